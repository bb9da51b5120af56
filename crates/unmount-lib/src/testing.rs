//! In-memory cluster and object builders shared by unit tests

use crate::cluster::{ClusterApi, Scalable};
use crate::models::ControllerKind;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::autoscaling::v1::{Scale, ScaleSpec};
use k8s_openapi::api::core::v1::{
    ObjectReference, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PersistentVolumeSpec, Pod, PodSpec, PodStatus, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::error::ErrorResponse;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {reason}"),
        reason: reason.to_string(),
        code,
    })
}

fn meta(namespace: Option<&str>, name: &str, owner: Option<(&str, &str)>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(String::from),
        owner_references: owner.map(|(kind, name)| {
            vec![OwnerReference {
                api_version: "apps/v1".to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
                uid: format!("uid-{name}"),
                controller: Some(true),
                ..Default::default()
            }]
        }),
        ..Default::default()
    }
}

pub fn pod(
    namespace: &str,
    name: &str,
    claims: &[&str],
    owner: Option<(&str, &str)>,
    phase: &str,
) -> Pod {
    let mut volumes = vec![Volume {
        name: "config".to_string(),
        ..Default::default()
    }];
    volumes.extend(claims.iter().enumerate().map(|(i, claim)| Volume {
        name: format!("data-{i}"),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            read_only: None,
        }),
        ..Default::default()
    }));

    Pod {
        metadata: meta(Some(namespace), name, owner),
        spec: Some(PodSpec {
            volumes: Some(volumes),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

pub fn claim(namespace: &str, name: &str, storage_class: Option<&str>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: meta(Some(namespace), name, None),
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: storage_class.map(String::from),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn volume(name: &str, storage_class: Option<&str>, bound_to: Option<(&str, &str)>) -> PersistentVolume {
    PersistentVolume {
        metadata: meta(None, name, None),
        spec: Some(PersistentVolumeSpec {
            storage_class_name: storage_class.map(String::from),
            claim_ref: bound_to.map(|(namespace, claim)| ObjectReference {
                kind: Some("PersistentVolumeClaim".to_string()),
                namespace: Some(namespace.to_string()),
                name: Some(claim.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn replica_set(namespace: &str, name: &str, owner: Option<(&str, &str)>) -> ReplicaSet {
    ReplicaSet {
        metadata: meta(Some(namespace), name, owner),
        ..Default::default()
    }
}

pub fn scale(replicas: i32) -> Scale {
    Scale {
        spec: Some(ScaleSpec {
            replicas: Some(replicas),
        }),
        ..Default::default()
    }
}

#[derive(Default)]
struct FakeState {
    claims: Vec<PersistentVolumeClaim>,
    volumes: Vec<PersistentVolume>,
    pods: Vec<Pod>,
    replica_sets: Vec<ReplicaSet>,
    /// Replica counts keyed by `kind/namespace/name`
    replicas: HashMap<String, i32>,
    /// Operations that fail, e.g. `list_pods:ns1` or `update_scale:Deployment/ns1/web`
    failures: HashSet<String>,
    /// Remaining failures for operations that fail a limited number of times
    transient: HashMap<String, usize>,
    scale_writes: usize,
    pod_lists: usize,
}

/// Cluster state held in memory
///
/// Scaling a controller to zero removes the pods it owns, directly or through
/// a replica set, so convergence can be observed.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_claim(&self, claim: PersistentVolumeClaim) -> &Self {
        self.with(|s| s.claims.push(claim));
        self
    }

    pub fn add_volume(&self, volume: PersistentVolume) -> &Self {
        self.with(|s| s.volumes.push(volume));
        self
    }

    pub fn add_pod(&self, pod: Pod) -> &Self {
        self.with(|s| s.pods.push(pod));
        self
    }

    pub fn add_replica_set(&self, rs: ReplicaSet) -> &Self {
        self.with(|s| s.replica_sets.push(rs));
        self
    }

    pub fn set_replicas(&self, key: &str, replicas: i32) -> &Self {
        self.with(|s| s.replicas.insert(key.to_string(), replicas));
        self
    }

    pub fn replicas(&self, key: &str) -> Option<i32> {
        self.with(|s| s.replicas.get(key).copied())
    }

    pub fn fail(&self, operation: &str) -> &Self {
        self.with(|s| s.failures.insert(operation.to_string()));
        self
    }

    pub fn fail_times(&self, operation: &str, times: usize) -> &Self {
        self.with(|s| s.transient.insert(operation.to_string(), times));
        self
    }

    pub fn scale_writes(&self) -> usize {
        self.with(|s| s.scale_writes)
    }

    pub fn pod_lists(&self) -> usize {
        self.with(|s| s.pod_lists)
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.with(|s| s.pods.iter().filter_map(|p| p.metadata.name.clone()).collect())
    }

    fn check(&self, operation: String) -> kube::Result<()> {
        self.with(|s| {
            if s.failures.contains(&operation) {
                return Err(api_error(500, &operation));
            }
            if let Some(remaining) = s.transient.get_mut(&operation) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(api_error(503, &operation));
                }
            }
            Ok(())
        })
    }
}

fn owned_by(meta: &ObjectMeta, kind: &str, name: &str) -> bool {
    meta.owner_references
        .iter()
        .flatten()
        .any(|o| o.kind == kind && o.name == name)
}

impl FakeState {
    fn remove_pods_of(&mut self, kind: &ControllerKind, namespace: &str, name: &str) {
        let mut owners = vec![(kind.to_string(), name.to_string())];
        if *kind == ControllerKind::Deployment {
            owners.extend(
                self.replica_sets
                    .iter()
                    .filter(|rs| rs.metadata.namespace.as_deref() == Some(namespace))
                    .filter(|rs| owned_by(&rs.metadata, "Deployment", name))
                    .filter_map(|rs| rs.metadata.name.clone())
                    .map(|rs| ("ReplicaSet".to_string(), rs)),
            );
        }
        self.pods.retain(|pod| {
            pod.metadata.namespace.as_deref() != Some(namespace)
                || !owners
                    .iter()
                    .any(|(kind, name)| owned_by(&pod.metadata, kind, name))
        });
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_claims(&self, namespace: &str) -> kube::Result<Vec<PersistentVolumeClaim>> {
        self.check(format!("list_claims:{namespace}"))?;
        Ok(self.with(|s| {
            s.claims
                .iter()
                .filter(|c| c.metadata.namespace.as_deref() == Some(namespace))
                .cloned()
                .collect()
        }))
    }

    async fn list_volumes(&self) -> kube::Result<Vec<PersistentVolume>> {
        self.check("list_volumes".to_string())?;
        Ok(self.with(|s| s.volumes.clone()))
    }

    async fn list_pods(&self, namespace: &str) -> kube::Result<Vec<Pod>> {
        self.with(|s| s.pod_lists += 1);
        self.check(format!("list_pods:{namespace}"))?;
        Ok(self.with(|s| {
            s.pods
                .iter()
                .filter(|p| p.metadata.namespace.as_deref() == Some(namespace))
                .cloned()
                .collect()
        }))
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> kube::Result<ReplicaSet> {
        self.check(format!("get_replica_set:{namespace}/{name}"))?;
        self.with(|s| {
            s.replica_sets
                .iter()
                .find(|rs| {
                    rs.metadata.namespace.as_deref() == Some(namespace)
                        && rs.metadata.name.as_deref() == Some(name)
                })
                .cloned()
                .ok_or_else(|| api_error(404, "NotFound"))
        })
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.check(format!("delete_pod:{namespace}/{name}"))?;
        self.with(|s| {
            s.pods.retain(|p| {
                p.metadata.namespace.as_deref() != Some(namespace)
                    || p.metadata.name.as_deref() != Some(name)
            })
        });
        Ok(())
    }

    fn scalable(&self, kind: &ControllerKind, namespace: &str) -> Option<Box<dyn Scalable>> {
        kind.is_scalable().then(|| {
            Box::new(FakeScaler {
                cluster: self.clone(),
                kind: kind.clone(),
                namespace: namespace.to_string(),
            }) as Box<dyn Scalable>
        })
    }
}

struct FakeScaler {
    cluster: FakeCluster,
    kind: ControllerKind,
    namespace: String,
}

impl FakeScaler {
    fn key(&self, name: &str) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, name)
    }
}

#[async_trait]
impl Scalable for FakeScaler {
    async fn get_scale(&self, name: &str) -> kube::Result<Scale> {
        let key = self.key(name);
        self.cluster.check(format!("get_scale:{key}"))?;
        self.cluster.with(|s| {
            s.replicas
                .get(&key)
                .map(|replicas| scale(*replicas))
                .ok_or_else(|| api_error(404, "NotFound"))
        })
    }

    async fn update_scale(&self, name: &str, new_scale: &Scale) -> kube::Result<Scale> {
        let key = self.key(name);
        self.cluster.check(format!("update_scale:{key}"))?;
        let replicas = new_scale.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
        self.cluster.with(|s| {
            s.scale_writes += 1;
            s.replicas.insert(key, replicas);
            if replicas == 0 {
                s.remove_pods_of(&self.kind, &self.namespace, name);
            }
        });
        Ok(scale(replicas))
    }
}
