//! Cluster API access
//!
//! [`ClusterApi`] is the seam between the unmount engine and the Kubernetes
//! API server. [`KubeCluster`] implements it on top of a `kube::Client`;
//! tests substitute mocks or an in-memory cluster.

use crate::models::ControllerKind;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v1::Scale;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim, Pod};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;

/// Read and write access to the scale subresource of one controller kind
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Scalable: Send + Sync {
    /// Fetch the current scale of the named controller
    async fn get_scale(&self, name: &str) -> kube::Result<Scale>;

    /// Persist a modified scale for the named controller
    async fn update_scale(&self, name: &str, scale: &Scale) -> kube::Result<Scale>;
}

#[async_trait]
impl<K> Scalable for Api<K>
where
    K: Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn get_scale(&self, name: &str) -> kube::Result<Scale> {
        Api::<K>::get_scale(self, name).await
    }

    async fn update_scale(&self, name: &str, scale: &Scale) -> kube::Result<Scale> {
        let data = serde_json::to_vec(scale).map_err(kube::Error::SerdeError)?;
        self.replace_scale(name, &PostParams::default(), data).await
    }
}

/// Operations the engine needs from the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List persistent volume claims in a namespace
    async fn list_claims(&self, namespace: &str) -> kube::Result<Vec<PersistentVolumeClaim>>;

    /// List persistent volumes across the cluster
    async fn list_volumes(&self) -> kube::Result<Vec<PersistentVolume>>;

    /// List pods in a namespace
    async fn list_pods(&self, namespace: &str) -> kube::Result<Vec<Pod>>;

    /// Fetch a single replica set
    async fn get_replica_set(&self, namespace: &str, name: &str) -> kube::Result<ReplicaSet>;

    /// Delete a single pod
    async fn delete_pod(&self, namespace: &str, name: &str) -> kube::Result<()>;

    /// Scale capability for a controller kind, `None` if the kind cannot be scaled
    fn scalable(&self, kind: &ControllerKind, namespace: &str) -> Option<Box<dyn Scalable>>;
}

/// [`ClusterApi`] backed by a live Kubernetes client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_claims(&self, namespace: &str) -> kube::Result<Vec<PersistentVolumeClaim>> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_volumes(&self) -> kube::Result<Vec<PersistentVolume>> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_pods(&self, namespace: &str) -> kube::Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> kube::Result<ReplicaSet> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> kube::Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    fn scalable(&self, kind: &ControllerKind, namespace: &str) -> Option<Box<dyn Scalable>> {
        let client = self.client.clone();
        match kind {
            ControllerKind::Deployment => {
                Some(Box::new(Api::<Deployment>::namespaced(client, namespace)))
            }
            ControllerKind::StatefulSet => {
                Some(Box::new(Api::<StatefulSet>::namespaced(client, namespace)))
            }
            ControllerKind::ReplicaSet => {
                Some(Box::new(Api::<ReplicaSet>::namespaced(client, namespace)))
            }
            _ => None,
        }
    }
}
