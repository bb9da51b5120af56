//! Owner reference resolution
//!
//! A pod resolves to its top-level controller in at most two hops:
//!
//! ```text
//! Pod (no owner)                  -> Pod itself
//! Pod -> ReplicaSet -> Deployment -> Deployment
//! Pod -> ReplicaSet (no owner)    -> ReplicaSet
//! Pod -> any other kind           -> that owner
//! ```
//!
//! Ownership never crosses namespaces, so every hop reuses the pod's namespace.

use super::Finder;
use crate::error::{Error, Result};
use crate::models::{controlling_owner, ControllerKind, ControllerRef};
use k8s_openapi::api::core::v1::Pod;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// `namespace/name` identity of a pod
pub fn pod_key(pod: &Pod, fallback_namespace: &str) -> String {
    format!(
        "{}/{}",
        pod.metadata.namespace.as_deref().unwrap_or(fallback_namespace),
        pod.metadata.name.as_deref().unwrap_or_default()
    )
}

impl Finder {
    /// Resolve one pod to its top-level controller
    ///
    /// A replica set that cannot be fetched fails the resolution rather than
    /// being treated as top-level.
    pub async fn find_controller(&self, pod: &Pod) -> Result<ControllerRef> {
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let pod_name = pod.metadata.name.clone().unwrap_or_default();

        let Some(owner) = controlling_owner(pod.metadata.owner_references.as_deref()) else {
            return Ok(ControllerRef::new(ControllerKind::Pod, namespace, pod_name));
        };

        let owner_kind = ControllerKind::from(owner.kind.as_str());
        if owner_kind != ControllerKind::ReplicaSet {
            return Ok(ControllerRef::new(owner_kind, namespace, owner.name.clone()));
        }

        let rs = self
            .cluster
            .get_replica_set(&namespace, &owner.name)
            .await
            .map_err(|e| {
                Error::discovery(
                    "get",
                    format!("ReplicaSet {}/{} owning pod {}", namespace, owner.name, pod_name),
                    e,
                )
            })?;

        let rs_name = rs.metadata.name.clone().unwrap_or_else(|| owner.name.clone());
        match controlling_owner(rs.metadata.owner_references.as_deref()) {
            Some(rs_owner) => Ok(ControllerRef::new(
                ControllerKind::from(rs_owner.kind.as_str()),
                namespace,
                rs_owner.name.clone(),
            )),
            None => Ok(ControllerRef::new(ControllerKind::ReplicaSet, namespace, rs_name)),
        }
    }

    /// Resolve pods to their deduplicated top-level controllers
    ///
    /// Controllers keep the order in which they were first seen. The first
    /// failed resolution aborts the whole call.
    pub async fn find_controllers(&self, pods: &[Pod]) -> Result<Vec<ControllerRef>> {
        info!(pods = pods.len(), "Finding controllers for pods");

        let mut seen = HashSet::new();
        let mut controllers = Vec::new();
        for pod in pods {
            let ctrl = match self.find_controller(pod).await {
                Ok(ctrl) => ctrl,
                Err(e) => {
                    warn!(pod = %pod_key(pod, ""), error = %e, "Failed to find controller for pod");
                    return Err(e);
                }
            };
            if seen.insert(ctrl.key()) {
                debug!(pod = %pod_key(pod, ""), controller = %ctrl, "Resolved controller");
                controllers.push(ctrl);
            }
        }

        Ok(controllers)
    }
}
