//! Pods mounting a set of claims

use super::{owners::pod_key, Finder};
use crate::error::{Error, Result};
use crate::models::ClaimSet;
use k8s_openapi::api::core::v1::Pod;
use std::collections::HashSet;
use tracing::debug;

/// Whether the pod has finished and will never run again
pub fn is_terminal(pod: &Pod) -> bool {
    matches!(
        pod.status.as_ref().and_then(|s| s.phase.as_deref()),
        Some("Succeeded") | Some("Failed")
    )
}

fn mounts_any(pod: &Pod, namespace: &str, claims: &ClaimSet) -> bool {
    pod.spec
        .iter()
        .flat_map(|spec| spec.volumes.iter().flatten())
        .filter_map(|volume| volume.persistent_volume_claim.as_ref())
        .any(|source| claims.contains(namespace, &source.claim_name))
}

impl Finder {
    /// Find every non-terminal pod mounting any of the claims
    ///
    /// Pods are deduplicated by `namespace/name`. The first failed listing
    /// aborts the search.
    pub async fn find_pods(&self, claims: &ClaimSet) -> Result<Vec<Pod>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for namespace in claims.namespaces() {
            let pods = self
                .cluster
                .list_pods(namespace)
                .await
                .map_err(|e| Error::discovery("list pods in", format!("namespace {namespace}"), e))?;

            for pod in pods {
                if is_terminal(&pod) || !mounts_any(&pod, namespace, claims) {
                    continue;
                }
                if seen.insert(pod_key(&pod, namespace)) {
                    found.push(pod);
                }
            }
        }

        debug!(count = found.len(), "Found pods using claims");
        Ok(found)
    }
}
