//! Claim selection by namespace and storage class

use super::Finder;
use crate::error::{Error, Result};
use crate::models::{ClaimSet, VolumeFilter};
use tracing::{debug, warn};

impl Finder {
    /// Resolve a filter to the set of matching claims, grouped by namespace
    ///
    /// An explicit claim name is used verbatim without touching the cluster.
    /// With a namespace, claims are listed in that namespace; without one,
    /// volumes are listed cluster-wide and mapped back to their claims.
    pub async fn find_claims(&self, filter: &VolumeFilter) -> Result<ClaimSet> {
        if let (Some(namespace), Some(claim)) = (filter.namespace(), filter.claim_name()) {
            return Ok(ClaimSet::from_iter([(namespace, claim)]));
        }

        match filter.namespace() {
            Some(namespace) => self.find_claims_in_namespace(namespace, filter).await,
            None => self.find_claims_from_volumes(filter).await,
        }
    }

    async fn find_claims_in_namespace(
        &self,
        namespace: &str,
        filter: &VolumeFilter,
    ) -> Result<ClaimSet> {
        let claims = self
            .cluster
            .list_claims(namespace)
            .await
            .map_err(|e| {
                Error::discovery(
                    "list persistent volume claims in",
                    format!("namespace {namespace}"),
                    e,
                )
            })?;

        let mut found = ClaimSet::new();
        for claim in claims {
            let storage_class = claim
                .spec
                .as_ref()
                .and_then(|spec| spec.storage_class_name.as_deref());
            if !filter.matches_storage_class(storage_class) {
                continue;
            }
            let Some(name) = claim.metadata.name else {
                continue;
            };
            let ns = claim.metadata.namespace.unwrap_or_else(|| namespace.to_string());
            found.insert(ns, name);
        }

        debug!(namespace = %namespace, count = found.len(), "Matched claims in namespace");
        Ok(found)
    }

    async fn find_claims_from_volumes(&self, filter: &VolumeFilter) -> Result<ClaimSet> {
        let volumes = self
            .cluster
            .list_volumes()
            .await
            .map_err(|e| Error::discovery("list", "persistent volumes", e))?;

        let mut found = ClaimSet::new();
        for volume in volumes {
            let volume_name = volume.metadata.name.unwrap_or_default();
            let Some(spec) = volume.spec else {
                continue;
            };
            if !filter.matches_storage_class(spec.storage_class_name.as_deref()) {
                continue;
            }
            let bound = spec.claim_ref.and_then(|r| r.namespace.zip(r.name));
            match bound {
                Some((namespace, claim)) => {
                    found.insert(namespace, claim);
                }
                None => {
                    warn!(volume = %volume_name, "PersistentVolume has no claim reference, skipping");
                }
            }
        }

        debug!(
            namespaces = found.namespaces().count(),
            count = found.len(),
            "Matched claims from volumes"
        );
        Ok(found)
    }
}
