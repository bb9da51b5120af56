//! End-to-end discovery: filter to claims, claims to pods, pods to controllers

use crate::discovery::Finder;
use crate::error::Result;
use crate::models::{ClaimSet, ControllerRef, VolumeFilter};
use k8s_openapi::api::core::v1::Pod;
use tracing::info;

/// Everything discovery found for one run
#[derive(Debug, Default)]
pub struct Plan {
    pub claims: ClaimSet,
    pub pods: Vec<Pod>,
    pub controllers: Vec<ControllerRef>,
}

impl Plan {
    /// True when there is nothing to scale down
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// Run every discovery stage for a filter
///
/// Stops early, returning a partially filled plan, when a stage finds
/// nothing. Any discovery error aborts the whole plan.
pub async fn discover(finder: &Finder, filter: &VolumeFilter) -> Result<Plan> {
    info!("Finding volumes...");
    let claims = finder.find_claims(filter).await?;
    if claims.is_empty() {
        info!("No matching PVCs found, nothing to do");
        return Ok(Plan::default());
    }
    info!(claims = claims.len(), "Found matching PVCs");

    info!("Finding pods...");
    let pods = finder.find_pods(&claims).await?;
    if pods.is_empty() {
        info!("No pods found, nothing to do");
        return Ok(Plan {
            claims,
            ..Default::default()
        });
    }
    info!("Found {} pods to scale down", pods.len());

    let controllers = finder.find_controllers(&pods).await?;
    info!("Found {} controllers to scale down", controllers.len());

    Ok(Plan {
        claims,
        pods,
        controllers,
    })
}

/// Whether no live pod mounts any of the claims any more
pub async fn is_unmounted(finder: &Finder, claims: &ClaimSet) -> Result<bool> {
    Ok(finder.find_pods(claims).await?.is_empty())
}
