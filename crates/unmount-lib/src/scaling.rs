//! Scaling controllers down to zero replicas
//!
//! [`Scaler::scale_down`] dispatches on the controller kind:
//! scalable kinds go through their scale subresource, standalone pods are
//! deleted, and everything else is skipped with a warning. A batch never
//! stops at the first failure; see [`Scaler::scale_down_all`].

use crate::cluster::{ClusterApi, Scalable};
use crate::error::{Error, Result};
use crate::models::{ControllerKind, ControllerRef};
use k8s_openapi::api::autoscaling::v1::ScaleSpec;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a successful scale-down did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// Replicas were reduced from `from` to zero
    Scaled { from: i32 },
    /// The controller was already at zero; nothing was written
    AlreadyScaledDown,
    /// A standalone pod was deleted
    Deleted,
    /// Dry-run mode; nothing was touched
    DryRun,
    /// The kind cannot be scaled and was left alone
    Skipped { reason: String },
}

impl std::fmt::Display for ScaleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scaled { from } => write!(f, "scaled from {from} to 0"),
            Self::AlreadyScaledDown => f.write_str("already at 0"),
            Self::Deleted => f.write_str("deleted"),
            Self::DryRun => f.write_str("dry-run"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// Per-controller results of a batch scale-down, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    results: Vec<(ControllerRef, Result<ScaleOutcome>)>,
}

impl BatchReport {
    pub fn results(&self) -> &[(ControllerRef, Result<ScaleOutcome>)] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ControllerRef, &Error)> {
        self.results
            .iter()
            .filter_map(|(ctrl, res)| res.as_ref().err().map(|e| (ctrl, e)))
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&ControllerRef, &ScaleOutcome)> {
        self.results
            .iter()
            .filter_map(|(ctrl, res)| res.as_ref().ok().map(|o| (ctrl, o)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Scales controllers down to zero
pub struct Scaler {
    cluster: Arc<dyn ClusterApi>,
    dry_run: bool,
}

impl Scaler {
    pub fn new(cluster: Arc<dyn ClusterApi>, dry_run: bool) -> Self {
        Self { cluster, dry_run }
    }

    /// Scale one controller down to zero
    pub async fn scale_down(&self, ctrl: &ControllerRef) -> Result<ScaleOutcome> {
        if self.dry_run {
            info!(controller = %ctrl, "Dry-run, skipping controller");
            return Ok(ScaleOutcome::DryRun);
        }

        match &ctrl.kind {
            ControllerKind::Pod => self.delete_pod(ctrl).await,
            ControllerKind::DaemonSet => {
                warn!(
                    namespace = %ctrl.namespace,
                    name = %ctrl.name,
                    "Cannot scale down DaemonSet (DaemonSets cannot be scaled)"
                );
                Ok(ScaleOutcome::Skipped {
                    reason: "DaemonSets cannot be scaled".to_string(),
                })
            }
            kind => match self.cluster.scalable(kind, &ctrl.namespace) {
                Some(scaler) => scale_to_zero(scaler.as_ref(), ctrl).await,
                None => {
                    warn!(
                        kind = %kind,
                        namespace = %ctrl.namespace,
                        name = %ctrl.name,
                        "Unsupported controller type, skipping"
                    );
                    Ok(ScaleOutcome::Skipped {
                        reason: format!("unsupported controller type {kind}"),
                    })
                }
            },
        }
    }

    /// Scale every controller, recording failures without stopping
    pub async fn scale_down_all(&self, controllers: &[ControllerRef]) -> BatchReport {
        let mut report = BatchReport::default();
        for ctrl in controllers {
            let result = self.scale_down(ctrl).await;
            if let Err(e) = &result {
                error!(controller = %ctrl, error = %e, "Scale down failed");
            }
            report.results.push((ctrl.clone(), result));
        }
        report
    }

    async fn delete_pod(&self, ctrl: &ControllerRef) -> Result<ScaleOutcome> {
        self.cluster
            .delete_pod(&ctrl.namespace, &ctrl.name)
            .await
            .map_err(|source| Error::Delete {
                namespace: ctrl.namespace.clone(),
                name: ctrl.name.clone(),
                source,
            })?;
        info!(namespace = %ctrl.namespace, name = %ctrl.name, "Deleted standalone Pod");
        Ok(ScaleOutcome::Deleted)
    }
}

async fn scale_to_zero(scaler: &dyn Scalable, ctrl: &ControllerRef) -> Result<ScaleOutcome> {
    let scale_error = |action, source| Error::ScaleUpdate {
        action,
        controller: ctrl.clone(),
        source,
    };

    let mut scale = scaler
        .get_scale(&ctrl.name)
        .await
        .map_err(|e| scale_error("get scale for", e))?;

    let original = scale.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
    if original == 0 {
        info!(controller = %ctrl, "Already scaled to 0");
        return Ok(ScaleOutcome::AlreadyScaledDown);
    }

    scale.spec = Some(ScaleSpec { replicas: Some(0) });
    scaler
        .update_scale(&ctrl.name, &scale)
        .await
        .map_err(|e| scale_error("scale down", e))?;

    info!(controller = %ctrl, replicas = original, "Scaled down from {} to 0 replicas", original);
    Ok(ScaleOutcome::Scaled { from: original })
}
