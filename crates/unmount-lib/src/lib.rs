//! Engine for unmounting persistent volumes from a Kubernetes cluster
//!
//! This crate provides the core functionality for:
//! - Selecting claims by namespace, storage class or name
//! - Finding the live pods that mount them
//! - Resolving pods to their top-level controllers
//! - Scaling those controllers to zero, tolerating per-controller failures
//! - Waiting until no pod mounts the claims any more

pub mod cluster;
pub mod discovery;
pub mod error;
pub mod models;
pub mod plan;
pub mod scaling;
pub mod wait;

#[cfg(test)]
mod testing;

pub use cluster::{ClusterApi, KubeCluster, Scalable};
pub use discovery::Finder;
pub use error::{Error, Result};
pub use models::*;
pub use plan::{discover, is_unmounted, Plan};
pub use scaling::{BatchReport, ScaleOutcome, Scaler};
pub use wait::{spawn_wait, WaitHandle, WaitOptions, WaitOutcome, DEFAULT_POLL_INTERVAL};
