//! Discovery of the workloads holding a set of volumes
//!
//! Discovery runs in three stages, each fail-fast:
//! - [`Finder::find_claims`] selects claims matching a [`VolumeFilter`]
//! - [`Finder::find_pods`] finds live pods mounting those claims
//! - [`Finder::find_controllers`] maps pods to their top-level controllers
//!
//! [`VolumeFilter`]: crate::models::VolumeFilter

mod owners;
mod pods;
mod volumes;


pub use owners::pod_key;
pub use pods::is_terminal;

use crate::cluster::ClusterApi;
use std::sync::Arc;

/// Runs discovery queries against a cluster
///
/// Cheap to clone; clones share the underlying cluster handle.
#[derive(Clone)]
pub struct Finder {
    cluster: Arc<dyn ClusterApi>,
}

impl Finder {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }
}
