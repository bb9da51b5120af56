//! Error types for discovery and scale-down

use crate::models::ControllerRef;
use thiserror::Error;

/// Main error type for unmount operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A listing or fetch against the cluster failed; fatal to the run
    #[error("failed to {operation} {target}: {source}")]
    Discovery {
        operation: &'static str,
        target: String,
        #[source]
        source: kube::Error,
    },

    /// Reading or updating one controller's scale failed
    #[error("failed to {action} {} {}/{}: {source}", .controller.kind, .controller.namespace, .controller.name)]
    ScaleUpdate {
        action: &'static str,
        controller: ControllerRef,
        #[source]
        source: kube::Error,
    },

    /// Deleting a standalone pod failed
    #[error("failed to delete pod {namespace}/{name}: {source}")]
    Delete {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// Flag combination rejected before discovery
    #[error("invalid arguments: {0}")]
    InvalidFilter(String),
}

impl Error {
    pub(crate) fn discovery(
        operation: &'static str,
        target: impl Into<String>,
        source: kube::Error,
    ) -> Self {
        Self::Discovery {
            operation,
            target: target.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
