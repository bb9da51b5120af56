//! Configuration management for the CLI

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use unmount_lib::WaitOptions;

/// Prefix for environment variable overrides, e.g. `UNMOUNT_POLL_INTERVAL_SECS`
pub const ENV_PREFIX: &str = "UNMOUNT";

/// Persistent CLI settings
///
/// Layered from `~/.config/kubectl-unmount/config.json` and then the
/// environment. Command-line flags override both.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    /// Seconds between convergence checks
    pub poll_interval_secs: Option<u64>,
    /// Seconds to wait for pods to go away; unset waits forever
    pub wait_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from the default file and the environment
    pub fn load() -> Result<Self> {
        let path = Self::config_path().ok();
        Self::load_with(path.as_deref(), config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings from an optional file and an environment source
    pub fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        builder
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Failed to parse settings")
    }

    /// Wait options after applying flag overrides
    pub fn wait_options(&self, poll_interval: Option<u64>, timeout: Option<u64>) -> WaitOptions {
        let defaults = WaitOptions::default();
        WaitOptions {
            interval: poll_interval
                .or(self.poll_interval_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            timeout: timeout
                .or(self.wait_timeout_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home
            .join(".config")
            .join("kubectl-unmount")
            .join("config.json"))
    }
}

/// Build a Kubernetes client
///
/// An explicit kubeconfig path or context is read directly; otherwise the
/// usual inference applies (`KUBECONFIG`, `~/.kube/config`, in-cluster).
pub async fn kube_client(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<kube::Client> {
    debug!(?kubeconfig, ?context, "Loading Kubernetes configuration");
    let config = if kubeconfig.is_none() && context.is_none() {
        kube::Config::infer()
            .await
            .context("Failed to read kubeconfig")?
    } else {
        let raw = match kubeconfig {
            Some(path) => Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?,
            None => Kubeconfig::read().context("Failed to read kubeconfig")?,
        };
        let options = KubeConfigOptions {
            context: context.map(String::from),
            ..Default::default()
        };
        kube::Config::from_custom_kubeconfig(raw, &options)
            .await
            .context("Failed to load kubeconfig context")?
    };

    debug!(cluster_url = %config.cluster_url, "Connecting to cluster");
    kube::Client::try_from(config).context("Failed to create Kubernetes client")
}
