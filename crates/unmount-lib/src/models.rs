//! Core data models for volume discovery and scale-down

use crate::error::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a resource that can own (or be) a workload instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerKind {
    Pod,
    ReplicaSet,
    Deployment,
    StatefulSet,
    DaemonSet,
    /// Any kind this tool does not know how to handle
    Other(String),
}

impl ControllerKind {
    /// Platform kind string, as it appears in owner references
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pod => "Pod",
            Self::ReplicaSet => "ReplicaSet",
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Other(kind) => kind,
        }
    }

    /// Whether the kind exposes a scale subresource
    pub fn is_scalable(&self) -> bool {
        matches!(self, Self::ReplicaSet | Self::Deployment | Self::StatefulSet)
    }
}

impl From<&str> for ControllerKind {
    fn from(kind: &str) -> Self {
        match kind {
            "Pod" => Self::Pod,
            "ReplicaSet" => Self::ReplicaSet,
            "Deployment" => Self::Deployment,
            "StatefulSet" => Self::StatefulSet,
            "DaemonSet" => Self::DaemonSet,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level controller of one or more pods
///
/// Identity is the `(kind, namespace, name)` triple. [`ControllerRef::key`]
/// yields the canonical `kind/namespace/name` string used for deduplication
/// and for the list printed on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerRef {
    pub kind: ControllerKind,
    pub namespace: String,
    pub name: String,
}

impl ControllerRef {
    pub fn new(kind: ControllerKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Canonical `kind/namespace/name` key
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Criteria selecting which claims to unmount
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFilter {
    /// Namespace to search; `None` searches cluster-wide via volumes
    pub namespace: Option<String>,
    /// Storage class to match; `None` matches every class
    pub storage_class: Option<String>,
    /// Explicit claim name, used verbatim (requires `namespace`)
    pub claim_name: Option<String>,
}

impl VolumeFilter {
    /// Reject flag combinations before any discovery runs
    pub fn validate(&self) -> Result<()> {
        let namespace = non_empty(&self.namespace);
        let storage_class = non_empty(&self.storage_class);
        let claim_name = non_empty(&self.claim_name);

        if claim_name.is_some() && namespace.is_none() {
            return Err(Error::InvalidFilter(
                "--pvc requires --namespace".to_string(),
            ));
        }
        if namespace.is_none() && storage_class.is_none() {
            return Err(Error::InvalidFilter(
                "you must specify at least one of --namespace or --storage-class".to_string(),
            ));
        }
        if claim_name.is_some() && storage_class.is_some() {
            return Err(Error::InvalidFilter(
                "--pvc and --storage-class are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn namespace(&self) -> Option<&str> {
        non_empty(&self.namespace)
    }

    pub fn storage_class(&self) -> Option<&str> {
        non_empty(&self.storage_class)
    }

    pub fn claim_name(&self) -> Option<&str> {
        non_empty(&self.claim_name)
    }

    /// Storage class match policy
    ///
    /// An unset filter matches everything. A resource without a storage class
    /// never matches a set filter.
    pub fn matches_storage_class(&self, storage_class_name: Option<&str>) -> bool {
        match self.storage_class() {
            None => true,
            Some(filter) => storage_class_name == Some(filter),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Claim names grouped by namespace
///
/// Namespaces iterate in sorted order; claims keep insertion order and are
/// never duplicated within a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    by_namespace: BTreeMap<String, Vec<String>>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a claim; returns false if it was already present
    pub fn insert(&mut self, namespace: impl Into<String>, claim: impl Into<String>) -> bool {
        let claim = claim.into();
        let claims = self.by_namespace.entry(namespace.into()).or_default();
        if claims.contains(&claim) {
            return false;
        }
        claims.push(claim);
        true
    }

    pub fn contains(&self, namespace: &str, claim: &str) -> bool {
        self.by_namespace
            .get(namespace)
            .is_some_and(|claims| claims.iter().any(|c| c == claim))
    }

    pub fn claims(&self, namespace: &str) -> &[String] {
        self.by_namespace
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.by_namespace.keys().map(String::as_str)
    }

    /// Total number of claims across namespaces
    pub fn len(&self) -> usize {
        self.by_namespace.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<N: Into<String>, C: Into<String>> FromIterator<(N, C)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (N, C)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (namespace, claim) in iter {
            set.insert(namespace, claim);
        }
        set
    }
}

/// Pick the owner reference that identifies an object's controller
///
/// Prefers the reference flagged `controller: true`, else the first one.
pub fn controlling_owner(owners: Option<&[OwnerReference]>) -> Option<&OwnerReference> {
    let owners = owners?;
    owners
        .iter()
        .find(|o| o.controller == Some(true))
        .or_else(|| owners.first())
}
