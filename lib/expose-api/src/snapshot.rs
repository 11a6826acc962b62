//! Immutable Deployment snapshots

use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a workload: the unit events are serialized on
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The parts of a Deployment the controller derives resources from.
///
/// Taken once per event and never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadSnapshot {
    pub namespace: String,
    pub name: String,
    pub annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    /// Pod selector `matchLabels` of the Deployment
    pub selector: BTreeMap<String, String>,
    /// First port of the first container, if declared
    pub container_port: Option<i32>,
}

impl WorkloadSnapshot {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selector.insert(key.into(), value.into());
        self
    }

    pub fn with_container_port(mut self, port: i32) -> Self {
        self.container_port = Some(port);
        self
    }

    pub fn key(&self) -> WorkloadKey {
        WorkloadKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Capture a snapshot of a Deployment as delivered by the watcher
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let spec = deployment.spec.as_ref();

        let selector = spec
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default();

        let container_port = spec
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|pod| pod.containers.first())
            .and_then(|c| c.ports.as_ref())
            .and_then(|ports| ports.first())
            .map(|p| p.container_port);

        Self {
            namespace: deployment
                .namespace()
                .unwrap_or_else(|| "default".to_string()),
            name: deployment.name_any(),
            annotations: deployment.annotations().clone(),
            labels: deployment.labels().clone(),
            selector,
            container_port,
        }
    }
}

impl From<&Deployment> for WorkloadSnapshot {
    fn from(deployment: &Deployment) -> Self {
        Self::from_deployment(deployment)
    }
}
