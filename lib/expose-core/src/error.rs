use std::fmt;
use thiserror::Error;

/// Kind of derived resource managed by the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Internal exposure (Service)
    Exposure,
    /// Externally routable entry point (Ingress)
    EntryPoint,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Exposure => write!(f, "Service"),
            ResourceKind::EntryPoint => write!(f, "Ingress"),
        }
    }
}

/// Why a workload's rule cannot be acted upon. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("value {value:?} of annotation {key} has no known zone")]
    NoResolvableZone { key: String, value: String },

    #[error("zone {0:?} is neither a private nor a public zone")]
    UnknownZone(String),

    #[error("label {0} is missing")]
    MissingSubdomainLabel(String),

    #[error("no container port declared")]
    MissingContainerPort,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name}: {message}")]
    Transient {
        kind: ResourceKind,
        namespace: String,
        name: String,
        message: String,
    },
}

impl StoreError {
    pub fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn already_exists(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        StoreError::AlreadyExists {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn transient(
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        message: impl Into<String>,
    ) -> Self {
        StoreError::Transient {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("annotation key must not be empty")]
    EmptyAnnotationKey,

    #[error("subdomain label key must not be empty")]
    EmptySubdomainLabel,

    #[error("no private or public zones configured")]
    NoZones,
}
