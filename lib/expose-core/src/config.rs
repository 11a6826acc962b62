//! Controller configuration, loaded once at startup and shared read-only

use crate::error::ConfigError;
use crate::zone::ZoneResolver;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Immutable configuration for the reconciliation engine.
///
/// Every token of a zone group maps to the full domain list of that group;
/// tokens and domains are not positionally paired.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigSet {
    /// Annotation carrying the comma-separated zone tokens
    pub annotation_key: String,
    /// Label naming the host prefix, e.g. `orders.`
    pub label_subdomain_key: String,
    /// Label naming the URL path (default `/`)
    pub label_path_key: String,
    /// Populate the Ingress TLS block with every generated host
    pub tls_enabled: bool,
    /// Appended to the zone token to form the IngressClass name
    pub ingress_class_suffix: String,
    pub private_zone_tokens: BTreeSet<String>,
    pub public_zone_tokens: BTreeSet<String>,
    pub private_domains: Vec<String>,
    pub public_domains: Vec<String>,
}

impl ConfigSet {
    pub fn resolver(&self) -> ZoneResolver<'_> {
        ZoneResolver::new(self)
    }

    /// Reject configuration under which no workload could ever be exposed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.annotation_key.is_empty() {
            return Err(ConfigError::EmptyAnnotationKey);
        }
        if self.label_subdomain_key.is_empty() {
            return Err(ConfigError::EmptySubdomainLabel);
        }
        if self.private_zone_tokens.is_empty() && self.public_zone_tokens.is_empty() {
            return Err(ConfigError::NoZones);
        }
        Ok(())
    }

    /// Tokens configured in both groups; they resolve as private
    pub fn overlapping_tokens(&self) -> Vec<&str> {
        self.private_zone_tokens
            .intersection(&self.public_zone_tokens)
            .map(String::as_str)
            .collect()
    }

    pub fn log_summary(&self) {
        info!("Annotation key: {}", self.annotation_key);
        info!("Subdomain label: {}", self.label_subdomain_key);
        info!("Path label: {}", self.label_path_key);
        info!("IngressClass suffix: {}", self.ingress_class_suffix);
        info!("Private zones: {:?}", self.private_zone_tokens);
        info!("Public zones: {:?}", self.public_zone_tokens);
        info!("Private domains: {:?}", self.private_domains);
        info!("Public domains: {:?}", self.public_domains);
        info!("TLS: {}", self.tls_enabled);

        for token in self.overlapping_tokens() {
            warn!("Zone {} is both private and public, treating it as private", token);
        }
    }
}
