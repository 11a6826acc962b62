//! Command line and environment configuration

use clap::{ArgAction, Parser};
use expose_core::ConfigSet;
use std::convert::Infallible;

/// Every option can also be set through the environment variable named after
/// its configuration key, e.g. `annotation.key` or `labelSubdomain`.
#[derive(Parser, Debug)]
#[command(name = "expose-controller")]
#[command(about = "Creates Services and per-zone Ingresses for annotated Deployments", long_about = None)]
#[command(version)]
pub struct ControllerArgs {
    /// Suffix appended to the zone name to form the IngressClass name
    #[arg(long, env = "ingressClassNameSuffix", default_value = "", allow_hyphen_values = true)]
    pub ingress_class_name_suffix: String,

    /// Label holding the host prefix of the workload (e.g. "orders.")
    #[arg(long, env = "labelSubdomain", default_value = "")]
    pub label_subdomain: String,

    /// Label holding the URL path of the workload (defaults to "/")
    #[arg(long, env = "labelPath", default_value = "")]
    pub label_path: String,

    /// Add a TLS block listing every generated host
    #[arg(long, env = "tls", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    pub tls: bool,

    /// Annotation holding the comma-separated zones of a Deployment
    #[arg(long = "annotation-key", env = "annotation.key", default_value = "")]
    pub annotation_key: String,

    /// Zones routed through private gateways
    #[arg(long = "annotation-privates", env = "annotation.privates", value_delimiter = ',')]
    pub annotation_privates: Vec<String>,

    /// Zones routed through public gateways
    #[arg(long = "annotation-publics", env = "annotation.publics", value_delimiter = ',')]
    pub annotation_publics: Vec<String>,

    /// Domain suffixes of private zones
    #[arg(long = "domain-privates", env = "domain.privates", value_delimiter = ',')]
    pub domain_privates: Vec<String>,

    /// Domain suffixes of public zones
    #[arg(long = "domain-publics", env = "domain.publics", value_delimiter = ',')]
    pub domain_publics: Vec<String>,

    /// Number of workloads reconciled concurrently
    #[arg(long, env = "WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Keep resources in memory instead of writing them to the cluster
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl ControllerArgs {
    pub fn config_set(&self) -> ConfigSet {
        ConfigSet {
            annotation_key: self.annotation_key.clone(),
            label_subdomain_key: self.label_subdomain.clone(),
            label_path_key: self.label_path.clone(),
            tls_enabled: self.tls,
            ingress_class_suffix: self.ingress_class_name_suffix.clone(),
            private_zone_tokens: non_empty(&self.annotation_privates).collect(),
            public_zone_tokens: non_empty(&self.annotation_publics).collect(),
            private_domains: non_empty(&self.domain_privates).collect(),
            public_domains: non_empty(&self.domain_publics).collect(),
        }
    }
}

fn non_empty(values: &[String]) -> impl Iterator<Item = String> + '_ {
    values.iter().filter(|v| !v.is_empty()).cloned()
}

/// Lenient boolean: anything that is not a recognised true value is false
pub fn parse_flag(value: &str) -> Result<bool, Infallible> {
    Ok(matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True"))
}
