//! Builders for the desired Service and Ingress objects of a workload

use crate::config::ConfigSet;
use crate::error::ValidationFailure;
use crate::naming;
use crate::rules::zone_tokens;
use crate::zone::ResolvedZone;
use expose_api::WorkloadSnapshot;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use tracing::warn;

/// Port the exposure Service listens on
pub const EXPOSURE_PORT: i32 = 80;
pub const DEFAULT_PATH: &str = "/";
/// Annotation recording which zone an Ingress was generated for
pub const ZONE_ANNOTATION: &str = "dns_zone";

const PATH_TYPE_PREFIX: &str = "Prefix";

pub struct SpecBuilder<'a> {
    config: &'a ConfigSet,
}

impl<'a> SpecBuilder<'a> {
    pub fn new(config: &'a ConfigSet) -> Self {
        Self { config }
    }

    /// ClusterIP Service forwarding port 80 to the workload's container port
    pub fn build_exposure(&self, workload: &WorkloadSnapshot) -> Result<Service, ValidationFailure> {
        let target = workload
            .container_port
            .ok_or(ValidationFailure::MissingContainerPort)?;

        Ok(Service {
            metadata: ObjectMeta {
                name: Some(naming::exposure_name(&workload.name)),
                namespace: Some(workload.namespace.clone()),
                labels: Some(workload.labels.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(workload.selector.clone()),
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port: EXPOSURE_PORT,
                    target_port: Some(IntOrString::Int(target)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                type_: Some("ClusterIP".to_string()),
                ..Default::default()
            }),
            status: None,
        })
    }

    /// One Ingress per known zone token of the annotation, in annotation order.
    ///
    /// Unknown tokens are skipped; duplicated tokens yield duplicated Ingresses.
    pub fn build_entry_points(&self, workload: &WorkloadSnapshot, exposure: &Service) -> Vec<Ingress> {
        let Some(annotation) = workload.annotation(&self.config.annotation_key) else {
            return Vec::new();
        };
        let resolver = self.config.resolver();

        zone_tokens(annotation)
            .filter_map(|token| match resolver.resolve(token) {
                Ok(zone) => Some(self.build_entry_point(workload, exposure, token, zone)),
                Err(e) => {
                    warn!(
                        namespace = %workload.namespace,
                        workload = %workload.name,
                        "Skipping zone: {}", e
                    );
                    None
                }
            })
            .collect()
    }

    pub fn build_entry_point(
        &self,
        workload: &WorkloadSnapshot,
        exposure: &Service,
        zone_token: &str,
        zone: ResolvedZone<'_>,
    ) -> Ingress {
        let backend_name = exposure
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| naming::exposure_name(&workload.name));
        let backend_port = exposure
            .spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .and_then(|ports| ports.first())
            .map(|p| p.port)
            .unwrap_or(EXPOSURE_PORT);
        let labels = exposure
            .spec
            .as_ref()
            .and_then(|s| s.selector.clone())
            .unwrap_or_else(|| workload.selector.clone());

        let path = self.path(workload);
        let hosts = self.hosts(workload, zone);

        let rules = hosts
            .iter()
            .map(|host| IngressRule {
                host: Some(host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(path.to_string()),
                        path_type: PATH_TYPE_PREFIX.to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: backend_name.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(backend_port),
                                    name: None,
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            })
            .collect();

        // Certificates are bound outside the controller, so no secret name.
        let tls = self.config.tls_enabled.then(|| {
            vec![IngressTLS {
                hosts: Some(hosts.clone()),
                secret_name: None,
            }]
        });

        Ingress {
            metadata: ObjectMeta {
                name: Some(naming::entry_point_name(&workload.name, zone_token)),
                namespace: Some(workload.namespace.clone()),
                labels: Some(labels),
                annotations: Some(BTreeMap::from([(
                    ZONE_ANNOTATION.to_string(),
                    zone_token.to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some(naming::ingress_class_name(
                    zone_token,
                    &self.config.ingress_class_suffix,
                )),
                rules: Some(rules),
                tls,
                ..Default::default()
            }),
            status: None,
        }
    }

    /// `<subdomain label><suffix>` for every domain suffix of the zone
    pub fn hosts(&self, workload: &WorkloadSnapshot, zone: ResolvedZone<'_>) -> Vec<String> {
        let subdomain = workload
            .label(&self.config.label_subdomain_key)
            .unwrap_or_default();
        zone.domains
            .iter()
            .map(|domain| naming::host_name(subdomain, domain))
            .collect()
    }

    pub fn path<'w>(&self, workload: &'w WorkloadSnapshot) -> &'w str {
        workload
            .label(&self.config.label_path_key)
            .unwrap_or(DEFAULT_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn config(tls: bool) -> ConfigSet {
        ConfigSet {
            annotation_key: "expose/zones".to_string(),
            label_subdomain_key: "subdomain".to_string(),
            label_path_key: "path".to_string(),
            tls_enabled: tls,
            ingress_class_suffix: "-nginx".to_string(),
            private_zone_tokens: BTreeSet::from(["intranet".to_string()]),
            public_zone_tokens: BTreeSet::from(["edge-public".to_string()]),
            private_domains: vec![".corp.local".to_string(), ".corp.internal".to_string()],
            public_domains: vec![".example.com".to_string()],
        }
    }

    fn workload(zones: &str) -> WorkloadSnapshot {
        WorkloadSnapshot::new("shop", "order-api")
            .with_annotation("expose/zones", zones)
            .with_label("app", "order-api")
            .with_label("subdomain", "orders.")
            .with_selector("app", "order-api")
            .with_container_port(8080)
    }

    fn hosts_of(ingress: &Ingress) -> Vec<String> {
        ingress
            .spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .map(|rules| rules.iter().filter_map(|r| r.host.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_build_exposure() {
        let cfg = config(false);
        let svc = SpecBuilder::new(&cfg).build_exposure(&workload("edge-public")).unwrap();

        assert_eq!(svc.metadata.name.as_deref(), Some("order-api-svc"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(
            svc.metadata.labels.as_ref().and_then(|l| l.get("subdomain")).map(String::as_str),
            Some("orders.")
        );

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(
            spec.selector,
            Some(BTreeMap::from([("app".to_string(), "order-api".to_string())]))
        );
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 80);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(8080)));
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
    }

    #[test]
    fn test_build_exposure_requires_port() {
        let cfg = config(false);
        let mut w = workload("edge-public");
        w.container_port = None;
        assert_eq!(
            SpecBuilder::new(&cfg).build_exposure(&w),
            Err(ValidationFailure::MissingContainerPort)
        );
    }

    #[test]
    fn test_entry_point_per_valid_zone() {
        let cfg = config(false);
        let builder = SpecBuilder::new(&cfg);
        let w = workload("edge-public,unknown,intranet,edge-public");
        let svc = builder.build_exposure(&w).unwrap();

        let ingresses = builder.build_entry_points(&w, &svc);
        let names: Vec<_> = ingresses
            .iter()
            .filter_map(|i| i.metadata.name.as_deref())
            .collect();
        assert_eq!(
            names,
            vec!["order-api-edg-ing", "order-api-int-ing", "order-api-edg-ing"]
        );

        assert_eq!(hosts_of(&ingresses[0]), vec!["orders.example.com"]);
        assert_eq!(
            hosts_of(&ingresses[1]),
            vec!["orders.corp.local", "orders.corp.internal"]
        );
    }

    #[test]
    fn test_entry_point_shape() {
        let cfg = config(false);
        let builder = SpecBuilder::new(&cfg);
        let w = workload("intranet").with_label("path", "/api");
        let svc = builder.build_exposure(&w).unwrap();

        let ing = builder.build_entry_points(&w, &svc).remove(0);
        assert_eq!(
            ing.metadata.annotations.as_ref().and_then(|a| a.get("dns_zone")).map(String::as_str),
            Some("intranet")
        );
        assert_eq!(
            ing.metadata.labels,
            Some(BTreeMap::from([("app".to_string(), "order-api".to_string())]))
        );

        let spec = ing.spec.unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("intranet-nginx"));
        assert!(spec.tls.is_none());

        for rule in spec.rules.unwrap() {
            let paths = rule.http.unwrap().paths;
            assert_eq!(paths.len(), 1);
            assert_eq!(paths[0].path.as_deref(), Some("/api"));
            assert_eq!(paths[0].path_type, "Prefix");
            let backend = paths[0].backend.service.as_ref().unwrap();
            assert_eq!(backend.name, "order-api-svc");
            assert_eq!(backend.port.as_ref().and_then(|p| p.number), Some(80));
        }
    }

    #[test]
    fn test_subdomain_without_trailing_dot() {
        let cfg = config(false);
        let builder = SpecBuilder::new(&cfg);
        let w = workload("edge-public,intranet").with_label("subdomain", "orders");
        let svc = builder.build_exposure(&w).unwrap();

        let ingresses = builder.build_entry_points(&w, &svc);
        assert_eq!(hosts_of(&ingresses[0]), vec!["orders.example.com"]);
        assert_eq!(
            hosts_of(&ingresses[1]),
            vec!["orders.corp.local", "orders.corp.internal"]
        );
    }

    #[test]
    fn test_default_path() {
        let cfg = config(false);
        let w = workload("intranet");
        assert_eq!(SpecBuilder::new(&cfg).path(&w), "/");
    }

    #[test]
    fn test_tls_lists_every_host() {
        let cfg = config(true);
        let builder = SpecBuilder::new(&cfg);
        let w = workload("intranet");
        let svc = builder.build_exposure(&w).unwrap();

        let ing = builder.build_entry_points(&w, &svc).remove(0);
        let tls = ing.spec.unwrap().tls.unwrap();
        assert_eq!(tls.len(), 1);
        assert_eq!(
            tls[0].hosts,
            Some(vec![
                "orders.corp.local".to_string(),
                "orders.corp.internal".to_string()
            ])
        );
        assert_eq!(tls[0].secret_name, None);
    }

    #[test]
    fn test_no_annotation_no_entry_points() {
        let cfg = config(false);
        let builder = SpecBuilder::new(&cfg);
        let mut w = workload("intranet");
        w.annotations.clear();
        let svc = builder.build_exposure(&w).unwrap();
        assert!(builder.build_entry_points(&w, &svc).is_empty());
    }
}
