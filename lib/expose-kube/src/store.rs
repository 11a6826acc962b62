//! ResourceStore backed by the Kubernetes API

use async_trait::async_trait;
use expose_core::{ResourceKind, ResourceStore, StoreError};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use tracing::debug;

/// KubeStore reads and writes Services and Ingresses through the API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fail unless the API server answers
    pub async fn check_connection(&self) -> anyhow::Result<String> {
        let version = self.client.apiserver_version().await?;
        Ok(version.git_version)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn ingresses(&self, namespace: &str) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn store_error(kind: ResourceKind, namespace: &str, name: &str, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::not_found(kind, namespace, name),
        kube::Error::Api(ae) if ae.code == 409 => StoreError::already_exists(kind, namespace, name),
        other => StoreError::transient(kind, namespace, name, other.to_string()),
    }
}

fn identity(namespace: Option<&String>, name: Option<&String>) -> (String, String) {
    (
        namespace.cloned().unwrap_or_else(|| "default".to_string()),
        name.cloned().unwrap_or_default(),
    )
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_exposure(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
        match self.services(namespace).get(name).await {
            Ok(svc) => Ok(Some(svc)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(store_error(ResourceKind::Exposure, namespace, name, e)),
        }
    }

    async fn create_exposure(&self, service: &Service) -> Result<(), StoreError> {
        let (namespace, name) = identity(
            service.metadata.namespace.as_ref(),
            service.metadata.name.as_ref(),
        );
        self.services(&namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(|e| store_error(ResourceKind::Exposure, &namespace, &name, e))?;
        debug!("Posted Service {}/{}", namespace, name);
        Ok(())
    }

    async fn delete_exposure(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.services(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| store_error(ResourceKind::Exposure, namespace, name, e))
    }

    async fn get_entry_point(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, StoreError> {
        match self.ingresses(namespace).get(name).await {
            Ok(ingress) => Ok(Some(ingress)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(store_error(ResourceKind::EntryPoint, namespace, name, e)),
        }
    }

    async fn create_entry_point(&self, ingress: &Ingress) -> Result<(), StoreError> {
        let (namespace, name) = identity(
            ingress.metadata.namespace.as_ref(),
            ingress.metadata.name.as_ref(),
        );
        self.ingresses(&namespace)
            .create(&PostParams::default(), ingress)
            .await
            .map_err(|e| store_error(ResourceKind::EntryPoint, &namespace, &name, e))?;
        debug!("Posted Ingress {}/{}", namespace, name);
        Ok(())
    }

    async fn delete_entry_point(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.ingresses(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| store_error(ResourceKind::EntryPoint, namespace, name, e))
    }
}
