//! Access to the store holding Services and Ingresses

use crate::error::{ResourceKind, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Get/create/delete of the two derived resource kinds.
///
/// `get_*` returns `Ok(None)` when the resource does not exist. `create_*`
/// fails with `AlreadyExists` on a name clash and `delete_*` fails with
/// `NotFound` when there is nothing to delete; callers decide whether those
/// count as errors.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_exposure(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError>;

    async fn create_exposure(&self, service: &Service) -> Result<(), StoreError>;

    async fn delete_exposure(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    async fn get_entry_point(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, StoreError>;

    async fn create_entry_point(&self, ingress: &Ingress) -> Result<(), StoreError>;

    async fn delete_entry_point(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// A mutation recorded by [`MemoryStore`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Create { kind: ResourceKind, namespace: String, name: String },
    Delete { kind: ResourceKind, namespace: String, name: String },
}

type ObjectKey = (String, String);

/// In-memory store, used for dry runs and tests.
///
/// Every attempted mutation is journaled, including ones that fail with
/// `AlreadyExists` or `NotFound`.
#[derive(Default)]
pub struct MemoryStore {
    services: RwLock<BTreeMap<ObjectKey, Service>>,
    ingresses: RwLock<BTreeMap<ObjectKey, Ingress>>,
    journal: RwLock<Vec<StoreOp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn services(&self) -> Vec<Service> {
        self.services.read().await.values().cloned().collect()
    }

    pub async fn ingresses(&self) -> Vec<Ingress> {
        self.ingresses.read().await.values().cloned().collect()
    }

    pub async fn journal(&self) -> Vec<StoreOp> {
        self.journal.read().await.clone()
    }

    pub async fn clear_journal(&self) {
        self.journal.write().await.clear();
    }

    async fn record(&self, op: StoreOp) {
        self.journal.write().await.push(op);
    }
}

fn object_key(namespace: Option<&String>, name: Option<&String>) -> ObjectKey {
    (
        namespace.cloned().unwrap_or_default(),
        name.cloned().unwrap_or_default(),
    )
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_exposure(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
        let key = (namespace.to_string(), name.to_string());
        Ok(self.services.read().await.get(&key).cloned())
    }

    async fn create_exposure(&self, service: &Service) -> Result<(), StoreError> {
        let (namespace, name) = object_key(
            service.metadata.namespace.as_ref(),
            service.metadata.name.as_ref(),
        );
        self.record(StoreOp::Create {
            kind: ResourceKind::Exposure,
            namespace: namespace.clone(),
            name: name.clone(),
        })
        .await;

        let mut services = self.services.write().await;
        if services.contains_key(&(namespace.clone(), name.clone())) {
            return Err(StoreError::already_exists(ResourceKind::Exposure, &namespace, &name));
        }
        debug!("Stored Service {}/{}", namespace, name);
        services.insert((namespace, name), service.clone());
        Ok(())
    }

    async fn delete_exposure(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.record(StoreOp::Delete {
            kind: ResourceKind::Exposure,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
        .await;

        let key = (namespace.to_string(), name.to_string());
        match self.services.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(ResourceKind::Exposure, namespace, name)),
        }
    }

    async fn get_entry_point(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, StoreError> {
        let key = (namespace.to_string(), name.to_string());
        Ok(self.ingresses.read().await.get(&key).cloned())
    }

    async fn create_entry_point(&self, ingress: &Ingress) -> Result<(), StoreError> {
        let (namespace, name) = object_key(
            ingress.metadata.namespace.as_ref(),
            ingress.metadata.name.as_ref(),
        );
        self.record(StoreOp::Create {
            kind: ResourceKind::EntryPoint,
            namespace: namespace.clone(),
            name: name.clone(),
        })
        .await;

        let mut ingresses = self.ingresses.write().await;
        if ingresses.contains_key(&(namespace.clone(), name.clone())) {
            return Err(StoreError::already_exists(ResourceKind::EntryPoint, &namespace, &name));
        }
        debug!("Stored Ingress {}/{}", namespace, name);
        ingresses.insert((namespace, name), ingress.clone());
        Ok(())
    }

    async fn delete_entry_point(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.record(StoreOp::Delete {
            kind: ResourceKind::EntryPoint,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
        .await;

        let key = (namespace.to_string(), name.to_string());
        match self.ingresses.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(ResourceKind::EntryPoint, namespace, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn service(name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("shop".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryStore::new();
        store.create_exposure(&service("order-api-svc")).await.unwrap();

        let found = store.get_exposure("shop", "order-api-svc").await.unwrap();
        assert_eq!(found.and_then(|s| s.metadata.name).as_deref(), Some("order-api-svc"));
        assert!(store.get_exposure("other", "order-api-svc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_already_exists() {
        let store = MemoryStore::new();
        store.create_exposure(&service("order-api-svc")).await.unwrap();
        let err = store.create_exposure(&service("order-api-svc")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.services().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found_and_journaled() {
        let store = MemoryStore::new();
        let err = store.delete_entry_point("shop", "order-api-edg-ing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            store.journal().await,
            vec![StoreOp::Delete {
                kind: ResourceKind::EntryPoint,
                namespace: "shop".to_string(),
                name: "order-api-edg-ing".to_string(),
            }]
        );
    }
}
