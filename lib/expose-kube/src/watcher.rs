//! Deployment watcher producing Add/Update/Delete workload events
//!
//! The kube-runtime watcher only reports the current state of an object.
//! SnapshotCache remembers the last snapshot per Deployment so an update can
//! carry both its before and after state, and turns objects that vanished
//! across a relist into deletions.

use expose_api::{WorkloadEvent, WorkloadKey, WorkloadSnapshot};
use futures::{stream, Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client};
use kube_runtime::watcher::{self, watcher, Event};
use kube_runtime::WatchStreamExt;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Last seen snapshot of every Deployment
#[derive(Debug, Default)]
pub struct SnapshotCache {
    known: HashMap<WorkloadKey, WorkloadSnapshot>,
    /// Keys seen since the current relist started
    relist: Option<HashSet<WorkloadKey>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Translate one watcher event into zero or more workload events
    pub fn observe(&mut self, event: Event<Deployment>) -> Vec<WorkloadEvent> {
        match event {
            Event::Init => {
                debug!("Deployment relist started");
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            Event::InitApply(deployment) => {
                let snapshot = WorkloadSnapshot::from_deployment(&deployment);
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(snapshot.key());
                }
                self.apply(snapshot).into_iter().collect()
            }
            Event::InitDone => {
                let Some(seen) = self.relist.take() else {
                    return Vec::new();
                };
                let gone: Vec<WorkloadKey> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                debug!(
                    "Deployment relist done: {} known, {} gone",
                    seen.len(),
                    gone.len()
                );
                gone.into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(WorkloadEvent::Delete)
                    .collect()
            }
            Event::Apply(deployment) => {
                let snapshot = WorkloadSnapshot::from_deployment(&deployment);
                self.apply(snapshot).into_iter().collect()
            }
            Event::Delete(deployment) => {
                let snapshot = WorkloadSnapshot::from_deployment(&deployment);
                self.known.remove(&snapshot.key());
                vec![WorkloadEvent::Delete(snapshot)]
            }
        }
    }

    fn apply(&mut self, snapshot: WorkloadSnapshot) -> Option<WorkloadEvent> {
        match self.known.insert(snapshot.key(), snapshot.clone()) {
            None => Some(WorkloadEvent::Add(snapshot)),
            // status-only changes produce identical snapshots
            Some(old) if old == snapshot => None,
            Some(old) => Some(WorkloadEvent::Update { old, new: snapshot }),
        }
    }
}

/// DeploymentWatcher streams workload events for Deployments in all namespaces
pub struct DeploymentWatcher {
    client: Client,
}

impl DeploymentWatcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Watch Deployments; watch errors are logged and retried with backoff
    pub fn events(&self) -> impl Stream<Item = WorkloadEvent> + Send + 'static {
        info!("Starting Deployment watcher");

        let deployments: Api<Deployment> = Api::all(self.client.clone());
        let mut cache = SnapshotCache::new();

        watcher(deployments, watcher::Config::default())
            .default_backoff()
            .filter_map(|result| async move {
                match result {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!("Deployment watch error: {}", e);
                        None
                    }
                }
            })
            .flat_map(move |event| stream::iter(cache.observe(event)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment(name: &str, zones: Option<&str>, subdomain: &str) -> Deployment {
        let mut annotations = serde_json::Map::new();
        if let Some(zones) = zones {
            annotations.insert("expose/zones".to_string(), json!(zones));
        }
        serde_json::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": name,
                "namespace": "shop",
                "annotations": annotations,
                "labels": { "app": name, "subdomain": subdomain }
            },
            "spec": {
                "selector": { "matchLabels": { "app": name } },
                "template": {
                    "spec": { "containers": [{ "name": "app", "image": "app", "ports": [{ "containerPort": 8080 }] }] }
                }
            }
        }))
        .expect("valid deployment")
    }

    #[test]
    fn test_first_apply_is_add() {
        let mut cache = SnapshotCache::new();
        let events = cache.observe(Event::Apply(deployment("order-api", Some("edge-public"), "orders.")));
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], WorkloadEvent::Add(w) if w.name == "order-api"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_second_apply_is_update_with_previous_snapshot() {
        let mut cache = SnapshotCache::new();
        cache.observe(Event::Apply(deployment("order-api", Some("edge-public"), "orders.")));
        let events = cache.observe(Event::Apply(deployment("order-api", Some("edge-public"), "orders2.")));

        match events.as_slice() {
            [WorkloadEvent::Update { old, new }] => {
                assert_eq!(old.label("subdomain"), Some("orders."));
                assert_eq!(new.label("subdomain"), Some("orders2."));
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_identical_apply_is_dropped() {
        let mut cache = SnapshotCache::new();
        cache.observe(Event::Apply(deployment("order-api", Some("edge-public"), "orders.")));
        let events = cache.observe(Event::Apply(deployment("order-api", Some("edge-public"), "orders.")));
        assert!(events.is_empty());
    }

    #[test]
    fn test_delete_forgets_snapshot() {
        let mut cache = SnapshotCache::new();
        cache.observe(Event::Apply(deployment("order-api", Some("edge-public"), "orders.")));
        let events = cache.observe(Event::Delete(deployment("order-api", Some("edge-public"), "orders.")));

        assert!(matches!(&events[..], [WorkloadEvent::Delete(w)] if w.annotation("expose/zones") == Some("edge-public")));
        assert!(cache.is_empty());

        let events = cache.observe(Event::Apply(deployment("order-api", None, "orders.")));
        assert!(matches!(&events[..], [WorkloadEvent::Add(_)]));
    }

    #[test]
    fn test_relist_deletes_vanished_deployments() {
        let mut cache = SnapshotCache::new();
        cache.observe(Event::Apply(deployment("order-api", Some("edge-public"), "orders.")));
        cache.observe(Event::Apply(deployment("cart-api", Some("intranet"), "cart.")));

        assert!(cache.observe(Event::Init).is_empty());
        let events = cache.observe(Event::InitApply(deployment("order-api", Some("edge-public"), "orders.")));
        assert!(events.is_empty());

        let events = cache.observe(Event::InitDone);
        assert!(matches!(&events[..], [WorkloadEvent::Delete(w)] if w.name == "cart-api"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_initial_list_adds_everything() {
        let mut cache = SnapshotCache::new();
        cache.observe(Event::Init);
        let a = cache.observe(Event::InitApply(deployment("order-api", Some("edge-public"), "orders.")));
        let b = cache.observe(Event::InitApply(deployment("cart-api", None, "cart.")));
        assert!(matches!(&a[..], [WorkloadEvent::Add(_)]));
        assert!(matches!(&b[..], [WorkloadEvent::Add(_)]));
        assert!(cache.observe(Event::InitDone).is_empty());
    }
}
