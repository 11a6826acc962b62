//! ReconcileEngine: turns workload events into store mutations
//!
//! Apply is get-or-create: an existing resource with the derived name is left
//! untouched, and `AlreadyExists` from a racing create counts as present.
//! Delete is best-effort: each resource is deleted independently, `NotFound`
//! counts as deleted, and failures never stop the rest of the batch.
//! Failed steps are logged and not retried. Relists drop unchanged snapshots,
//! so a failed step is only attempted again when the rule of the workload
//! changes or the controller restarts.

use crate::builder::SpecBuilder;
use crate::config::ConfigSet;
use crate::error::{ResourceKind, StoreError};
use crate::naming;
use crate::plan::{plan_update, NoopReason, UpdatePlan};
use crate::rules::{self, zone_tokens, RuleState};
use crate::store::ResourceStore;
use expose_api::{WorkloadEvent, WorkloadSnapshot};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyStatus {
    Created,
    /// Found on lookup, or created concurrently by someone else
    AlreadyPresent,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    /// Nothing to delete
    Absent,
    Failed(String),
}

pub trait StepStatus {
    fn is_failure(&self) -> bool;
}

impl StepStatus for ApplyStatus {
    fn is_failure(&self) -> bool {
        matches!(self, ApplyStatus::Failed(_))
    }
}

impl StepStatus for DeleteStatus {
    fn is_failure(&self) -> bool {
        matches!(self, DeleteStatus::Failed(_))
    }
}

/// Outcome of one mutation on one derived resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step<S> {
    pub kind: ResourceKind,
    pub name: String,
    pub status: S,
}

/// Independent per-resource outcomes of an apply or delete batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report<S> {
    pub steps: Vec<Step<S>>,
}

pub type ApplyReport = Report<ApplyStatus>;
pub type DeleteReport = Report<DeleteStatus>;

impl<S> Default for Report<S> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<S: StepStatus> Report<S> {
    fn push(&mut self, kind: ResourceKind, name: String, status: S) {
        self.steps.push(Step { kind, name, status });
    }

    pub fn names(&self, kind: ResourceKind) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn status_of(&self, kind: ResourceKind, name: &str) -> Option<&S> {
        self.steps
            .iter()
            .find(|s| s.kind == kind && s.name == name)
            .map(|s| &s.status)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Step<S>> {
        self.steps.iter().filter(|s| s.status.is_failure())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &Step<S>> {
        self.steps.iter().filter(|s| !s.status.is_failure())
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Some steps succeeded and some failed
    pub fn is_partial(&self) -> bool {
        !self.is_complete() && self.succeeded().next().is_some()
    }

    fn log_partial(&self, workload: &WorkloadSnapshot, action: &str) {
        if !self.is_partial() {
            return;
        }
        let succeeded: Vec<String> = self.succeeded().map(|s| format!("{} {}", s.kind, s.name)).collect();
        let failed: Vec<String> = self.failed().map(|s| format!("{} {}", s.kind, s.name)).collect();
        warn!(
            namespace = %workload.namespace,
            workload = %workload.name,
            ?succeeded,
            ?failed,
            "Partial {} for Deployment {}/{}",
            action,
            workload.namespace,
            workload.name
        );
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied(ApplyReport),
    Replaced {
        removed: DeleteReport,
        applied: ApplyReport,
    },
    Removed(DeleteReport),
    Skipped(NoopReason),
}

/// Reconciles workload events against a [`ResourceStore`].
///
/// Holds no per-workload state; events for one workload must be fed in
/// delivery order by the caller.
pub struct ReconcileEngine<S> {
    config: Arc<ConfigSet>,
    store: Arc<S>,
}

impl<S: ResourceStore> ReconcileEngine<S> {
    pub fn new(config: Arc<ConfigSet>, store: Arc<S>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn handle(&self, event: &WorkloadEvent) -> Outcome {
        match event {
            WorkloadEvent::Add(workload) => self.on_add(workload).await,
            WorkloadEvent::Update { old, new } => self.on_update(old, new).await,
            WorkloadEvent::Delete(workload) => self.on_delete(workload).await,
        }
    }

    pub async fn on_add(&self, workload: &WorkloadSnapshot) -> Outcome {
        match rules::evaluate(workload, &self.config) {
            RuleState::Valid(_) => Outcome::Applied(self.apply(workload).await),
            RuleState::Absent => self.skip(workload, NoopReason::NotAnnotated),
            RuleState::Invalid(failures) => self.skip(workload, NoopReason::Invalid(failures)),
        }
    }

    pub async fn on_update(&self, old: &WorkloadSnapshot, new: &WorkloadSnapshot) -> Outcome {
        let plan = plan_update(
            &rules::evaluate(old, &self.config),
            &rules::evaluate(new, &self.config),
        );
        debug!(
            namespace = %new.namespace,
            workload = %new.name,
            ?plan,
            "Planned update"
        );

        match plan {
            UpdatePlan::Create => Outcome::Applied(self.apply(new).await),
            UpdatePlan::Replace => {
                info!("Replacing resources of Deployment {}/{}", new.namespace, new.name);
                let removed = self.remove(old).await;
                let applied = self.apply(new).await;
                Outcome::Replaced { removed, applied }
            }
            UpdatePlan::Delete => Outcome::Removed(self.remove(old).await),
            UpdatePlan::Noop(reason) => self.skip(new, reason),
        }
    }

    pub async fn on_delete(&self, workload: &WorkloadSnapshot) -> Outcome {
        if workload.annotation(&self.config.annotation_key).is_some() {
            Outcome::Removed(self.remove(workload).await)
        } else {
            self.skip(workload, NoopReason::NotAnnotated)
        }
    }

    /// Get-or-create the Service and one Ingress per known zone token
    pub async fn apply(&self, workload: &WorkloadSnapshot) -> ApplyReport {
        let builder = SpecBuilder::new(&self.config);
        let namespace = workload.namespace.as_str();
        let mut report = ApplyReport::default();

        let exposure_name = naming::exposure_name(&workload.name);
        let exposure = match builder.build_exposure(workload) {
            Ok(service) => service,
            Err(e) => {
                warn!("Cannot build Service {}/{}: {}", namespace, exposure_name, e);
                report.push(ResourceKind::Exposure, exposure_name, ApplyStatus::Failed(e.to_string()));
                return report;
            }
        };

        let status = get_or_create(
            ResourceKind::Exposure,
            namespace,
            &exposure_name,
            self.store.get_exposure(namespace, &exposure_name).await,
            || self.store.create_exposure(&exposure),
        )
        .await;
        report.push(ResourceKind::Exposure, exposure_name, status);

        for ingress in builder.build_entry_points(workload, &exposure) {
            let name = ingress.metadata.name.clone().unwrap_or_default();
            let status = get_or_create(
                ResourceKind::EntryPoint,
                namespace,
                &name,
                self.store.get_entry_point(namespace, &name).await,
                || self.store.create_entry_point(&ingress),
            )
            .await;
            report.push(ResourceKind::EntryPoint, name, status);
        }

        report.log_partial(workload, "apply");
        report
    }

    /// Delete the Service and the Ingress of every zone token in the annotation
    pub async fn remove(&self, workload: &WorkloadSnapshot) -> DeleteReport {
        let namespace = workload.namespace.as_str();
        let mut report = DeleteReport::default();

        let exposure_name = naming::exposure_name(&workload.name);
        let result = self.store.delete_exposure(namespace, &exposure_name).await;
        let status = delete_status(ResourceKind::Exposure, namespace, &exposure_name, result);
        report.push(ResourceKind::Exposure, exposure_name, status);

        if let Some(annotation) = workload.annotation(&self.config.annotation_key) {
            for token in zone_tokens(annotation).filter(|t| !t.is_empty()) {
                let name = naming::entry_point_name(&workload.name, token);
                let result = self.store.delete_entry_point(namespace, &name).await;
                let status = delete_status(ResourceKind::EntryPoint, namespace, &name, result);
                report.push(ResourceKind::EntryPoint, name, status);
            }
        }

        report.log_partial(workload, "delete");
        report
    }

    fn skip(&self, workload: &WorkloadSnapshot, reason: NoopReason) -> Outcome {
        match &reason {
            NoopReason::NotAnnotated => {
                debug!("Deployment {}/{} is not annotated", workload.namespace, workload.name)
            }
            NoopReason::Unchanged => {
                debug!("Rule of Deployment {}/{} unchanged", workload.namespace, workload.name)
            }
            NoopReason::Invalid(failures) => {
                for failure in failures {
                    warn!(
                        namespace = %workload.namespace,
                        workload = %workload.name,
                        "Rule: {} on Deployment {}/{}",
                        failure,
                        workload.namespace,
                        workload.name
                    );
                }
            }
            NoopReason::RuleBroken(failures) => {
                for failure in failures {
                    warn!(
                        namespace = %workload.namespace,
                        workload = %workload.name,
                        "Rule no longer valid, keeping existing resources: {} on Deployment {}/{}",
                        failure,
                        workload.namespace,
                        workload.name
                    );
                }
            }
        }
        Outcome::Skipped(reason)
    }
}

async fn get_or_create<T, F, Fut>(
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    lookup: Result<Option<T>, StoreError>,
    create: F,
) -> ApplyStatus
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    match lookup {
        Ok(Some(_)) => {
            info!("{} already created: {}/{}", kind, namespace, name);
            return ApplyStatus::AlreadyPresent;
        }
        Ok(None) => {}
        Err(e) => {
            error!(resource = %name, "Error getting {} {}/{}: {}", kind, namespace, name, e);
            return ApplyStatus::Failed(e.to_string());
        }
    }

    match create().await {
        Ok(()) => {
            info!("{} created: {}/{}", kind, namespace, name);
            ApplyStatus::Created
        }
        Err(e) if e.is_already_exists() => {
            info!("{} created concurrently: {}/{}", kind, namespace, name);
            ApplyStatus::AlreadyPresent
        }
        Err(e) => {
            error!(resource = %name, "Error creating {} {}/{}: {}", kind, namespace, name, e);
            ApplyStatus::Failed(e.to_string())
        }
    }
}

fn delete_status(
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    result: Result<(), StoreError>,
) -> DeleteStatus {
    match result {
        Ok(()) => {
            info!("{} {}/{} deleted successfully", kind, namespace, name);
            DeleteStatus::Deleted
        }
        Err(e) if e.is_not_found() => {
            debug!("{} {}/{} not found, already deleted", kind, namespace, name);
            DeleteStatus::Absent
        }
        Err(e) => {
            error!(resource = %name, "Error deleting {} {}/{}: {}", kind, namespace, name, e);
            DeleteStatus::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockResourceStore;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> Arc<ConfigSet> {
        Arc::new(ConfigSet {
            annotation_key: "expose/zones".to_string(),
            label_subdomain_key: "subdomain".to_string(),
            label_path_key: "path".to_string(),
            private_zone_tokens: BTreeSet::from(["intranet".to_string()]),
            public_zone_tokens: BTreeSet::from(["edge-public".to_string()]),
            private_domains: vec![".corp.local".to_string()],
            public_domains: vec![".example.com".to_string()],
            ..Default::default()
        })
    }

    fn workload(zones: &str) -> WorkloadSnapshot {
        WorkloadSnapshot::new("shop", "order-api")
            .with_annotation("expose/zones", zones)
            .with_label("subdomain", "orders.")
            .with_selector("app", "order-api")
            .with_container_port(8080)
    }

    #[tokio::test]
    async fn test_lookup_failure_abandons_only_that_step() {
        let mut store = MockResourceStore::new();
        store.expect_get_exposure().times(1).returning(|ns, name| {
            Err(StoreError::transient(ResourceKind::Exposure, ns, name, "connection refused"))
        });
        store.expect_create_exposure().times(0);
        store.expect_get_entry_point().times(1).returning(|_, _| Ok(None));
        store.expect_create_entry_point().times(1).returning(|_| Ok(()));

        let engine = ReconcileEngine::new(config(), Arc::new(store));
        let report = engine.apply(&workload("edge-public")).await;

        assert!(matches!(
            report.status_of(ResourceKind::Exposure, "order-api-svc"),
            Some(ApplyStatus::Failed(_))
        ));
        assert_eq!(
            report.status_of(ResourceKind::EntryPoint, "order-api-edg-ing"),
            Some(&ApplyStatus::Created)
        );
        assert!(report.is_partial());
    }

    #[tokio::test]
    async fn test_already_exists_on_create_is_absorbed() {
        let mut store = MockResourceStore::new();
        store.expect_get_exposure().returning(|_, _| Ok(None));
        store.expect_create_exposure().times(1).returning(|svc| {
            let name = svc.metadata.name.clone().unwrap_or_default();
            Err(StoreError::already_exists(ResourceKind::Exposure, "shop", &name))
        });
        store.expect_get_entry_point().returning(|_, _| Ok(None));
        store.expect_create_entry_point().times(1).returning(|_| Ok(()));

        let engine = ReconcileEngine::new(config(), Arc::new(store));
        let outcome = engine.on_add(&workload("edge-public")).await;

        let Outcome::Applied(report) = outcome else {
            panic!("expected the workload to be applied");
        };
        assert!(report.is_complete());
        assert_eq!(
            report.status_of(ResourceKind::Exposure, "order-api-svc"),
            Some(&ApplyStatus::AlreadyPresent)
        );
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_block_batch() {
        let mut store = MockResourceStore::new();
        store.expect_delete_exposure().times(1).returning(|ns, name| {
            Err(StoreError::transient(ResourceKind::Exposure, ns, name, "timeout"))
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        store.expect_delete_entry_point().times(2).returning(move |ns, name| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::not_found(ResourceKind::EntryPoint, ns, name))
            } else {
                Ok(())
            }
        });

        let engine = ReconcileEngine::new(config(), Arc::new(store));
        let report = engine.remove(&workload("edge-public,intranet")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            report.names(ResourceKind::EntryPoint),
            vec!["order-api-edg-ing", "order-api-int-ing"]
        );
        assert!(matches!(
            report.status_of(ResourceKind::Exposure, "order-api-svc"),
            Some(DeleteStatus::Failed(_))
        ));
        assert_eq!(
            report.status_of(ResourceKind::EntryPoint, "order-api-edg-ing"),
            Some(&DeleteStatus::Absent)
        );
        assert_eq!(
            report.status_of(ResourceKind::EntryPoint, "order-api-int-ing"),
            Some(&DeleteStatus::Deleted)
        );
        assert!(report.is_partial());
    }

    #[tokio::test]
    async fn test_invalid_add_touches_nothing() {
        let store = MockResourceStore::new();
        let engine = ReconcileEngine::new(config(), Arc::new(store));

        let outcome = engine.on_add(&workload("unknown-zone")).await;
        assert!(matches!(outcome, Outcome::Skipped(NoopReason::Invalid(_))));
    }

    #[tokio::test]
    async fn test_delete_without_annotation_touches_nothing() {
        let store = MockResourceStore::new();
        let engine = ReconcileEngine::new(config(), Arc::new(store));

        let w = WorkloadSnapshot::new("shop", "order-api");
        assert_eq!(
            engine.on_delete(&w).await,
            Outcome::Skipped(NoopReason::NotAnnotated)
        );
    }
}
