//! Reconciliation core for workload exposure
//!
//! This library provides:
//! - ConfigSet: the immutable controller configuration
//! - Zone resolution and deterministic resource naming
//! - Validation rules for the zone annotation and subdomain label
//! - Builders for the desired Service and per-zone Ingress objects
//! - The update planner and the ReconcileEngine applying plans to a ResourceStore

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod naming;
pub mod plan;
pub mod rules;
pub mod store;
pub mod zone;

pub use builder::SpecBuilder;
pub use config::ConfigSet;
pub use engine::{ApplyReport, ApplyStatus, DeleteReport, DeleteStatus, Outcome, ReconcileEngine, Report, Step};
pub use error::{ConfigError, ResourceKind, StoreError, ValidationFailure};
pub use plan::{plan_update, NoopReason, UpdatePlan};
pub use rules::{Rule, RuleState};
pub use store::{MemoryStore, ResourceStore, StoreOp};
pub use zone::{ResolvedZone, ZoneGroup, ZoneResolver};
