//! Workload types observed by the expose controller
//!
//! This library defines the data the reconciliation engine consumes:
//! - WorkloadKey: namespace/name identity of a Deployment
//! - WorkloadSnapshot: the annotations, labels, selector and port of a Deployment at event time
//! - WorkloadEvent: Add/Update/Delete notifications carrying full snapshots

pub mod event;
pub mod snapshot;

pub use event::WorkloadEvent;
pub use snapshot::{WorkloadKey, WorkloadSnapshot};
