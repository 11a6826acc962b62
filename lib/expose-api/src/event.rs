//! Lifecycle notifications for workloads

use crate::{WorkloadKey, WorkloadSnapshot};

/// A workload lifecycle event with strongly typed snapshots
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkloadEvent {
    Add(WorkloadSnapshot),
    Update {
        old: WorkloadSnapshot,
        new: WorkloadSnapshot,
    },
    Delete(WorkloadSnapshot),
}

impl WorkloadEvent {
    /// Key used to serialize processing of events for the same workload
    pub fn key(&self) -> WorkloadKey {
        match self {
            WorkloadEvent::Add(w) | WorkloadEvent::Delete(w) => w.key(),
            WorkloadEvent::Update { new, .. } => new.key(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkloadEvent::Add(_) => "add",
            WorkloadEvent::Update { .. } => "update",
            WorkloadEvent::Delete(_) => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_key_follows_new_snapshot() {
        let old = WorkloadSnapshot::new("shop", "order-api");
        let new = WorkloadSnapshot::new("shop", "order-api").with_label("subdomain", "orders.");
        let event = WorkloadEvent::Update { old, new };

        assert_eq!(event.key(), WorkloadKey::new("shop", "order-api"));
        assert_eq!(event.kind(), "update");
    }
}
