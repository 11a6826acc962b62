//! Transition planning for update events

use crate::error::ValidationFailure;
use crate::rules::RuleState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoopReason {
    /// Neither snapshot carries the annotation
    NotAnnotated,
    /// Old and new rules are identical
    Unchanged,
    /// The workload carries the annotation but its rule cannot be applied
    Invalid(Vec<ValidationFailure>),
    /// A previously valid rule became invalid; existing resources are kept
    RuleBroken(Vec<ValidationFailure>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Create the resources of the new snapshot
    Create,
    /// Delete everything derived from the old snapshot, then create from the new one
    Replace,
    /// Delete everything derived from the old snapshot
    Delete,
    Noop(NoopReason),
}

/// Decide what an update from `old` to `new` requires.
///
/// | old                | new                         | plan    |
/// |--------------------|-----------------------------|---------|
/// | not valid          | valid                       | Create  |
/// | valid              | valid, same rule            | Noop    |
/// | valid              | valid, different rule       | Replace |
/// | annotation present | annotation absent           | Delete  |
/// | valid              | annotation present, invalid | Noop    |
/// | not valid          | not valid                   | Noop    |
pub fn plan_update(old: &RuleState, new: &RuleState) -> UpdatePlan {
    match (old, new) {
        (RuleState::Valid(old_rule), RuleState::Valid(new_rule)) => {
            if old_rule == new_rule {
                UpdatePlan::Noop(NoopReason::Unchanged)
            } else {
                UpdatePlan::Replace
            }
        }
        (_, RuleState::Valid(_)) => UpdatePlan::Create,
        (RuleState::Absent, RuleState::Absent) => UpdatePlan::Noop(NoopReason::NotAnnotated),
        (_, RuleState::Absent) => UpdatePlan::Delete,
        (RuleState::Valid(_), RuleState::Invalid(failures)) => {
            UpdatePlan::Noop(NoopReason::RuleBroken(failures.clone()))
        }
        (_, RuleState::Invalid(failures)) => UpdatePlan::Noop(NoopReason::Invalid(failures.clone())),
    }
}
