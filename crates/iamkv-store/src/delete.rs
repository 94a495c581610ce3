use serde::Serialize;

use crate::error::BackingError;

/// One of the four removals issued by [`TieredStore::delete`](crate::TieredStore::delete),
/// listed in issue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteTarget {
    SecondaryDocument,
    PrimaryDocument,
    SecondaryHolder,
    PrimaryHolder,
}

impl DeleteTarget {
    pub const ORDER: [DeleteTarget; 4] = [
        Self::SecondaryDocument,
        Self::PrimaryDocument,
        Self::SecondaryHolder,
        Self::PrimaryHolder,
    ];
}

impl std::fmt::Display for DeleteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SecondaryDocument => write!(f, "secondary document"),
            Self::PrimaryDocument => write!(f, "primary document"),
            Self::SecondaryHolder => write!(f, "secondary holder"),
            Self::PrimaryHolder => write!(f, "primary holder"),
        }
    }
}

/// Result of a single removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Removed,
    /// Nothing to remove.
    Absent,
    /// The service refused; the reason is kept for the caller to inspect.
    Failed(String),
}

impl DeleteOutcome {
    pub(crate) fn from_result(result: Result<(), BackingError>) -> Self {
        match result {
            Ok(()) => Self::Removed,
            Err(e) if e.is_not_found() => Self::Absent,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeleteStep {
    pub target: DeleteTarget,
    pub outcome: DeleteOutcome,
}

/// Per-step summary of a best-effort delete.
///
/// A delete never fails as a whole; callers that care can check
/// [`is_clean`](Self::is_clean) or walk [`failures`](Self::failures).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub steps: Vec<DeleteStep>,
}

impl DeleteReport {
    pub(crate) fn push(&mut self, target: DeleteTarget, outcome: DeleteOutcome) {
        self.steps.push(DeleteStep { target, outcome });
    }

    pub fn outcome(&self, target: DeleteTarget) -> Option<&DeleteOutcome> {
        self.steps
            .iter()
            .find(|s| s.target == target)
            .map(|s| &s.outcome)
    }

    /// `true` when no step failed.
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeleteStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, DeleteOutcome::Failed(_)))
    }

    /// `true` when every step found nothing to remove.
    pub fn was_absent(&self) -> bool {
        self.steps.iter().all(|s| s.outcome == DeleteOutcome::Absent)
    }
}
