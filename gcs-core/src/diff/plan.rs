//! Resolver output and its hand-off to the apply engine.

use serde::{Deserialize, Serialize};

use super::{ResolutionOperation, ResolutionStatus};
use crate::apply::{ApplyDiff, PlannedEntry};
use crate::error::{GcsError, GcsResult};

/// Number of operations per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub noop: usize,
    pub conflict: usize,
    pub review: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.create + self.update + self.delete + self.noop + self.conflict + self.review
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPlan {
    /// One per identity hash, in hash order.
    pub operations: Vec<ResolutionOperation>,
    /// Computed in full, but must not be acted on.
    pub dry_run: bool,
}

impl ResolutionPlan {
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for op in &self.operations {
            match op.status {
                ResolutionStatus::Create => counts.create += 1,
                ResolutionStatus::Update => counts.update += 1,
                ResolutionStatus::Delete => counts.delete += 1,
                ResolutionStatus::Noop => counts.noop += 1,
                ResolutionStatus::Conflict => counts.conflict += 1,
                ResolutionStatus::Review => counts.review += 1,
            }
        }
        counts
    }

    /// Operations the apply engine would act on.
    pub fn actionable(&self) -> impl Iterator<Item = &ResolutionOperation> {
        self.operations.iter().filter(|op| op.status.is_actionable())
    }

    /// Operations a human should look at.
    pub fn needs_attention(&self) -> impl Iterator<Item = &ResolutionOperation> {
        self.operations
            .iter()
            .filter(|op| matches!(op.status, ResolutionStatus::Conflict | ResolutionStatus::Review))
    }

    pub fn to_apply_diff(&self) -> GcsResult<ApplyDiff> {
        if self.dry_run {
            return Err(GcsError::DryRun);
        }

        let mut diff = ApplyDiff::default();
        for op in self.actionable() {
            match op.status {
                ResolutionStatus::Delete => diff.deletes.push(op.identity_hash.clone()),
                status => {
                    let event = op.payload.as_ref().ok_or_else(|| {
                        GcsError::invalid_field(
                            "payload",
                            format!("{status:?} for {} carries no event", op.identity_hash),
                        )
                    })?;
                    let planned = PlannedEntry::from_event(event)?;
                    if status == ResolutionStatus::Create {
                        diff.creates.push(planned);
                    } else {
                        diff.updates.push(planned);
                    }
                }
            }
        }
        Ok(diff)
    }
}
