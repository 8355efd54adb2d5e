//! Source vs existing comparison, one decision per identity hash.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ResolutionOperation, ResolutionPlan, ResolutionStatus};
use crate::error::{GcsError, GcsResult};
use crate::identity::IdentityHash;
use crate::manifest::ManifestEvent;

/// Switches for the decisions that touch things this tool may not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverPolicy {
    /// Act on unmanaged existing events instead of flagging them for review.
    pub allow_mutate_unmanaged: bool,
    /// Existing-only identities become deletes rather than reviews.
    pub delete_orphans: bool,
    pub dry_run: bool,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        ResolverPolicy {
            allow_mutate_unmanaged: false,
            delete_orphans: true,
            dry_run: false,
        }
    }
}

pub type EventsByHash = BTreeMap<IdentityHash, ManifestEvent>;

/// Compare two identity-indexed event sets.
///
/// Walks the sorted union of hashes once; every hash gets exactly one
/// operation. Inputs are only read.
pub fn resolve(
    source: &EventsByHash,
    existing: &EventsByHash,
    policy: &ResolverPolicy,
) -> GcsResult<ResolutionPlan> {
    check_keys("source", source)?;
    check_keys("existing", existing)?;

    let hashes: BTreeSet<&IdentityHash> = source.keys().chain(existing.keys()).collect();
    let operations: Vec<ResolutionOperation> = hashes
        .into_iter()
        .map(|hash| {
            let op = decide(hash, source.get(hash), existing.get(hash), policy);
            debug!(hash = %hash.short(), status = ?op.status, reason = %op.reason, "resolved identity");
            op
        })
        .collect();

    let plan = ResolutionPlan {
        operations,
        dry_run: policy.dry_run,
    };
    let counts = plan.counts();
    info!(
        create = counts.create,
        update = counts.update,
        delete = counts.delete,
        noop = counts.noop,
        conflict = counts.conflict,
        review = counts.review,
        dry_run = policy.dry_run,
        "resolved events"
    );
    Ok(plan)
}

fn decide(
    hash: &IdentityHash,
    source: Option<&ManifestEvent>,
    existing: Option<&ManifestEvent>,
    policy: &ResolverPolicy,
) -> ResolutionOperation {
    use ResolutionStatus::*;

    match (source, existing) {
        (Some(src), None) => ResolutionOperation::new(Create, hash, "new in source", Some(src.clone())),
        (None, Some(old)) => {
            let payload = Some(old.clone());
            if old.ownership.locked {
                ResolutionOperation::new(Conflict, hash, "locked event missing from source", payload)
            } else if !old.ownership.managed && !policy.allow_mutate_unmanaged {
                ResolutionOperation::new(Review, hash, "unmanaged event missing from source", payload)
            } else if policy.delete_orphans {
                ResolutionOperation::new(Delete, hash, "missing from source", payload)
            } else {
                ResolutionOperation::new(Review, hash, "orphan kept, deletion disabled", payload)
            }
        }
        (Some(src), Some(old)) if structurally_equal(src, old) => {
            ResolutionOperation::new(Noop, hash, "unchanged", Some(src.clone()))
        }
        (Some(src), Some(old)) => {
            if old.ownership.locked {
                ResolutionOperation::new(Conflict, hash, "locked event differs from source", Some(src.clone()))
            } else if !old.ownership.managed && !policy.allow_mutate_unmanaged {
                ResolutionOperation::new(Review, hash, "unmanaged event differs from source", Some(src.clone()))
            } else {
                let mut updated = src.clone();
                updated.ownership = old.ownership.clone();
                ResolutionOperation::new(Update, hash, "schedule changed", Some(updated))
            }
        }
        // Unreachable: the hash came from one of the two maps
        (None, None) => ResolutionOperation::new(Noop, hash, "absent on both sides", None),
    }
}

/// Pairwise sub-event timing, behavior and payload. Identity, ownership
/// and correlation are ignored.
fn structurally_equal(a: &ManifestEvent, b: &ManifestEvent) -> bool {
    a.sub_events.len() == b.sub_events.len()
        && a.sub_events.iter().zip(&b.sub_events).all(|(x, y)| x.same_schedule(y))
}

fn check_keys(side: &str, events: &EventsByHash) -> GcsResult<()> {
    for (key, event) in events {
        let stamped_mismatch = matches!(&event.identity_hash, Some(stamped) if stamped != key);
        if stamped_mismatch || event.id != key.as_str() {
            debug!(side, key = %key, id = %event.id, "key guard failed");
            return Err(GcsError::KeyMismatch {
                key: key.to_string(),
                id: event.id.clone(),
            });
        }
    }
    Ok(())
}
