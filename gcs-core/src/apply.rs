//! Apply engine: fold a diff into the host's ordered entry list.
//!
//! Unmanaged entries are never touched, reordered or removed. Managed
//! entries are matched by identity hash; new ones go at the end.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GcsError, GcsResult};
use crate::fpp::ScheduleEntry;
use crate::identity::IdentityHash;
use crate::manifest::ManifestEvent;

/// A host entry ready to be written for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedEntry {
    pub identity_hash: IdentityHash,
    /// Creates are appended in this order, ties broken by hash.
    pub order_key: String,
    pub entry: ScheduleEntry,
}

impl PlannedEntry {
    pub fn from_event(event: &ManifestEvent) -> GcsResult<Self> {
        let entry = ScheduleEntry::from_event(event)?;
        Ok(PlannedEntry {
            identity_hash: event.hash()?,
            order_key: entry.order_key(),
            entry,
        })
    }

    /// The entry with ownership set to this identity.
    fn stamped(&self) -> ScheduleEntry {
        ScheduleEntry {
            managed: Some(true),
            identity_hash: Some(self.identity_hash.clone()),
            fields: self.entry.fields.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyDiff {
    #[serde(default)]
    pub creates: Vec<PlannedEntry>,
    #[serde(default)]
    pub updates: Vec<PlannedEntry>,
    #[serde(default)]
    pub deletes: Vec<IdentityHash>,
}

impl ApplyDiff {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Every hash may appear at most once across all three lists.
    fn check_disjoint(&self) -> GcsResult<()> {
        let mut seen = BTreeSet::new();
        let hashes = self
            .creates
            .iter()
            .map(|p| &p.identity_hash)
            .chain(self.updates.iter().map(|p| &p.identity_hash))
            .chain(self.deletes.iter());
        for hash in hashes {
            if !seen.insert(hash) {
                return Err(GcsError::OverlappingDiff(hash.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub entries: Vec<ScheduleEntry>,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

pub fn apply(diff: &ApplyDiff, existing: &[ScheduleEntry]) -> GcsResult<ApplyOutcome> {
    diff.check_disjoint()?;

    let deletes: BTreeSet<&IdentityHash> = diff.deletes.iter().collect();
    let updates: BTreeMap<&IdentityHash, &PlannedEntry> =
        diff.updates.iter().map(|p| (&p.identity_hash, p)).collect();

    let mut entries = Vec::with_capacity(existing.len() + diff.creates.len());
    let mut live: BTreeSet<&IdentityHash> = BTreeSet::new();
    let mut updated_hashes: BTreeSet<&IdentityHash> = BTreeSet::new();
    let mut deleted = 0;

    for (index, entry) in existing.iter().enumerate() {
        if !entry.is_managed() {
            entries.push(entry.clone());
            continue;
        }

        let hash = entry
            .identity_hash
            .as_ref()
            .ok_or(GcsError::MissingManagedHash { index })?;
        if !live.insert(hash) {
            return Err(GcsError::DuplicateManagedHash(hash.to_string()));
        }

        if deletes.contains(hash) {
            debug!(hash = %hash.short(), index, "deleting entry");
            deleted += 1;
        } else if let Some(update) = updates.get(hash) {
            debug!(hash = %hash.short(), index, "updating entry");
            entries.push(update.stamped());
            updated_hashes.insert(hash);
        } else {
            entries.push(entry.clone());
        }
    }

    if let Some(missing) = diff
        .updates
        .iter()
        .find(|p| !updated_hashes.contains(&p.identity_hash))
    {
        return Err(GcsError::UpdateTargetMissing(missing.identity_hash.to_string()));
    }

    let mut creates: Vec<&PlannedEntry> = diff.creates.iter().collect();
    if let Some(clash) = creates.iter().find(|p| live.contains(&p.identity_hash)) {
        return Err(GcsError::DuplicateManagedHash(clash.identity_hash.to_string()));
    }
    creates.sort_by(|a, b| (&a.order_key, &a.identity_hash).cmp(&(&b.order_key, &b.identity_hash)));
    entries.extend(creates.iter().map(|p| p.stamped()));

    let outcome = ApplyOutcome {
        entries,
        created: creates.len(),
        updated: updated_hashes.len(),
        deleted,
    };
    info!(
        created = outcome.created,
        updated = outcome.updated,
        deleted = outcome.deleted,
        total = outcome.entries.len(),
        "applied diff"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::event;
    use serde_json::{Map, json};

    fn unmanaged(command: &str) -> ScheduleEntry {
        let mut fields = Map::new();
        fields.insert("command".into(), json!(command));
        ScheduleEntry::unmanaged(fields)
    }

    fn planned(target: &str, hour: u32) -> PlannedEntry {
        PlannedEntry::from_event(&event(target, hour)).unwrap()
    }

    fn managed(target: &str, hour: u32) -> ScheduleEntry {
        planned(target, hour).stamped()
    }

    #[test]
    fn delete_keeps_unmanaged() {
        let b = planned("B", 17);
        let existing = vec![unmanaged("A"), b.stamped()];
        let diff = ApplyDiff {
            deletes: vec![b.identity_hash.clone()],
            ..ApplyDiff::default()
        };
        let outcome = apply(&diff, &existing).unwrap();
        assert_eq!(outcome.entries, vec![unmanaged("A")]);
        assert_eq!(outcome.deleted, 1);
    }

    #[test]
    fn update_substitutes_in_place() {
        let mut update = planned("B", 17);
        update.entry.fields.insert("enabled".into(), json!(0));
        let existing = vec![managed("B", 17), unmanaged("A")];
        let diff = ApplyDiff {
            updates: vec![update.clone()],
            ..ApplyDiff::default()
        };
        let outcome = apply(&diff, &existing).unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.entries[0].fields["enabled"], 0);
        assert!(outcome.entries[0].is_managed());
        assert_eq!(outcome.entries[1], unmanaged("A"));
    }

    #[test]
    fn creates_are_appended_in_order() {
        let existing = vec![unmanaged("A")];
        let diff = ApplyDiff {
            creates: vec![planned("Late", 20), planned("Early", 17)],
            ..ApplyDiff::default()
        };
        let outcome = apply(&diff, &existing).unwrap();
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.entries[0], unmanaged("A"));
        assert_eq!(outcome.entries[1].fields["playlist"], "Early");
        assert_eq!(outcome.entries[2].fields["playlist"], "Late");
        assert!(outcome.entries[1..].iter().all(ScheduleEntry::is_managed));
    }

    #[test]
    fn overlapping_lists_fail() {
        let b = planned("B", 17);
        let diff = ApplyDiff {
            updates: vec![b.clone()],
            deletes: vec![b.identity_hash.clone()],
            ..ApplyDiff::default()
        };
        assert_eq!(apply(&diff, &[]).unwrap_err().code(), ErrorCode::OverlappingDiff);

        let twice = ApplyDiff {
            creates: vec![b.clone(), b],
            ..ApplyDiff::default()
        };
        assert_eq!(apply(&twice, &[]).unwrap_err().code(), ErrorCode::OverlappingDiff);
    }

    #[test]
    fn live_list_invariants() {
        let dup = vec![managed("B", 17), managed("B", 17)];
        assert_eq!(
            apply(&ApplyDiff::default(), &dup).unwrap_err().code(),
            ErrorCode::DuplicateManagedHash
        );

        let mut no_hash = managed("B", 17);
        no_hash.identity_hash = None;
        assert_eq!(
            apply(&ApplyDiff::default(), &[no_hash]).unwrap_err().code(),
            ErrorCode::MissingManagedHash
        );

        let clash = ApplyDiff {
            creates: vec![planned("B", 17)],
            ..ApplyDiff::default()
        };
        assert_eq!(
            apply(&clash, &[managed("B", 17)]).unwrap_err().code(),
            ErrorCode::DuplicateManagedHash
        );
    }

    #[test]
    fn update_without_target_fails() {
        let diff = ApplyDiff {
            updates: vec![planned("B", 17)],
            ..ApplyDiff::default()
        };
        assert_eq!(
            apply(&diff, &[unmanaged("A")]).unwrap_err().code(),
            ErrorCode::UpdateTargetMissing
        );
    }

    #[test]
    fn unmatched_delete_is_not_counted() {
        let diff = ApplyDiff {
            deletes: vec![planned("Nowhere", 17).identity_hash],
            ..ApplyDiff::default()
        };
        let outcome = apply(&diff, &[unmanaged("A")]).unwrap();
        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.entries.len(), 1);
    }
}
