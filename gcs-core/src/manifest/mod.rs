//! The manifest: the persisted catalog of events, keyed by identity hash.
//!
//! All writes go through [`Manifest::upsert_event`] (or
//! [`Manifest::replace_with`], which upserts) so the identity invariants are
//! re-checked on every change. Reading and writing the backing file is the
//! job of [`ManifestStore`].

mod event;
mod store;
mod validate;

pub use event::{
    Behavior, Correlation, DateSpec, ManifestEvent, Ownership, Repeat, StopType, SubEvent,
    SubEventTiming,
};
pub use store::{DraftManifest, ManifestStore};
pub use validate::validate_manifest_value;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{GcsError, GcsResult};
use crate::identity::{IdentityHash, canonicalize};
use crate::intent::{Intent, merge_intents};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub events: BTreeMap<String, ManifestEvent>,
}

/// Counts from a replacement-style ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub added: usize,
    pub kept: usize,
    pub removed: usize,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEvent> {
        self.events.get(id)
    }

    /// Insert or replace an event, keyed by its id.
    ///
    /// The identity is re-hashed and stamped on the event and its
    /// sub-events. Replacing an event whose recorded hash differs from the
    /// new one is an [`GcsError::IdentityMutation`]: a changed meaning needs a
    /// new identity, not an overwrite of the old key.
    pub fn upsert_event(&mut self, mut event: ManifestEvent) -> GcsResult<()> {
        if event.id.trim().is_empty() {
            return Err(GcsError::invalid_identity("id", "must not be empty"));
        }

        let computed = event.identity.hash()?;

        match self.events.get(&event.id) {
            Some(existing) => {
                let recorded = existing.hash()?;
                if recorded != computed {
                    return Err(GcsError::IdentityMutation {
                        id: event.id.clone(),
                        recorded: recorded.to_string(),
                        computed: computed.to_string(),
                    });
                }
            }
            None if event.id != computed.as_str() => {
                return Err(GcsError::KeyMismatch {
                    key: computed.to_string(),
                    id: event.id.clone(),
                });
            }
            None => {}
        }

        event.stamp(computed)?;
        debug!(id = %event.id, sub_events = event.sub_events.len(), "upserted manifest event");
        self.events.insert(event.id.clone(), event);
        Ok(())
    }

    /// Identity-less insertion. Retired: every event needs an identity.
    pub fn append_event(&mut self, _event: Value) -> GcsResult<()> {
        Err(GcsError::AppendRetired)
    }

    /// Replace the catalog with the given intents.
    ///
    /// Intents sharing an identity are merged into one event. Events that are
    /// not in the new set are dropped. A `locked` flag already on record is
    /// carried over to the replacement.
    pub fn replace_with(&mut self, intents: Vec<Intent>) -> GcsResult<ReplaceSummary> {
        let mut next = Manifest::default();
        let mut summary = ReplaceSummary::default();

        for intent in merge_intents(intents) {
            let mut event = intent.into_event();
            match self.events.get(&event.id) {
                Some(existing) => {
                    event.ownership.locked |= existing.ownership.locked;
                    summary.kept += 1;
                }
                None => summary.added += 1,
            }
            next.upsert_event(event)?;
        }

        summary.removed = self.events.keys().filter(|k| !next.events.contains_key(*k)).count();
        *self = next;
        Ok(summary)
    }

    /// Events indexed by identity hash, for the event resolver.
    pub fn by_hash(&self) -> GcsResult<BTreeMap<IdentityHash, ManifestEvent>> {
        self.events
            .values()
            .map(|event| Ok((event.hash()?, event.clone())))
            .collect()
    }

    /// Assign identities to a bootstrap draft.
    ///
    /// Every draft event must carry a valid `identity`; its hash becomes the
    /// event's id and key. Two draft events with the same identity are
    /// rejected rather than merged.
    pub fn promote_draft(draft: DraftManifest) -> GcsResult<Manifest> {
        let mut manifest = Manifest::default();
        let mut origin: BTreeMap<IdentityHash, String> = BTreeMap::new();

        for (key, mut raw) in draft.events {
            let identity = raw
                .get("identity")
                .ok_or_else(|| GcsError::invalid_identity(format!("events.{key}.identity"), "missing"))?;
            let canonical = canonicalize(identity)?;
            let hash = canonical.hash()?;

            if let Some(first) = origin.insert(hash.clone(), key.clone()) {
                return Err(GcsError::ManifestCorrupt(format!(
                    "draft events '{first}' and '{key}' share identity {hash}"
                )));
            }

            if let Some(object) = raw.as_object_mut() {
                object.insert("id".into(), Value::String(hash.to_string()));
                object.insert("identity".into(), canonical.into_value());
                object.remove("identity_hash");
            }
            let event: ManifestEvent = serde_json::from_value(raw)
                .map_err(|e| GcsError::ManifestCorrupt(format!("draft event '{key}': {e}")))?;
            manifest.upsert_event(event)?;
        }

        validate_manifest_value(&serde_json::to_value(&manifest)?)?;
        Ok(manifest)
    }
}
