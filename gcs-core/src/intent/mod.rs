//! Intents: provider records normalized into identity-bearing events.
//!
//! Both inputs (calendar events and raw host entries) funnel into the same
//! [`Intent`] shape so they can be compared by identity hash.

mod calendar;
mod host;
mod recurrence;

pub use calendar::{Provenance, RawCalendarEvent, from_calendar};
pub use host::{RawFppEntry, from_fpp};

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::error::GcsResult;
use crate::identity::{Identity, IdentityHash};
use crate::manifest::{Correlation, ManifestEvent, Ownership, SubEvent};
use crate::scope::ResolutionScope;

/// Controller name recorded on events this tool manages.
pub const DEFAULT_CONTROLLER: &str = "gcs";

/// Settings the normalizers need from outside the record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeContext {
    pub timezone: Tz,
    /// Unbounded recurrences are expanded up to the end of this scope.
    pub horizon: ResolutionScope,
    pub controller: String,
}

impl NormalizeContext {
    pub fn new(timezone: Tz, horizon: ResolutionScope) -> Self {
        NormalizeContext {
            timezone,
            horizon,
            controller: DEFAULT_CONTROLLER.to_string(),
        }
    }

    pub fn with_controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = controller.into();
        self
    }
}

/// A normalized event with its identity computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    pub identity: Identity,
    pub identity_hash: IdentityHash,
    pub ownership: Ownership,
    pub correlation: Correlation,
    #[serde(rename = "subEvents")]
    pub sub_events: Vec<SubEvent>,
}

impl Intent {
    pub fn new(
        identity: Identity,
        ownership: Ownership,
        correlation: Correlation,
        sub_events: Vec<SubEvent>,
    ) -> GcsResult<Self> {
        let identity_hash = identity.hash()?;
        Ok(Intent {
            identity,
            identity_hash,
            ownership,
            correlation,
            sub_events,
        })
    }

    /// The manifest event for this intent, keyed by its hash. Not yet stamped.
    pub fn into_event(self) -> ManifestEvent {
        ManifestEvent {
            id: self.identity_hash.to_string(),
            identity: self.identity,
            identity_hash: None,
            ownership: self.ownership,
            correlation: self.correlation,
            sub_events: self.sub_events,
        }
    }
}

/// Collapse intents that share an identity.
///
/// Sub-events are concatenated and ordered by date; exact duplicates are
/// dropped. Ownership and correlation come from the first intent seen.
/// Output is ordered by identity hash.
pub fn merge_intents(intents: Vec<Intent>) -> Vec<Intent> {
    let mut merged: BTreeMap<IdentityHash, Intent> = BTreeMap::new();

    for intent in intents {
        match merged.entry(intent.identity_hash.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(intent);
            }
            Entry::Occupied(mut slot) => {
                debug!(hash = %intent.identity_hash.short(), "merging intents with shared identity");
                slot.get_mut().sub_events.extend(intent.sub_events);
            }
        }
    }

    merged
        .into_values()
        .map(|mut intent| {
            intent
                .sub_events
                .sort_by_key(|s| (s.timing.start_date.hard, s.timing.end_date.hard));
            intent.sub_events.dedup_by(|a, b| a.same_schedule(b));
            intent
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::DateSpec;
    use crate::test_support::{date, event};

    fn intent(target: &str, hour: u32, day: u32) -> Intent {
        let mut ev = event(target, hour);
        ev.sub_events[0].timing.start_date = DateSpec::hard(date(day));
        ev.sub_events[0].timing.end_date = DateSpec::hard(date(day));
        Intent::new(ev.identity, ev.ownership, ev.correlation, ev.sub_events).unwrap()
    }

    #[test]
    fn merges_shared_identity_in_date_order() {
        let merged = merge_intents(vec![
            intent("Xmas", 17, 5),
            intent("Halloween", 18, 1),
            intent("Xmas", 17, 2),
            intent("Xmas", 17, 5),
        ]);
        assert_eq!(merged.len(), 2);
        let xmas = merged.iter().find(|i| i.identity.target == "Xmas").unwrap();
        let days: Vec<_> = xmas
            .sub_events
            .iter()
            .map(|s| s.timing.start_date.hard.unwrap())
            .collect();
        assert_eq!(days, vec![date(2), date(5)]);
    }

    #[test]
    fn into_event_is_keyed_by_hash() {
        let i = intent("Xmas", 17, 1);
        let hash = i.identity_hash.clone();
        let ev = i.into_event();
        assert_eq!(ev.id, hash.as_str());
        assert_eq!(ev.hash().unwrap(), hash);
    }
}
