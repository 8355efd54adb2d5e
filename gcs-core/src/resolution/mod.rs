//! Resolution engine: recurring events into executable bundles.
//!
//! Each source event's occurrence window is cut around its cancelled days.
//! Every remaining segment becomes one bundle: the overrides anchored in it,
//! collapsed and most specific first, followed by the base sub-event.

mod overrides;
mod segments;

pub use segments::kept_segments;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GcsError, GcsResult};
use crate::identity::{Identity, IdentityTiming, TargetKind};
use crate::intent::{Intent, merge_intents};
use crate::manifest::{
    Behavior, Correlation, DateSpec, ManifestEvent, Ownership, SubEvent, SubEventTiming,
};
use crate::scope::ResolutionScope;

pub const BASE_PRIORITY: u32 = 0;
pub const OVERRIDE_PRIORITY: u32 = 100;

/// The recurring pattern of a source event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseIntent {
    pub timing: IdentityTiming,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// A single-day change to a source event, anchored on `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideIntent {
    pub date: NaiveDate,
    pub timing: IdentityTiming,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// A source event as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEvent {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub target: String,
    /// Every day the event would occur on without cancellations.
    pub window: ResolutionScope,
    pub base: BaseIntent,
    #[serde(default)]
    pub cancelled: Vec<NaiveDate>,
    #[serde(default)]
    pub overrides: Vec<OverrideIntent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubEventRole {
    Base,
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSubEvent {
    pub role: SubEventRole,
    pub priority: u32,
    pub scope: ResolutionScope,
    pub timing: IdentityTiming,
    pub behavior: Behavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ResolvedSubEvent {
    fn base(scope: ResolutionScope, base: &BaseIntent) -> Self {
        ResolvedSubEvent {
            role: SubEventRole::Base,
            priority: BASE_PRIORITY,
            scope,
            timing: base.timing.clone(),
            behavior: base.behavior.clone(),
            payload: base.payload.clone(),
        }
    }

    fn to_sub_event(&self) -> SubEvent {
        SubEvent::new(
            SubEventTiming {
                start_date: DateSpec::hard(self.scope.start()),
                end_date: DateSpec::hard(self.scope.last_day()),
                start_time: self.timing.start_time.clone(),
                end_time: self.timing.end_time.clone(),
                days: self.timing.days,
            },
            self.behavior.clone(),
            self.payload.clone(),
        )
    }
}

/// One atomic schedulable unit. The last sub-event is always the base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBundle {
    pub source_event_uid: String,
    pub parent_uid: Option<String>,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub target: String,
    pub segment_scope: ResolutionScope,
    pub subevents: Vec<ResolvedSubEvent>,
}

impl ResolvedBundle {
    fn sort_key(&self) -> (NaiveDate, NaiveDate, Option<&str>, &str) {
        (
            self.segment_scope.start(),
            self.segment_scope.end(),
            self.parent_uid.as_deref(),
            self.source_event_uid.as_str(),
        )
    }

    pub fn base(&self) -> Option<&ResolvedSubEvent> {
        self.subevents.last().filter(|s| s.role == SubEventRole::Base)
    }

    pub fn overrides(&self) -> impl Iterator<Item = &ResolvedSubEvent> {
        self.subevents.iter().filter(|s| s.role == SubEventRole::Override)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSchedule {
    pub bundles: Vec<ResolvedBundle>,
}

impl ResolvedSchedule {
    /// One intent per source event, sub-events in bundle order.
    ///
    /// The identity is built from the base timing. Different source events
    /// with the same identity stay separate here; [`merge_intents`] joins them.
    pub fn to_intents(&self, controller: &str) -> GcsResult<Vec<Intent>> {
        let mut by_uid: BTreeMap<&str, Intent> = BTreeMap::new();

        for bundle in &self.bundles {
            let subs = bundle.subevents.iter().map(ResolvedSubEvent::to_sub_event);
            match by_uid.entry(bundle.source_event_uid.as_str()) {
                Entry::Occupied(mut slot) => slot.get_mut().sub_events.extend(subs),
                Entry::Vacant(slot) => {
                    let base = bundle.base().ok_or_else(|| {
                        GcsError::invalid_field(
                            "subevents",
                            format!("bundle for '{}' has no base", bundle.source_event_uid),
                        )
                    })?;
                    let identity = Identity::new(bundle.kind, &bundle.target, base.timing.clone());
                    let correlation = Correlation {
                        source: Some("calendar".into()),
                        external_id: Some(bundle.source_event_uid.clone()),
                    };
                    slot.insert(Intent::new(
                        identity,
                        Ownership::managed_by(controller),
                        correlation,
                        subs.collect(),
                    )?);
                }
            }
        }

        Ok(by_uid.into_values().collect())
    }

    /// Manifest events for persistence, one per identity.
    pub fn to_manifest_events(&self, controller: &str) -> GcsResult<Vec<ManifestEvent>> {
        Ok(merge_intents(self.to_intents(controller)?)
            .into_iter()
            .map(Intent::into_event)
            .collect())
    }
}

/// Resolve every source event into bundles, ordered by
/// (segment start, segment end, parent uid, source uid).
pub fn resolve(events: &[SnapshotEvent]) -> GcsResult<ResolvedSchedule> {
    let mut bundles = Vec::new();
    for event in events {
        bundles.extend(resolve_event(event)?);
    }
    bundles.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(ResolvedSchedule { bundles })
}

fn resolve_event(event: &SnapshotEvent) -> GcsResult<Vec<ResolvedBundle>> {
    let segments = kept_segments(event.window, &event.cancelled)?;

    let anchored: Vec<&OverrideIntent> = event
        .overrides
        .iter()
        .filter(|ov| {
            if !event.window.contains(ov.date) {
                warn!(uid = %event.uid, date = %ov.date, "override outside occurrence window, dropped");
                false
            } else if event.cancelled.contains(&ov.date) {
                warn!(uid = %event.uid, date = %ov.date, "override on a cancelled day, dropped");
                false
            } else {
                true
            }
        })
        .collect();

    debug!(
        uid = %event.uid,
        segments = segments.len(),
        overrides = anchored.len(),
        "resolving event"
    );

    segments
        .into_iter()
        .map(|segment| {
            let inside: Vec<&OverrideIntent> =
                anchored.iter().copied().filter(|ov| segment.contains(ov.date)).collect();
            let mut subevents = overrides::collapse(&inside)?;
            subevents.push(ResolvedSubEvent::base(segment, &event.base));
            Ok(ResolvedBundle {
                source_event_uid: event.uid.clone(),
                parent_uid: event.parent_uid.clone(),
                kind: event.kind,
                target: event.target.clone(),
                segment_scope: segment,
                subevents,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DayMask;
    use crate::test_support::{date, time};

    fn timing(hour: u32) -> IdentityTiming {
        IdentityTiming {
            days: DayMask::EVERY_DAY,
            start_time: time(hour),
            end_time: time(23),
        }
    }

    fn snapshot(uid: &str, first: u32, end: u32) -> SnapshotEvent {
        SnapshotEvent {
            uid: uid.into(),
            parent_uid: None,
            kind: TargetKind::Playlist,
            target: "X".into(),
            window: ResolutionScope::new(date(first), date(end)).unwrap(),
            base: BaseIntent {
                timing: timing(17),
                behavior: Behavior::default(),
                payload: None,
            },
            cancelled: vec![],
            overrides: vec![],
        }
    }

    fn ov(day: u32, hour: u32) -> OverrideIntent {
        OverrideIntent {
            date: date(day),
            timing: timing(hour),
            behavior: Behavior::default(),
            payload: None,
        }
    }

    #[test]
    fn clustered_cancellations_give_two_base_bundles() {
        let mut event = snapshot("a", 1, 11);
        event.cancelled = vec![date(4), date(5), date(6)];
        let schedule = resolve(&[event]).unwrap();
        assert_eq!(schedule.bundles.len(), 2);
        for bundle in &schedule.bundles {
            assert_eq!(bundle.subevents.len(), 1);
            assert_eq!(bundle.subevents[0].role, SubEventRole::Base);
            assert_eq!(bundle.subevents[0].priority, BASE_PRIORITY);
        }
    }

    #[test]
    fn overrides_sit_above_base() {
        let mut event = snapshot("a", 1, 11);
        event.overrides = vec![ov(3, 18), ov(4, 18), ov(5, 19)];
        let schedule = resolve(&[event]).unwrap();
        let bundle = &schedule.bundles[0];
        assert_eq!(bundle.overrides().count(), 2);
        assert!(bundle.overrides().all(|s| s.priority > BASE_PRIORITY));
        assert!(bundle.base().is_some());
        assert_eq!(bundle.subevents.len(), 3);
    }

    #[test]
    fn overrides_follow_their_segment() {
        let mut event = snapshot("a", 1, 11);
        event.cancelled = vec![date(5)];
        event.overrides = vec![ov(3, 18), ov(5, 18), ov(8, 18), ov(20, 18)];
        let schedule = resolve(&[event]).unwrap();
        assert_eq!(schedule.bundles.len(), 2);
        assert_eq!(schedule.bundles[0].overrides().count(), 1);
        assert_eq!(schedule.bundles[1].overrides().count(), 1);
        assert_eq!(schedule.bundles[1].overrides().next().unwrap().scope.start(), date(8));
    }

    #[test]
    fn bundles_sorted_across_events() {
        let mut late = snapshot("b", 1, 11);
        late.cancelled = vec![date(1)];
        let early = snapshot("z", 1, 11);
        let also_early = snapshot("a", 1, 11);
        let schedule = resolve(&[late, early, also_early]).unwrap();
        let uids: Vec<_> = schedule.bundles.iter().map(|b| b.source_event_uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "z", "b"]);
    }

    #[test]
    fn fully_cancelled_event_contributes_nothing() {
        let mut event = snapshot("a", 1, 3);
        event.cancelled = vec![date(1), date(2)];
        assert!(resolve(&[event]).unwrap().bundles.is_empty());
    }

    #[test]
    fn deterministic() {
        let mut event = snapshot("a", 1, 11);
        event.cancelled = vec![date(7)];
        event.overrides = vec![ov(2, 19), ov(3, 19)];
        let events = vec![event, snapshot("b", 2, 6)];
        assert_eq!(resolve(&events).unwrap(), resolve(&events).unwrap());
    }

    #[test]
    fn folds_back_into_manifest_events() {
        let mut event = snapshot("a", 1, 11);
        event.cancelled = vec![date(5)];
        event.overrides = vec![ov(2, 19)];
        let schedule = resolve(&[event]).unwrap();

        let events = schedule.to_manifest_events("gcs").unwrap();
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.identity.timing, timing(17));
        assert_eq!(ev.sub_events.len(), 3);
        assert_eq!(ev.correlation.external_id.as_deref(), Some("a"));
        assert_eq!(ev.date_span(), Some((date(1), date(10))));
    }
}
