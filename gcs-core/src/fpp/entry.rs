//! Host scheduler entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::legacy::{encode_marker, strip_marker};
use crate::error::{GcsError, GcsResult};
use crate::identity::{IdentityHash, TargetKind};
use crate::intent::{NormalizeContext, RawFppEntry, from_fpp};
use crate::manifest::{ManifestEvent, SubEvent};

/// One entry in the host's schedule list.
///
/// Only ownership is typed. Everything else is kept as the host wrote it so
/// that unmanaged entries survive an apply untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_hash: Option<IdentityHash>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ScheduleEntry {
    pub fn unmanaged(fields: Map<String, Value>) -> Self {
        ScheduleEntry {
            managed: None,
            identity_hash: None,
            fields,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.managed == Some(true)
    }

    /// Render a manifest event as a managed host entry.
    ///
    /// The entry spans every hard date of the event; behavior and payload
    /// come from the last sub-event that runs on the identity's own timing.
    pub fn from_event(event: &ManifestEvent) -> GcsResult<Self> {
        let base = base_sub_event(event)
            .ok_or_else(|| GcsError::invalid_field("subEvents", format!("'{event}' has none")))?;
        let identity = &event.identity;
        let hash = event.hash()?;

        let (start_date, end_date) = match event.date_span() {
            Some((start, end)) => (start.format("%Y-%m-%d").to_string(), end.format("%Y-%m-%d").to_string()),
            None => (
                base.timing.start_date.host_value(),
                base.timing.end_date.host_value(),
            ),
        };

        let mut fields = Map::new();
        fields.insert("enabled".into(), json!(i64::from(base.behavior.enabled)));
        fields.insert("sequence".into(), json!(i64::from(identity.kind == TargetKind::Sequence)));
        match identity.kind {
            TargetKind::Playlist => {
                fields.insert("playlist".into(), json!(identity.target));
            }
            TargetKind::Sequence => {
                fields.insert("playlist".into(), json!(format!("{}.fseq", identity.target)));
            }
            TargetKind::Command => {
                fields.insert("playlist".into(), json!(""));
                fields.insert("command".into(), json!(identity.target));
                let args = base
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("args"))
                    .cloned()
                    .unwrap_or_else(|| json!([]));
                fields.insert("args".into(), args);
            }
        }
        fields.insert("day".into(), json!(identity.timing.days.host_code()));
        fields.insert("startTime".into(), json!(identity.timing.start_time.host_value()));
        fields.insert("startTimeOffset".into(), json!(identity.timing.start_time.offset));
        fields.insert("endTime".into(), json!(identity.timing.end_time.host_value()));
        fields.insert("endTimeOffset".into(), json!(identity.timing.end_time.offset));
        fields.insert("startDate".into(), json!(start_date));
        fields.insert("endDate".into(), json!(end_date));
        fields.insert("repeat".into(), json!(base.behavior.repeat.host_code()));
        fields.insert("stopType".into(), json!(base.behavior.stop_type.host_code()));

        Ok(ScheduleEntry {
            managed: Some(true),
            identity_hash: Some(hash),
            fields,
        })
    }

    /// Sort key for newly created entries: `startDate startTime target`.
    pub fn order_key(&self) -> String {
        let field = |key: &str| self.fields.get(key).and_then(Value::as_str).unwrap_or("");
        let target = match field("command") {
            "" => field("playlist"),
            command => command,
        };
        format!("{} {} {}", field("startDate"), field("startTime"), target)
    }

    /// Move a `gcs:managed:<hash>` argument marker into the typed ownership fields.
    ///
    /// Returns true when a marker was found.
    pub fn lift_legacy_marker(&mut self) -> bool {
        let Some(Value::Array(args)) = self.fields.get_mut("args") else {
            return false;
        };
        match strip_marker(args) {
            Some(hash) => {
                self.managed = Some(true);
                self.identity_hash = Some(hash);
                true
            }
            None => false,
        }
    }

    /// The inverse of [`ScheduleEntry::lift_legacy_marker`], for hosts that
    /// drop unknown entry fields.
    pub fn with_legacy_marker(&self) -> ScheduleEntry {
        let mut fields = self.fields.clone();
        if let (true, Some(hash)) = (self.is_managed(), &self.identity_hash) {
            let args = fields.entry("args").or_insert_with(|| json!([]));
            if let Value::Array(args) = args {
                args.push(json!(encode_marker(hash)));
            }
        }
        ScheduleEntry::unmanaged(fields)
    }

    /// The normalizer's view of this entry.
    pub fn to_raw(&self) -> RawFppEntry {
        let text = |key: &str| self.fields.get(key).and_then(Value::as_str).map(str::to_string);
        let int = |key: &str| self.fields.get(key).and_then(Value::as_i64);

        let command = text("command").filter(|c| !c.is_empty());
        let (kind, target) = match command {
            Some(command) => (Some(TargetKind::Command), Some(command)),
            None if int("sequence") == Some(1) => (Some(TargetKind::Sequence), text("playlist")),
            None => (None, text("playlist")),
        };
        let args = match self.fields.get("args") {
            Some(Value::Array(args)) => Some(args.clone()),
            _ => None,
        };

        RawFppEntry {
            target,
            kind,
            start_date: text("startDate"),
            end_date: text("endDate"),
            start_time: text("startTime"),
            end_time: text("endTime"),
            start_time_offset: int("startTimeOffset"),
            end_time_offset: int("endTimeOffset"),
            day: int("day"),
            enabled: self.fields.get("enabled").cloned(),
            repeat: int("repeat"),
            stop_type: int("stopType"),
            args,
            managed: self.managed,
        }
    }
}

/// The event as the host hands it back once written.
///
/// The host keeps one entry per identity, so an event with a sub-event per
/// day comes back as a single sub-event spanning all of them. Source events
/// must be put in this shape before they are compared with events read from
/// the host. Ownership and correlation are kept from `event`.
pub fn host_round_trip(event: &ManifestEvent, ctx: &NormalizeContext) -> GcsResult<ManifestEvent> {
    let entry = ScheduleEntry::from_event(event)?;
    let mut seen = from_fpp(&entry.to_raw(), ctx)?.into_event();
    seen.ownership = event.ownership.clone();
    seen.correlation = event.correlation.clone();
    Ok(seen)
}

fn base_sub_event(event: &ManifestEvent) -> Option<&SubEvent> {
    let timing = &event.identity.timing;
    event
        .sub_events
        .iter()
        .rev()
        .find(|sub| {
            sub.timing.days == timing.days
                && sub.timing.start_time == timing.start_time
                && sub.timing.end_time == timing.end_time
        })
        .or_else(|| event.sub_events.last())
}
