//! Manifest event types.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GcsResult;
use crate::identity::{DayMask, Identity, IdentityHash, IdentityTiming, TargetKind, TimeSpec};

/// Who owns an event and whether it may be changed automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub managed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

impl Ownership {
    pub fn managed_by(controller: impl Into<String>) -> Self {
        Ownership {
            managed: true,
            controller: Some(controller.into()),
            locked: false,
        }
    }
}

/// Where an event came from, for tracing it back to the provider record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "externalId", default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// A calendar date, concrete or symbolic (e.g. a holiday name the host resolves).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpec {
    pub hard: Option<NaiveDate>,
    #[serde(default)]
    pub symbolic: Option<String>,
}

impl DateSpec {
    pub fn hard(date: NaiveDate) -> Self {
        DateSpec {
            hard: Some(date),
            symbolic: None,
        }
    }

    /// `YYYY-MM-DD` for hard dates, the symbolic name otherwise.
    pub fn host_value(&self) -> String {
        match (&self.hard, &self.symbolic) {
            (Some(date), _) => date.format("%Y-%m-%d").to_string(),
            (None, Some(symbolic)) => symbolic.clone(),
            (None, None) => String::new(),
        }
    }
}

/// How the host stops a running target when its window closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    #[default]
    Graceful,
    Hard,
    GracefulLoop,
}

/// Whether (and how often) the host restarts a target inside its window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    #[default]
    None,
    Immediate,
    /// Restart every n minutes.
    Every(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Behavior {
    pub enabled: bool,
    pub repeat: Repeat,
    #[serde(rename = "stopType")]
    pub stop_type: StopType,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            enabled: true,
            repeat: Repeat::None,
            stop_type: StopType::Graceful,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubEventTiming {
    #[serde(rename = "startDate")]
    pub start_date: DateSpec,
    #[serde(rename = "endDate")]
    pub end_date: DateSpec,
    pub start_time: TimeSpec,
    pub end_time: TimeSpec,
    pub days: DayMask,
}

/// One executable occurrence or date segment of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_hash: Option<IdentityHash>,
    pub timing: SubEventTiming,
    pub behavior: Behavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl SubEvent {
    pub fn new(timing: SubEventTiming, behavior: Behavior, payload: Option<Value>) -> Self {
        SubEvent {
            identity_hash: None,
            timing,
            behavior,
            payload,
        }
    }

    /// The identity this sub-event would have on its own.
    pub fn identity(&self, kind: TargetKind, target: &str) -> Identity {
        Identity::new(
            kind,
            target,
            IdentityTiming {
                days: self.timing.days,
                start_time: self.timing.start_time.clone(),
                end_time: self.timing.end_time.clone(),
            },
        )
    }

    /// Same timing, behavior and payload. Stamped hashes are ignored.
    pub fn same_schedule(&self, other: &SubEvent) -> bool {
        self.timing == other.timing && self.behavior == other.behavior && self.payload == other.payload
    }
}

/// An event as persisted in the manifest, keyed by its identity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEvent {
    pub id: String,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_hash: Option<IdentityHash>,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default)]
    pub correlation: Correlation,
    #[serde(rename = "subEvents", default)]
    pub sub_events: Vec<SubEvent>,
}

impl ManifestEvent {
    /// Set `identity_hash` on the event and every sub-event.
    pub(crate) fn stamp(&mut self, hash: IdentityHash) -> GcsResult<()> {
        for sub in &mut self.sub_events {
            sub.identity_hash = Some(sub.identity(self.identity.kind, &self.identity.target).hash()?);
        }
        self.identity_hash = Some(hash);
        Ok(())
    }

    /// The stamped hash, or a freshly computed one if the event was never stamped.
    pub fn hash(&self) -> GcsResult<IdentityHash> {
        match &self.identity_hash {
            Some(hash) => Ok(hash.clone()),
            None => self.identity.hash(),
        }
    }

    /// Earliest and latest hard dates across all sub-events.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let starts = self.sub_events.iter().filter_map(|s| s.timing.start_date.hard);
        let ends = self.sub_events.iter().filter_map(|s| s.timing.end_date.hard);
        Some((starts.min()?, ends.max()?))
    }
}

impl fmt::Display for ManifestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity)
    }
}
