//! Event identity: the fields that decide *which* logical event something is.
//!
//! An identity deliberately leaves out everything that describes *how* or
//! *when exactly* an event runs (stop type, repeat mode, enabled flag, concrete
//! dates, provider UIDs). Two events that share type, target and daily timing
//! pattern are the same logical event, wherever they came from.

mod canonical;
mod hash;

pub use canonical::{CanonicalIdentity, FORBIDDEN_FIELDS, canonicalize};
pub use hash::{IdentityHash, canonical_json_bytes};

use std::fmt;

use chrono::{NaiveTime, Weekday};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::GcsResult;

/// What a scheduler entry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Playlist,
    Command,
    Sequence,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Playlist => "playlist",
            TargetKind::Command => "command",
            TargetKind::Sequence => "sequence",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "playlist" => Some(TargetKind::Playlist),
            "command" => Some(TargetKind::Command),
            "sequence" => Some(TargetKind::Sequence),
            _ => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solar times the host scheduler resolves against its configured location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SymbolicTime {
    Dawn,
    SunRise,
    SunSet,
    Dusk,
}

impl SymbolicTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolicTime::Dawn => "Dawn",
            SymbolicTime::SunRise => "SunRise",
            SymbolicTime::SunSet => "SunSet",
            SymbolicTime::Dusk => "Dusk",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Dawn" => Some(SymbolicTime::Dawn),
            "SunRise" => Some(SymbolicTime::SunRise),
            "SunSet" => Some(SymbolicTime::SunSet),
            "Dusk" => Some(SymbolicTime::Dusk),
            _ => None,
        }
    }
}

/// A time of day, either concrete (`hard`) or solar (`symbolic` + minute offset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpec {
    pub hard: Option<NaiveTime>,
    pub symbolic: Option<SymbolicTime>,
    #[serde(default)]
    pub offset: i32,
}

impl TimeSpec {
    pub fn hard(time: NaiveTime) -> Self {
        TimeSpec {
            hard: Some(time),
            symbolic: None,
            offset: 0,
        }
    }

    pub fn symbolic(symbolic: SymbolicTime, offset: i32) -> Self {
        TimeSpec {
            hard: None,
            symbolic: Some(symbolic),
            offset,
        }
    }

    /// `HH:MM:SS` for hard times, the symbolic name otherwise.
    pub fn host_value(&self) -> String {
        match (&self.hard, &self.symbolic) {
            (_, Some(symbolic)) => symbolic.as_str().to_string(),
            (Some(hard), None) => hard.format("%H:%M:%S").to_string(),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.symbolic, self.offset) {
            (Some(_), 0) | (None, _) => f.write_str(&self.host_value()),
            (Some(_), offset) => write!(f, "{}{:+}m", self.host_value(), offset),
        }
    }
}

/// Two-letter weekday codes, Sunday first (the host's week order).
pub const DAY_CODES: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

/// A non-empty set of weekdays.
///
/// Bit 0 is Sunday, bit 6 is Saturday. Serialized as an array of
/// [`DAY_CODES`] in week order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayMask(u8);

impl DayMask {
    pub const EVERY_DAY: DayMask = DayMask(0b111_1111);
    pub const WEEKDAYS: DayMask = DayMask(0b011_1110);
    pub const WEEKENDS: DayMask = DayMask(0b100_0001);

    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits != 0 && bits <= Self::EVERY_DAY.0).then_some(DayMask(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn single(weekday: Weekday) -> Self {
        DayMask(1 << weekday.num_days_from_sunday())
    }

    pub fn of(weekdays: &[Weekday]) -> Option<Self> {
        Self::from_bits(
            weekdays
                .iter()
                .fold(0u8, |acc, d| acc | (1 << d.num_days_from_sunday())),
        )
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.0 & (1 << weekday.num_days_from_sunday()) != 0
    }

    pub fn codes(&self) -> Vec<&'static str> {
        DAY_CODES
            .iter()
            .enumerate()
            .filter(|(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, code)| *code)
            .collect()
    }

    /// Build a mask from day codes. Unknown codes, repeats and an empty list
    /// are rejected rather than ignored.
    pub fn from_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Result<Self, String> {
        let mut bits = 0u8;
        for code in codes {
            let index = DAY_CODES
                .iter()
                .position(|c| *c == code)
                .ok_or_else(|| format!("unknown day code '{code}'"))?;
            if bits & (1 << index) != 0 {
                return Err(format!("day code '{code}' listed twice"));
            }
            bits |= 1 << index;
        }
        Self::from_bits(bits).ok_or_else(|| "at least one day is required".to_string())
    }
}

impl fmt::Display for DayMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DayMask::EVERY_DAY => f.write_str("daily"),
            DayMask::WEEKDAYS => f.write_str("weekdays"),
            DayMask::WEEKENDS => f.write_str("weekends"),
            _ => f.write_str(&self.codes().join(",")),
        }
    }
}

impl Serialize for DayMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let codes = self.codes();
        let mut seq = serializer.serialize_seq(Some(codes.len()))?;
        for code in codes {
            seq.serialize_element(code)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for DayMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let codes = Vec::<String>::deserialize(deserializer)?;
        DayMask::from_codes(codes.iter().map(String::as_str)).map_err(de::Error::custom)
    }
}

/// The timing pattern that is part of an identity. No concrete dates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityTiming {
    pub days: DayMask,
    pub start_time: TimeSpec,
    pub end_time: TimeSpec,
}

/// The identity-defining subset of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub target: String,
    pub timing: IdentityTiming,
}

impl Identity {
    pub fn new(kind: TargetKind, target: impl Into<String>, timing: IdentityTiming) -> Self {
        Identity {
            kind,
            target: target.into(),
            timing,
        }
    }

    /// Canonical form of this identity, validated the same way as raw input.
    pub fn canonical(&self) -> GcsResult<CanonicalIdentity> {
        canonicalize(&serde_json::to_value(self)?)
    }

    pub fn hash(&self) -> GcsResult<IdentityHash> {
        self.canonical()?.hash()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}-{}",
            self.kind,
            self.target,
            self.timing.days,
            self.timing.start_time,
            self.timing.end_time
        )
    }
}
