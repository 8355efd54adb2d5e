//! Raw host scheduler entries to intents.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Intent, NormalizeContext};
use crate::error::{GcsError, GcsResult};
use crate::fpp::{default_repeat, enabled_from_host, strip_target_suffix};
use crate::identity::{DayMask, Identity, IdentityTiming, SymbolicTime, TargetKind, TimeSpec};
use crate::manifest::{
    Behavior, Correlation, DateSpec, Ownership, Repeat, StopType, SubEvent, SubEventTiming,
};

/// A host entry as stored, reduced to the fields normalization reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFppEntry {
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TargetKind>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub start_time_offset: Option<i64>,
    pub end_time_offset: Option<i64>,
    pub day: Option<i64>,
    pub enabled: Option<Value>,
    pub repeat: Option<i64>,
    pub stop_type: Option<i64>,
    pub args: Option<Vec<Value>>,
    pub managed: Option<bool>,
}

pub fn from_fpp(raw: &RawFppEntry, ctx: &NormalizeContext) -> GcsResult<Intent> {
    let named = required("target", &raw.target)?;
    let kind = raw.kind.unwrap_or(if named.ends_with(".fseq") {
        TargetKind::Sequence
    } else {
        TargetKind::Playlist
    });
    let target = strip_target_suffix(named);

    let start_date = parse_date("startDate", required("startDate", &raw.start_date)?)?;
    let end_date = parse_date("endDate", required("endDate", &raw.end_date)?)?;
    let start_time = parse_time("startTime", required("startTime", &raw.start_time)?, raw.start_time_offset)?;
    let end_time = parse_time("endTime", required("endTime", &raw.end_time)?, raw.end_time_offset)?;

    let days = raw.day.map(DayMask::from_host).transpose()?.unwrap_or(DayMask::EVERY_DAY);
    let behavior = Behavior {
        enabled: raw.enabled.as_ref().map(enabled_from_host).transpose()?.unwrap_or(true),
        repeat: raw
            .repeat
            .map(Repeat::from_host)
            .transpose()?
            .unwrap_or_else(|| default_repeat(kind)),
        stop_type: raw.stop_type.map(StopType::from_host).transpose()?.unwrap_or_default(),
    };
    let payload = match (kind, &raw.args) {
        (TargetKind::Command, Some(args)) => Some(json!({ "args": args })),
        _ => None,
    };

    let sub = SubEvent::new(
        SubEventTiming {
            start_date,
            end_date,
            start_time: start_time.clone(),
            end_time: end_time.clone(),
            days,
        },
        behavior,
        payload,
    );
    let identity = Identity::new(
        kind,
        target,
        IdentityTiming {
            days,
            start_time,
            end_time,
        },
    );
    let ownership = match raw.managed {
        Some(true) => Ownership::managed_by(&ctx.controller),
        _ => Ownership::default(),
    };
    let correlation = Correlation {
        source: Some("fpp".into()),
        external_id: None,
    };

    Intent::new(identity, ownership, correlation, vec![sub])
}

fn required<'a>(field: &str, value: &'a Option<String>) -> GcsResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GcsError::MissingField(field.to_string()))
}

/// `YYYY-MM-DD`, or a holiday name the host resolves itself.
fn parse_date(field: &str, value: &str) -> GcsResult<DateSpec> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(DateSpec::hard(date));
    }
    if value.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(GcsError::invalid_field(field, format!("invalid date '{value}'")));
    }
    Ok(DateSpec {
        hard: None,
        symbolic: Some(value.to_string()),
    })
}

/// `HH:MM[:SS]` or a solar time name. The host writes end-of-day as `24:00:00`.
fn parse_time(field: &str, value: &str, offset: Option<i64>) -> GcsResult<TimeSpec> {
    if let Some(symbolic) = SymbolicTime::parse(value) {
        let offset = i32::try_from(offset.unwrap_or(0))
            .map_err(|_| GcsError::invalid_field(field, "offset out of range"))?;
        return Ok(TimeSpec::symbolic(symbolic, offset));
    }
    if value == "24:00:00" || value == "24:00" {
        let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        return Ok(TimeSpec::hard(last));
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map(TimeSpec::hard)
        .map_err(|_| GcsError::invalid_field(field, format!("invalid time '{value}'")))
}
