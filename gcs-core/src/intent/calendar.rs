//! Calendar events to intents.
//!
//! The summary names the target. Optional `key: value` lines in the
//! description override the type, target and behavior:
//!
//! ```text
//! type: command
//! target: Volume Set
//! args: 70
//! stopType: hard
//! repeat: 15
//! enabled: no
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{Intent, NormalizeContext, recurrence};
use crate::error::{GcsError, GcsResult};
use crate::fpp::{default_repeat, strip_target_suffix};
use crate::identity::{DayMask, Identity, IdentityTiming, TargetKind, TimeSpec};
use crate::manifest::{
    Behavior, Correlation, DateSpec, Ownership, Repeat, StopType, SubEvent, SubEventTiming,
};

/// Where a calendar event came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
}

/// A calendar event as the provider adapter hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCalendarEvent {
    pub summary: String,
    /// RFC 3339, local `YYYY-MM-DDTHH:MM:SS`, or `YYYY-MM-DD` for all-day events.
    pub dtstart: String,
    pub dtend: String,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub rrule: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl RawCalendarEvent {
    fn label(&self) -> String {
        self.provenance.uid.clone().unwrap_or_else(|| self.summary.clone())
    }
}

pub fn from_calendar(raw: &RawCalendarEvent, ctx: &NormalizeContext) -> GcsResult<Intent> {
    let label = raw.label();
    let directives = Directives::parse(raw.description.as_deref());
    let (kind, target) = directives.target(&raw.summary)?;

    let start = CalendarTime::parse("dtstart", &raw.dtstart, ctx.timezone)?;
    let end = CalendarTime::parse("dtend", &raw.dtend, ctx.timezone)?;
    let window = Window::new(start, end, raw.is_all_day)?;

    let behavior = directives.behavior(kind)?;
    let payload = directives.payload(kind, &label);

    let first_days = match &raw.rrule {
        Some(fields) => {
            let rule = recurrence::parse_rule(&label, fields)?;
            recurrence::expand_daily(&label, window.first_start, &rule, ctx)?
        }
        None => vec![window.first_start.date()],
    };

    let days = DayMask::EVERY_DAY;
    let sub_events = first_days
        .into_iter()
        .map(|day| {
            let last = day
                .checked_add_days(Days::new(window.span_days))
                .ok_or_else(|| GcsError::invalid_field("dtend", "date out of range"))?;
            Ok(SubEvent::new(
                SubEventTiming {
                    start_date: DateSpec::hard(day),
                    end_date: DateSpec::hard(last),
                    start_time: window.start_time.clone(),
                    end_time: window.end_time.clone(),
                    days,
                },
                behavior.clone(),
                payload.clone(),
            ))
        })
        .collect::<GcsResult<Vec<_>>>()?;

    let identity = Identity::new(
        kind,
        target,
        IdentityTiming {
            days,
            start_time: window.start_time,
            end_time: window.end_time,
        },
    );
    let correlation = Correlation {
        source: Some(raw.provenance.source.clone().unwrap_or_else(|| "calendar".into())),
        external_id: raw.provenance.uid.clone(),
    };

    Intent::new(identity, Ownership::managed_by(&ctx.controller), correlation, sub_events)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalendarTime {
    Date(NaiveDate),
    /// Wall-clock time in the context timezone.
    Local(NaiveDateTime),
}

impl CalendarTime {
    fn parse(field: &str, value: &str, tz: Tz) -> GcsResult<Self> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(CalendarTime::Local(dt.with_timezone(&tz).naive_local()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(CalendarTime::Local(naive));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(CalendarTime::Date(date));
        }
        Err(GcsError::invalid_field(field, format!("unrecognized date/time '{value}'")))
    }
}

/// Daily window and date span of one occurrence.
struct Window {
    first_start: NaiveDateTime,
    start_time: TimeSpec,
    end_time: TimeSpec,
    /// Extra days an occurrence covers after its first day.
    span_days: u64,
}

impl Window {
    fn new(start: CalendarTime, end: CalendarTime, all_day: bool) -> GcsResult<Self> {
        match (start, end) {
            (CalendarTime::Date(first), CalendarTime::Date(end)) => Self::all_day(first, end),
            (CalendarTime::Local(start), CalendarTime::Local(end)) if all_day => {
                Self::all_day(start.date(), end.date())
            }
            (CalendarTime::Local(start), CalendarTime::Local(end)) => Self::timed(start, end),
            _ => Err(GcsError::invalid_field("dtend", "mixes a date with a date-time")),
        }
    }

    /// All-day events end exclusively on `end`, as calendars store them.
    fn all_day(first: NaiveDate, end: NaiveDate) -> GcsResult<Self> {
        let last = if end > first { end.pred_opt().unwrap_or(first) } else { first };
        Ok(Window {
            first_start: first.and_time(NaiveTime::MIN),
            start_time: TimeSpec::hard(NaiveTime::MIN),
            end_time: TimeSpec::hard(end_of_day()),
            span_days: (last - first).num_days().unsigned_abs(),
        })
    }

    fn timed(start: NaiveDateTime, end: NaiveDateTime) -> GcsResult<Self> {
        if end <= start {
            return Err(GcsError::invalid_field("dtend", "event ends before it starts"));
        }
        if end - start >= Duration::days(1) {
            return Err(GcsError::invalid_field(
                "dtend",
                "timed events of a day or longer are not supported",
            ));
        }
        Ok(Window {
            first_start: start,
            start_time: TimeSpec::hard(whole_seconds(start.time())),
            end_time: TimeSpec::hard(whole_seconds(end.time())),
            span_days: 0,
        })
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn whole_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

const DIRECTIVE_KEYS: [&str; 6] = ["type", "target", "enabled", "stoptype", "repeat", "args"];

/// `key: value` lines found in an event description.
#[derive(Debug, Default)]
struct Directives(BTreeMap<String, String>);

impl Directives {
    fn parse(description: Option<&str>) -> Self {
        let Some(description) = description else {
            return Directives::default();
        };
        let text = description.replace("<br>", "\n").replace("<br/>", "\n");
        let entries = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
            .filter(|(key, _)| DIRECTIVE_KEYS.contains(&key.as_str()))
            .collect();
        Directives(entries)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn target(&self, summary: &str) -> GcsResult<(TargetKind, String)> {
        let named = self.get("target").unwrap_or(summary).trim();
        if named.is_empty() {
            return Err(GcsError::MissingField("summary".into()));
        }
        let kind = match self.get("type") {
            Some(kind) => TargetKind::parse(&kind.to_ascii_lowercase())
                .ok_or_else(|| GcsError::invalid_field("type", format!("unknown type '{kind}'")))?,
            None if named.ends_with(".fseq") => TargetKind::Sequence,
            None => TargetKind::Playlist,
        };
        Ok((kind, strip_target_suffix(named).to_string()))
    }

    fn behavior(&self, kind: TargetKind) -> GcsResult<Behavior> {
        let enabled = match self.get("enabled") {
            Some(v) => parse_flag(v)?,
            None => true,
        };
        let stop_type = match self.get("stoptype") {
            Some(v) => parse_stop_type(v)?,
            None => StopType::default(),
        };
        let repeat = match self.get("repeat") {
            Some(v) => parse_repeat(v)?,
            None => default_repeat(kind),
        };
        Ok(Behavior {
            enabled,
            repeat,
            stop_type,
        })
    }

    fn payload(&self, kind: TargetKind, label: &str) -> Option<serde_json::Value> {
        let args = self.get("args")?;
        if kind != TargetKind::Command {
            warn!(event = label, "ignoring args on a non-command event");
            return None;
        }
        let args: Vec<&str> = args.split(',').map(str::trim).filter(|a| !a.is_empty()).collect();
        Some(json!({ "args": args }))
    }
}

fn parse_flag(value: &str) -> GcsResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(GcsError::invalid_field("enabled", format!("expected yes/no, got '{other}'"))),
    }
}

fn parse_stop_type(value: &str) -> GcsResult<StopType> {
    match value.to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
        "graceful" => Ok(StopType::Graceful),
        "hard" => Ok(StopType::Hard),
        "graceful_loop" => Ok(StopType::GracefulLoop),
        other => Err(GcsError::invalid_field("stopType", format!("unknown stop type '{other}'"))),
    }
}

/// `none`, `immediate`, or a whole number of minutes.
fn parse_repeat(value: &str) -> GcsResult<Repeat> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Ok(Repeat::None),
        "immediate" => Ok(Repeat::Immediate),
        other => other
            .parse::<u32>()
            .ok()
            .filter(|m| *m > 0)
            .map(Repeat::Every)
            .ok_or_else(|| GcsError::invalid_field("repeat", format!("unknown repeat '{other}'"))),
    }
}
