//! Daily RRULE expansion for calendar events.
//!
//! Only `FREQ=DAILY` is supported, optionally bounded by `UNTIL` or `COUNT`.
//! Anything that would need weekday or month logic is rejected: the host
//! scheduler has no way to express it on a single entry.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::debug;

use super::NormalizeContext;
use crate::error::{GcsError, GcsResult};

/// Upper bound on occurrences from a single rule.
const MAX_OCCURRENCES: u16 = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Until {
    Date(NaiveDate),
    Utc(DateTime<Utc>),
    Floating(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct DailyRule {
    until: Option<Until>,
    count: Option<u32>,
}

/// Validate rule fields. Keys are matched case-insensitively.
pub(crate) fn parse_rule(event: &str, fields: &BTreeMap<String, String>) -> GcsResult<DailyRule> {
    let unsupported = |reason: String| GcsError::UnsupportedRecurrence {
        event: event.to_string(),
        reason,
    };

    let mut rule = DailyRule::default();
    let mut freq = None;

    for (key, value) in fields {
        let value = value.trim();
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => freq = Some(value.to_ascii_uppercase()),
            "INTERVAL" if value == "1" => {}
            "INTERVAL" => return Err(unsupported(format!("INTERVAL={value}"))),
            "WKST" => {}
            "UNTIL" => rule.until = Some(parse_until(value).ok_or_else(|| unsupported(format!("UNTIL={value}")))?),
            "COUNT" => {
                let count = value
                    .parse::<u32>()
                    .ok()
                    .filter(|c| *c > 0)
                    .ok_or_else(|| unsupported(format!("COUNT={value}")))?;
                rule.count = Some(count);
            }
            other => return Err(unsupported(format!("{other} is not supported"))),
        }
    }

    match freq.as_deref() {
        Some("DAILY") => {}
        Some(other) => return Err(unsupported(format!("FREQ={other}"))),
        None => return Err(unsupported("FREQ is missing".into())),
    }
    if rule.until.is_some() && rule.count.is_some() {
        return Err(unsupported("UNTIL and COUNT are mutually exclusive".into()));
    }

    Ok(rule)
}

fn parse_until(value: &str) -> Option<Until> {
    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(Until::Utc(naive.and_utc()));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Some(Until::Floating(naive));
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").ok().map(Until::Date)
}

/// Local dates inside the context horizon on which the rule fires.
///
/// Occurrences before the horizon start are skipped without being expanded;
/// `COUNT` still counts from `first`. Unbounded rules stop at the end of the
/// horizon. A rule that fires only after the horizon keeps its first
/// occurrence, and one with nothing left inside it falls back to `first`'s
/// date, so every event has at least one date.
pub(crate) fn expand_daily(
    event: &str,
    first: NaiveDateTime,
    rule: &DailyRule,
    ctx: &NormalizeContext,
) -> GcsResult<Vec<NaiveDate>> {
    let rrule_str = build_rrule_string(event, first, rule, ctx.timezone)?;

    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| GcsError::UnsupportedRecurrence {
        event: event.to_string(),
        reason: format!("{e}"),
    })?;

    let first_utc = to_utc(event, first, ctx.timezone)?;
    let horizon_start = to_utc(event, ctx.horizon.start().and_time(NaiveTime::MIN), ctx.timezone)?;
    let horizon_end = to_utc(event, ctx.horizon.end().and_time(NaiveTime::MIN), ctx.timezone)?;

    // after/before are inclusive; the horizon end is not
    let tz: rrule::Tz = Utc.into();
    let after = first_utc.max(horizon_start).with_timezone(&tz);
    let before = (horizon_end - Duration::seconds(1)).max(first_utc).with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);
    if result.limited {
        return Err(GcsError::UnsupportedRecurrence {
            event: event.to_string(),
            reason: format!("more than {MAX_OCCURRENCES} occurrences"),
        });
    }

    let mut dates: Vec<NaiveDate> = result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&ctx.timezone).date_naive())
        .collect();
    dates.dedup();

    if dates.is_empty() {
        debug!(event, "no occurrences inside the horizon, keeping the first");
        dates.push(first.date());
    }

    debug!(event, occurrences = dates.len(), "expanded daily rule");
    Ok(dates)
}

/// Build an iCalendar-format rule for the rrule crate parser.
fn build_rrule_string(event: &str, first: NaiveDateTime, rule: &DailyRule, tz: Tz) -> GcsResult<String> {
    let dtstart = if tz == chrono_tz::UTC {
        format!("DTSTART:{}Z", first.format("%Y%m%dT%H%M%S"))
    } else {
        format!("DTSTART;TZID={}:{}", tz.name(), first.format("%Y%m%dT%H%M%S"))
    };

    let mut rrule = String::from("RRULE:FREQ=DAILY");
    if let Some(count) = rule.count {
        rrule.push_str(&format!(";COUNT={count}"));
    }
    if let Some(until) = &rule.until {
        // The crate requires UNTIL in UTC once DTSTART carries a zone
        let until = match until {
            Until::Utc(dt) => *dt,
            Until::Floating(naive) => to_utc(event, *naive, tz)?,
            Until::Date(date) => to_utc(event, date.and_time(last_second()), tz)?,
        };
        rrule.push_str(&format!(";UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
    }

    Ok(format!("{dtstart}\n{rrule}"))
}

fn last_second() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn to_utc(event: &str, local: NaiveDateTime, tz: Tz) -> GcsResult<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| GcsError::UnsupportedRecurrence {
            event: event.to_string(),
            reason: format!("{local} does not exist in {}", tz.name()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ResolutionScope;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn ctx(tz: Tz) -> NormalizeContext {
        let start = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        NormalizeContext::new(tz, ResolutionScope::new(start, end).unwrap())
    }

    fn first() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    #[test]
    fn rejects_non_daily_rules() {
        for rule in [
            fields(&[("FREQ", "WEEKLY")]),
            fields(&[("FREQ", "DAILY"), ("BYDAY", "MO")]),
            fields(&[("FREQ", "DAILY"), ("INTERVAL", "2")]),
            fields(&[("INTERVAL", "1")]),
            fields(&[("FREQ", "DAILY"), ("COUNT", "0")]),
        ] {
            let err = parse_rule("evt", &rule).unwrap_err();
            assert!(matches!(err, GcsError::UnsupportedRecurrence { .. }), "{rule:?}");
        }
    }

    #[test]
    fn count_bounds_occurrences() {
        let rule = parse_rule("evt", &fields(&[("freq", "daily"), ("count", "3")])).unwrap();
        let dates = expand_daily("evt", first(), &rule, &ctx(chrono_tz::America::New_York)).unwrap();
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0], first().date());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2025, 12, 3).unwrap());
    }

    #[test]
    fn until_date_is_inclusive() {
        let rule = parse_rule("evt", &fields(&[("FREQ", "DAILY"), ("UNTIL", "20251205")])).unwrap();
        let dates = expand_daily("evt", first(), &rule, &ctx(chrono_tz::Europe::Amsterdam)).unwrap();
        assert_eq!(dates.len(), 5);
        assert_eq!(dates.last(), Some(&NaiveDate::from_ymd_opt(2025, 12, 5).unwrap()));
    }

    #[test]
    fn unbounded_rule_stops_at_horizon() {
        let rule = parse_rule("evt", &fields(&[("FREQ", "DAILY")])).unwrap();
        let dates = expand_daily("evt", first(), &rule, &ctx(chrono_tz::UTC)).unwrap();
        assert_eq!(dates.len(), 31);
        assert_eq!(dates.last(), Some(&NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
    }

    fn horizon(start: NaiveDate, end: NaiveDate) -> NormalizeContext {
        NormalizeContext::new(chrono_tz::UTC, ResolutionScope::new(start, end).unwrap())
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn long_running_rule_starts_at_horizon() {
        let rule = parse_rule("porch", &fields(&[("FREQ", "DAILY")])).unwrap();
        let started = day(2019, 1, 1).and_hms_opt(17, 0, 0).unwrap();
        let ctx = horizon(day(2025, 12, 1), day(2026, 12, 1));
        let dates = expand_daily("porch", started, &rule, &ctx).unwrap();
        assert_eq!(dates.len(), 365);
        assert_eq!(dates[0], day(2025, 12, 1));
        assert_eq!(dates.last(), Some(&day(2026, 11, 30)));
    }

    #[test]
    fn count_is_taken_from_the_first_occurrence() {
        let rule = parse_rule("evt", &fields(&[("FREQ", "DAILY"), ("COUNT", "5")])).unwrap();
        let started = day(2025, 11, 28).and_hms_opt(17, 0, 0).unwrap();
        let dates = expand_daily("evt", started, &rule, &horizon(day(2025, 12, 1), day(2026, 1, 1))).unwrap();
        assert_eq!(dates, vec![day(2025, 12, 1), day(2025, 12, 2)]);
    }

    #[test]
    fn midnight_rule_stays_inside_horizon() {
        let rule = parse_rule("evt", &fields(&[("FREQ", "DAILY")])).unwrap();
        let started = day(2025, 12, 10).and_time(NaiveTime::MIN);
        let dates = expand_daily("evt", started, &rule, &horizon(day(2025, 12, 1), day(2025, 12, 15))).unwrap();
        assert_eq!(dates.len(), 5);
        assert_eq!(dates.last(), Some(&day(2025, 12, 14)));
    }

    #[test]
    fn expired_rule_keeps_its_first_date() {
        let rule = parse_rule("evt", &fields(&[("FREQ", "DAILY"), ("UNTIL", "20240110")])).unwrap();
        let started = day(2024, 1, 1).and_hms_opt(17, 0, 0).unwrap();
        let dates = expand_daily("evt", started, &rule, &horizon(day(2025, 12, 1), day(2026, 1, 1))).unwrap();
        assert_eq!(dates, vec![day(2024, 1, 1)]);
    }
}
