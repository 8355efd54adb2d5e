//! Half-open date intervals.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{GcsError, GcsResult};

/// Dates in `[start, end)`. Always at least one day long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "ScopeFields")]
pub struct ResolutionScope {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct ScopeFields {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<ScopeFields> for ResolutionScope {
    type Error = GcsError;

    fn try_from(fields: ScopeFields) -> Result<Self, Self::Error> {
        ResolutionScope::new(fields.start, fields.end)
    }
}

impl ResolutionScope {
    pub fn new(start: NaiveDate, end: NaiveDate) -> GcsResult<Self> {
        if end <= start {
            return Err(GcsError::invalid_field(
                "scope",
                format!("end {end} must be after start {start}"),
            ));
        }
        Ok(ResolutionScope { start, end })
    }

    /// The scope covering `first..=last`.
    pub fn inclusive(first: NaiveDate, last: NaiveDate) -> GcsResult<Self> {
        let end = next_day(last)?;
        Self::new(first, end)
    }

    pub fn single_day(day: NaiveDate) -> GcsResult<Self> {
        Self::inclusive(day, day)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// The last day inside the scope.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.start)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(|d| *d < self.end)
    }

    /// Parse a CLI-style range.
    /// - `from`: YYYY-MM-DD, defaults to `today`
    /// - `to`: YYYY-MM-DD (inclusive), defaults to `today + default_days`
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        today: NaiveDate,
        default_days: u64,
    ) -> GcsResult<Self> {
        let start = match from {
            Some(s) => parse_date(s)?,
            None => today,
        };
        let end = match to {
            Some(s) => next_day(parse_date(s)?)?,
            None => today
                .checked_add_days(Days::new(default_days))
                .ok_or_else(|| GcsError::invalid_field("to", "date out of range"))?,
        };
        Self::new(start, end)
    }
}

impl fmt::Display for ResolutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.last_day())
    }
}

pub(crate) fn next_day(day: NaiveDate) -> GcsResult<NaiveDate> {
    day.succ_opt()
        .ok_or_else(|| GcsError::invalid_field("date", format!("{day} has no next day")))
}

fn parse_date(s: &str) -> GcsResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        GcsError::invalid_field("date", format!("invalid date '{s}', expected YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted() {
        assert!(ResolutionScope::new(d(5), d(5)).is_err());
        assert!(ResolutionScope::new(d(5), d(4)).is_err());
    }

    #[test]
    fn half_open_membership() {
        let scope = ResolutionScope::new(d(1), d(4)).unwrap();
        assert!(scope.contains(d(1)));
        assert!(scope.contains(d(3)));
        assert!(!scope.contains(d(4)));
        assert_eq!(scope.days(), 3);
        assert_eq!(scope.last_day(), d(3));
        assert_eq!(scope.iter_days().collect::<Vec<_>>(), vec![d(1), d(2), d(3)]);
        assert_eq!(scope.to_string(), "2025-12-01..2025-12-03");
    }

    #[test]
    fn deserialization_validates() {
        let ok: ResolutionScope =
            serde_json::from_str(r#"{"start":"2025-12-01","end":"2025-12-02"}"#).unwrap();
        assert_eq!(ok, ResolutionScope::single_day(d(1)).unwrap());
        assert!(
            serde_json::from_str::<ResolutionScope>(r#"{"start":"2025-12-02","end":"2025-12-01"}"#)
                .is_err()
        );
    }

    #[test]
    fn from_args_defaults() {
        let scope = ResolutionScope::from_args(None, None, d(1), 10).unwrap();
        assert_eq!(scope.start(), d(1));
        assert_eq!(scope.end(), d(11));

        let scope = ResolutionScope::from_args(Some("2025-12-02"), Some("2025-12-03"), d(1), 10).unwrap();
        assert_eq!(scope.days(), 2);

        assert!(ResolutionScope::from_args(Some("12/02/2025"), None, d(1), 10).is_err());
    }
}
