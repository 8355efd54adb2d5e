//! Cancellation subtraction.

use chrono::NaiveDate;

use crate::error::GcsResult;
use crate::scope::{ResolutionScope, next_day};

/// Split `window` into the maximal runs of days not in `cancelled`.
///
/// Cancellations outside the window are ignored. Repeated and adjacent
/// cancellations merge into one gap, so a fully cancelled window yields
/// no segments.
pub fn kept_segments(window: ResolutionScope, cancelled: &[NaiveDate]) -> GcsResult<Vec<ResolutionScope>> {
    let mut gaps: Vec<NaiveDate> = cancelled.iter().copied().filter(|d| window.contains(*d)).collect();
    gaps.sort();
    gaps.dedup();

    let mut segments = Vec::new();
    let mut cursor = window.start();
    for gap in gaps {
        if gap > cursor {
            segments.push(ResolutionScope::new(cursor, gap)?);
        }
        cursor = next_day(gap)?;
    }
    if cursor < window.end() {
        segments.push(ResolutionScope::new(cursor, window.end())?);
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    fn window() -> ResolutionScope {
        ResolutionScope::new(d(1), d(11)).unwrap()
    }

    fn spans(segments: &[ResolutionScope]) -> Vec<(u32, u32)> {
        use chrono::Datelike;
        segments.iter().map(|s| (s.start().day(), s.last_day().day())).collect()
    }

    #[test]
    fn no_cancellations_is_whole_window() {
        assert_eq!(kept_segments(window(), &[]).unwrap(), vec![window()]);
    }

    #[test]
    fn clustered_cancellations_make_two_segments() {
        let segments = kept_segments(window(), &[d(5), d(4), d(6)]).unwrap();
        assert_eq!(spans(&segments), vec![(1, 3), (7, 10)]);
    }

    #[test]
    fn scattered_cancellations() {
        let segments = kept_segments(window(), &[d(2), d(9), d(5), d(5)]).unwrap();
        assert_eq!(spans(&segments), vec![(1, 1), (3, 4), (6, 8), (10, 10)]);
    }

    #[test]
    fn edges_and_out_of_window() {
        let segments = kept_segments(window(), &[d(1), d(10), d(20)]).unwrap();
        assert_eq!(spans(&segments), vec![(2, 9)]);
    }

    #[test]
    fn fully_cancelled_window_is_empty() {
        let all: Vec<_> = window().iter_days().collect();
        assert!(kept_segments(window(), &all).unwrap().is_empty());
    }
}
