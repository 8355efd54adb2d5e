//! Override collapsing.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{OVERRIDE_PRIORITY, OverrideIntent, ResolvedSubEvent, SubEventRole};
use crate::error::GcsResult;
use crate::scope::ResolutionScope;

/// A run of consecutive days sharing one override signature.
struct Run<'a> {
    first: NaiveDate,
    last: NaiveDate,
    source: &'a OverrideIntent,
}

/// Time of day, enabled flag, stop type and payload. Repeat mode is not
/// part of the signature; a merged run keeps its first day's.
fn same_signature(a: &OverrideIntent, b: &OverrideIntent) -> bool {
    a.timing == b.timing
        && a.behavior.enabled == b.behavior.enabled
        && a.behavior.stop_type == b.behavior.stop_type
        && a.payload == b.payload
}

/// Collapse the overrides anchored in one segment into the fewest sub-events.
///
/// Output is most specific first: shortest span, then earliest start.
pub(super) fn collapse(overrides: &[&OverrideIntent]) -> GcsResult<Vec<ResolvedSubEvent>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&OverrideIntent>> = BTreeMap::new();
    for ov in overrides.iter().copied() {
        by_day.entry(ov.date).or_default().push(ov);
    }

    let mut runs: Vec<Run<'_>> = Vec::new();
    for (day, on_day) in by_day {
        for ov in on_day {
            let open = runs
                .iter_mut()
                .find(|run| run.last.succ_opt() == Some(day) && same_signature(run.source, ov));
            match open {
                Some(run) => run.last = day,
                None => runs.push(Run {
                    first: day,
                    last: day,
                    source: ov,
                }),
            }
        }
    }

    let mut subevents = runs
        .into_iter()
        .map(|run| {
            Ok(ResolvedSubEvent {
                role: SubEventRole::Override,
                priority: OVERRIDE_PRIORITY,
                scope: ResolutionScope::inclusive(run.first, run.last)?,
                timing: run.source.timing.clone(),
                behavior: run.source.behavior.clone(),
                payload: run.source.payload.clone(),
            })
        })
        .collect::<GcsResult<Vec<_>>>()?;
    subevents.sort_by_key(|s| (s.scope.days(), s.scope.start()));
    Ok(subevents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{DayMask, IdentityTiming};
    use crate::manifest::{Behavior, StopType};
    use crate::test_support::{date, time};

    fn ov(day: u32, hour: u32) -> OverrideIntent {
        OverrideIntent {
            date: date(day),
            timing: IdentityTiming {
                days: DayMask::EVERY_DAY,
                start_time: time(hour),
                end_time: time(23),
            },
            behavior: Behavior::default(),
            payload: None,
        }
    }

    fn spans(subs: &[ResolvedSubEvent]) -> Vec<(NaiveDate, i64)> {
        subs.iter().map(|s| (s.scope.start(), s.scope.days())).collect()
    }

    #[test]
    fn identical_consecutive_days_merge() {
        let (a, b, c) = (ov(3, 18), ov(4, 18), ov(5, 19));
        let subs = collapse(&[&c, &a, &b]).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(spans(&subs), vec![(date(5), 1), (date(3), 2)]);
        assert!(subs.iter().all(|s| s.role == SubEventRole::Override));
    }

    #[test]
    fn gap_breaks_run() {
        let (a, b) = (ov(3, 18), ov(5, 18));
        assert_eq!(collapse(&[&a, &b]).unwrap().len(), 2);
    }

    #[test]
    fn stop_type_breaks_run_but_repeat_does_not() {
        let a = ov(3, 18);
        let mut b = ov(4, 18);
        b.behavior.stop_type = StopType::Hard;
        assert_eq!(collapse(&[&a, &b]).unwrap().len(), 2);

        let mut c = ov(4, 18);
        c.behavior.repeat = crate::manifest::Repeat::Every(5);
        assert_eq!(collapse(&[&a, &c]).unwrap().len(), 1);
    }

    #[test]
    fn same_day_overrides_are_all_kept() {
        let (a, b, c) = (ov(3, 18), ov(3, 20), ov(4, 20));
        let subs = collapse(&[&a, &b, &c]).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(spans(&subs), vec![(date(3), 1), (date(3), 2)]);
    }
}
