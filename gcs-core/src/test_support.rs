//! Builders shared by unit tests.

use chrono::{NaiveDate, NaiveTime};

use crate::identity::{DayMask, Identity, IdentityTiming, TargetKind, TimeSpec};
use crate::manifest::{
    Behavior, Correlation, DateSpec, Manifest, ManifestEvent, Ownership, SubEvent, SubEventTiming,
};

pub(crate) fn time(hour: u32) -> TimeSpec {
    TimeSpec::hard(NaiveTime::from_hms_opt(hour, 0, 0).unwrap())
}

pub(crate) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
}

pub(crate) fn identity(target: &str, start_hour: u32) -> Identity {
    Identity::new(
        TargetKind::Playlist,
        target,
        IdentityTiming {
            days: DayMask::EVERY_DAY,
            start_time: time(start_hour),
            end_time: time(23),
        },
    )
}

/// A managed playlist event running daily from `start_hour` to 23:00 on 2025-12-01.
pub(crate) fn event(target: &str, start_hour: u32) -> ManifestEvent {
    let identity = identity(target, start_hour);
    let id = identity.hash().unwrap().to_string();
    let sub = SubEvent::new(
        SubEventTiming {
            start_date: DateSpec::hard(date(1)),
            end_date: DateSpec::hard(date(1)),
            start_time: identity.timing.start_time.clone(),
            end_time: identity.timing.end_time.clone(),
            days: identity.timing.days,
        },
        Behavior::default(),
        None,
    );
    ManifestEvent {
        id,
        identity,
        identity_hash: None,
        ownership: Ownership::managed_by("gcs"),
        correlation: Correlation::default(),
        sub_events: vec![sub],
    }
}

pub(crate) fn stamped_manifest(events: &[(&str, u32)]) -> Manifest {
    let mut manifest = Manifest::default();
    for (target, hour) in events {
        manifest.upsert_event(event(target, *hour)).unwrap();
    }
    manifest
}
