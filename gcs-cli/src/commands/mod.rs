pub mod adopt;
pub mod apply;
pub mod config;
pub mod hash;
pub mod ingest;
pub mod plan;
pub mod resolve;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use gcs_core::diff::EventsByHash;
use gcs_core::env::FppEnv;
use gcs_core::fpp::{ScheduleEntry, host_round_trip};
use gcs_core::gcs_config::GcsConfig;
use gcs_core::intent::{Intent, NormalizeContext, from_fpp, merge_intents};
use gcs_core::{Manifest, ManifestStore, ResolutionScope};
use serde::de::DeserializeOwned;
use tracing::debug;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Could not parse {}", path.display()))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Normalization settings from the config and the host's environment export.
pub fn normalize_context(config: &GcsConfig) -> Result<NormalizeContext> {
    let env = FppEnv::load(&config.env_path())?;
    let ctx = config.normalize_context(env.as_ref(), today())?;
    debug!(timezone = %ctx.timezone, horizon = %ctx.horizon, "normalize context");
    Ok(ctx)
}

/// Replace the horizon with an explicit `--from`/`--to` range.
pub fn with_horizon(
    mut ctx: NormalizeContext,
    config: &GcsConfig,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<NormalizeContext> {
    if from.is_none() && to.is_none() {
        return Ok(ctx);
    }
    let days = u64::from(config.horizon_days.max(1));
    ctx.horizon = ResolutionScope::from_args(from, to, today(), days)?;
    debug!(horizon = %ctx.horizon, "horizon from arguments");
    Ok(ctx)
}

/// The configured store, or one at `path` with the configured encoding.
pub fn manifest_store(config: &GcsConfig, path: Option<&Path>) -> ManifestStore {
    match path {
        Some(path) => ManifestStore::new(path, config.pretty_manifest),
        None => config.manifest_store(),
    }
}

pub fn load_events(config: &GcsConfig, path: Option<&Path>) -> Result<EventsByHash> {
    let store = manifest_store(config, path);
    let manifest = store
        .load()
        .with_context(|| format!("Could not load manifest {}", store.path().display()))?;
    Ok(manifest.by_hash()?)
}

/// Host entries with legacy ownership markers lifted into typed fields.
pub fn read_entries(path: &Path) -> Result<Vec<ScheduleEntry>> {
    let mut entries: Vec<ScheduleEntry> = read_json(path)?;
    let lifted = entries
        .iter_mut()
        .map(ScheduleEntry::lift_legacy_marker)
        .filter(|lifted| *lifted)
        .count();
    if lifted > 0 {
        debug!(lifted, "lifted legacy ownership markers");
    }
    Ok(entries)
}

/// Intents for the managed host entries. Unmanaged entries are not ours to ingest.
pub fn host_intents(entries: &[ScheduleEntry], ctx: &NormalizeContext) -> Result<Vec<Intent>> {
    let intents = entries
        .iter()
        .filter(|e| e.is_managed())
        .map(|e| from_fpp(&e.to_raw(), ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(intents)
}

/// The managed host entries as a manifest.
pub fn host_manifest(entries: &[ScheduleEntry], ctx: &NormalizeContext) -> Result<Manifest> {
    let mut manifest = Manifest::default();
    for intent in merge_intents(host_intents(entries, ctx)?) {
        manifest.upsert_event(intent.into_event())?;
    }
    Ok(manifest)
}

/// Source events in the shape they would have once read back from the host.
pub fn host_view(source: &EventsByHash, ctx: &NormalizeContext) -> Result<EventsByHash> {
    source
        .values()
        .map(|event| {
            let seen = host_round_trip(event, ctx)?;
            Ok((seen.identity.hash()?, seen))
        })
        .collect()
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Could not write {}", path.display())),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcs_core::fpp::legacy::encode_marker;
    use gcs_core::identity::{DayMask, Identity, IdentityTiming, TargetKind, TimeSpec};
    use serde_json::json;

    fn ctx() -> NormalizeContext {
        let day = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        NormalizeContext::new(chrono_tz::UTC, ResolutionScope::single_day(day).unwrap())
    }

    fn xmas_hash() -> gcs_core::IdentityHash {
        let hm = |h| TimeSpec::hard(chrono::NaiveTime::from_hms_opt(h, 0, 0).unwrap());
        Identity::new(
            TargetKind::Playlist,
            "Xmas",
            IdentityTiming {
                days: DayMask::EVERY_DAY,
                start_time: hm(17),
                end_time: hm(22),
            },
        )
        .hash()
        .unwrap()
    }

    fn entry(args: serde_json::Value) -> serde_json::Value {
        json!({
            "enabled": 1,
            "sequence": 0,
            "playlist": "Xmas",
            "day": 7,
            "startTime": "17:00:00",
            "endTime": "22:00:00",
            "startDate": "2025-12-01",
            "endDate": "2025-12-24",
            "repeat": 1,
            "stopType": 0,
            "args": args
        })
    }

    #[test]
    fn read_entries_lifts_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let marked = entry(json!([encode_marker(&xmas_hash())]));
        let plain = entry(json!([]));
        std::fs::write(&path, serde_json::to_string(&json!([marked, plain])).unwrap()).unwrap();

        let entries = read_entries(&path).unwrap();
        assert!(entries[0].is_managed());
        assert_eq!(entries[0].identity_hash.as_ref(), Some(&xmas_hash()));
        assert_eq!(entries[0].fields["args"], json!([]));
        assert!(!entries[1].is_managed());
    }

    #[test]
    fn host_manifest_only_takes_managed_entries() {
        let mut managed: ScheduleEntry = serde_json::from_value(entry(json!([]))).unwrap();
        managed.managed = Some(true);
        managed.identity_hash = Some(xmas_hash());
        let mut other = entry(json!([]));
        other["playlist"] = json!("Halloween");
        let unmanaged: ScheduleEntry = serde_json::from_value(other).unwrap();

        let manifest = host_manifest(&[managed, unmanaged], &ctx()).unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.get(xmas_hash().as_str()).is_some());
    }

    #[test]
    fn read_json_reports_path() {
        let err = read_json::<serde_json::Value>(Path::new("/nonexistent/gcs.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/gcs.json"));
    }

    #[test]
    fn host_view_matches_written_entries() {
        use gcs_core::apply::apply;
        use gcs_core::diff::{ResolutionStatus, ResolverPolicy, resolve};
        use gcs_core::intent::{RawCalendarEvent, from_calendar};

        let december = ResolutionScope::new(
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
        .unwrap();
        let ctx = || NormalizeContext::new(chrono_tz::America::Chicago, december);
        let raw: RawCalendarEvent = serde_json::from_value(json!({
            "summary": "Xmas",
            "dtstart": "2025-12-01T17:00:00",
            "dtend": "2025-12-01T22:00:00",
            "rrule": {"FREQ": "DAILY", "UNTIL": "20251224T235959Z"}
        }))
        .unwrap();
        let mut manifest = Manifest::default();
        manifest.replace_with(vec![from_calendar(&raw, &ctx()).unwrap()]).unwrap();
        let source = manifest.by_hash().unwrap();
        assert_eq!(source.values().next().unwrap().sub_events.len(), 24);

        let first = resolve(&source, &EventsByHash::new(), &ResolverPolicy::default()).unwrap();
        let written = apply(&first.to_apply_diff().unwrap(), &[]).unwrap().entries;

        let existing = host_manifest(&written, &ctx()).unwrap().by_hash().unwrap();
        let second = resolve(&host_view(&source, &ctx()).unwrap(), &existing, &ResolverPolicy::default()).unwrap();
        let statuses: Vec<_> = second.operations.iter().map(|op| op.status).collect();
        assert_eq!(statuses, vec![ResolutionStatus::Noop]);
        assert!(second.to_apply_diff().unwrap().is_empty());
    }

    #[test]
    fn explicit_range_replaces_horizon() {
        let config = GcsConfig::default();
        let ctx = with_horizon(ctx(), &config, Some("2025-12-05"), Some("2025-12-20")).unwrap();
        assert_eq!(ctx.horizon.start(), NaiveDate::from_ymd_opt(2025, 12, 5).unwrap());
        assert_eq!(ctx.horizon.last_day(), NaiveDate::from_ymd_opt(2025, 12, 20).unwrap());

        let unchanged = with_horizon(ctx.clone(), &config, None, None).unwrap();
        assert_eq!(unchanged.horizon, ctx.horizon);

        assert!(with_horizon(ctx, &config, Some("2025-12-20"), Some("2025-12-05")).is_err());
    }
}
