use std::path::Path;

use anyhow::Result;
use gcs_core::GcsError;
use gcs_core::gcs_config::GcsConfig;
use gcs_core::intent::{RawCalendarEvent, from_calendar};
use owo_colors::OwoColorize;
use tracing::warn;

use super::{host_intents, manifest_store, normalize_context, read_entries, read_json, with_horizon};

pub struct IngestPaths<'a> {
    pub calendar: &'a Path,
    pub entries: Option<&'a Path>,
    pub manifest: Option<&'a Path>,
}

pub fn run(
    config: &GcsConfig,
    paths: IngestPaths<'_>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let ctx = with_horizon(normalize_context(config)?, config, from, to)?;
    let events: Vec<RawCalendarEvent> = read_json(paths.calendar)?;

    let mut intents = Vec::with_capacity(events.len());
    let mut skipped = 0;
    for event in &events {
        match from_calendar(event, &ctx) {
            Ok(intent) => intents.push(intent),
            Err(e @ GcsError::UnsupportedRecurrence { .. }) => {
                warn!(summary = %event.summary, error = %e, "skipping event");
                println!("   {} {}", "?".cyan(), e.to_string().cyan());
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = paths.entries {
        intents.extend(host_intents(&read_entries(path)?, &ctx)?);
    }

    let store = manifest_store(config, paths.manifest);
    let mut manifest = store.load()?;
    let summary = manifest.replace_with(intents)?;
    store.save(&manifest)?;

    println!(
        "Ingested {} added, {} kept, {} removed{}",
        summary.added.green(),
        summary.kept,
        summary.removed.red(),
        if skipped > 0 {
            format!(" ({skipped} skipped)")
        } else {
            String::new()
        }
    );
    Ok(())
}
