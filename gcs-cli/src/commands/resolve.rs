use std::path::Path;

use anyhow::Result;
use gcs_core::gcs_config::GcsConfig;
use gcs_core::resolution::{SnapshotEvent, resolve};

use super::{read_json, write_output};

pub fn run(config: &GcsConfig, snapshot: &Path, as_events: bool) -> Result<()> {
    let events: Vec<SnapshotEvent> = read_json(snapshot)?;
    let schedule = resolve(&events)?;

    let content = if as_events {
        serde_json::to_string_pretty(&schedule.to_manifest_events(&config.controller)?)?
    } else {
        serde_json::to_string_pretty(&schedule)?
    };
    write_output(None, &content)
}
