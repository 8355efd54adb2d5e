use std::path::Path;

use anyhow::{Result, bail};
use gcs_core::Manifest;
use gcs_core::gcs_config::GcsConfig;
use gcs_core::intent::merge_intents;
use gcs_core::manifest::DraftManifest;
use owo_colors::OwoColorize;
use tracing::info;

use super::{host_intents, manifest_store, normalize_context, read_entries};
use crate::render::pluralize;

/// Bootstrap the manifest from a host that already runs managed entries.
pub fn run(config: &GcsConfig, entries: &Path, manifest_path: Option<&Path>) -> Result<()> {
    let store = manifest_store(config, manifest_path);
    if !store.load()?.is_empty() {
        bail!(
            "Manifest {} already has events. Adopt only bootstraps an empty manifest.",
            store.path().display()
        );
    }

    let ctx = normalize_context(config)?;
    let intents = merge_intents(host_intents(&read_entries(entries)?, &ctx)?);

    let mut draft = DraftManifest::default();
    for (index, intent) in intents.into_iter().enumerate() {
        let mut raw = serde_json::to_value(intent.into_event())?;
        raw["id"] = serde_json::Value::String(format!("draft-{index}"));
        draft.events.insert(format!("draft-{index}"), raw);
    }
    store.save_draft(&draft)?;
    info!(events = draft.events.len(), "saved adoption draft");

    let manifest = Manifest::promote_draft(store.load_draft()?)?;
    store.save(&manifest)?;

    println!(
        "{} Adopted {} {} into {}",
        "✓".green(),
        manifest.len(),
        pluralize("event", manifest.len()),
        store.path().display()
    );
    Ok(())
}
