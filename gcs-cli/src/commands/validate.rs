use std::path::Path;

use anyhow::Result;
use gcs_core::gcs_config::GcsConfig;
use owo_colors::OwoColorize;

use super::manifest_store;
use crate::render::{Render, pluralize};

pub fn run(config: &GcsConfig, path: Option<&Path>, verbose: bool) -> Result<()> {
    let store = manifest_store(config, path);
    let manifest = store.load()?;

    println!("{}", store.path().display().bold());
    for event in manifest.events.values() {
        if verbose || !event.ownership.managed || event.ownership.locked {
            println!("   {}", event.render());
        }
    }

    let managed = manifest.events.values().filter(|e| e.ownership.managed).count();
    let locked = manifest.events.values().filter(|e| e.ownership.locked).count();
    println!(
        "{} {} {} ({managed} managed, {locked} locked)",
        "✓".green(),
        manifest.len(),
        pluralize("event", manifest.len())
    );
    Ok(())
}
