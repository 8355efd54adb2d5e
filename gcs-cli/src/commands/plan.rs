use std::path::Path;

use anyhow::Result;
use gcs_core::diff::{ResolverPolicy, resolve};
use gcs_core::gcs_config::GcsConfig;
use owo_colors::OwoColorize;

use super::load_events;
use crate::render::render_plan;

pub fn run(
    config: &GcsConfig,
    source: Option<&Path>,
    existing: &Path,
    policy: &ResolverPolicy,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let source = load_events(config, source)?;
    let existing = load_events(config, Some(existing))?;
    let plan = resolve(&source, &existing, policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{}", render_plan(&plan, verbose));

    let counts = plan.counts();
    if counts.conflict + counts.review > 0 {
        println!(
            "\n{}",
            format!(
                "{} conflicting, {} to review: nothing is applied for these",
                counts.conflict, counts.review
            )
            .yellow()
        );
    }
    Ok(())
}
