use std::path::Path;

use anyhow::{Result, bail};
use gcs_core::apply::apply;
use gcs_core::diff::{ResolverPolicy, resolve};
use gcs_core::fpp::ScheduleEntry;
use gcs_core::gcs_config::GcsConfig;

use super::{host_manifest, host_view, load_events, normalize_context, read_entries, write_output};
use crate::render::{render_outcome, render_plan};

pub struct ApplyPaths<'a> {
    pub source: Option<&'a Path>,
    pub existing: Option<&'a Path>,
    pub entries: &'a Path,
    pub out: Option<&'a Path>,
}

pub fn run(
    config: &GcsConfig,
    paths: ApplyPaths<'_>,
    policy: &ResolverPolicy,
    legacy_markers: bool,
    verbose: bool,
) -> Result<()> {
    if policy.dry_run {
        bail!("Refusing to apply a dry-run plan. Use `gcs plan --dry-run` to preview changes.");
    }

    let entries = read_entries(paths.entries)?;
    let source = load_events(config, paths.source)?;
    let (source, existing) = match paths.existing {
        Some(path) => (source, load_events(config, Some(path))?),
        None => {
            let ctx = normalize_context(config)?;
            (host_view(&source, &ctx)?, host_manifest(&entries, &ctx)?.by_hash()?)
        }
    };

    let plan = resolve(&source, &existing, policy)?;
    eprintln!("{}", render_plan(&plan, verbose));

    let diff = plan.to_apply_diff()?;
    let outcome = apply(&diff, &entries)?;

    let written: Vec<ScheduleEntry> = if legacy_markers {
        outcome.entries.iter().map(ScheduleEntry::with_legacy_marker).collect()
    } else {
        outcome.entries.clone()
    };
    write_output(paths.out, &serde_json::to_string_pretty(&written)?)?;

    eprintln!("{}", render_outcome(&outcome));
    Ok(())
}
