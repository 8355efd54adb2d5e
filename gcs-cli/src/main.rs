mod commands;
mod render;

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gcs_core::diff::ResolverPolicy;
use gcs_core::gcs_config::GcsConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "gcs")]
#[command(about = "Reconcile calendar events with the show scheduler's entry list")]
struct Cli {
    /// Use this config file instead of ~/.config/gcs/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show every operation instead of per-status counts
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PolicyArgs {
    /// Compute the plan but refuse to act on it
    #[arg(long)]
    dry_run: bool,

    /// Delete identities missing from the source (overrides config)
    #[arg(long)]
    delete_orphans: Option<bool>,

    /// Allow updates and deletes of entries this tool does not own
    #[arg(long)]
    allow_unmanaged: bool,
}

impl PolicyArgs {
    /// Command-line switches layered over the configured policy.
    fn apply_to(&self, mut policy: ResolverPolicy) -> ResolverPolicy {
        policy.dry_run |= self.dry_run;
        policy.allow_mutate_unmanaged |= self.allow_unmanaged;
        if let Some(delete_orphans) = self.delete_orphans {
            policy.delete_orphans = delete_orphans;
        }
        policy
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the identity hash of an identity document
    Hash {
        identity: PathBuf,

        /// Also print the canonical form
        #[arg(long)]
        canonical: bool,
    },
    /// Load the manifest with full validation
    Validate {
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Normalize calendar events (and host entries) into the manifest
    Ingest {
        /// JSON array of calendar events
        #[arg(long)]
        calendar: PathBuf,

        /// Host schedule; its managed entries are ingested too
        #[arg(long)]
        entries: Option<PathBuf>,

        #[arg(long)]
        manifest: Option<PathBuf>,

        /// First day to expand recurrences from (YYYY-MM-DD, default today)
        #[arg(long)]
        from: Option<String>,

        /// Last day to expand recurrences to (YYYY-MM-DD, default today + horizon_days)
        #[arg(long)]
        to: Option<String>,
    },
    /// Cut recurring events into bundles and print them as JSON
    Resolve {
        snapshot: PathBuf,

        /// Print the bundles folded into manifest events
        #[arg(long)]
        as_events: bool,
    },
    /// Compare a source manifest against an existing one
    Plan {
        /// Defaults to the configured manifest
        #[arg(long)]
        source: Option<PathBuf>,

        #[arg(long)]
        existing: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plan, then fold the result into the host schedule
    Apply {
        /// Defaults to the configured manifest
        #[arg(long)]
        source: Option<PathBuf>,

        /// Defaults to the managed entries of --entries
        #[arg(long)]
        existing: Option<PathBuf>,

        #[arg(long)]
        entries: PathBuf,

        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Encode ownership as an args marker for hosts that drop unknown fields
        #[arg(long)]
        legacy_markers: bool,

        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Build the manifest from the managed entries already on the host
    Adopt {
        #[arg(long)]
        entries: PathBuf,

        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Show configuration paths and effective settings
    Config,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GCS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "gcs=debug,gcs_core=debug,info"
        } else {
            "gcs=info,gcs_core=info,warn"
        })
    });

    let format = env::var("GCS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GcsConfig> {
    let config = match path {
        Some(path) => GcsConfig::load_from(path)?,
        None => GcsConfig::load()?,
    };
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Hash {
            identity,
            canonical,
        } => commands::hash::run(&identity, canonical),
        Commands::Validate { manifest } => {
            let config = load_config(cli.config.as_ref())?;
            commands::validate::run(&config, manifest.as_deref(), cli.verbose)
        }
        Commands::Ingest {
            calendar,
            entries,
            manifest,
            from,
            to,
        } => {
            let config = load_config(cli.config.as_ref())?;
            commands::ingest::run(
                &config,
                commands::ingest::IngestPaths {
                    calendar: &calendar,
                    entries: entries.as_deref(),
                    manifest: manifest.as_deref(),
                },
                from.as_deref(),
                to.as_deref(),
            )
        }
        Commands::Resolve {
            snapshot,
            as_events,
        } => {
            let config = load_config(cli.config.as_ref())?;
            commands::resolve::run(&config, &snapshot, as_events)
        }
        Commands::Plan {
            source,
            existing,
            policy,
            json,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let policy = policy.apply_to(config.policy);
            commands::plan::run(&config, source.as_deref(), &existing, &policy, json, cli.verbose)
        }
        Commands::Apply {
            source,
            existing,
            entries,
            out,
            legacy_markers,
            policy,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let policy = policy.apply_to(config.policy);
            commands::apply::run(
                &config,
                commands::apply::ApplyPaths {
                    source: source.as_deref(),
                    existing: existing.as_deref(),
                    entries: &entries,
                    out: out.as_deref(),
                },
                &policy,
                legacy_markers,
                cli.verbose,
            )
        }
        Commands::Adopt { entries, manifest } => {
            let config = load_config(cli.config.as_ref())?;
            commands::adopt::run(&config, &entries, manifest.as_deref())
        }
        Commands::Config => commands::config::run(cli.config.as_deref()),
    }
}
