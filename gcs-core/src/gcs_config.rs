//! Global gcs configuration.

use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::ResolverPolicy;
use crate::env::{FppEnv, parse_timezone};
use crate::error::{GcsError, GcsResult};
use crate::intent::{DEFAULT_CONTROLLER, NormalizeContext};
use crate::manifest::ManifestStore;
use crate::scope::ResolutionScope;

static DEFAULT_MANIFEST_PATH: &str = "~/.local/share/gcs/manifest.json";
static DEFAULT_ENV_PATH: &str = "/home/fpp/media/plugins/GoogleCalendarScheduler/runtime/fpp-env.json";
const DEFAULT_HORIZON_DAYS: u32 = 365;

fn default_manifest_path() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_PATH)
}

fn default_env_path() -> PathBuf {
    PathBuf::from(DEFAULT_ENV_PATH)
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

fn default_true() -> bool {
    true
}

fn default_controller() -> String {
    DEFAULT_CONTROLLER.to_string()
}

/// Global configuration at ~/.config/gcs/config.toml
///
/// Every field may be overridden from the environment with a `GCS_` prefix;
/// policy fields use a double underscore (`GCS_POLICY__DRY_RUN=true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcsConfig {
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    #[serde(default = "default_env_path")]
    pub env_path: PathBuf,

    /// IANA name. Takes precedence over the environment export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// How far ahead unbounded daily recurrences are expanded.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    #[serde(default = "default_true")]
    pub pretty_manifest: bool,

    #[serde(default = "default_controller")]
    pub controller: String,

    #[serde(default)]
    pub policy: ResolverPolicy,
}

impl Default for GcsConfig {
    fn default() -> Self {
        GcsConfig {
            manifest_path: default_manifest_path(),
            env_path: default_env_path(),
            timezone: None,
            horizon_days: DEFAULT_HORIZON_DAYS,
            pretty_manifest: true,
            controller: default_controller(),
            policy: ResolverPolicy::default(),
        }
    }
}

impl GcsConfig {
    pub fn config_path() -> GcsResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| GcsError::Config("Could not determine config directory".into()))?
            .join("gcs");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, writing a commented template first
    /// if none exists.
    pub fn load() -> GcsResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from `path` (optional) layered under `GCS_*` environment variables.
    pub fn load_from(path: &Path) -> GcsResult<Self> {
        let config: GcsConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("GCS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| GcsError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| GcsError::Config(e.to_string()))?;

        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn to_toml(&self) -> GcsResult<String> {
        toml::to_string_pretty(self).map_err(|e| GcsError::Config(e.to_string()))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> GcsResult<()> {
        let contents = format!(
            "\
# gcs configuration

# Where the manifest is stored:
# manifest_path = \"{DEFAULT_MANIFEST_PATH}\"

# Runtime environment exported by the host:
# env_path = \"{DEFAULT_ENV_PATH}\"

# Timezone for calendar times (defaults to the host's, then UTC):
# timezone = \"America/Chicago\"

# Days ahead to expand open-ended daily recurrences:
# horizon_days = {DEFAULT_HORIZON_DAYS}

# Pretty-print the manifest:
# pretty_manifest = true

# [policy]
# allow_mutate_unmanaged = false
# delete_orphans = true
# dry_run = false
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GcsError::Config(format!("Could not create config directory: {e}")))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| GcsError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        expand(&self.manifest_path)
    }

    pub fn env_path(&self) -> PathBuf {
        expand(&self.env_path)
    }

    pub fn manifest_store(&self) -> ManifestStore {
        ManifestStore::new(self.manifest_path(), self.pretty_manifest)
    }

    /// Configured timezone, else the environment export's, else UTC.
    pub fn resolve_timezone(&self, env: Option<&FppEnv>) -> GcsResult<Tz> {
        if let Some(name) = self.timezone.as_deref() {
            return parse_timezone(name);
        }
        if let Some(tz) = env.map(FppEnv::timezone).transpose()?.flatten() {
            return Ok(tz);
        }
        Ok(chrono_tz::UTC)
    }

    /// Normalization settings for a run starting on `today`.
    pub fn normalize_context(&self, env: Option<&FppEnv>, today: NaiveDate) -> GcsResult<NormalizeContext> {
        let end = today
            .checked_add_days(Days::new(u64::from(self.horizon_days.max(1))))
            .ok_or_else(|| GcsError::Config(format!("horizon of {} days is out of range", self.horizon_days)))?;
        let horizon = ResolutionScope::new(today, end)?;
        Ok(NormalizeContext::new(self.resolve_timezone(env)?, horizon).with_controller(&self.controller))
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GcsConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.horizon_days, DEFAULT_HORIZON_DAYS);
        assert!(config.policy.delete_orphans);
        assert!(!config.policy.dry_run);
        assert_eq!(config.controller, "gcs");
    }

    #[test]
    fn template_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gcs/config.toml");
        GcsConfig::create_default_config(&path).unwrap();
        let config = GcsConfig::load_from(&path).unwrap();
        assert_eq!(config.manifest_path, default_manifest_path());
        assert!(config.pretty_manifest);
    }

    #[test]
    fn reads_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "timezone = \"Europe/Amsterdam\"\nhorizon_days = 30\n\n[policy]\ndelete_orphans = false\n",
        )
        .unwrap();
        let config = GcsConfig::load_from(&path).unwrap();
        assert_eq!(config.horizon_days, 30);
        assert!(!config.policy.delete_orphans);
        assert_eq!(config.resolve_timezone(None).unwrap(), chrono_tz::Europe::Amsterdam);

        let today = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let ctx = config.normalize_context(None, today).unwrap();
        assert_eq!(ctx.horizon.days(), 30);
    }

    #[test]
    fn timezone_precedence() {
        let env = FppEnv {
            schema_version: 1,
            source: "gcs-export".into(),
            timezone: Some("America/Denver".into()),
            latitude: None,
            longitude: None,
            raw_locale: None,
            ok: false,
            error: None,
        };
        let config = GcsConfig::default();
        assert_eq!(config.resolve_timezone(Some(&env)).unwrap(), chrono_tz::America::Denver);
        assert_eq!(config.resolve_timezone(None).unwrap(), chrono_tz::UTC);

        let bad = GcsConfig {
            timezone: Some("Nowhere/Special".into()),
            ..GcsConfig::default()
        };
        assert_eq!(bad.resolve_timezone(Some(&env)).unwrap_err().code(), ErrorCode::Config);
    }

    #[test]
    fn toml_round_trip() {
        let config = GcsConfig::default();
        let text = config.to_toml().unwrap();
        let back: GcsConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
