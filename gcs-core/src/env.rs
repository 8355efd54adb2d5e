//! The host's runtime environment export (`fpp-env.json`).
//!
//! Written by the host-side export tool, read here. Supplies the timezone
//! and tells whether the host has a location configured for solar times.

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GcsError, GcsResult};

pub const ENV_SCHEMA_VERSION: u32 = 1;
pub const ENV_SOURCE: &str = "gcs-export";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FppEnv {
    pub schema_version: u32,
    pub source: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub raw_locale: Option<Value>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FppEnv {
    /// Read the export. A missing file is `None`.
    pub fn load(path: &Path) -> GcsResult<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "no environment export");
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let env: FppEnv = serde_json::from_str(&content)
            .map_err(|e| GcsError::Config(format!("{} is not a valid environment export: {e}", path.display())))?;

        if env.schema_version != ENV_SCHEMA_VERSION {
            return Err(GcsError::Config(format!(
                "unsupported environment schemaVersion {} (expected {ENV_SCHEMA_VERSION})",
                env.schema_version
            )));
        }
        if env.source != ENV_SOURCE {
            warn!(source = %env.source, "environment export from unexpected source");
        }
        if !env.ok {
            warn!(error = env.error.as_deref().unwrap_or("unknown"), "environment export reports a problem");
        }
        Ok(Some(env))
    }

    /// The exported timezone, if one was set.
    pub fn timezone(&self) -> GcsResult<Option<Tz>> {
        match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => parse_timezone(name).map(Some),
        }
    }

    /// Latitude and longitude are present and non-zero, so the host can
    /// resolve symbolic solar times.
    pub fn has_location(&self) -> bool {
        matches!(
            (self.latitude, self.longitude),
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0
        )
    }
}

pub(crate) fn parse_timezone(name: &str) -> GcsResult<Tz> {
    name.parse::<Tz>()
        .map_err(|e| GcsError::Config(format!("unknown timezone '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn write(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("fpp-env.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FppEnv::load(&dir.path().join("fpp-env.json")).unwrap().is_none());
    }

    #[test]
    fn reads_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{
                "schemaVersion": 1,
                "source": "gcs-export",
                "timezone": "America/Chicago",
                "latitude": 41.88,
                "longitude": -87.63,
                "rawLocale": {"Name": "USA"},
                "ok": true
            }"#,
        );
        let env = FppEnv::load(&path).unwrap().unwrap();
        assert_eq!(env.timezone().unwrap(), Some(chrono_tz::America::Chicago));
        assert!(env.has_location());
    }

    #[test]
    fn zero_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"schemaVersion": 1, "source": "gcs-export", "timezone": "",
                "latitude": 0.0, "longitude": 0.0, "ok": false,
                "error": "Latitude/Longitude not present (or zero) in FPP locale."}"#,
        );
        let env = FppEnv::load(&path).unwrap().unwrap();
        assert!(!env.has_location());
        assert_eq!(env.timezone().unwrap(), None);
    }

    #[test]
    fn rejects_bad_exports() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"schemaVersion": 2, "source": "gcs-export", "ok": true}"#);
        assert_eq!(FppEnv::load(&path).unwrap_err().code(), ErrorCode::Config);

        let path = write(
            dir.path(),
            r#"{"schemaVersion": 1, "source": "gcs-export", "timezone": "Mars/Olympus", "ok": true}"#,
        );
        let env = FppEnv::load(&path).unwrap().unwrap();
        assert_eq!(env.timezone().unwrap_err().code(), ErrorCode::Config);
    }
}
