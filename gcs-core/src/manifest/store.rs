//! Manifest persistence.
//!
//! The store is the only place the manifest touches disk. Normal loads and
//! saves run full validation in both directions; the draft variants only
//! check the document's shape and exist for bootstrap, before identities
//! have been assigned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{Manifest, validate_manifest_value};
use crate::error::{GcsError, GcsResult};

/// Manifest document before identity assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftManifest {
    #[serde(default)]
    pub events: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    pretty: bool,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>, pretty: bool) -> Self {
        ManifestStore {
            path: path.into(),
            pretty,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and fully validate the manifest. A missing file is an empty manifest.
    pub fn load(&self) -> GcsResult<Manifest> {
        let Some(root) = self.read_document()? else {
            debug!(path = %self.path.display(), "no manifest on disk, starting empty");
            return Ok(Manifest::default());
        };
        let manifest = validate_manifest_value(&root)?;
        debug!(path = %self.path.display(), events = manifest.len(), "loaded manifest");
        Ok(manifest)
    }

    /// Validate, then write the manifest atomically.
    pub fn save(&self, manifest: &Manifest) -> GcsResult<()> {
        let root = serde_json::to_value(manifest)?;
        validate_manifest_value(&root)?;
        self.write_document(&root)?;
        info!(path = %self.path.display(), events = manifest.len(), "saved manifest");
        Ok(())
    }

    /// Load without identity checks. Bootstrap only.
    pub fn load_draft(&self) -> GcsResult<DraftManifest> {
        let Some(root) = self.read_document()? else {
            return Ok(DraftManifest::default());
        };
        check_draft_shape(&root)?;
        serde_json::from_value(root).map_err(|e| GcsError::ManifestCorrupt(e.to_string()))
    }

    /// Save without identity checks. Bootstrap only.
    pub fn save_draft(&self, draft: &DraftManifest) -> GcsResult<()> {
        let root = serde_json::to_value(draft)?;
        check_draft_shape(&root)?;
        self.write_document(&root)?;
        info!(path = %self.path.display(), events = draft.events.len(), "saved draft manifest");
        Ok(())
    }

    fn read_document(&self) -> GcsResult<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            GcsError::ManifestCorrupt(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let root = serde_json::from_str(&content).map_err(|e| {
            GcsError::ManifestCorrupt(format!("{} is not valid JSON: {e}", self.path.display()))
        })?;
        Ok(Some(root))
    }

    fn write_document(&self, root: &Value) -> GcsResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = if self.pretty {
            serde_json::to_string_pretty(root)?
        } else {
            serde_json::to_string(root)?
        };

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

fn check_draft_shape(root: &Value) -> GcsResult<()> {
    let root = root
        .as_object()
        .ok_or_else(|| GcsError::ManifestCorrupt("document root is not an object".into()))?;
    match root.get("events") {
        None => Ok(()),
        Some(Value::Object(events)) => match events.iter().find(|(_, v)| !v.is_object()) {
            Some((key, _)) => Err(GcsError::ManifestCorrupt(format!("event '{key}' is not an object"))),
            None => Ok(()),
        },
        Some(_) => Err(GcsError::ManifestCorrupt("'events' is not an object".into())),
    }
}
