//! Full manifest validation, shared by load and save.
//!
//! Each event passes through the same ordered checks. The first failure ends
//! validation for the whole document; nothing is skipped or repaired.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Manifest, ManifestEvent};
use crate::error::{GcsError, GcsResult};
use crate::identity::{CanonicalIdentity, IdentityHash, canonicalize};

/// An event under validation, with its identity already canonicalized.
struct Candidate<'a> {
    key: &'a str,
    hash: IdentityHash,
    event: ManifestEvent,
}

type EventCheck = fn(&Candidate<'_>) -> Result<(), String>;

const EVENT_CHECKS: [EventCheck; 4] = [check_key, check_id_is_hash, check_stamp, check_sub_events];

/// Validate a manifest document and return the typed manifest.
///
/// Fails with [`GcsError::IdentityInvalid`] when an identity does not
/// canonicalize, and with [`GcsError::ManifestCorrupt`] for shape errors,
/// key/id/hash mismatches and duplicate identities.
pub fn validate_manifest_value(root: &Value) -> GcsResult<Manifest> {
    let root = root
        .as_object()
        .ok_or_else(|| GcsError::ManifestCorrupt("document root is not an object".into()))?;

    let events = match root.get("events") {
        None => return Ok(Manifest::default()),
        Some(Value::Object(events)) => events,
        Some(_) => return Err(GcsError::ManifestCorrupt("'events' is not an object".into())),
    };

    let mut manifest = Manifest::default();
    let mut seen: BTreeMap<IdentityHash, &str> = BTreeMap::new();

    for (key, raw) in events {
        let candidate = parse_candidate(key, raw)?;

        for check in EVENT_CHECKS {
            check(&candidate)
                .map_err(|reason| GcsError::ManifestCorrupt(format!("event '{key}': {reason}")))?;
        }

        if let Some(first) = seen.insert(candidate.hash.clone(), key) {
            return Err(GcsError::ManifestCorrupt(format!(
                "events '{first}' and '{key}' share identity {}",
                candidate.hash
            )));
        }

        manifest.events.insert(key.clone(), candidate.event);
    }

    Ok(manifest)
}

fn parse_candidate<'a>(key: &'a str, raw: &Value) -> GcsResult<Candidate<'a>> {
    let identity = raw
        .get("identity")
        .ok_or_else(|| GcsError::ManifestCorrupt(format!("event '{key}': missing identity")))?;

    let canonical: CanonicalIdentity = canonicalize(identity).map_err(|e| match e {
        GcsError::IdentityInvalid { field, reason } => GcsError::IdentityInvalid {
            field: format!("events.{key}.identity.{field}"),
            reason,
        },
        other => other,
    })?;
    let hash = canonical.hash()?;

    let event: ManifestEvent = serde_json::from_value(raw.clone())
        .map_err(|e| GcsError::ManifestCorrupt(format!("event '{key}': {e}")))?;

    Ok(Candidate { key, hash, event })
}

fn check_key(c: &Candidate<'_>) -> Result<(), String> {
    if c.event.id == c.key {
        Ok(())
    } else {
        Err(format!("id '{}' does not match its key", c.event.id))
    }
}

fn check_id_is_hash(c: &Candidate<'_>) -> Result<(), String> {
    if c.event.id == c.hash.as_str() {
        Ok(())
    } else {
        Err(format!("id does not match identity hash {}", c.hash))
    }
}

fn check_stamp(c: &Candidate<'_>) -> Result<(), String> {
    match &c.event.identity_hash {
        Some(stored) if *stored != c.hash => {
            Err(format!("stored identity_hash {stored} does not match computed {}", c.hash))
        }
        _ => Ok(()),
    }
}

fn check_sub_events(c: &Candidate<'_>) -> Result<(), String> {
    let identity = &c.event.identity;
    for (index, sub) in c.event.sub_events.iter().enumerate() {
        let Some(stored) = &sub.identity_hash else {
            continue;
        };
        let computed = sub
            .identity(identity.kind, &identity.target)
            .hash()
            .map_err(|e| format!("sub-event {index}: {e}"))?;
        if *stored != computed {
            return Err(format!(
                "sub-event {index} identity_hash {stored} does not match computed {computed}"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{event, stamped_manifest};
    use serde_json::json;

    fn document() -> Value {
        serde_json::to_value(stamped_manifest(&[("Xmas", 17), ("Halloween", 18)])).unwrap()
    }

    fn first_key(doc: &Value) -> String {
        doc["events"].as_object().unwrap().keys().next().unwrap().clone()
    }

    #[test]
    fn valid_document_passes() {
        let manifest = validate_manifest_value(&document()).unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn missing_events_is_empty() {
        assert!(validate_manifest_value(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn non_object_root_is_corrupt() {
        let err = validate_manifest_value(&json!([])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ManifestCorrupt);
    }

    #[test]
    fn id_key_mismatch_is_corrupt() {
        let mut doc = document();
        let key = first_key(&doc);
        doc["events"][&key]["id"] = json!("something-else");
        let err = validate_manifest_value(&doc).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ManifestCorrupt);
    }

    #[test]
    fn tampered_hash_is_corrupt() {
        let mut doc = document();
        let key = first_key(&doc);
        doc["events"][&key]["identity_hash"] = json!("0".repeat(64));
        let err = validate_manifest_value(&doc).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ManifestCorrupt);
    }

    #[test]
    fn edited_identity_is_corrupt() {
        let mut doc = document();
        let key = first_key(&doc);
        doc["events"][&key]["identity"]["target"] = json!("Renamed");
        let err = validate_manifest_value(&doc).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ManifestCorrupt);
    }

    #[test]
    fn tampered_sub_event_hash_is_corrupt() {
        let mut doc = document();
        let key = first_key(&doc);
        doc["events"][&key]["subEvents"][0]["identity_hash"] = json!("f".repeat(64));
        let err = validate_manifest_value(&doc).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ManifestCorrupt);
    }

    #[test]
    fn invalid_identity_is_reported_with_path() {
        let mut doc = document();
        let key = first_key(&doc);
        doc["events"][&key]["identity"]["stopType"] = json!(0);
        match validate_manifest_value(&doc).unwrap_err() {
            GcsError::IdentityInvalid { field, .. } => {
                assert_eq!(field, format!("events.{key}.identity.stopType"));
            }
            other => panic!("expected IdentityInvalid, got {other:?}"),
        }
    }

    #[test]
    fn unstamped_events_are_accepted() {
        let ev = event("Xmas", 17);
        let doc = json!({"events": {ev.id.clone(): ev}});
        assert_eq!(validate_manifest_value(&doc).unwrap().len(), 1);
    }
}
