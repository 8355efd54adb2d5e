//! Identity canonicalization.
//!
//! Raw identities arrive as JSON objects (from the manifest, from adapters,
//! from hand-written fixtures). [`canonicalize`] runs them through an ordered
//! pipeline of independent checks and, only if every check passes, rebuilds
//! the object with all keys sorted so that equal identities serialize to
//! identical bytes.
//!
//! Nothing is repaired. A missing `type`, an unknown day code or a stray
//! `stopType` is an error, not something to guess around.

use chrono::NaiveTime;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{DayMask, Identity, IdentityHash, SymbolicTime, TargetKind};
use crate::error::{GcsError, GcsResult};

/// Top-level keys that describe behavior or bookkeeping, never identity.
pub const FORBIDDEN_FIELDS: [&str; 7] = ["stopType", "repeat", "enabled", "status", "uid", "hash", "id"];

const IDENTITY_FIELDS: [&str; 3] = ["type", "target", "timing"];
const TIMING_FIELDS: [&str; 3] = ["days", "start_time", "end_time"];
const TIME_SPEC_FIELDS: [&str; 3] = ["hard", "symbolic", "offset"];

/// An identity that passed validation, with every object's keys sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalIdentity(Value);

impl CanonicalIdentity {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn to_identity(&self) -> GcsResult<Identity> {
        Ok(serde_json::from_value(self.0.clone())?)
    }

    pub fn hash(&self) -> GcsResult<IdentityHash> {
        IdentityHash::of(self)
    }
}

impl Serialize for CanonicalIdentity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invalid {
    field: String,
    reason: String,
}

impl Invalid {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<Invalid> for GcsError {
    fn from(invalid: Invalid) -> Self {
        GcsError::IdentityInvalid {
            field: invalid.field,
            reason: invalid.reason,
        }
    }
}

type Check = fn(&Map<String, Value>) -> Result<(), Invalid>;

/// Checks run in order; the first failure is reported.
const PIPELINE: [Check; 5] = [
    check_forbidden,
    check_known_fields,
    check_type,
    check_target,
    check_timing,
];

/// Validate a raw identity and return its canonical form.
///
/// Canonicalization is idempotent: feeding the output back in yields the
/// same value.
pub fn canonicalize(raw: &Value) -> GcsResult<CanonicalIdentity> {
    let root = raw
        .as_object()
        .ok_or_else(|| Invalid::new("<root>", "identity must be an object"))?;

    for check in PIPELINE {
        check(root)?;
    }

    Ok(CanonicalIdentity(build(root)?))
}

fn check_forbidden(root: &Map<String, Value>) -> Result<(), Invalid> {
    match FORBIDDEN_FIELDS.iter().find(|f| root.contains_key(**f)) {
        Some(field) => Err(Invalid::new(*field, "field is not part of identity")),
        None => Ok(()),
    }
}

fn check_known_fields(root: &Map<String, Value>) -> Result<(), Invalid> {
    reject_unknown(root, &IDENTITY_FIELDS, "")?;
    for field in IDENTITY_FIELDS {
        if !root.contains_key(field) {
            return Err(Invalid::new(field, "missing"));
        }
    }
    Ok(())
}

fn check_type(root: &Map<String, Value>) -> Result<(), Invalid> {
    let kind = root
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Invalid::new("type", "must be a string"))?;
    TargetKind::parse(kind)
        .map(|_| ())
        .ok_or_else(|| Invalid::new("type", format!("unknown type '{kind}'")))
}

fn check_target(root: &Map<String, Value>) -> Result<(), Invalid> {
    match root.get("target").and_then(Value::as_str) {
        Some(target) if !target.trim().is_empty() => Ok(()),
        Some(_) => Err(Invalid::new("target", "must not be empty")),
        None => Err(Invalid::new("target", "must be a string")),
    }
}

fn check_timing(root: &Map<String, Value>) -> Result<(), Invalid> {
    let timing = root
        .get("timing")
        .and_then(Value::as_object)
        .ok_or_else(|| Invalid::new("timing", "must be an object"))?;

    reject_unknown(timing, &TIMING_FIELDS, "timing.")?;

    let days = timing
        .get("days")
        .ok_or_else(|| Invalid::new("timing.days", "missing"))?;
    parse_days(days)?;

    for field in ["start_time", "end_time"] {
        let path = format!("timing.{field}");
        let spec = timing
            .get(field)
            .ok_or_else(|| Invalid::new(&path, "missing"))?;
        check_time_spec(spec, &path)?;
    }
    Ok(())
}

fn check_time_spec(spec: &Value, path: &str) -> Result<(), Invalid> {
    let spec = spec
        .as_object()
        .ok_or_else(|| Invalid::new(path, "must be an object"))?;
    reject_unknown(spec, &TIME_SPEC_FIELDS, &format!("{path}."))?;

    let hard = match spec.get("hard") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .map_err(|_| Invalid::new(format!("{path}.hard"), format!("'{s}' is not HH:MM:SS")))?;
            Some(s)
        }
        Some(_) => return Err(Invalid::new(format!("{path}.hard"), "must be a string or null")),
    };

    let symbolic = match spec.get("symbolic") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            SymbolicTime::parse(s).ok_or_else(|| {
                Invalid::new(format!("{path}.symbolic"), format!("unknown symbolic time '{s}'"))
            })?;
            Some(s)
        }
        Some(_) => {
            return Err(Invalid::new(format!("{path}.symbolic"), "must be a string or null"));
        }
    };

    if hard.is_none() && symbolic.is_none() {
        return Err(Invalid::new(path, "needs a hard or symbolic value"));
    }

    match spec.get("offset") {
        None => Ok(()),
        Some(Value::Number(n)) if n.as_i64().is_some_and(|v| i32::try_from(v).is_ok()) => Ok(()),
        Some(_) => Err(Invalid::new(format!("{path}.offset"), "must be an integer")),
    }
}

fn parse_days(days: &Value) -> Result<DayMask, Invalid> {
    let codes = days
        .as_array()
        .ok_or_else(|| Invalid::new("timing.days", "must be an array of day codes"))?;
    let codes: Vec<&str> = codes
        .iter()
        .map(|c| {
            c.as_str()
                .ok_or_else(|| Invalid::new("timing.days", "day codes must be strings"))
        })
        .collect::<Result<_, _>>()?;
    DayMask::from_codes(codes).map_err(|reason| Invalid::new("timing.days", reason))
}

fn reject_unknown(map: &Map<String, Value>, allowed: &[&str], prefix: &str) -> Result<(), Invalid> {
    match map.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(Invalid::new(format!("{prefix}{key}"), "unexpected field")),
        None => Ok(()),
    }
}

/// Rebuild a validated identity in canonical shape.
///
/// An absent `hard`/`symbolic` is written as null and an absent `offset` as
/// zero, so that both spellings hash the same.
fn build(root: &Map<String, Value>) -> Result<Value, Invalid> {
    let timing = root
        .get("timing")
        .and_then(Value::as_object)
        .ok_or_else(|| Invalid::new("timing", "must be an object"))?;

    let days = parse_days(&timing["days"])?;
    let days: Vec<Value> = days.codes().into_iter().map(Value::from).collect();

    let mut canonical_timing = Map::new();
    canonical_timing.insert("days".into(), Value::Array(days));
    for field in ["start_time", "end_time"] {
        let spec = &timing[field];
        let mut canonical_spec = Map::new();
        canonical_spec.insert("hard".into(), spec.get("hard").cloned().unwrap_or(Value::Null));
        canonical_spec.insert("offset".into(), spec.get("offset").cloned().unwrap_or(Value::from(0)));
        canonical_spec.insert(
            "symbolic".into(),
            spec.get("symbolic").cloned().unwrap_or(Value::Null),
        );
        canonical_timing.insert(field.into(), Value::Object(canonical_spec));
    }

    let mut canonical = Map::new();
    canonical.insert("target".into(), root["target"].clone());
    canonical.insert("timing".into(), Value::Object(canonical_timing));
    canonical.insert("type".into(), root["type"].clone());

    Ok(sort_keys(Value::Object(canonical)))
}

/// Recursively re-insert object keys in byte order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn raw_identity() -> Value {
        json!({
            "type": "playlist",
            "target": "Xmas Show",
            "timing": {
                "days": ["MO", "SU"],
                "start_time": {"hard": "17:00:00", "symbolic": null, "offset": 0},
                "end_time": {"symbolic": "Dusk", "offset": 30}
            }
        })
    }

    fn field_of(err: GcsError) -> String {
        match err {
            GcsError::IdentityInvalid { field, .. } => field,
            other => panic!("expected IdentityInvalid, got {other:?}"),
        }
    }

    #[test]
    fn canonicalize_sorts_keys_and_days() {
        let canonical = canonicalize(&raw_identity()).unwrap();
        let text = serde_json::to_string(canonical.as_value()).unwrap();
        assert!(text.starts_with(r#"{"target":"Xmas Show","timing":{"days":["SU","MO"]"#));
        assert_eq!(canonical.as_value()["timing"]["end_time"]["hard"], Value::Null);
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize(&raw_identity()).unwrap();
        let twice = canonicalize(once.as_value()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn forbidden_stop_type_is_rejected() {
        let mut raw = raw_identity();
        raw["stopType"] = json!(1);
        let err = canonicalize(&raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IdentityInvalid);
        assert_eq!(field_of(err), "stopType");
    }

    #[test]
    fn every_forbidden_field_is_rejected() {
        for field in FORBIDDEN_FIELDS {
            let mut raw = raw_identity();
            raw[field] = json!("x");
            assert_eq!(field_of(canonicalize(&raw).unwrap_err()), field);
        }
    }

    #[test]
    fn calendar_dates_are_not_identity() {
        let mut raw = raw_identity();
        raw["startDate"] = json!("2025-12-01");
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "startDate");
    }

    #[test]
    fn missing_fields_are_named() {
        let mut raw = raw_identity();
        raw.as_object_mut().unwrap().remove("target");
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "target");

        let mut raw = raw_identity();
        raw["timing"].as_object_mut().unwrap().remove("days");
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "timing.days");
    }

    #[test]
    fn time_needs_hard_or_symbolic() {
        let mut raw = raw_identity();
        raw["timing"]["start_time"] = json!({"hard": null, "symbolic": null});
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "timing.start_time");
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut raw = raw_identity();
        raw["type"] = json!("effect");
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "type");

        let mut raw = raw_identity();
        raw["timing"]["start_time"]["hard"] = json!("5pm");
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "timing.start_time.hard");

        let mut raw = raw_identity();
        raw["timing"]["end_time"]["symbolic"] = json!("Noon");
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "timing.end_time.symbolic");

        let mut raw = raw_identity();
        raw["target"] = json!("  ");
        assert_eq!(field_of(canonicalize(&raw).unwrap_err()), "target");

        assert_eq!(field_of(canonicalize(&json!([1, 2])).unwrap_err()), "<root>");
    }

    #[test]
    fn absent_and_default_spellings_agree() {
        let mut explicit = raw_identity();
        explicit["timing"]["end_time"] = json!({"hard": null, "symbolic": "Dusk", "offset": 30});
        assert_eq!(
            canonicalize(&raw_identity()).unwrap(),
            canonicalize(&explicit).unwrap()
        );
    }

    #[test]
    fn round_trips_to_typed_identity() {
        let canonical = canonicalize(&raw_identity()).unwrap();
        let identity = canonical.to_identity().unwrap();
        assert_eq!(identity.kind, TargetKind::Playlist);
        assert_eq!(identity.timing.end_time.symbolic, Some(SymbolicTime::Dusk));
        assert_eq!(identity.canonical().unwrap(), canonical);
    }
}
