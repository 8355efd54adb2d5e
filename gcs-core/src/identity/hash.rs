//! Identity hashing.
//!
//! The identity hash is the only key shared by calendar events, manifest
//! records and scheduler entries, so it has to be collision resistant and
//! stable forever: SHA-256 over the canonical JSON bytes, lowercase hex.
//!
//! Canonical JSON here means sorted object keys, no whitespace, and no
//! floats (float formatting is not stable across serializers).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::CanonicalIdentity;
use crate::error::{GcsError, GcsResult};

const HASH_HEX_LEN: usize = 64;

/// Hex-encoded SHA-256 of a canonical identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityHash(String);

impl IdentityHash {
    /// Hash a canonical identity.
    ///
    /// Top-level keys must already be sorted. A [`CanonicalIdentity`] always
    /// satisfies this; failing here means the value was built by hand.
    pub fn of(canonical: &CanonicalIdentity) -> GcsResult<Self> {
        let root = canonical
            .as_value()
            .as_object()
            .ok_or_else(|| GcsError::invalid_identity("<root>", "identity must be an object"))?;
        let keys: Vec<&String> = root.keys().collect();
        if !keys.windows(2).all(|w| w[0] < w[1]) {
            return Err(GcsError::invalid_identity("<root>", "keys not sorted"));
        }

        let bytes = canonical_json_bytes(canonical.as_value())?;
        let digest = Sha256::digest(&bytes);
        Ok(IdentityHash(hex::encode(digest)))
    }

    /// Parse a stored hash, checking only its shape.
    pub fn parse(s: &str) -> GcsResult<Self> {
        let well_formed = s.len() == HASH_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(IdentityHash(s.to_string()))
        } else {
            Err(GcsError::invalid_field(
                "identity_hash",
                format!("'{s}' is not a 64-character lowercase hex digest"),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl TryFrom<String> for IdentityHash {
    type Error = GcsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        IdentityHash::parse(&s)
    }
}

impl From<IdentityHash> for String {
    fn from(hash: IdentityHash) -> Self {
        hash.0
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize a JSON value with sorted keys and no whitespace.
pub fn canonical_json_bytes(value: &Value) -> GcsResult<Vec<u8>> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> GcsResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(GcsError::invalid_identity(
                    "<number>",
                    format!("float {n} is not allowed in canonical JSON"),
                ));
            }
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Value::String(s) => out.extend_from_slice(serde_json::to_string(s)?.as_bytes()),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(serde_json::to_string(key)?.as_bytes());
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}
