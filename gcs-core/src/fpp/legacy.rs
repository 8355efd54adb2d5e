//! Ownership markers embedded in entry arguments.
//!
//! Older hosts have no room for `managed`/`identity_hash` on an entry, so
//! ownership was written into the command arguments as `gcs:managed:<hash>`.

use serde_json::Value;

use crate::identity::IdentityHash;

pub const MARKER_PREFIX: &str = "gcs:managed:";

pub fn encode_marker(hash: &IdentityHash) -> String {
    format!("{MARKER_PREFIX}{hash}")
}

/// The hash in a single argument, if it is a well-formed marker.
pub fn decode_marker(arg: &Value) -> Option<IdentityHash> {
    let rest = arg.as_str()?.strip_prefix(MARKER_PREFIX)?;
    IdentityHash::parse(rest).ok()
}

/// Remove every marker from `args`, returning the first hash found.
pub fn strip_marker(args: &mut Vec<Value>) -> Option<IdentityHash> {
    let found = args.iter().find_map(decode_marker);
    if found.is_some() {
        args.retain(|arg| decode_marker(arg).is_none());
    }
    found
}
