//! Core of gcs: reconcile calendar events with a show scheduler's entry list.
//!
//! - `identity`: canonical identities and their hashes
//! - `manifest`: the identity-keyed event catalog and its store
//! - `intent`: calendar events and host entries normalized into intents
//! - `resolution`: recurring events cut into executable bundles
//! - `diff`: source vs existing, one operation per identity
//! - `apply`: a diff folded into the host's entry list

pub mod apply;
pub mod diff;
pub mod env;
pub mod error;
pub mod fpp;
pub mod gcs_config;
pub mod identity;
pub mod intent;
pub mod manifest;
pub mod resolution;
pub mod scope;

#[cfg(test)]
mod test_support;

pub use error::{ErrorCode, GcsError, GcsResult};
pub use identity::{Identity, IdentityHash, canonicalize};
pub use manifest::{Manifest, ManifestEvent, ManifestStore};
pub use scope::ResolutionScope;
