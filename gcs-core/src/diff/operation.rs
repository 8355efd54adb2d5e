use std::fmt;

use serde::{Deserialize, Serialize};

use super::ResolutionStatus;
use crate::identity::IdentityHash;
use crate::manifest::ManifestEvent;

/// The resolver's decision for one identity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOperation {
    pub status: ResolutionStatus,
    #[serde(rename = "identityHash")]
    pub identity_hash: IdentityHash,
    pub reason: String,
    /// Create/Update/Noop: the source event (with existing ownership on
    /// updates). Delete: the existing event. Conflict/Review: whichever
    /// side is present, source first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ManifestEvent>,
}

impl ResolutionOperation {
    pub(crate) fn new(
        status: ResolutionStatus,
        identity_hash: &IdentityHash,
        reason: impl Into<String>,
        payload: Option<ManifestEvent>,
    ) -> Self {
        ResolutionOperation {
            status,
            identity_hash: identity_hash.clone(),
            reason: reason.into(),
            payload,
        }
    }
}

impl fmt::Display for ResolutionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(event) => write!(f, "{}: {} ({})", self.status, event, self.reason),
            None => write!(f, "{}: {} ({})", self.status, self.identity_hash.short(), self.reason),
        }
    }
}
