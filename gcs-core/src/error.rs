//! Error types for the gcs core.

use std::fmt;

use thiserror::Error;

/// Errors that can occur in gcs operations.
///
/// Every variant is fatal for the call that produced it. Situations a human
/// should look at (unmanaged drift, orphaned entries) are not errors; they
/// surface as `Review`/`Conflict` operations from the event resolver.
#[derive(Error, Debug)]
pub enum GcsError {
    #[error("Invalid identity: {field}: {reason}")]
    IdentityInvalid { field: String, reason: String },

    #[error("Identity of '{id}' would change from {recorded} to {computed}")]
    IdentityMutation {
        id: String,
        recorded: String,
        computed: String,
    },

    #[error("Manifest corrupt: {0}")]
    ManifestCorrupt(String),

    #[error("Event key '{key}' does not match its id '{id}'")]
    KeyMismatch { key: String, id: String },

    #[error("Identity-less append is retired; use upsert with an identity")]
    AppendRetired,

    #[error("Identity {0} appears in more than one diff list")]
    OverlappingDiff(String),

    #[error("Update targets identity {0}, which has no managed entry")]
    UpdateTargetMissing(String),

    #[error("Managed identity {0} appears more than once in the entry list")]
    DuplicateManagedHash(String),

    #[error("Managed entry at index {index} has no identity hash")]
    MissingManagedHash { index: usize },

    #[error("Unsupported recurrence for '{event}': {reason}")]
    UnsupportedRecurrence { event: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Plan was computed as a dry run and cannot be applied")]
    DryRun,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for gcs operations.
pub type GcsResult<T> = Result<T, GcsError>;

/// Machine-readable error codes, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    IdentityInvalid,
    IdentityMutation,
    ManifestCorrupt,
    KeyMismatch,
    AppendRetired,
    OverlappingDiff,
    UpdateTargetMissing,
    DuplicateManagedHash,
    MissingManagedHash,
    UnsupportedRecurrence,
    MissingField,
    InvalidField,
    DryRun,
    Config,
    Io,
    Serialization,
}

impl ErrorCode {
    /// Stable code identifier (`G####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::IdentityInvalid => "G1001",
            Self::IdentityMutation => "G1002",
            Self::ManifestCorrupt => "G2001",
            Self::KeyMismatch => "G2002",
            Self::AppendRetired => "G2003",
            Self::OverlappingDiff => "G3001",
            Self::UpdateTargetMissing => "G3002",
            Self::DuplicateManagedHash => "G3003",
            Self::MissingManagedHash => "G3004",
            Self::UnsupportedRecurrence => "G4001",
            Self::MissingField => "G4002",
            Self::InvalidField => "G4003",
            Self::DryRun => "G5001",
            Self::Config => "G9001",
            Self::Io => "G9002",
            Self::Serialization => "G9003",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl GcsError {
    /// Return the machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            GcsError::IdentityInvalid { .. } => ErrorCode::IdentityInvalid,
            GcsError::IdentityMutation { .. } => ErrorCode::IdentityMutation,
            GcsError::ManifestCorrupt(_) => ErrorCode::ManifestCorrupt,
            GcsError::KeyMismatch { .. } => ErrorCode::KeyMismatch,
            GcsError::AppendRetired => ErrorCode::AppendRetired,
            GcsError::OverlappingDiff(_) => ErrorCode::OverlappingDiff,
            GcsError::UpdateTargetMissing(_) => ErrorCode::UpdateTargetMissing,
            GcsError::DuplicateManagedHash(_) => ErrorCode::DuplicateManagedHash,
            GcsError::MissingManagedHash { .. } => ErrorCode::MissingManagedHash,
            GcsError::UnsupportedRecurrence { .. } => ErrorCode::UnsupportedRecurrence,
            GcsError::MissingField(_) => ErrorCode::MissingField,
            GcsError::InvalidField { .. } => ErrorCode::InvalidField,
            GcsError::DryRun => ErrorCode::DryRun,
            GcsError::Config(_) => ErrorCode::Config,
            GcsError::Io(_) => ErrorCode::Io,
            GcsError::Serialization(_) => ErrorCode::Serialization,
        }
    }

    pub(crate) fn invalid_identity(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GcsError::IdentityInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GcsError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for GcsError {
    fn from(e: serde_json::Error) -> Self {
        GcsError::Serialization(e.to_string())
    }
}
