use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionStatus {
    Create,
    Update,
    Delete,
    Noop,
    Conflict,
    Review,
}

impl ResolutionStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            ResolutionStatus::Create => "+",
            ResolutionStatus::Update => "~",
            ResolutionStatus::Delete => "-",
            ResolutionStatus::Noop => "=",
            ResolutionStatus::Conflict => "!",
            ResolutionStatus::Review => "?",
        }
    }

    /// Whether the apply engine acts on operations with this status.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            ResolutionStatus::Create | ResolutionStatus::Update | ResolutionStatus::Delete
        )
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
