//! Sync conflict audit model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// How a conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Local deck re-uploaded over the remote copy
    KeepLocal,
    /// Remote copy replaced the local deck
    UseCloud,
    /// Dialog closed without a choice; rest of the pass aborted
    Dismissed,
}

impl ConflictStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::UseCloud => "use_cloud",
            Self::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_local" => Ok(Self::KeepLocal),
            "use_cloud" => Ok(Self::UseCloud),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(Error::InvalidInput(format!(
                "unknown conflict strategy '{other}'"
            ))),
        }
    }
}

/// Recorded conflict and how the user settled it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Deck involved in the conflict
    pub deck_id: String,
    /// Local `updated_at` when the conflict was detected
    pub local_updated_at: i64,
    /// Remote `modifiedTime` when the conflict was detected
    pub remote_modified_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy
    pub strategy: ConflictStrategy,
}
