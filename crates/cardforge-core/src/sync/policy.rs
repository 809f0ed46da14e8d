//! Tunables for a sync pass

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Timestamp difference (ms) below which replicas are not considered diverged.
pub const DEFAULT_CONFLICT_WINDOW_MS: i64 = 1000;

/// What a transport failure while uploading one deck does to the rest of the pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportFailurePolicy {
    /// Stop the pass; remaining decks are not attempted.
    #[default]
    AbortPass,
    /// Record the failure and continue with the next deck.
    SkipDeck,
}

impl TransportFailurePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AbortPass => "abort",
            Self::SkipDeck => "skip",
        }
    }
}

impl fmt::Display for TransportFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort-pass" | "abort_pass" => Ok(Self::AbortPass),
            "skip" | "skip-deck" | "skip_deck" => Ok(Self::SkipDeck),
            other => Err(Error::InvalidInput(format!(
                "unknown transport failure policy '{other}' (expected abort or skip)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub conflict_window_ms: i64,
    pub transport_failure: TransportFailurePolicy,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            conflict_window_ms: DEFAULT_CONFLICT_WINDOW_MS,
            transport_failure: TransportFailurePolicy::default(),
        }
    }
}

impl SyncPolicy {
    #[must_use]
    pub const fn with_transport_failure(mut self, policy: TransportFailurePolicy) -> Self {
        self.transport_failure = policy;
        self
    }
}
