//! Pass outcome reporting

use std::fmt;

use super::conflict::ConflictView;
use super::error::SyncError;
use crate::models::DeckId;

/// Counters collected during one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted_remote: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub downloaded: usize,
    pub images_pushed: usize,
    pub images_pulled: usize,
    /// Referenced images found neither locally nor remotely
    pub images_missing: usize,
    /// Remote deck files that could not be read or parsed during discovery
    pub discovery_failures: usize,
    /// Decks skipped after a transport failure (skip-deck policy only)
    pub failed_decks: Vec<DeckId>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} unchanged, {} downloaded, {} deleted remotely",
            self.uploaded, self.skipped, self.downloaded, self.deleted_remote
        )?;
        if self.images_pushed + self.images_pulled > 0 {
            write!(
                f,
                "; images: {} pushed, {} pulled",
                self.images_pushed, self.images_pulled
            )?;
        }
        if self.images_missing > 0 {
            write!(f, "; {} images missing", self.images_missing)?;
        }
        if self.discovery_failures > 0 {
            write!(f, "; {} unreadable remote decks", self.discovery_failures)?;
        }
        if !self.failed_decks.is_empty() {
            write!(f, "; {} decks failed", self.failed_decks.len())?;
        }
        Ok(())
    }
}

/// The single terminal result of a sync trigger.
#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Pass paused; a decision is needed before the rest of the queue runs
    Conflict {
        conflict: ConflictView,
        report: SyncReport,
    },
    Failed {
        error: SyncError,
        report: SyncReport,
    },
    /// Another pass is already running; nothing was done
    Busy,
    /// A conflict is waiting for a decision; nothing was done
    AwaitingResolution,
    /// Conflict dismissed; the remaining queue was dropped
    Aborted,
}

impl SyncOutcome {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report)
            | Self::Conflict { report, .. }
            | Self::Failed { report, .. } => Some(report),
            Self::Busy | Self::AwaitingResolution | Self::Aborted => None,
        }
    }

    /// One-line, user-facing summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Completed(report) => format!("Sync complete: {report}"),
            Self::Conflict { conflict, .. } => format!(
                "Sync paused: deck '{}' changed both locally and in the cloud",
                conflict.local.name
            ),
            Self::Failed { error, .. } => format!("Sync failed: {error}"),
            Self::Busy => "Sync already in progress".to_string(),
            Self::AwaitingResolution => "Sync is waiting for a conflict decision".to_string(),
            Self::Aborted => "Sync aborted".to_string(),
        }
    }
}
