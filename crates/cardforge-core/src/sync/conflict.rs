//! Conflict resolution state machine.
//!
//! `Normal` -> `ConflictPending` (pass paused, tail captured) -> `Resolving`
//! (both versions shown) -> `Normal`, either with a choice that resumes the
//! tail or a dismissal that drops it.

use std::fmt;

use super::error::{SyncError, SyncResult};
use crate::models::{ConflictStrategy, Deck, DeckId, RemoteFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Normal,
    ConflictPending,
    Resolving,
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::ConflictPending => "conflict pending",
            Self::Resolving => "resolving",
        })
    }
}

/// Which replica wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    KeepLocal,
    UseCloud,
}

impl From<ConflictChoice> for ConflictStrategy {
    fn from(choice: ConflictChoice) -> Self {
        match choice {
            ConflictChoice::KeepLocal => Self::KeepLocal,
            ConflictChoice::UseCloud => Self::UseCloud,
        }
    }
}

/// A paused pass: the diverging deck plus the queue tail not yet attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConflict {
    pub local: Deck,
    pub remote: Deck,
    pub remote_file: RemoteFile,
    pub remaining: Vec<DeckId>,
}

impl PendingConflict {
    #[must_use]
    pub fn view(&self) -> ConflictView {
        ConflictView {
            deck_id: self.local.id,
            local: self.local.clone(),
            remote: self.remote.clone(),
            local_updated_at: self.local.updated_at,
            remote_modified_at: self.remote_file.modified_at,
            remaining: self.remaining.len(),
        }
    }
}

/// What a user is shown when asked to pick a winner.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictView {
    pub deck_id: DeckId,
    pub local: Deck,
    pub remote: Deck,
    pub local_updated_at: i64,
    pub remote_modified_at: i64,
    /// Decks still queued behind the conflicting one
    pub remaining: usize,
}

#[derive(Debug, Default)]
pub struct ConflictResolver {
    pending: Option<PendingConflict>,
    resolving: bool,
}

impl ConflictResolver {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: None,
            resolving: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ResolverState {
        match (&self.pending, self.resolving) {
            (None, _) => ResolverState::Normal,
            (Some(_), false) => ResolverState::ConflictPending,
            (Some(_), true) => ResolverState::Resolving,
        }
    }

    #[must_use]
    pub fn view(&self) -> Option<ConflictView> {
        self.pending.as_ref().map(PendingConflict::view)
    }

    /// Suspend a pass on `conflict`.
    pub fn pause(&mut self, conflict: PendingConflict) -> SyncResult<ConflictView> {
        self.expect_state(ResolverState::Normal, "pause")?;
        let view = conflict.view();
        self.pending = Some(conflict);
        self.resolving = false;
        Ok(view)
    }

    /// Present both versions to the user.
    pub fn begin_resolution(&mut self) -> SyncResult<ConflictView> {
        self.expect_state(ResolverState::ConflictPending, "begin resolution")?;
        self.resolving = true;
        self.view()
            .ok_or_else(|| SyncError::InvalidState("no pending conflict".to_string()))
    }

    /// Settle the conflict, handing back what the engine needs to apply and resume.
    pub fn resolve(&mut self, choice: ConflictChoice) -> SyncResult<(ConflictChoice, PendingConflict)> {
        self.expect_state(ResolverState::Resolving, "resolve")?;
        let conflict = self.take()?;
        Ok((choice, conflict))
    }

    /// Close without choosing. The captured tail is dropped.
    pub fn dismiss(&mut self) -> SyncResult<PendingConflict> {
        if self.state() == ResolverState::Normal {
            return Err(SyncError::InvalidState(
                "cannot dismiss: no conflict pending".to_string(),
            ));
        }
        self.take()
    }

    fn take(&mut self) -> SyncResult<PendingConflict> {
        self.resolving = false;
        self.pending
            .take()
            .ok_or_else(|| SyncError::InvalidState("no pending conflict".to_string()))
    }

    fn expect_state(&self, expected: ResolverState, action: &str) -> SyncResult<()> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(SyncError::InvalidState(format!(
                "cannot {action} while {actual} (expected {expected})"
            )))
        }
    }
}
