//! Sync error taxonomy

use thiserror::Error;

use crate::storage::RemoteError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No valid remote credential; nothing was attempted
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Remote(RemoteError),

    #[error(transparent)]
    Local(#[from] crate::Error),

    /// Operation not allowed in the current engine or resolver state
    #[error("Invalid sync state: {0}")]
    InvalidState(String),
}

impl SyncError {
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        match self {
            Self::Remote(error) => error.is_transport(),
            _ => false,
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Auth(message) => Self::Auth(message),
            other => Self::Remote(other),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
