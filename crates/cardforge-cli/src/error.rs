use std::io;

use cardforge_core::storage::RemoteError;
use cardforge_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] cardforge_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Deck name cannot be empty")]
    EmptyDeckName,
    #[error("Deck not found for id/prefix/name: {0}")]
    DeckNotFound(String),
    #[error("Card not found for id/prefix: {0}")]
    CardNotFound(String),
    #[error("{0}")]
    Ambiguous(String),
    #[error("Invalid slot '{0}'; expected NAME=VALUE")]
    InvalidSlot(String),
    #[error("Image not found: {0}")]
    ImageNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("{0}")]
    SyncFailed(String),
    #[error(
        "Sync is not configured. Run `cardforge config init` + `cardforge auth login`, or set GOOGLE_DRIVE_ACCESS_TOKEN."
    )]
    SyncNotConfigured,
}
