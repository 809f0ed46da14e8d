//! Remote file store collaborator surface.

use thiserror::Error;

use crate::models::RemoteFile;

/// Failures reported by a remote file store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// No valid credential could be obtained
    #[error("Remote authentication failed: {0}")]
    Auth(String),
    /// The file does not exist (or no longer exists)
    #[error("Remote file not found: {0}")]
    NotFound(String),
    /// Network-level failure; the request may not have reached the server
    #[error("Remote transport failure: {0}")]
    Transport(String),
    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// The server answered with something we could not interpret
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    /// Network failures, server errors and rate limiting. Retrying later may succeed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Flat namespace of named files with server-assigned modification times.
#[allow(async_fn_in_trait)]
pub trait RemoteFileStore {
    /// Obtain (refreshing if needed) an access token for this pass.
    async fn ensure_signed_in(&self) -> RemoteResult<String>;

    /// Whether credentials are available without prompting the user.
    fn has_credentials(&self) -> bool {
        true
    }

    async fn list_files(&self) -> RemoteResult<Vec<RemoteFile>>;

    async fn get_file_content(&self, file_id: &str) -> RemoteResult<Vec<u8>>;

    /// Create or overwrite the file called `name`.
    async fn save_file(
        &self,
        name: &str,
        content: &[u8],
        mime_type: &str,
    ) -> RemoteResult<RemoteFile>;

    async fn delete_file(&self, file_id: &str) -> RemoteResult<()>;
}
