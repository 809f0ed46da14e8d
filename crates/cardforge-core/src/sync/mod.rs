//! Offline-first synchronization with a remote file store

mod auto;
mod conflict;
mod engine;
mod error;
mod index;
mod policy;
mod report;

pub use auto::AutoSync;
pub use conflict::{ConflictChoice, ConflictResolver, ConflictView, PendingConflict, ResolverState};
pub use engine::{EngineState, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use index::RemoteIndex;
pub use policy::{SyncPolicy, TransportFailurePolicy, DEFAULT_CONFLICT_WINDOW_MS};
pub use report::{SyncOutcome, SyncReport};
