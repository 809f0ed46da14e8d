//! Image storage and remote file store backends.

mod content;
mod drive;
mod memory;
mod remote;

pub use content::{is_image_data_url, to_data_url, ContentStore, ImagePayload, ResolvedSlot};
pub use drive::GoogleDriveStore;
pub use memory::{MemoryRemoteStore, RemoteOp};
pub use remote::{RemoteError, RemoteFileStore, RemoteResult};
