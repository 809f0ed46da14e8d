//! Data models for cardforge

mod card;
mod deck;
mod image;
mod remote_file;
mod settings;
mod sync_conflict;

pub use card::{Card, CardId, SlotValue};
pub use deck::{deck_file_name, Deck, DeckDocument, DeckId, Style, DECK_SCHEMA_VERSION};
pub use image::{
    image_extension_for_mime, mime_for_extension, ContentHash, StoredImage, REFERENCE_PREFIX,
};
pub use remote_file::{image_file_name, RemoteFile, RemoteFileKind};
pub use settings::Settings;
pub use sync_conflict::{ConflictStrategy, SyncConflict};
