//! Local persistence for cardforge

mod conflict_repository;
mod connection;
mod deck_repository;
mod image_repository;
mod migrations;
mod settings_repository;
mod tombstone_repository;

pub use conflict_repository::{ConflictLogRepository, LibSqlConflictLogRepository};
pub(crate) use connection::run_in_transaction;
pub use connection::Database;
pub use deck_repository::{DeckFingerprint, DeckRepository, LibSqlDeckRepository};
pub use image_repository::{ImageRepository, LibSqlImageRepository};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
pub(crate) use tombstone_repository::RECORD_DELETION_SQL;
pub use tombstone_repository::{LibSqlTombstoneRepository, TombstoneRepository};
