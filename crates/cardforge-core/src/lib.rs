//! cardforge-core - Core library for Cardforge
//!
//! This crate contains the deck models, the local libSQL store, the
//! content-addressable image store, and the offline-first sync engine that
//! reconciles the local library with a per-user Google Drive app folder.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Card, CardId, ContentHash, Deck, DeckId, SlotValue, Style};
