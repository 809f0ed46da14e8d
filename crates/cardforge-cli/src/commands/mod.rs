pub mod auth_cmd;
pub mod card;
pub mod common;
pub mod completions;
pub mod config;
pub mod deck;
pub mod image;
pub mod sync;
