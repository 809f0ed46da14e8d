//! Local application settings

use serde::{Deserialize, Serialize};

/// Local-only preferences. Never synced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// User opted into remote sync; gates automatic passes
    pub sync_enabled: bool,
    /// Completion time of the last successful pass (Unix ms)
    pub last_synced_at: Option<i64>,
}
