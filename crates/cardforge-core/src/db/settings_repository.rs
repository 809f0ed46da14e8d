//! Settings repository implementation

use crate::error::Result;
use crate::models::Settings;
use libsql::Connection;

const SYNC_ENABLED: &str = "sync_enabled";
const LAST_SYNCED_AT: &str = "last_synced_at";

/// Trait for settings storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Load settings from the database
    async fn load(&self) -> Result<Settings>;

    /// Save settings to the database
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// libSQL implementation of `SettingsRepository`
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn load(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(value) = self.get_setting(SYNC_ENABLED).await? {
            settings.sync_enabled = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(value) = self.get_setting(LAST_SYNCED_AT).await? {
            settings.last_synced_at = value.trim().parse().ok();
        }

        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        self.set_setting(
            SYNC_ENABLED,
            if settings.sync_enabled { "true" } else { "false" },
        )
        .await?;

        match settings.last_synced_at {
            Some(at) => self.set_setting(LAST_SYNCED_AT, &at.to_string()).await?,
            None => {
                self.conn
                    .execute("DELETE FROM settings WHERE key = ?", [LAST_SYNCED_AT])
                    .await?;
            }
        }
        Ok(())
    }
}

impl LibSqlSettingsRepository<'_> {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}
