//! Conflict resolution audit log

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::Result;
use crate::models::{ConflictStrategy, DeckId, SyncConflict};
use libsql::Connection;

/// Storage for resolved sync conflicts (async)
#[allow(async_fn_in_trait)]
pub trait ConflictLogRepository {
    /// Append a resolution record
    async fn record(
        &self,
        deck_id: &DeckId,
        local_updated_at: i64,
        remote_modified_at: i64,
        strategy: ConflictStrategy,
    ) -> Result<SyncConflict>;

    /// Most recent resolutions first
    async fn list(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `ConflictLogRepository`
pub struct LibSqlConflictLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlConflictLogRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ConflictLogRepository for LibSqlConflictLogRepository<'_> {
    async fn record(
        &self,
        deck_id: &DeckId,
        local_updated_at: i64,
        remote_modified_at: i64,
        strategy: ConflictStrategy,
    ) -> Result<SyncConflict> {
        let resolved_at = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO sync_conflicts (deck_id, local_updated_at, remote_modified_at, resolved_at, strategy)
                 VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    deck_id.as_str(),
                    local_updated_at,
                    remote_modified_at,
                    resolved_at,
                    strategy.as_str()
                ],
            )
            .await?;

        Ok(SyncConflict {
            id: self.conn.last_insert_rowid(),
            deck_id: deck_id.as_str(),
            local_updated_at,
            remote_modified_at,
            resolved_at,
            strategy,
        })
    }

    async fn list(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, deck_id, local_updated_at, remote_modified_at, resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                [limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            let strategy: String = row.get(5)?;
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                deck_id: row.get(1)?,
                local_updated_at: row.get(2)?,
                remote_modified_at: row.get(3)?,
                resolved_at: row.get(4)?,
                strategy: strategy.parse()?,
            });
        }
        Ok(conflicts)
    }
}
