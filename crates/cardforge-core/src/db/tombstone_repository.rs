//! Persisted set of locally deleted decks awaiting remote deletion

use crate::error::{Error, Result};
use crate::models::DeckId;
use libsql::Connection;

/// Tombstone storage operations (async)
#[allow(async_fn_in_trait)]
pub trait TombstoneRepository {
    /// Record a local deletion. Returns `false` when already tombstoned.
    async fn record_deletion(&self, id: &DeckId) -> Result<bool>;

    /// Tombstoned deck ids in the order they were deleted
    async fn pending_deletions(&self) -> Result<Vec<DeckId>>;

    /// Remove a single tombstone
    async fn clear(&self, id: &DeckId) -> Result<()>;

    async fn contains(&self, id: &DeckId) -> Result<bool>;
}

/// libSQL implementation of `TombstoneRepository`
pub struct LibSqlTombstoneRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTombstoneRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

pub(crate) const RECORD_DELETION_SQL: &str =
    "INSERT OR IGNORE INTO tombstones (deck_id, deleted_at) VALUES (?, ?)";

impl TombstoneRepository for LibSqlTombstoneRepository<'_> {
    async fn record_deletion(&self, id: &DeckId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();
        let inserted = self
            .conn
            .execute(RECORD_DELETION_SQL, libsql::params![id.as_str(), now])
            .await?;
        Ok(inserted > 0)
    }

    async fn pending_deletions(&self) -> Result<Vec<DeckId>> {
        let mut rows = self
            .conn
            .query("SELECT deck_id FROM tombstones ORDER BY seq ASC", ())
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            ids.push(
                id.parse()
                    .map_err(|_| Error::Database(format!("invalid tombstone id '{id}'")))?,
            );
        }
        Ok(ids)
    }

    async fn clear(&self, id: &DeckId) -> Result<()> {
        self.conn
            .execute("DELETE FROM tombstones WHERE deck_id = ?", [id.as_str()])
            .await?;
        Ok(())
    }

    async fn contains(&self, id: &DeckId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM tombstones WHERE deck_id = ?)",
                [id.as_str()],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn record_has_set_semantics() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlTombstoneRepository::new(db.connection());
        let id = DeckId::new();

        assert!(repo.record_deletion(&id).await.unwrap());
        assert!(!repo.record_deletion(&id).await.unwrap());
        assert_eq!(repo.pending_deletions().await.unwrap(), vec![id]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_deletions_keep_insertion_order() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlTombstoneRepository::new(db.connection());
        let ids = [DeckId::new(), DeckId::new(), DeckId::new()];

        for id in ids.iter().rev() {
            repo.record_deletion(id).await.unwrap();
        }
        let expected: Vec<DeckId> = ids.iter().rev().copied().collect();
        assert_eq!(repo.pending_deletions().await.unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_removes_single_entry() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlTombstoneRepository::new(db.connection());
        let keep = DeckId::new();
        let drop = DeckId::new();

        repo.record_deletion(&keep).await.unwrap();
        repo.record_deletion(&drop).await.unwrap();
        repo.clear(&drop).await.unwrap();

        assert!(repo.contains(&keep).await.unwrap());
        assert!(!repo.contains(&drop).await.unwrap());
        assert_eq!(repo.pending_deletions().await.unwrap(), vec![keep]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tombstones_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tombstones.db");
        let id = DeckId::new();

        {
            let db = Database::open(&path).await.unwrap();
            LibSqlTombstoneRepository::new(db.connection())
                .record_deletion(&id)
                .await
                .unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        let repo = LibSqlTombstoneRepository::new(db.connection());
        assert_eq!(repo.pending_deletions().await.unwrap(), vec![id]);
    }
}
