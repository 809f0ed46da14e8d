//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for a local libSQL file
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_libsql(db).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_libsql(db).await
    }

    async fn from_libsql(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self { _db: db, conn };
        database.configure().await?;
        migrations::run(&database.conn).await?;
        Ok(database)
    }

    /// Configure `SQLite` pragmas
    async fn configure(&self) -> Result<()> {
        // WAL is unavailable for in-memory databases; ignore failures
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Run `statements` inside one transaction, rolling back on the first failure.
pub(crate) async fn run_in_transaction(
    conn: &Connection,
    statements: &[(&str, Vec<libsql::Value>)],
) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for (sql, params) in statements {
        if let Err(e) = conn.execute(sql, params.clone()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }
    Ok(())
}
