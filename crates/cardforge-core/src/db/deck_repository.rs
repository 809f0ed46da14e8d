//! Deck repository implementation

use crate::error::{Error, Result};
use crate::models::{Deck, DeckId};
use libsql::Connection;

/// Cheap change detector over the deck table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeckFingerprint {
    pub count: i64,
    pub max_updated_at: i64,
}

/// Trait for deck storage operations (async)
#[allow(async_fn_in_trait)]
pub trait DeckRepository {
    /// All decks in queue order
    async fn list(&self) -> Result<Vec<Deck>>;

    /// Get a deck by ID
    async fn get(&self, id: &DeckId) -> Result<Option<Deck>>;

    /// Insert a new deck at the end of the queue
    async fn insert(&self, deck: &Deck) -> Result<()>;

    /// Insert or update a deck, keeping its queue position
    async fn save(&self, deck: &Deck) -> Result<()>;

    /// Remove a deck. Returns whether a row was removed.
    async fn delete(&self, id: &DeckId) -> Result<bool>;

    /// Deck ids in queue order
    async fn ids(&self) -> Result<Vec<DeckId>>;

    async fn fingerprint(&self) -> Result<DeckFingerprint>;
}

/// libSQL implementation of `DeckRepository`
pub struct LibSqlDeckRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDeckRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_deck(row: &libsql::Row) -> Result<Deck> {
        let document: String = row.get(0)?;
        Deck::parse(document.as_bytes())
    }

    fn document_text(deck: &Deck) -> Result<String> {
        String::from_utf8(deck.serialize()?)
            .map_err(|error| Error::Database(format!("deck document is not UTF-8: {error}")))
    }
}

impl DeckRepository for LibSqlDeckRepository<'_> {
    async fn list(&self) -> Result<Vec<Deck>> {
        let mut rows = self
            .conn
            .query(
                "SELECT document FROM decks ORDER BY position ASC, created_at ASC",
                (),
            )
            .await?;

        let mut decks = Vec::new();
        while let Some(row) = rows.next().await? {
            decks.push(Self::parse_deck(&row)?);
        }
        Ok(decks)
    }

    async fn get(&self, id: &DeckId) -> Result<Option<Deck>> {
        let mut rows = self
            .conn
            .query("SELECT document FROM decks WHERE id = ?", [id.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_deck(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, deck: &Deck) -> Result<()> {
        let document = Self::document_text(deck)?;
        let now = chrono::Utc::now().timestamp_millis();

        self.conn
            .execute(
                "INSERT INTO decks (id, name, position, document, updated_at, created_at)
                 VALUES (?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM decks), ?, ?, ?)",
                libsql::params![
                    deck.id.as_str(),
                    deck.name.as_str(),
                    document,
                    deck.updated_at,
                    now
                ],
            )
            .await?;
        Ok(())
    }

    async fn save(&self, deck: &Deck) -> Result<()> {
        let document = Self::document_text(deck)?;
        let now = chrono::Utc::now().timestamp_millis();

        self.conn
            .execute(
                "INSERT INTO decks (id, name, position, document, updated_at, created_at)
                 VALUES (?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM decks), ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     document = excluded.document,
                     updated_at = excluded.updated_at",
                libsql::params![
                    deck.id.as_str(),
                    deck.name.as_str(),
                    document,
                    deck.updated_at,
                    now
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &DeckId) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM decks WHERE id = ?", [id.as_str()])
            .await?;
        Ok(affected > 0)
    }

    async fn ids(&self) -> Result<Vec<DeckId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM decks ORDER BY position ASC, created_at ASC",
                (),
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            ids.push(
                id.parse()
                    .map_err(|_| Error::Database(format!("invalid deck id '{id}'")))?,
            );
        }
        Ok(ids)
    }

    async fn fingerprint(&self) -> Result<DeckFingerprint> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*), COALESCE(MAX(updated_at), 0) FROM decks", ())
            .await?;

        match rows.next().await? {
            Some(row) => Ok(DeckFingerprint {
                count: row.get(0)?,
                max_updated_at: row.get(1)?,
            }),
            None => Ok(DeckFingerprint::default()),
        }
    }
}
