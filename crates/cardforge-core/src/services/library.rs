//! Shared local library service used by the sync engine and clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::db::{
    run_in_transaction, ConflictLogRepository, Database, DeckFingerprint, DeckRepository,
    LibSqlConflictLogRepository, LibSqlDeckRepository, LibSqlSettingsRepository,
    LibSqlTombstoneRepository, SettingsRepository, TombstoneRepository, RECORD_DELETION_SQL,
};
use crate::models::{
    Card, CardId, ConflictStrategy, ContentHash, Deck, DeckId, Settings, StoredImage,
    SyncConflict,
};
use crate::storage::{ContentStore, ImagePayload};
use crate::{Error, Result};

/// Thread-safe service over the local deck library.
///
/// Every user-facing mutation bumps a revision counter that auto-sync
/// listens to. Writes made on behalf of the sync engine do not.
#[derive(Clone)]
pub struct LibraryService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    revisions: Arc<watch::Sender<u64>>,
}

impl LibraryService {
    /// Open a library at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened library at {}", db_path.display());
        Ok(Self::from_database(db, Some(db_path)))
    }

    /// Open an in-memory library (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db, None))
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Self {
        let (revisions, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path,
            revisions: Arc::new(revisions),
        }
    }

    #[must_use]
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Content-addressable image store sharing this library's database.
    #[must_use]
    pub fn content_store(&self) -> ContentStore {
        ContentStore::new(Arc::clone(&self.db))
    }

    /// Receiver bumped on every local user mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }

    /// Signal a change made outside this process (e.g. another CLI invocation).
    pub fn notify_external_change(&self) {
        self.notify();
    }

    fn notify(&self) {
        self.revisions.send_modify(|revision| *revision += 1);
    }

    // Decks

    /// All decks in sync queue order.
    pub async fn list_decks(&self) -> Result<Vec<Deck>> {
        let db = self.db.lock().await;
        LibSqlDeckRepository::new(db.connection()).list().await
    }

    pub async fn get_deck(&self, id: &DeckId) -> Result<Option<Deck>> {
        let db = self.db.lock().await;
        LibSqlDeckRepository::new(db.connection()).get(id).await
    }

    async fn require_deck(&self, id: &DeckId) -> Result<Deck> {
        self.get_deck(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("deck {id}")))
    }

    pub async fn deck_ids(&self) -> Result<Vec<DeckId>> {
        let db = self.db.lock().await;
        LibSqlDeckRepository::new(db.connection()).ids().await
    }

    pub async fn create_deck(&self, name: &str) -> Result<Deck> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Deck name cannot be empty".to_string()));
        }

        let deck = Deck::new(name);
        {
            let db = self.db.lock().await;
            LibSqlDeckRepository::new(db.connection())
                .insert(&deck)
                .await?;
        }
        self.notify();
        Ok(deck)
    }

    /// Persist a locally edited deck.
    ///
    /// `updated_at` advances only when name, cards or style changed, and
    /// always moves forward even if the wall clock went backwards.
    pub async fn save_deck(&self, deck: &Deck) -> Result<Deck> {
        let db = self.db.lock().await;
        let repo = LibSqlDeckRepository::new(db.connection());
        let previous = repo.get(&deck.id).await?;

        if previous
            .as_ref()
            .is_some_and(|previous| previous.same_content(deck))
        {
            tracing::debug!(deck = %deck.id, "Save without content change; keeping timestamp");
            return previous.ok_or_else(|| Error::NotFound(format!("deck {}", deck.id)));
        }

        let now = chrono::Utc::now().timestamp_millis();
        let floor = previous.as_ref().map_or(deck.updated_at, |previous| {
            previous.updated_at.saturating_add(1)
        });
        let mut saved = deck.clone();
        saved.updated_at = now.max(floor);
        repo.save(&saved).await?;
        drop(db);

        self.notify();
        Ok(saved)
    }

    pub async fn rename_deck(&self, id: &DeckId, name: &str) -> Result<Deck> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Deck name cannot be empty".to_string()));
        }
        let mut deck = self.require_deck(id).await?;
        name.clone_into(&mut deck.name);
        self.save_deck(&deck).await
    }

    /// Delete locally and record a tombstone in the same transaction.
    pub async fn delete_deck(&self, id: &DeckId) -> Result<()> {
        {
            let db = self.db.lock().await;
            let repo = LibSqlDeckRepository::new(db.connection());
            if repo.get(id).await?.is_none() {
                return Err(Error::NotFound(format!("deck {id}")));
            }

            let now = chrono::Utc::now().timestamp_millis();
            run_in_transaction(
                db.connection(),
                &[
                    ("DELETE FROM decks WHERE id = ?", vec![id.as_str().into()]),
                    (
                        RECORD_DELETION_SQL,
                        vec![id.as_str().into(), now.into()],
                    ),
                ],
            )
            .await?;
        }
        tracing::info!(deck = %id, "Deleted deck; remote copy queued for deletion");
        self.notify();
        Ok(())
    }

    // Cards

    /// Append a card, moving any inline base64 images into the content store.
    pub async fn add_card(&self, deck_id: &DeckId, mut card: Card) -> Result<Deck> {
        let mut deck = self.require_deck(deck_id).await?;
        self.content_store().internalize_card(&mut card).await?;
        deck.cards.push(card);
        self.save_deck(&deck).await
    }

    pub async fn remove_card(&self, deck_id: &DeckId, card_id: &CardId) -> Result<Deck> {
        let mut deck = self.require_deck(deck_id).await?;
        let before = deck.cards.len();
        deck.cards.retain(|card| &card.id != card_id);
        if deck.cards.len() == before {
            return Err(Error::NotFound(format!("card {card_id}")));
        }
        self.save_deck(&deck).await
    }

    /// Insert a copy of a card right after the original.
    pub async fn duplicate_card(&self, deck_id: &DeckId, card_id: &CardId) -> Result<(Deck, CardId)> {
        let mut deck = self.require_deck(deck_id).await?;
        let index = deck
            .cards
            .iter()
            .position(|card| &card.id == card_id)
            .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
        let copy = deck.cards[index].duplicate();
        let copy_id = copy.id;
        deck.cards.insert(index + 1, copy);
        Ok((self.save_deck(&deck).await?, copy_id))
    }

    // Images

    pub async fn import_image(&self, payload: ImagePayload) -> Result<ContentHash> {
        self.content_store().put(payload).await
    }

    pub async fn image(&self, hash: &ContentHash) -> Result<Option<StoredImage>> {
        self.content_store().get(hash).await
    }

    // Sync engine support. None of these notify auto-sync.

    /// Overwrite a local deck with a remote copy, keeping its timestamp.
    pub async fn replace_deck_from_remote(&self, deck: &Deck) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlDeckRepository::new(db.connection()).save(deck).await
    }

    /// Append a deck discovered remotely. Returns `false` if the id already exists.
    pub async fn insert_imported_deck(&self, deck: &Deck) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlDeckRepository::new(db.connection());
        if repo.get(&deck.id).await?.is_some() {
            return Ok(false);
        }
        repo.insert(deck).await?;
        Ok(true)
    }

    pub async fn tombstones(&self) -> Result<Vec<DeckId>> {
        let db = self.db.lock().await;
        LibSqlTombstoneRepository::new(db.connection())
            .pending_deletions()
            .await
    }

    pub async fn clear_tombstone(&self, id: &DeckId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlTombstoneRepository::new(db.connection())
            .clear(id)
            .await
    }

    pub async fn is_tombstoned(&self, id: &DeckId) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlTombstoneRepository::new(db.connection())
            .contains(id)
            .await
    }

    pub async fn record_conflict(
        &self,
        deck_id: &DeckId,
        local_updated_at: i64,
        remote_modified_at: i64,
        strategy: ConflictStrategy,
    ) -> Result<SyncConflict> {
        let db = self.db.lock().await;
        LibSqlConflictLogRepository::new(db.connection())
            .record(deck_id, local_updated_at, remote_modified_at, strategy)
            .await
    }

    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        LibSqlConflictLogRepository::new(db.connection())
            .list(limit)
            .await
    }

    // Settings

    pub async fn settings(&self) -> Result<Settings> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection()).load().await
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection())
            .save(settings)
            .await
    }

    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<Settings> {
        let mut settings = self.settings().await?;
        settings.sync_enabled = enabled;
        self.save_settings(&settings).await?;
        if enabled {
            self.notify();
        }
        Ok(settings)
    }

    pub async fn mark_synced(&self, at: i64) -> Result<()> {
        let mut settings = self.settings().await?;
        settings.last_synced_at = Some(at);
        self.save_settings(&settings).await
    }

    /// Cheap snapshot used to notice edits made by other processes.
    pub async fn fingerprint(&self) -> Result<(DeckFingerprint, usize)> {
        let db = self.db.lock().await;
        let decks = LibSqlDeckRepository::new(db.connection())
            .fingerprint()
            .await?;
        let tombstones = LibSqlTombstoneRepository::new(db.connection())
            .pending_deletions()
            .await?
            .len();
        Ok((decks, tombstones))
    }
}
