//! Per-pass view of the remote namespace

use std::collections::HashMap;

use crate::models::{ContentHash, DeckId, RemoteFile, RemoteFileKind};

/// Built from a single `list_files()` call and kept current as the pass
/// writes and deletes, so each phase sees what earlier phases did.
#[derive(Debug, Default)]
pub struct RemoteIndex {
    /// Several files can share a deck name remotely; newest first.
    decks: HashMap<DeckId, Vec<RemoteFile>>,
    /// Deck ids in listing order, for deterministic discovery.
    deck_order: Vec<DeckId>,
    images: HashMap<ContentHash, (RemoteFile, String)>,
}

impl RemoteIndex {
    #[must_use]
    pub fn from_listing(files: Vec<RemoteFile>) -> Self {
        let mut index = Self::default();
        for file in files {
            match file.kind() {
                RemoteFileKind::Deck(id) => index.push_deck(id, file),
                RemoteFileKind::Image { hash, extension } => {
                    index.images.insert(hash, (file, extension));
                }
                RemoteFileKind::Other => {
                    tracing::trace!(name = %file.name, "Ignoring unrelated remote file");
                }
            }
        }
        for files in index.decks.values_mut() {
            files.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        }
        index
    }

    fn push_deck(&mut self, id: DeckId, file: RemoteFile) {
        let files = self.decks.entry(id).or_default();
        if files.is_empty() {
            self.deck_order.push(id);
        }
        files.push(file);
    }

    /// Most recently modified remote file for a deck.
    #[must_use]
    pub fn deck(&self, id: &DeckId) -> Option<&RemoteFile> {
        self.decks.get(id).and_then(|files| files.first())
    }

    /// Every remote file carrying this deck's name.
    #[must_use]
    pub fn deck_files(&self, id: &DeckId) -> &[RemoteFile] {
        self.decks.get(id).map_or(&[], Vec::as_slice)
    }

    /// Deck ids present remotely, in listing order.
    pub fn deck_ids(&self) -> impl Iterator<Item = &DeckId> {
        self.deck_order
            .iter()
            .filter(|id| self.decks.contains_key(id))
    }

    pub fn upsert_deck(&mut self, id: DeckId, file: RemoteFile) {
        let files = self.decks.entry(id).or_default();
        if files.is_empty() && !self.deck_order.contains(&id) {
            self.deck_order.push(id);
        }
        files.retain(|existing| existing.id != file.id);
        files.insert(0, file);
    }

    pub fn remove_deck(&mut self, id: &DeckId) {
        self.decks.remove(id);
    }

    #[must_use]
    pub fn image(&self, hash: &ContentHash) -> Option<&(RemoteFile, String)> {
        self.images.get(hash)
    }

    #[must_use]
    pub fn has_image(&self, hash: &ContentHash) -> bool {
        self.images.contains_key(hash)
    }

    pub fn upsert_image(&mut self, hash: ContentHash, file: RemoteFile, extension: String) {
        self.images.insert(hash, (file, extension));
    }

    #[must_use]
    pub fn deck_count(&self) -> usize {
        self.decks.len()
    }

    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}
