//! Remote file metadata and name conventions

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::deck::DeckId;
use super::image::{image_extension_for_mime, ContentHash};

static DECK_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^deck-(.+)\.json$").expect("Invalid regex"));

static IMAGE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^img-([0-9a-fA-F]{64})\.([A-Za-z0-9+]+)$").expect("Invalid regex")
});

/// A file as reported by the remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Server-assigned file id
    pub id: String,
    /// File name in the flat remote namespace
    pub name: String,
    /// Server-reported modification time (Unix ms)
    pub modified_at: i64,
}

impl RemoteFile {
    #[must_use]
    pub fn kind(&self) -> RemoteFileKind {
        RemoteFileKind::classify(&self.name)
    }
}

/// Which family a remote file belongs to, decided by its name alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFileKind {
    /// `deck-<deckId>.json`
    Deck(DeckId),
    /// `img-<hash>.<ext>`
    Image { hash: ContentHash, extension: String },
    /// Anything else sharing the namespace
    Other,
}

impl RemoteFileKind {
    #[must_use]
    pub fn classify(name: &str) -> Self {
        if let Some(captures) = DECK_FILE.captures(name) {
            return captures[1]
                .parse()
                .map_or(Self::Other, Self::Deck);
        }
        if let Some(captures) = IMAGE_FILE.captures(name) {
            if let Ok(hash) = captures[1].parse() {
                return Self::Image {
                    hash,
                    extension: captures[2].to_string(),
                };
            }
        }
        Self::Other
    }
}

/// `img-<hash>.<ext>`, extension derived from the MIME type.
#[must_use]
pub fn image_file_name(hash: &ContentHash, mime_type: &str) -> String {
    format!("img-{hash}.{}", image_extension_for_mime(mime_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deck_file_name;

    #[test]
    fn classifies_deck_files() {
        let id = DeckId::new();
        assert_eq!(
            RemoteFileKind::classify(&deck_file_name(&id)),
            RemoteFileKind::Deck(id)
        );
    }

    #[test]
    fn deck_file_with_bad_id_is_other() {
        assert_eq!(
            RemoteFileKind::classify("deck-not-a-uuid.json"),
            RemoteFileKind::Other
        );
    }

    #[test]
    fn classifies_image_files() {
        let hash = ContentHash::of(b"pixels");
        let name = image_file_name(&hash, "image/png");
        assert_eq!(name, format!("img-{hash}.png"));
        assert_eq!(
            RemoteFileKind::classify(&name),
            RemoteFileKind::Image {
                hash,
                extension: "png".to_string()
            }
        );
    }

    #[test]
    fn unrelated_names_are_other() {
        assert_eq!(RemoteFileKind::classify("notes.txt"), RemoteFileKind::Other);
        assert_eq!(RemoteFileKind::classify("img-abc.png"), RemoteFileKind::Other);
    }
}
