//! Content-addressable image store.
//!
//! Images are keyed by the SHA-256 of their raw bytes. Data URLs are unwrapped
//! and base64-decoded before hashing, so the same picture pasted inline and
//! uploaded from disk collapses to one stored object.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::sync::Mutex;

use crate::db::{Database, ImageRepository, LibSqlImageRepository};
use crate::error::{Error, Result};
use crate::models::{Card, ContentHash, SlotValue, StoredImage};

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Canonicalized image content ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime_type: String,
    bytes: Vec<u8>,
}

impl ImagePayload {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: normalize_mime(&mime_type.into()),
            bytes,
        }
    }

    /// Decode a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .trim()
            .strip_prefix(DATA_URL_SCHEME)
            .ok_or_else(|| Error::InvalidInput("image is not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::InvalidInput("data URL has no payload".to_string()))?;
        let mime_type = header.strip_suffix(BASE64_MARKER).ok_or_else(|| {
            Error::InvalidInput("only base64 data URLs can hold images".to_string())
        })?;

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|error| Error::InvalidInput(format!("invalid base64 image data: {error}")))?;
        Ok(Self::from_bytes(bytes, mime_type))
    }

    /// Read an image file, guessing its MIME type from the extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mime_type = mime_guess::from_path(path).first_or_octet_stream();
        Ok(Self::from_bytes(bytes, mime_type.essence_str()))
    }

    #[must_use]
    pub fn hash(&self) -> ContentHash {
        ContentHash::of(&self.bytes)
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn into_stored(self) -> StoredImage {
        StoredImage {
            hash: self.hash(),
            mime_type: self.mime_type,
            bytes: self.bytes,
        }
    }
}

fn normalize_mime(mime_type: &str) -> String {
    let trimmed = mime_type.trim();
    if trimmed.is_empty() {
        "application/octet-stream".to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Whether an inline slot value is an embedded base64 image.
#[must_use]
pub fn is_image_data_url(value: &str) -> bool {
    value.starts_with("data:image/") && value.contains(";base64,")
}

/// Render stored bytes back into a `data:` URL.
#[must_use]
pub fn to_data_url(image: &StoredImage) -> String {
    format!(
        "{DATA_URL_SCHEME}{}{BASE64_MARKER},{}",
        image.mime_type,
        STANDARD.encode(&image.bytes)
    )
}

/// What a card slot resolves to for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSlot {
    Inline(String),
    Image(StoredImage),
    /// Referenced content is not stored locally; render the slot empty.
    Missing(ContentHash),
    Other(serde_json::Value),
}

/// Deduplicated image blobs backed by the local database.
#[derive(Clone)]
pub struct ContentStore {
    db: Arc<Mutex<Database>>,
}

impl ContentStore {
    pub(crate) const fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Store content under its hash. Re-storing identical content is a no-op.
    pub async fn put(&self, payload: ImagePayload) -> Result<ContentHash> {
        let image = payload.into_stored();
        let db = self.db.lock().await;
        let repo = LibSqlImageRepository::new(db.connection());
        if repo.put(&image).await? {
            tracing::debug!(hash = %image.hash, bytes = image.bytes.len(), "Stored new image blob");
        }
        Ok(image.hash)
    }

    pub async fn get(&self, hash: &ContentHash) -> Result<Option<StoredImage>> {
        let db = self.db.lock().await;
        LibSqlImageRepository::new(db.connection()).get(hash).await
    }

    pub async fn contains(&self, hash: &ContentHash) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlImageRepository::new(db.connection())
            .contains(hash)
            .await
    }

    pub async fn delete(&self, hash: &ContentHash) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlImageRepository::new(db.connection())
            .delete(hash)
            .await
    }

    pub async fn list_hashes(&self) -> Result<Vec<ContentHash>> {
        let db = self.db.lock().await;
        LibSqlImageRepository::new(db.connection())
            .list_hashes()
            .await
    }

    /// Resolve a slot for display. Missing content is not an error.
    pub async fn resolve(&self, slot: &SlotValue) -> Result<ResolvedSlot> {
        match slot {
            SlotValue::Inline(text) => Ok(ResolvedSlot::Inline(text.clone())),
            SlotValue::Other(value) => Ok(ResolvedSlot::Other(value.clone())),
            SlotValue::Reference(hash) => Ok(self
                .get(hash)
                .await?
                .map_or_else(|| ResolvedSlot::Missing(hash.clone()), ResolvedSlot::Image)),
        }
    }

    /// Move inline base64 images into the store, leaving references behind.
    ///
    /// Returns how many slots were rewritten.
    pub async fn internalize_card(&self, card: &mut Card) -> Result<usize> {
        let mut rewritten = 0;
        for value in card.data.values_mut() {
            let SlotValue::Inline(text) = value else {
                continue;
            };
            if !is_image_data_url(text) {
                continue;
            }
            let hash = self.put(ImagePayload::from_data_url(text)?).await?;
            *value = SlotValue::Reference(hash);
            rewritten += 1;
        }
        Ok(rewritten)
    }
}
