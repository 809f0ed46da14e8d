//! Content hash and image MIME helpers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::sha256_hex;

/// Prefix marking a card slot string as a stored image reference.
pub const REFERENCE_PREFIX: &str = "ref:";

const HASH_HEX_LEN: usize = 64;

/// SHA-256 identity of an image's canonical bytes, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash raw bytes.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(sha256_hex(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as a `ref:<hash>` token for embedding in card data.
    #[must_use]
    pub fn to_reference_token(&self) -> String {
        format!("{REFERENCE_PREFIX}{}", self.0)
    }

    /// Parse a `ref:<hash>` token. Returns `None` for anything else.
    ///
    /// Only the canonical lowercase spelling is a reference; other spellings
    /// stay inline text so they are written back exactly as read.
    #[must_use]
    pub fn from_reference_token(token: &str) -> Option<Self> {
        let hex = token.strip_prefix(REFERENCE_PREFIX)?;
        let hash: Self = hex.parse().ok()?;
        (hash.0 == hex).then_some(hash)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let candidate = s.trim().to_ascii_lowercase();
        if candidate.len() != HASH_HEX_LEN || !candidate.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!(
                "'{s}' is not a SHA-256 content hash"
            )));
        }
        Ok(Self(candidate))
    }
}

impl TryFrom<String> for ContentHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

/// Image bytes held by the content-addressable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Hash of `bytes`
    pub hash: ContentHash,
    /// MIME type recorded at import time
    pub mime_type: String,
    /// Raw decoded image bytes
    pub bytes: Vec<u8>,
}

/// File extension used for `img-<hash>.<ext>` names.
#[must_use]
pub fn image_extension_for_mime(mime_type: &str) -> String {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => "png".to_string(),
        "image/jpeg" | "image/jpg" => "jpg".to_string(),
        "image/gif" => "gif".to_string(),
        "image/webp" => "webp".to_string(),
        "image/svg+xml" => "svg".to_string(),
        "image/bmp" => "bmp".to_string(),
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|extensions| extensions.first())
            .map_or_else(|| "bin".to_string(), |ext| (*ext).to_string()),
    }
}

/// MIME type guessed from a file extension.
#[must_use]
pub fn mime_for_extension(extension: &str) -> String {
    mime_guess::from_ext(extension)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
