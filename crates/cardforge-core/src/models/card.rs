//! Card model

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::image::ContentHash;

/// A unique identifier for a card, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardId(Uuid);

impl CardId {
    /// Create a new unique card ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Content of one card slot.
///
/// On the wire a reference is the string `ref:<hash>`, any other string is
/// inline content, and non-string JSON values are carried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    /// Inline text or an inline image (e.g. a data URL)
    Inline(String),
    /// Image stored in the content-addressable store
    Reference(ContentHash),
    /// Any other JSON value (numbers, flags, nested metadata)
    Other(serde_json::Value),
}

impl SlotValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Inline(value.into())
    }

    #[must_use]
    pub const fn reference(&self) -> Option<&ContentHash> {
        match self {
            Self::Reference(hash) => Some(hash),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for SlotValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => ContentHash::from_reference_token(&text)
                .map_or(Self::Inline(text), Self::Reference),
            other => Self::Other(other),
        }
    }
}

impl From<ContentHash> for SlotValue {
    fn from(value: ContentHash) -> Self {
        Self::Reference(value)
    }
}

impl Serialize for SlotValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Inline(text) => serializer.serialize_str(text),
            Self::Reference(hash) => serializer.serialize_str(&hash.to_reference_token()),
            Self::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SlotValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// A card inside a deck
///
/// Rendering metadata this build does not model (rotation, borders, ...)
/// lands in `extra` and is written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Stable identifier used for re-ordering and duplication
    pub id: CardId,
    /// Rendering layout/template name; empty when the writer set none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub layout: String,
    /// Slot name to slot content
    #[serde(default)]
    pub data: BTreeMap<String, SlotValue>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Card {
    #[must_use]
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            id: CardId::new(),
            layout: layout.into(),
            data: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<SlotValue>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Copy of this card with a fresh id.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            id: CardId::new(),
            layout: self.layout.clone(),
            data: self.data.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Image references in slot-name order.
    pub fn image_references(&self) -> impl Iterator<Item = &ContentHash> {
        self.data.values().filter_map(SlotValue::reference)
    }
}

impl From<String> for SlotValue {
    fn from(value: String) -> Self {
        Self::Inline(value)
    }
}

impl From<&str> for SlotValue {
    fn from(value: &str) -> Self {
        Self::Inline(value.to_string())
    }
}
