//! Deck model and its versioned wire document

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::card::{Card, CardId};
use super::image::ContentHash;
use crate::error::{Error, Result};

/// Highest `schemaVersion` this build can read and the one it writes.
pub const DECK_SCHEMA_VERSION: u32 = 1;

/// A unique identifier for a deck, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeckId(Uuid);

impl DeckId {
    /// Create a new unique deck ID using UUID v7
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

impl Default for DeckId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeckId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Deck-wide presentation settings.
///
/// Unknown keys are kept in `extra` so documents written by newer clients
/// survive a round trip through this one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A deck of cards; the unit of synchronization
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    /// Stable identifier, never reused
    pub id: DeckId,
    /// Display name
    pub name: String,
    /// Ordered cards
    pub cards: Vec<Card>,
    /// Presentation settings
    pub style: Style,
    /// Last content change (Unix ms)
    pub updated_at: i64,
    /// Top-level document fields written by other clients
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Deck {
    /// Create an empty deck with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DeckId::new(),
            name: name.into(),
            cards: Vec::new(),
            style: Style::default(),
            updated_at: chrono::Utc::now().timestamp_millis(),
            extra: serde_json::Map::new(),
        }
    }

    /// Remote file name for this deck.
    #[must_use]
    pub fn file_name(&self) -> String {
        deck_file_name(&self.id)
    }

    #[must_use]
    pub fn to_document(&self) -> DeckDocument {
        DeckDocument {
            schema_version: DECK_SCHEMA_VERSION,
            id: self.id.to_string(),
            name: self.name.clone(),
            cards: self.cards.clone(),
            style: self.style.clone(),
            updated_at: self.updated_at,
            extra: self.extra.clone(),
        }
    }

    pub fn from_document(document: DeckDocument) -> Result<Self> {
        document.into_deck()
    }

    /// Canonical serialization; these are the exact bytes written remotely.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_document())?)
    }

    /// Parse and validate a serialized deck document.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::from_document(DeckDocument::parse(bytes)?)
    }

    pub fn content_hash(&self) -> Result<ContentHash> {
        Ok(ContentHash::of(&self.serialize()?))
    }

    /// Whether `other` differs from this deck only in `updated_at`.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.cards == other.cards
            && self.style == other.style
            && self.extra == other.extra
    }

    /// Distinct image references across all cards, in first-use order.
    #[must_use]
    pub fn image_references(&self) -> Vec<ContentHash> {
        let mut seen = HashSet::new();
        self.cards
            .iter()
            .flat_map(Card::image_references)
            .filter(|hash| seen.insert((*hash).clone()))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|card| &card.id == id)
    }
}

/// `deck-<id>.json`
#[must_use]
pub fn deck_file_name(id: &DeckId) -> String {
    format!("deck-{id}.json")
}

/// Versioned wire format of `deck-<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDocument {
    /// Absent in documents written before versioning; those are version 1.
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    pub id: String,
    pub name: String,
    pub cards: Vec<Card>,
    pub style: Style,
    pub updated_at: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

const fn legacy_schema_version() -> u32 {
    1
}

impl DeckDocument {
    /// Parse raw bytes, enforcing required fields and the supported version.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let document: Self = serde_json::from_slice(bytes)
            .map_err(|error| Error::InvalidDocument(error.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    fn validate(&self) -> Result<()> {
        if self.schema_version == 0 || self.schema_version > DECK_SCHEMA_VERSION {
            return Err(Error::InvalidDocument(format!(
                "unsupported schemaVersion {} (supported up to {DECK_SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        if self.id.parse::<DeckId>().is_err() {
            return Err(Error::InvalidDocument(format!(
                "id '{}' is not a UUID",
                self.id
            )));
        }
        if self.updated_at < 0 {
            return Err(Error::InvalidDocument(
                "updatedAt must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_deck(self) -> Result<Deck> {
        self.validate()?;
        let id = self
            .id
            .parse()
            .map_err(|_| Error::InvalidDocument(format!("id '{}' is not a UUID", self.id)))?;
        Ok(Deck {
            id,
            name: self.name,
            cards: self.cards,
            style: self.style,
            updated_at: self.updated_at,
            extra: self.extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotValue;
    use pretty_assertions::assert_eq;

    fn sample_deck() -> Deck {
        let hash = ContentHash::of(b"cat.png");
        let mut deck = Deck::new("Animals");
        deck.style.font_family = Some("Inter".to_string());
        deck.cards.push(
            Card::new("picture")
                .with_slot("title", "Cat")
                .with_slot("image", hash.clone()),
        );
        deck.cards.push(Card::new("picture").with_slot("image", hash));
        deck
    }

    #[test]
    fn test_deck_id_parse() {
        let id = DeckId::new();
        let parsed: DeckId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serialization_roundtrip_preserves_cards_and_style() {
        let deck = sample_deck();
        let parsed = Deck::parse(&deck.serialize().unwrap()).unwrap();
        assert_eq!(parsed, deck);
    }

    #[test]
    fn serialization_is_stable() {
        let deck = sample_deck();
        assert_eq!(deck.serialize().unwrap(), deck.serialize().unwrap());
        assert_eq!(deck.content_hash().unwrap(), deck.content_hash().unwrap());
    }

    #[test]
    fn document_uses_camel_case_wire_names() {
        let json: serde_json::Value =
            serde_json::from_slice(&sample_deck().serialize().unwrap()).unwrap();
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["style"]["fontFamily"], "Inter");
    }

    #[test]
    fn document_without_schema_version_is_v1() {
        let id = DeckId::new();
        let raw = format!(
            r#"{{"id":"{id}","name":"Old","cards":[],"style":{{}},"updatedAt":5}}"#
        );
        let deck = Deck::parse(raw.as_bytes()).unwrap();
        assert_eq!(deck.id, id);
        assert_eq!(deck.updated_at, 5);
    }

    #[test]
    fn document_from_newer_schema_is_rejected() {
        let id = DeckId::new();
        let raw = format!(
            r#"{{"schemaVersion":2,"id":"{id}","name":"New","cards":[],"style":{{}},"updatedAt":5}}"#
        );
        let error = Deck::parse(raw.as_bytes()).unwrap_err();
        assert!(error.to_string().contains("schemaVersion"));
    }

    #[test]
    fn document_missing_required_fields_is_rejected() {
        let id = DeckId::new();
        let raw = format!(r#"{{"id":"{id}","name":"No cards","updatedAt":5}}"#);
        assert!(matches!(
            Deck::parse(raw.as_bytes()),
            Err(Error::InvalidDocument(_))
        ));
        assert!(Deck::parse(b"not json").is_err());
    }

    #[test]
    fn unknown_style_keys_survive_roundtrip() {
        let id = DeckId::new();
        let raw = format!(
            r#"{{"id":"{id}","name":"S","cards":[],"style":{{"cornerRadius":8}},"updatedAt":1}}"#
        );
        let deck = Deck::parse(raw.as_bytes()).unwrap();
        assert_eq!(deck.style.extra["cornerRadius"], 8);
        let json: serde_json::Value = serde_json::from_slice(&deck.serialize().unwrap()).unwrap();
        assert_eq!(json["style"]["cornerRadius"], 8);
    }

    #[test]
    fn unknown_document_fields_survive_roundtrip() {
        let id = DeckId::new();
        let card_id = CardId::new();
        let raw = format!(
            r#"{{"id":"{id}","name":"Shared","description":"From the web app","cards":[{{"id":"{card_id}","data":{{}},"rotation":90,"borderColor":"red"}}],"style":{{}},"updatedAt":5}}"#
        );
        let deck = Deck::parse(raw.as_bytes()).unwrap();
        assert_eq!(deck.extra["description"], "From the web app");

        let json: serde_json::Value = serde_json::from_slice(&deck.serialize().unwrap()).unwrap();
        assert_eq!(json["description"], "From the web app");
        assert_eq!(json["cards"][0]["rotation"], 90);
        assert_eq!(json["cards"][0]["borderColor"], "red");
        assert!(json["cards"][0].get("layout").is_none());

        let reparsed = Deck::parse(&deck.serialize().unwrap()).unwrap();
        assert_eq!(reparsed, deck);
        assert_eq!(reparsed.serialize().unwrap(), deck.serialize().unwrap());
    }

    #[test]
    fn same_content_compares_unknown_fields() {
        let deck = sample_deck();
        let mut annotated = deck.clone();
        annotated
            .extra
            .insert("description".to_string(), serde_json::json!("notes"));
        assert!(!deck.same_content(&annotated));
    }

    #[test]
    fn image_references_are_deduplicated() {
        let deck = sample_deck();
        assert_eq!(deck.image_references(), vec![ContentHash::of(b"cat.png")]);
    }

    #[test]
    fn same_content_ignores_timestamp() {
        let deck = sample_deck();
        let mut later = deck.clone();
        later.updated_at += 10_000;
        assert!(deck.same_content(&later));

        later.cards[0]
            .data
            .insert("title".to_string(), SlotValue::text("Dog"));
        assert!(!deck.same_content(&later));
    }

    #[test]
    fn file_name_follows_convention() {
        let deck = Deck::new("x");
        assert_eq!(deck.file_name(), format!("deck-{}.json", deck.id));
    }
}
