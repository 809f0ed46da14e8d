use std::path::{Path, PathBuf};

use cardforge_core::services::LibraryService;
use cardforge_core::storage::ImagePayload;
use cardforge_core::{Card, SlotValue};

use crate::cli::CardCommands;
use crate::commands::common::{open_library, resolve_card, resolve_deck, short_id};
use crate::error::CliError;

/// Parsed `NAME=VALUE` slot argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotInput {
    Text(String),
    /// `@path` imports the file into the content store
    ImageFile(PathBuf),
}

pub fn parse_slot_arg(raw: &str) -> Result<(String, SlotInput), CliError> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidSlot(raw.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidSlot(raw.to_string()));
    }

    let input = match value.strip_prefix('@') {
        Some(path) if !path.trim().is_empty() => SlotInput::ImageFile(PathBuf::from(path.trim())),
        _ => SlotInput::Text(value.to_string()),
    };
    Ok((name.to_string(), input))
}

pub async fn run_card(command: CardCommands, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path).await?;
    match command {
        CardCommands::Add {
            deck,
            layout,
            slots,
        } => {
            let deck = resolve_deck(&deck, &library).await?;
            let card = build_card(&library, &layout, &slots).await?;
            let card_id = card.id;
            let updated = library.add_card(&deck.id, card).await?;
            println!(
                "Added card {} to {} ({} cards)",
                short_id(&card_id.to_string()),
                updated.name,
                updated.cards.len()
            );
        }
        CardCommands::Remove { deck, card } => {
            let deck = resolve_deck(&deck, &library).await?;
            let card_id = resolve_card(&card, &deck)?.id;
            let updated = library.remove_card(&deck.id, &card_id).await?;
            println!(
                "Removed card {} from {} ({} cards)",
                short_id(&card_id.to_string()),
                updated.name,
                updated.cards.len()
            );
        }
        CardCommands::Duplicate { deck, card } => {
            let deck = resolve_deck(&deck, &library).await?;
            let card_id = resolve_card(&card, &deck)?.id;
            let (updated, copy_id) = library.duplicate_card(&deck.id, &card_id).await?;
            println!(
                "Duplicated card {} as {} in {}",
                short_id(&card_id.to_string()),
                short_id(&copy_id.to_string()),
                updated.name
            );
        }
    }
    Ok(())
}

/// Build a card from slot arguments, importing `@path` images first.
pub async fn build_card(
    library: &LibraryService,
    layout: &str,
    slots: &[String],
) -> Result<Card, CliError> {
    let mut card = Card::new(layout.trim());
    for raw in slots {
        let (name, input) = parse_slot_arg(raw)?;
        let value = match input {
            SlotInput::Text(text) => SlotValue::text(text),
            SlotInput::ImageFile(path) => {
                let hash = library.import_image(ImagePayload::from_file(&path)?).await?;
                tracing::debug!("Imported {} as {}", path.display(), hash);
                SlotValue::Reference(hash)
            }
        };
        card = card.with_slot(name, value);
    }
    Ok(card)
}
