use std::path::Path;

use cardforge_core::services::LibraryService;
use cardforge_core::storage::ResolvedSlot;
use cardforge_core::Deck;

use crate::cli::DeckCommands;
use crate::commands::common::{
    deck_to_list_item, format_deck_lines, format_sync_timestamp, normalize_name, open_library,
    resolve_deck, short_id, DeckListItem,
};
use crate::error::CliError;

const INLINE_PREVIEW_CHARS: usize = 60;

pub async fn run_deck(command: DeckCommands, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path).await?;
    match command {
        DeckCommands::New { name } => {
            let deck = library.create_deck(&normalize_name(&name)?).await?;
            println!("Created deck {} ({})", deck.name, short_id(&deck.id.to_string()));
        }
        DeckCommands::List { json } => run_deck_list(&library, json).await?,
        DeckCommands::Show { deck, json } => {
            let deck = resolve_deck(&deck, &library).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&deck.to_document())?);
            } else {
                for line in render_deck(&deck, &library).await? {
                    println!("{line}");
                }
            }
        }
        DeckCommands::Rename { deck, name } => {
            let deck = resolve_deck(&deck, &library).await?;
            let renamed = library.rename_deck(&deck.id, &normalize_name(&name)?).await?;
            println!("Renamed '{}' to '{}'", deck.name, renamed.name);
        }
        DeckCommands::Delete { deck } => {
            let deck = resolve_deck(&deck, &library).await?;
            library.delete_deck(&deck.id).await?;
            println!(
                "Deleted deck {} ({}); the cloud copy goes on the next sync",
                deck.name,
                short_id(&deck.id.to_string())
            );
        }
    }
    Ok(())
}

async fn run_deck_list(library: &LibraryService, as_json: bool) -> Result<(), CliError> {
    let decks = library.list_decks().await?;

    if as_json {
        let items = decks
            .iter()
            .map(deck_to_list_item)
            .collect::<Vec<DeckListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if decks.is_empty() {
        println!("No decks yet. Create one with `cardforge deck new <name>`.");
        return Ok(());
    }
    for line in format_deck_lines(&decks) {
        println!("{line}");
    }
    Ok(())
}

/// Human-readable deck listing with image references resolved.
pub async fn render_deck(deck: &Deck, library: &LibraryService) -> Result<Vec<String>, CliError> {
    let store = library.content_store();
    let mut lines = vec![
        format!("{} ({})", deck.name, deck.id),
        format!("Updated {}", format_sync_timestamp(deck.updated_at)),
    ];
    if deck.cards.is_empty() {
        lines.push("No cards.".to_string());
    }

    for (position, card) in deck.cards.iter().enumerate() {
        lines.push(format!(
            "{:>3}. {} [{}]",
            position + 1,
            short_id(&card.id.to_string()),
            card.layout
        ));
        for (slot, value) in &card.data {
            let rendered = match store.resolve(value).await? {
                ResolvedSlot::Inline(text) => preview(&text),
                ResolvedSlot::Image(image) => format!(
                    "<image {} {}, {} bytes>",
                    short_id(image.hash.as_str()),
                    image.mime_type,
                    image.bytes.len()
                ),
                ResolvedSlot::Missing(hash) => format!("<missing image {}>", short_id(hash.as_str())),
                ResolvedSlot::Other(value) => value.to_string(),
            };
            lines.push(format!("       {slot}: {rendered}"));
        }
    }
    Ok(lines)
}

fn preview(text: &str) -> String {
    if text.starts_with("data:") {
        return "<inline data URL>".to_string();
    }
    let single_line = text.lines().next().unwrap_or_default();
    let mut preview = single_line
        .chars()
        .take(INLINE_PREVIEW_CHARS)
        .collect::<String>();
    if single_line.chars().count() > INLINE_PREVIEW_CHARS || text.lines().nth(1).is_some() {
        preview.push_str("...");
    }
    preview
}
