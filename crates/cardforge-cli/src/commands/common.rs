use std::env;
use std::path::{Path, PathBuf};

use cardforge_core::config::SyncConfig;
use cardforge_core::models::SyncConflict;
use cardforge_core::services::LibraryService;
use cardforge_core::storage::GoogleDriveStore;
use cardforge_core::sync::SyncEngine;
use cardforge_core::{Card, CardId, Deck, DeckId};
use chrono::Utc;
use serde::Serialize;

use crate::auth::CliTokens;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub const ENV_DB_PATH: &str = "CARDFORGE_DB_PATH";
const SHORT_ID_LEN: usize = 13;

pub type CliRemote = GoogleDriveStore<CliTokens>;
pub type CliEngine = SyncEngine<CliRemote>;

#[derive(Debug, Serialize)]
pub struct DeckListItem {
    pub id: String,
    pub name: String,
    pub cards: usize,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub deck_id: String,
    pub local_updated_at: i64,
    pub remote_modified_at: i64,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(ENV_DB_PATH).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("cardforge").join("cardforge.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_library(path: &Path) -> Result<LibraryService, CliError> {
    Ok(LibraryService::open_path(path).await?)
}

/// Sync config from the environment, falling back to the profile's values.
pub fn resolve_sync_config(profile: Option<&CliProfile>) -> Result<SyncConfig, CliError> {
    Ok(SyncConfig::parse(|key| {
        env::var(key)
            .ok()
            .or_else(|| profile.and_then(|profile| profile.lookup(key)))
    })?)
}

/// Profile name and its resolved sync config.
pub fn load_profile_sync_config(
    explicit_profile: Option<&str>,
) -> Result<(String, SyncConfig), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    let sync_config = resolve_sync_config(config.profile(&profile_name))?;
    Ok((profile_name, sync_config))
}

pub async fn open_engine(
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(CliEngine, SyncConfig), CliError> {
    let (profile_name, config) = load_profile_sync_config(profile)?;
    let tokens = CliTokens::for_profile(&profile_name, &config)
        .map_err(|error| CliError::Auth(error.to_string()))?;
    if !tokens.is_configured() {
        return Err(CliError::SyncNotConfigured);
    }
    tracing::debug!(
        "Using {} for profile '{}' against {}",
        tokens.label(),
        profile_name,
        config.drive_api_base_url
    );

    let remote = GoogleDriveStore::new(&config.drive_api_base_url, tokens)?;
    let library = open_library(db_path).await?;
    Ok((SyncEngine::new(library, remote, config.policy), config))
}

/// Find a deck by full ID, unique ID prefix, or exact (case-insensitive) name.
pub async fn resolve_deck(query: &str, library: &LibraryService) -> Result<Deck, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::DeckNotFound(String::new()));
    }
    if let Ok(deck_id) = query.parse::<DeckId>() {
        if let Some(deck) = library.get_deck(&deck_id).await? {
            return Ok(deck);
        }
    }

    let decks = library.list_decks().await?;
    let by_prefix = decks
        .iter()
        .filter(|deck| deck.id.to_string().starts_with(&query.to_ascii_lowercase()))
        .collect::<Vec<_>>();
    let matches = if by_prefix.is_empty() {
        decks
            .iter()
            .filter(|deck| deck.name.eq_ignore_ascii_case(query))
            .collect::<Vec<_>>()
    } else {
        by_prefix
    };

    match matches.as_slice() {
        [] => Err(CliError::DeckNotFound(query.to_string())),
        [deck] => Ok((*deck).clone()),
        many => {
            let options = many
                .iter()
                .take(3)
                .map(|deck| short_id(&deck.id.to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::Ambiguous(format!(
                "Deck '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn resolve_card<'a>(query: &str, deck: &'a Deck) -> Result<&'a Card, CliError> {
    let query = query.trim();
    if let Ok(card_id) = query.parse::<CardId>() {
        if let Some(card) = deck.card(&card_id) {
            return Ok(card);
        }
    }
    if query.is_empty() {
        return Err(CliError::CardNotFound(String::new()));
    }

    let query = query.to_ascii_lowercase();
    let matches = deck
        .cards
        .iter()
        .filter(|card| card.id.to_string().starts_with(&query))
        .collect::<Vec<_>>();
    match matches.as_slice() {
        [] => Err(CliError::CardNotFound(query)),
        [card] => Ok(card),
        many => {
            let options = many
                .iter()
                .take(3)
                .map(|card| short_id(&card.id.to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::Ambiguous(format!(
                "Card prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_name(parts: &[String]) -> Result<String, CliError> {
    let name = parts.join(" ");
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::EmptyDeckName);
    }
    Ok(name.to_string())
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

pub fn deck_to_list_item(deck: &Deck) -> DeckListItem {
    DeckListItem {
        id: deck.id.to_string(),
        name: deck.name.clone(),
        cards: deck.cards.len(),
        updated_at: deck.updated_at,
        relative_time: format_relative_time(deck.updated_at, Utc::now().timestamp_millis()),
    }
}

pub fn format_deck_lines(decks: &[Deck]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    decks
        .iter()
        .map(|deck| {
            let cards = match deck.cards.len() {
                1 => "1 card".to_string(),
                count => format!("{count} cards"),
            };
            format!(
                "{}  {:<9}  {:<9}  {}",
                short_id(&deck.id.to_string()),
                format_relative_time(deck.updated_at, now_ms),
                cards,
                deck.name
            )
        })
        .collect()
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        deck_id: conflict.deck_id.clone(),
        local_updated_at: conflict.local_updated_at,
        remote_modified_at: conflict.remote_modified_at,
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.to_string(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<10}  deck={}  local={} cloud={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                short_id(&conflict.deck_id),
                format_sync_timestamp(conflict.local_updated_at),
                format_sync_timestamp(conflict.remote_modified_at)
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
