use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

use cardforge_core::services::LibraryService;
use cardforge_core::storage::RemoteFileStore;
use cardforge_core::sync::{
    AutoSync, ConflictChoice, ConflictView, SyncEngine, SyncOutcome, SyncReport,
};
use chrono::Utc;

use crate::cli::{OnConflict, SyncCommands};
use crate::commands::common::{
    format_relative_time, format_sync_conflict_lines, format_sync_timestamp, open_engine,
    open_library, short_id, sync_conflict_to_item, CliEngine, SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(
    command: Option<SyncCommands>,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    match command.unwrap_or(SyncCommands::Run {
        on_conflict: OnConflict::Prompt,
    }) {
        SyncCommands::Run { on_conflict } => run_sync_pass(on_conflict, db_path, profile).await,
        SyncCommands::Status => run_sync_status(db_path, profile).await,
        SyncCommands::Enable => set_sync_enabled(true, db_path).await,
        SyncCommands::Disable => set_sync_enabled(false, db_path).await,
        SyncCommands::Pending => run_sync_pending(db_path).await,
        SyncCommands::Conflicts { limit, json } => run_sync_conflicts(limit, json, db_path).await,
        SyncCommands::Watch {
            on_conflict,
            poll_ms,
        } => run_sync_watch(on_conflict, Duration::from_millis(poll_ms), db_path, profile).await,
    }
}

pub async fn run_sync_pass(
    on_conflict: OnConflict,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let (engine, _) = open_engine(db_path, profile).await?;
    let outcome = engine.run().await;
    let outcome = settle_conflicts(&engine, outcome, |view| choose(on_conflict, view)).await?;
    println!("{}", outcome.summary());

    match outcome {
        SyncOutcome::Failed { .. } => Err(CliError::SyncFailed(outcome.summary())),
        _ => Ok(()),
    }
}

/// Answer conflicts until the pass reaches a terminal outcome.
///
/// `decide` returning `None` dismisses the conflict and drops the rest of
/// the queue.
pub async fn settle_conflicts<R: RemoteFileStore>(
    engine: &SyncEngine<R>,
    mut outcome: SyncOutcome,
    mut decide: impl FnMut(&ConflictView) -> Result<Option<ConflictChoice>, CliError>,
) -> Result<SyncOutcome, CliError> {
    while let SyncOutcome::Conflict { conflict, report } = &outcome {
        if report.uploaded + report.downloaded + report.deleted_remote > 0 {
            println!("Before pausing: {report}");
        }
        for line in format_conflict(conflict) {
            println!("{line}");
        }
        outcome = match decide(conflict)? {
            Some(choice) => engine.resolve_conflict(choice).await?,
            None => engine.dismiss_conflict().await?,
        };
    }
    Ok(outcome)
}

pub fn choose(
    on_conflict: OnConflict,
    conflict: &ConflictView,
) -> Result<Option<ConflictChoice>, CliError> {
    match on_conflict {
        OnConflict::KeepLocal => Ok(Some(ConflictChoice::KeepLocal)),
        OnConflict::UseCloud => Ok(Some(ConflictChoice::UseCloud)),
        OnConflict::Abort => Ok(None),
        OnConflict::Prompt => prompt_for_choice(conflict),
    }
}

fn prompt_for_choice(conflict: &ConflictView) -> Result<Option<ConflictChoice>, CliError> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        println!("No terminal to ask on; stopping. Re-run with --on-conflict keep-local|use-cloud.");
        return Ok(None);
    }

    let mut input = stdin.lock();
    loop {
        print!(
            "Keep [l]ocal, use [c]loud, or [a]bort ({} more queued)? ",
            conflict.remaining
        );
        io::stdout().flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }
        if let Some(choice) = parse_choice(&answer) {
            return Ok(choice);
        }
        println!("Please answer l, c, or a.");
    }
}

/// `Some(None)` means abort; `None` means the answer was not understood.
pub fn parse_choice(answer: &str) -> Option<Option<ConflictChoice>> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "l" | "local" | "keep-local" => Some(Some(ConflictChoice::KeepLocal)),
        "c" | "cloud" | "use-cloud" => Some(Some(ConflictChoice::UseCloud)),
        "a" | "abort" => Some(None),
        _ => None,
    }
}

pub fn format_conflict(conflict: &ConflictView) -> Vec<String> {
    let mut lines = vec![format!(
        "Deck '{}' ({}) changed both here and in the cloud:",
        conflict.local.name,
        short_id(&conflict.deck_id.to_string())
    )];
    lines.push(format!(
        "  local: '{}', {} cards, edited {}",
        conflict.local.name,
        conflict.local.cards.len(),
        format_sync_timestamp(conflict.local_updated_at)
    ));
    lines.push(format!(
        "  cloud: '{}', {} cards, uploaded {}",
        conflict.remote.name,
        conflict.remote.cards.len(),
        format_sync_timestamp(conflict.remote_modified_at)
    ));
    lines
}

pub async fn run_sync_status(db_path: &Path, profile: Option<&str>) -> Result<(), CliError> {
    let library = open_library(db_path).await?;
    let settings = library.settings().await?;
    let decks = library.deck_ids().await?.len();
    let pending = library.tombstones().await?.len();

    println!(
        "Auto-sync: {}",
        if settings.sync_enabled { "enabled" } else { "disabled" }
    );
    match settings.last_synced_at {
        Some(at) => println!(
            "Last sync: {} ({})",
            format_sync_timestamp(at),
            format_relative_time(at, Utc::now().timestamp_millis())
        ),
        None => println!("Last sync: never"),
    }
    println!("Local decks: {decks}");
    println!("Pending remote deletions: {pending}");

    match open_engine(db_path, profile).await {
        Ok((engine, config)) => println!(
            "Remote: {} ({})",
            config.drive_api_base_url,
            if engine.remote().has_credentials() {
                "signed in"
            } else {
                "signed out"
            }
        ),
        Err(CliError::SyncNotConfigured) => println!("Remote: not configured"),
        Err(error) => return Err(error),
    }
    Ok(())
}

pub async fn set_sync_enabled(enabled: bool, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path).await?;
    library.set_sync_enabled(enabled).await?;
    if enabled {
        println!("Auto-sync enabled");
    } else {
        println!("Auto-sync disabled");
    }
    Ok(())
}

pub async fn run_sync_pending(db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path).await?;
    let tombstones = library.tombstones().await?;
    if tombstones.is_empty() {
        println!("No pending remote deletions.");
        return Ok(());
    }
    for deck_id in tombstones {
        println!("{deck_id}");
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let library = open_library(db_path).await?;
    let conflicts = library.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_watch(
    on_conflict: OnConflict,
    poll_interval: Duration,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let (engine, config) = open_engine(db_path, profile).await?;
    if !engine.library().settings().await?.sync_enabled {
        println!("Auto-sync is disabled; run `cardforge sync enable` first.");
        return Ok(());
    }

    let engine = &engine;
    let auto = AutoSync::new(engine, config.auto_sync_debounce);
    if let Some(outcome) = auto.trigger().await {
        report_watch_outcome(engine, on_conflict, outcome).await;
    }

    println!("Watching for changes (Ctrl+C to stop)");
    let revisions = engine.library().subscribe();
    tokio::select! {
        () = auto.run(revisions, move |outcome| report_watch_outcome(engine, on_conflict, outcome)) => {}
        result = poll_external_changes(engine.library(), poll_interval) => result?,
        result = tokio::signal::ctrl_c() => {
            result?;
            println!("Stopped watching");
        }
    }
    Ok(())
}

async fn report_watch_outcome(engine: &CliEngine, on_conflict: OnConflict, outcome: SyncOutcome) {
    let outcome = resume_pending(engine, outcome);
    match settle_conflicts(engine, outcome, |view| choose(on_conflict, view)).await {
        Ok(outcome) => println!("{}", outcome.summary()),
        Err(error) => eprintln!("Error: {error}"),
    }
}

/// A conflict left pending by a failed resolution is offered again.
pub fn resume_pending<R: RemoteFileStore>(
    engine: &SyncEngine<R>,
    outcome: SyncOutcome,
) -> SyncOutcome {
    match (outcome, engine.pending_conflict()) {
        (SyncOutcome::AwaitingResolution, Some(conflict)) => SyncOutcome::Conflict {
            conflict,
            report: SyncReport::default(),
        },
        (outcome, _) => outcome,
    }
}

/// Turn edits made by other processes into library revisions.
async fn poll_external_changes(
    library: &LibraryService,
    interval: Duration,
) -> Result<(), CliError> {
    let mut last = library.fingerprint().await?;
    loop {
        tokio::time::sleep(interval).await;
        let current = library.fingerprint().await?;
        if current != last {
            tracing::debug!("Library changed outside this process");
            last = current;
            library.notify_external_change();
        }
    }
}
