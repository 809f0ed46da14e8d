//! Cardforge CLI - author card decks from the terminal
//!
//! Decks live in a local libSQL database and sync to the user's Google
//! Drive app folder on demand or while `cardforge sync watch` runs.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::card::run_card;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::deck::run_deck;
use crate::commands::image::run_image;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cardforge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::Deck { command }) => run_deck(command, &resolve_db_path(cli.db_path)?).await,
        Some(Commands::Card { command }) => run_card(command, &resolve_db_path(cli.db_path)?).await,
        Some(Commands::Image { command }) => {
            run_image(command, &resolve_db_path(cli.db_path)?).await
        }
        Some(Commands::Sync { command }) => {
            run_sync(command, &resolve_db_path(cli.db_path)?, profile).await
        }
        Some(Commands::Auth { command }) => run_auth(command, profile).await,
        Some(Commands::Config { command }) => run_config(command, profile),
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
