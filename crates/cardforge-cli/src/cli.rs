use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cardforge")]
#[command(about = "Author card decks offline and sync them through Google Drive")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for OAuth and Drive configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, inspect, and delete decks
    Deck {
        #[command(subcommand)]
        command: DeckCommands,
    },
    /// Edit the cards of a deck
    Card {
        #[command(subcommand)]
        command: CardCommands,
    },
    /// Move images in and out of the content store
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },
    /// Synchronize the library with Google Drive
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Authenticate CLI profile with Google
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

/// What to do when a deck changed both locally and in the cloud.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OnConflict {
    /// Ask on the terminal for each conflict
    Prompt,
    KeepLocal,
    UseCloud,
    /// Stop the pass and leave the remaining decks for later
    Abort,
}

#[derive(Subcommand)]
pub enum DeckCommands {
    /// Create an empty deck
    New {
        /// Deck name
        name: Vec<String>,
    },
    /// List decks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a deck and its cards
    Show {
        /// Deck ID, unique ID prefix, or exact name
        deck: String,
        /// Print the deck document as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a deck
    Rename {
        /// Deck ID, unique ID prefix, or exact name
        deck: String,
        /// New name
        name: Vec<String>,
    },
    /// Delete a deck locally and remotely on the next sync
    Delete {
        /// Deck ID, unique ID prefix, or exact name
        deck: String,
    },
}

#[derive(Subcommand)]
pub enum CardCommands {
    /// Append a card to a deck
    Add {
        /// Deck ID, unique ID prefix, or exact name
        deck: String,
        /// Card layout name
        #[arg(long, default_value = "basic")]
        layout: String,
        /// Slot content as NAME=VALUE; VALUE `@path` imports an image file
        #[arg(short, long = "slot", value_name = "NAME=VALUE")]
        slots: Vec<String>,
    },
    /// Remove a card from a deck
    Remove {
        /// Deck ID, unique ID prefix, or exact name
        deck: String,
        /// Card ID or unique ID prefix
        card: String,
    },
    /// Duplicate a card in place
    Duplicate {
        /// Deck ID, unique ID prefix, or exact name
        deck: String,
        /// Card ID or unique ID prefix
        card: String,
    },
}

#[derive(Subcommand)]
pub enum ImageCommands {
    /// Store an image file and print its content hash
    Import {
        /// Image file path
        path: PathBuf,
    },
    /// Write a stored image to disk (or a data URL to stdout)
    Export {
        /// Content hash
        hash: String,
        /// Optional output path (stdout data URL when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run one sync pass now
    Run {
        /// How to settle decks that changed on both sides
        #[arg(long, value_enum, default_value_t = OnConflict::Prompt)]
        on_conflict: OnConflict,
    },
    /// Show sync settings and pending work
    Status,
    /// Opt into automatic sync
    Enable,
    /// Opt out of automatic sync
    Disable,
    /// List decks deleted locally but not yet removed remotely
    Pending,
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing as the library changes until interrupted
    Watch {
        /// How to settle decks that changed on both sides
        #[arg(long, value_enum, default_value_t = OnConflict::Abort)]
        on_conflict: OnConflict,
        /// How often to look for edits made by other processes
        #[arg(long, default_value = "2000", value_name = "MS")]
        poll_ms: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Google OAuth client ID
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// Google OAuth client secret
        #[arg(long, value_name = "SECRET")]
        client_secret: Option<String>,
        /// Drive API base URL override
        #[arg(long, value_name = "URL")]
        drive_api_base_url: Option<String>,
        /// OAuth token endpoint override
        #[arg(long, value_name = "URL")]
        token_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile config
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store a Google session obtained from a refresh token
    Login {
        /// Refresh token issued for the drive.appdata scope
        #[arg(long, value_name = "TOKEN")]
        refresh_token: String,
    },
    /// Show auth status for profile
    Status,
    /// Revoke and forget the stored session
    Logout,
}
