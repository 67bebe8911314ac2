use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Local-first records that sync when the remote is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Use an in-process remote authority instead of FERRY_API_URL
    #[arg(long, global = true)]
    pub memory_remote: bool,

    /// Treat the remote as unreachable; writes stay queued
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update a record
    #[command(alias = "save")]
    Put {
        /// Collection name
        collection: String,
        /// Local id or server id of an existing record
        #[arg(long)]
        id: Option<String>,
        /// Field assignment; values are parsed as JSON when possible
        #[arg(long = "set", value_name = "KEY=VALUE")]
        assignments: Vec<String>,
        /// Full JSON object to store (merged before --set)
        #[arg(long, value_name = "JSON")]
        json: Option<String>,
    },
    /// List cached records of a collection
    List {
        /// Collection name
        collection: String,
        /// Refresh from the remote before listing
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a record by local id or server id
    Delete {
        /// Collection name
        collection: String,
        /// Local id or server id
        id: String,
    },
    /// Push pending outbox entries to the remote
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a collection from the remote into the local cache
    Pull {
        /// Collection name
        collection: String,
    },
    /// Show pending outbox entries
    Outbox {
        /// Restrict to one collection
        collection: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show engine status
    Status,
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
