//! Ferry CLI - local-first records from the command line
//!
//! Writes land in the local cache immediately and reach the remote when it is
//! reachable.

mod cli;
mod commands;
mod error;
mod remote;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{open_manager, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::outbox::run_outbox;
use crate::commands::put::run_put;
use crate::commands::status::run_status;
use crate::commands::sync::{run_pull, run_sync};
use crate::error::CliError;
use crate::remote::CliGateway;

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
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ferry=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path);
    let gateway = CliGateway::resolve(cli.memory_remote)?;
    tracing::debug!("Using {} remote with {}", gateway.label(), db_path.display());
    let manager = open_manager(&db_path, gateway, cli.offline).await?;

    match cli.command {
        Commands::Put {
            collection,
            id,
            assignments,
            json,
        } => {
            run_put(
                &manager,
                &collection,
                id.as_deref(),
                json.as_deref(),
                &assignments,
            )
            .await?;
        }
        Commands::List {
            collection,
            refresh,
            json,
        } => run_list(&manager, &collection, refresh, json).await?,
        Commands::Delete { collection, id } => run_delete(&manager, &collection, &id).await?,
        Commands::Sync { json } => run_sync(&manager, json).await?,
        Commands::Pull { collection } => run_pull(&manager, &collection).await?,
        Commands::Outbox { collection, json } => {
            run_outbox(&manager, collection.as_deref(), json).await?;
        }
        Commands::Status => run_status(&manager, &db_path).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
