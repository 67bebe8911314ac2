use std::path::Path;

use crate::commands::common::Manager;
use crate::error::CliError;

pub async fn run_status(manager: &Manager, db_path: &Path) -> Result<(), CliError> {
    let pending = manager.store().pending_count().await?;
    println!("Database: {}", db_path.display());
    println!("Remote:   {}", manager.gateway().label());
    println!("Online:   {}", if manager.is_online() { "yes" } else { "no" });
    println!("State:    {}", manager.state());
    println!("Pending:  {pending}");
    Ok(())
}
