//! Write a default config and create the database.

use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::error::Error;

/// Run the init command.
pub fn run(force: bool) -> Result<(), Error> {
    let path = Config::path()?;
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        println!("Run 'captionist init --force' to overwrite it with defaults.");
        return Ok(());
    }

    let config = Config::default();
    config.save()?;
    info!(path = %path.display(), "Wrote default config");

    let db_path = config.db_path()?;
    Database::open(&db_path)?;
    info!(path = %db_path.display(), "Created database");

    println!("captionist initialized.");
    Ok(())
}
