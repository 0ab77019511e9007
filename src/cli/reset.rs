//! Reset or delete a store's data.

use std::io::{self, Write};

use crate::cli::open_engine;
use crate::config::Config;
use crate::error::Error;

/// Run the reset command.
pub async fn run(store: &str, delete: bool, force: bool) -> Result<(), Error> {
    let action = if delete { "delete" } else { "reset" };
    println!("This will {} all metrics and the learning profile of {}.", action, store);

    if !force {
        print!("\nAre you sure? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let config = Config::load()?;
    let engine = open_engine(&config)?;
    let removed = if delete {
        engine.delete_store(store).await?
    } else {
        engine.reset_store(store).await?
    };

    println!("Removed {} metric rows, profile {}.", removed, if delete { "deleted" } else { "reset" });
    Ok(())
}
