//! Print the prompt addition for a store.

use crate::cli::{open_engine, print_json};
use crate::config::Config;
use crate::error::Error;

/// Run the prompt command.
pub async fn run(store: &str, category: &str, profile: bool) -> Result<(), Error> {
    let config = Config::load()?;
    let engine = open_engine(&config)?;

    if profile {
        return print_json(&engine.profiles().load(store).await?);
    }

    let addition = engine.prompt_addition(store, category).await;
    if addition.is_empty() {
        println!("Nothing learned yet for {}.", store);
    } else {
        println!("{}", addition);
    }
    Ok(())
}
