//! Show blended insights.

use crate::cli::{open_engine, print_json};
use crate::config::Config;
use crate::error::Error;
use crate::insights::render_insight_prompt;

/// Run the insights command.
pub async fn run(store: &str, category: &str, text: bool) -> Result<(), Error> {
    let config = Config::load()?;
    let engine = open_engine(&config)?;
    let blended = engine.insights().blended_insights(store, category).await?;

    if !text {
        return print_json(&blended);
    }

    let rendered = render_insight_prompt(&blended);
    if rendered.is_empty() {
        println!("No reported data yet for {} / {}.", blended.category_label, blended.category_group);
    } else {
        println!("{}", rendered);
    }
    Ok(())
}
