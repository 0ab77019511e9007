//! Learn from feedback.

use tracing::warn;

use crate::cli::{open_engine, print_json};
use crate::config::Config;
use crate::error::Error;
use crate::generation::IpcGenerator;
use crate::profile::FeedbackOutcome;

/// Run the feedback command.
pub async fn run(
    store: &str,
    feedback: &str,
    original: &str,
    revised: Option<&str>,
    simple: bool,
) -> Result<(), Error> {
    let config = Config::load()?;
    let engine = open_engine(&config)?;

    let outcome = if simple {
        FeedbackOutcome::Lightweight(
            engine
                .profiles()
                .apply_feedback_to_profile(store, feedback)
                .await?,
        )
    } else {
        let generator = IpcGenerator::from_config(&config.generation);
        if !generator.is_service_running().await {
            warn!(
                socket = %config.generation.socket_path,
                "Generation service is not running, keyword learning only"
            );
        }
        engine
            .profiles()
            .learn_from_feedback(store, feedback, original, revised)
            .await?
    };

    print_json(&outcome)
}
