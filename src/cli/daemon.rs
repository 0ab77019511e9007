//! Foreground daemon running scheduled jobs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cli::open_engine;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Error;
use crate::generation::{IpcGenerator, TextGenerator};
use crate::insights::CATEGORY_LIMIT;
use crate::jobs::JobLocks;

pub const DAILY_DIGEST: &str = "daily-digest";

/// Run the daemon until Ctrl+C.
pub async fn run() -> Result<(), Error> {
    let config = Config::load()?;
    info!("Starting captionist daemon...");
    info!("Database: {}", config.db_path()?.display());

    let generator = IpcGenerator::from_config(&config.generation);
    if !generator.is_service_running().await {
        warn!(
            "Generation service is not running at {}",
            config.generation.socket_path
        );
    }

    let engine = Arc::new(open_engine(&config)?);
    let locks = JobLocks::new();
    let interval_secs = config.daemon.digest_interval_secs.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    info!(interval_secs, "Daemon running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
            _ = interval.tick() => {
                let Some(guard) = locks.try_acquire(DAILY_DIGEST) else {
                    debug!(job = DAILY_DIGEST, "Previous run still in progress, skipping");
                    continue;
                };
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    if let Err(e) = daily_digest(&engine).await {
                        error!(job = guard.name(), error = %e, "Job failed");
                    }
                    drop(guard);
                });
            }
        }
    }

    Ok(())
}

/// Log category insights for every category with reported data.
///
/// Returns the number of categories summarized.
pub async fn daily_digest<G: TextGenerator>(engine: &Engine<G>) -> Result<usize, Error> {
    let categories = engine.insights().reported_categories().await?;
    for category in &categories {
        let insights = engine
            .insights()
            .category_insights(category, CATEGORY_LIMIT)
            .await?;
        info!(
            category = %category,
            sample_size = insights.sample_size,
            avg_save_intensity = insights.avg_save_intensity,
            top_posts_avg_length = insights.top_posts_avg_length,
            best_hours = ?insights.best_posting_hours,
            hook = ?insights.winning_pattern.as_ref().map(|p| p.dominant_hook_type),
            "Category digest"
        );
    }
    info!(job = DAILY_DIGEST, categories = categories.len(), "Digest complete");
    Ok(categories.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::generation::testing::ScriptedGenerator;
    use crate::insights::OutcomeReport;

    #[tokio::test]
    async fn test_digest_covers_reported_categories() {
        let db = Database::open_memory().unwrap().into_shared();
        let engine = Engine::new(db, ScriptedGenerator::new(), &Config::default());
        assert_eq!(daily_digest(&engine).await.unwrap(), 0);

        for category in ["カフェ", "美容室", "cafe"] {
            let report = OutcomeReport {
                store_id: "s".to_string(),
                category: category.to_string(),
                caption_text: "本日のおすすめをご紹介します #おすすめ".to_string(),
                likes: 40,
                saves: 4,
                ..Default::default()
            };
            engine.insights().record_outcome(&report).await.unwrap();
        }
        engine
            .insights()
            .seed_unreported("s", "花屋", "母の日のブーケ予約受付中です", None)
            .await;

        assert_eq!(daily_digest(&engine).await.unwrap(), 2);
    }
}
