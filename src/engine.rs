//! Facade over the insight aggregator and the profile engine.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::SharedDatabase;
use crate::error::Error;
use crate::generation::TextGenerator;
use crate::insights::{render_insight_prompt, InsightAggregator, OutcomeReport, OutcomeResult};
use crate::profile::{EngagementVerdict, OutcomeCounts, ProfileEngine};
use crate::validator::BoundsTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    #[serde(flatten)]
    pub result: OutcomeResult,
    /// How the post compared to the store's average, when it was learned from.
    pub verdict: Option<EngagementVerdict>,
}

pub struct Engine<G> {
    insights: InsightAggregator,
    profiles: ProfileEngine<G>,
}

impl<G: TextGenerator> Engine<G> {
    pub fn new(db: SharedDatabase, generator: G, config: &Config) -> Self {
        Self {
            insights: InsightAggregator::new(db.clone(), BoundsTable::from_overrides(&config.bounds)),
            profiles: ProfileEngine::new(db, generator, &config.generation),
        }
    }

    pub fn insights(&self) -> &InsightAggregator {
        &self.insights
    }

    pub fn profiles(&self) -> &ProfileEngine<G> {
        &self.profiles
    }

    /// Everything the caption prompt builder should append for this store.
    ///
    /// Insight and personalization fragments are joined by blank lines; empty
    /// ones are skipped. Never fails: read errors degrade to fewer fragments.
    pub async fn prompt_addition(&self, store_id: &str, category: &str) -> String {
        let insight = match self.insights.blended_insights(store_id, category).await {
            Ok(blended) => render_insight_prompt(&blended),
            Err(e) => {
                warn!(store_id, error = %e, "Failed to load insights for prompt");
                String::new()
            }
        };
        let personalization = self.profiles.personalization_prompt_addition(store_id).await;
        let advanced = self.profiles.advanced_personalization_prompt(store_id).await;

        [insight, personalization, advanced]
            .into_iter()
            .filter(|fragment| !fragment.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Record an outcome, then learn from it relative to the store's prior average.
    ///
    /// Learning is advisory; its failure does not undo the recorded metric.
    /// Each post is learned from once: corrections to already reported numbers
    /// only update the metric row.
    pub async fn report_outcome(&self, report: &OutcomeReport) -> Result<OutcomeSummary, Error> {
        let average = self
            .insights
            .own_store_insights(&report.store_id)
            .await?
            .avg_save_intensity;

        let result = self.insights.record_outcome(report).await?;
        let learnable = matches!(result, OutcomeResult::Recorded { corrected: false, .. });
        if !learnable || (report.likes == 0 && report.saves == 0) {
            return Ok(OutcomeSummary {
                result,
                verdict: None,
            });
        }

        let counts = OutcomeCounts {
            likes: report.likes,
            saves: report.saves,
            comments: report.comments,
        };
        let verdict = match self
            .profiles
            .analyze_engagement_outcome(&report.store_id, &report.caption_text, counts, average)
            .await
        {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                warn!(store_id = %report.store_id, error = %e, "Engagement learning failed");
                None
            }
        };
        Ok(OutcomeSummary { result, verdict })
    }

    /// Drop the store's metrics and reset its profile to defaults.
    pub async fn reset_store(&self, store_id: &str) -> Result<usize, Error> {
        let removed = self.insights.delete_store_metrics(store_id).await?;
        self.profiles.reset(store_id).await?;
        info!(store_id, removed, "Reset store data");
        Ok(removed)
    }

    /// Remove the store's metrics and profile entirely.
    pub async fn delete_store(&self, store_id: &str) -> Result<usize, Error> {
        let removed = self.insights.delete_store_metrics(store_id).await?;
        self.profiles.delete(store_id).await?;
        info!(store_id, removed, "Deleted store data");
        Ok(removed)
    }
}
