//! Profile engine: storage round-trips and generation-assisted learning.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::analysis::{self, engagement_prompt, persona_prompt, StructuredAnalysis};
use super::feedback::{apply_keyword_feedback, FeedbackSignals};
use super::prompt::{advanced_personalization_prompt, personalization_prompt};
use super::{parse_engagement_beliefs, LearningProfile, PostSummary};
use crate::config::GenerationConfig;
use crate::db::{save_intensity, SharedDatabase};
use crate::error::Error;
use crate::generation::{GenerateOptions, TextGenerator};

/// Attempts at a compare-and-swap write before giving up.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Save-intensity floor for a high performer.
const HIGH_PERFORMER_FLOOR: f64 = 0.08;
const HIGH_PERFORMER_FACTOR: f64 = 1.5;
const LOW_PERFORMER_FACTOR: f64 = 0.5;

pub const ENGAGEMENT_SOURCE: &str = "engagement_auto";
pub const UNDERPERFORMED_BELIEF: &str = "直近の投稿は反応が伸びなかった。構成や書き出しに変化をつける";

/// Raw counts of one reported post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutcomeCounts {
    pub likes: u64,
    pub saves: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementVerdict {
    High,
    Low,
    Average,
}

impl EngagementVerdict {
    /// Classify a post's save intensity against its store's average.
    pub fn classify(save_intensity: f64, store_average: f64) -> Self {
        let high_threshold = (store_average * HIGH_PERFORMER_FACTOR).max(HIGH_PERFORMER_FLOOR);
        if save_intensity >= high_threshold {
            EngagementVerdict::High
        } else if store_average > 0.0 && save_intensity < store_average * LOW_PERFORMER_FACTOR {
            EngagementVerdict::Low
        } else {
            EngagementVerdict::Average
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileUpdate {
    pub beliefs_added: usize,
    pub persona_regenerated: bool,
    pub persona_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Deep(ProfileUpdate),
    Lightweight(FeedbackSignals),
}

/// Owns every read-modify-write of learning profiles.
pub struct ProfileEngine<G> {
    db: SharedDatabase,
    generator: G,
    analysis_options: GenerateOptions,
    persona_options: GenerateOptions,
}

impl<G: TextGenerator> ProfileEngine<G> {
    pub fn new(db: SharedDatabase, generator: G, config: &GenerationConfig) -> Self {
        Self {
            db,
            generator,
            analysis_options: GenerateOptions::new(config.max_tokens, config.temperature),
            persona_options: GenerateOptions::new(config.persona_max_tokens, config.temperature),
        }
    }

    /// Current profile, or a zeroed one if the store has none yet.
    pub async fn load(&self, store_id: &str) -> Result<LearningProfile, Error> {
        let db = self.db.lock().await;
        match db.get_profile(store_id)? {
            Some(row) => Ok(serde_json::from_str(&row.profile_data)?),
            None => Ok(LearningProfile::default()),
        }
    }

    /// Read, mutate and write back a profile under a revision check.
    ///
    /// `apply` may run more than once if another writer gets in between.
    async fn mutate<T>(
        &self,
        store_id: &str,
        mut apply: impl FnMut(&mut LearningProfile) -> T,
    ) -> Result<T, Error> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let db = self.db.lock().await;
            let row = db.get_profile(store_id)?;
            let mut profile = match &row {
                Some(row) => serde_json::from_str(&row.profile_data)?,
                None => LearningProfile::default(),
            };

            let result = apply(&mut profile);
            let data = serde_json::to_string(&profile)?;

            let written = match &row {
                Some(row) => db.update_profile_if_revision(store_id, &data, row.revision)?,
                None => db.insert_profile(store_id, &data)?,
            };
            if written {
                return Ok(result);
            }
            debug!(store_id, attempt, "Profile revision moved, retrying");
        }
        Err(Error::ConcurrentModification {
            store_id: store_id.to_string(),
        })
    }

    /// Keyword path: counters, emoji style and quoted phrases.
    pub async fn apply_feedback_to_profile(
        &self,
        store_id: &str,
        feedback: &str,
    ) -> Result<FeedbackSignals, Error> {
        let signals = self
            .mutate(store_id, |profile| apply_keyword_feedback(profile, feedback))
            .await?;
        if signals.is_empty() {
            debug!(store_id, "No preference keywords in feedback");
        } else {
            debug!(store_id, ?signals, "Applied keyword feedback");
        }
        Ok(signals)
    }

    /// Deep path analysis. `None` means the caller should use the keyword path.
    pub async fn analyze_feedback(
        &self,
        feedback: &str,
        original_caption: &str,
        revised_caption: Option<&str>,
    ) -> Option<StructuredAnalysis> {
        analysis::analyze_feedback(
            &self.generator,
            &self.analysis_options,
            feedback,
            original_caption,
            revised_caption,
        )
        .await
    }

    /// Merge an analysis into the profile, regenerating the persona when due.
    pub async fn update_profile(
        &self,
        store_id: &str,
        analysis: &StructuredAnalysis,
    ) -> Result<ProfileUpdate, Error> {
        let (beliefs_added, due, beliefs, version) = self
            .mutate(store_id, |profile| {
                let added = profile.apply_analysis(analysis);
                (
                    added,
                    profile.should_regenerate_persona(),
                    profile.belief_texts(),
                    profile.persona_version,
                )
            })
            .await?;

        let mut update = ProfileUpdate {
            beliefs_added,
            persona_regenerated: false,
            persona_version: version,
        };
        if !due {
            return Ok(update);
        }

        let definition = match self
            .generator
            .generate(&persona_prompt(&beliefs), &self.persona_options)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(store_id, "Persona generation returned nothing");
                return Ok(update);
            }
            Err(e) => {
                warn!(store_id, error = %e, "Persona generation failed");
                return Ok(update);
            }
        };

        let applied = self
            .mutate(store_id, |profile| {
                // Another update may have regenerated it while we were generating.
                if profile.should_regenerate_persona() {
                    profile.apply_persona(&definition);
                    Some(profile.persona_version)
                } else {
                    None
                }
            })
            .await?;

        if let Some(version) = applied {
            info!(store_id, version, "Regenerated persona");
            update.persona_regenerated = true;
            update.persona_version = version;
        }
        Ok(update)
    }

    /// Deep path with keyword fallback.
    pub async fn learn_from_feedback(
        &self,
        store_id: &str,
        feedback: &str,
        original_caption: &str,
        revised_caption: Option<&str>,
    ) -> Result<FeedbackOutcome, Error> {
        match self
            .analyze_feedback(feedback, original_caption, revised_caption)
            .await
        {
            Some(analysis) => Ok(FeedbackOutcome::Deep(
                self.update_profile(store_id, &analysis).await?,
            )),
            None => Ok(FeedbackOutcome::Lightweight(
                self.apply_feedback_to_profile(store_id, feedback).await?,
            )),
        }
    }

    /// Append a belief without generation. Never regenerates the persona.
    pub async fn add_simple_belief(
        &self,
        store_id: &str,
        text: &str,
        source: &str,
    ) -> Result<bool, Error> {
        self.mutate(store_id, |profile| profile.add_belief(text, source))
            .await
    }

    /// Learn from one reported outcome relative to the store average.
    pub async fn analyze_engagement_outcome(
        &self,
        store_id: &str,
        caption: &str,
        counts: OutcomeCounts,
        store_average_save_intensity: f64,
    ) -> Result<EngagementVerdict, Error> {
        let intensity = save_intensity(counts.likes, counts.saves);
        let verdict = EngagementVerdict::classify(intensity, store_average_save_intensity);
        let post = PostSummary::from_caption(caption, intensity);

        match verdict {
            EngagementVerdict::High => {
                let beliefs = match self
                    .generator
                    .generate(
                        &engagement_prompt(caption, intensity),
                        &self.analysis_options,
                    )
                    .await
                {
                    Ok(text) => parse_engagement_beliefs(&text).unwrap_or_else(|e| {
                        warn!(store_id, error = %e, "Engagement belief response unusable");
                        Vec::new()
                    }),
                    Err(e) => {
                        warn!(store_id, error = %e, "Engagement belief call failed");
                        Vec::new()
                    }
                };
                self.mutate(store_id, |profile| {
                    profile.engagement_learning.record_high(post.clone());
                    for belief in &beliefs {
                        profile.add_belief(belief, ENGAGEMENT_SOURCE);
                    }
                })
                .await?;
            }
            EngagementVerdict::Low => {
                self.mutate(store_id, |profile| {
                    profile.engagement_learning.record_low(post.clone());
                    profile.add_belief(UNDERPERFORMED_BELIEF, ENGAGEMENT_SOURCE);
                })
                .await?;
            }
            EngagementVerdict::Average => {}
        }

        debug!(store_id, intensity, ?verdict, "Analyzed engagement outcome");
        Ok(verdict)
    }

    /// Keyword-layer prompt fragment. Empty on no signal or on read failure.
    pub async fn personalization_prompt_addition(&self, store_id: &str) -> String {
        match self.load(store_id).await {
            Ok(profile) => personalization_prompt(&profile),
            Err(e) => {
                warn!(store_id, error = %e, "Failed to load profile for prompt");
                String::new()
            }
        }
    }

    /// Belief-layer prompt fragment. Empty on no signal or on read failure.
    pub async fn advanced_personalization_prompt(&self, store_id: &str) -> String {
        match self.load(store_id).await {
            Ok(profile) => advanced_personalization_prompt(&profile),
            Err(e) => {
                warn!(store_id, error = %e, "Failed to load profile for prompt");
                String::new()
            }
        }
    }

    /// Wipe a store's profile back to defaults.
    pub async fn reset(&self, store_id: &str) -> Result<(), Error> {
        self.mutate(store_id, |profile| *profile = LearningProfile::default())
            .await?;
        info!(store_id, "Reset learning profile");
        Ok(())
    }

    /// Remove a store's profile entirely.
    pub async fn delete(&self, store_id: &str) -> Result<bool, Error> {
        self.db.lock().await.delete_profile(store_id)
    }
}
