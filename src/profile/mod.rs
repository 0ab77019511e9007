//! Per-store learning profiles.
//!
//! A profile collects two layers of preference signal: cheap keyword counters
//! fed by short feedback strings, and beliefs / writing style extracted by the
//! generation service. All mutation rules (caps, dedup, persona trigger) live
//! on [`LearningProfile`]; [`ProfileEngine`] adds storage and generation.

mod analysis;
mod engine;
mod feedback;
mod prompt;

pub use analysis::{
    parse_engagement_beliefs, parse_structured_analysis, StructuredAnalysis, WritingStyleUpdate,
};
pub use engine::{EngagementVerdict, FeedbackOutcome, OutcomeCounts, ProfileEngine, ProfileUpdate};
pub use feedback::{apply_keyword_feedback, FeedbackSignals};
pub use prompt::{advanced_personalization_prompt, personalization_prompt, sanitize_fragment};

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::structure;

pub const MAX_BELIEFS: usize = 20;
pub const MAX_PERSONA_HISTORY: usize = 5;
pub const MAX_SENTENCE_ENDINGS: usize = 5;
pub const MAX_CATCHPHRASES: usize = 10;
pub const MAX_AVOIDED_WORDS: usize = 50;
pub const MAX_ENGAGEMENT_POSTS: usize = 10;

/// Beliefs needed before a persona is first generated.
pub const PERSONA_MIN_BELIEFS: usize = 5;

/// New beliefs needed before an existing persona is regenerated.
pub const PERSONA_REFRESH_BELIEFS: u64 = 3;

/// Weight added to a preferred word per mention from deep analysis.
pub const PREFERRED_WORD_WEIGHT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Casual,
    Formal,
}

impl Tone {
    pub fn label(&self) -> &'static str {
        match self {
            Tone::Casual => "カジュアル",
            Tone::Formal => "丁寧",
        }
    }
}

const POLITE_MARKERS: &[&str] = &["です", "ます", "ございます", "ません", "ください"];
const CASUAL_MARKERS: &[&str] = &["だよ", "だね", "よね", "じゃん", "よ！", "ね！", "♪", "〜"];

/// Laughter runs (`ｗｗ`, `www`) closing a line; a lone ASCII `w` is just a letter.
static LAUGH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)(?:ｗ+|w{2,})$").unwrap());

/// Rough register of a caption, by counting polite and casual markers.
pub fn detect_tone(text: &str) -> Tone {
    let polite: usize = POLITE_MARKERS.iter().map(|m| text.matches(m).count()).sum();
    let casual: usize = CASUAL_MARKERS.iter().map(|m| text.matches(m).count()).sum::<usize>()
        + LAUGH_RE.find_iter(text).count();
    if polite > casual {
        Tone::Formal
    } else {
        Tone::Casual
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmojiStyle {
    Minimal,
    #[default]
    Moderate,
    Rich,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToneAdjustments {
    pub casual: u32,
    pub formal: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LengthPreferences {
    pub prefer_short: u32,
    pub prefer_long: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefLog {
    pub text: String,
    pub source: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaVersion {
    pub version: u32,
    pub definition: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WritingStyle {
    pub sentence_endings: Vec<String>,
    pub catchphrases: Vec<String>,
    pub line_break_style: Option<String>,
}

/// One post remembered by the engagement learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub excerpt: String,
    pub length: usize,
    pub emoji_count: usize,
    pub save_intensity: f64,
    pub tone: Tone,
    pub recorded_at: String,
}

impl PostSummary {
    pub fn from_caption(caption: &str, save_intensity: f64) -> Self {
        let body = structure::extract_body(caption);
        Self {
            excerpt: body.chars().take(50).collect(),
            length: structure::char_len(caption),
            emoji_count: structure::count_emoji(caption),
            save_intensity,
            tone: detect_tone(&body),
            recorded_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngagementLearning {
    pub high_er_posts: Vec<PostSummary>,
    pub low_er_posts: Vec<PostSummary>,
    pub high_count: u64,
    pub high_total_length: u64,
    pub high_total_emoji: u64,
    pub high_casual: u64,
    pub high_formal: u64,
    pub preferred_length: Option<usize>,
    pub preferred_emoji_count: Option<f64>,
    pub high_er_tone: Option<Tone>,
}

impl EngagementLearning {
    pub fn is_empty(&self) -> bool {
        self.high_er_posts.is_empty() && self.low_er_posts.is_empty()
    }

    pub fn record_high(&mut self, post: PostSummary) {
        self.high_count += 1;
        self.high_total_length += post.length as u64;
        self.high_total_emoji += post.emoji_count as u64;
        match post.tone {
            Tone::Casual => self.high_casual += 1,
            Tone::Formal => self.high_formal += 1,
        }

        self.preferred_length =
            Some((self.high_total_length as f64 / self.high_count as f64).round() as usize);
        self.preferred_emoji_count = Some(
            (self.high_total_emoji as f64 / self.high_count as f64 * 10.0).round() / 10.0,
        );
        self.high_er_tone = Some(if self.high_formal > self.high_casual {
            Tone::Formal
        } else {
            Tone::Casual
        });

        push_capped(&mut self.high_er_posts, post, MAX_ENGAGEMENT_POSTS);
    }

    pub fn record_low(&mut self, post: PostSummary) {
        push_capped(&mut self.low_er_posts, post, MAX_ENGAGEMENT_POSTS);
    }
}

fn push_capped<T>(items: &mut Vec<T>, item: T, cap: usize) {
    items.push(item);
    if items.len() > cap {
        let overflow = items.len() - cap;
        items.drain(..overflow);
    }
}

/// Append with dedup; a repeated item moves to the back. Keeps the newest `cap`.
fn merge_recent(items: &mut Vec<String>, incoming: &[String], cap: usize) {
    for item in incoming {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        items.retain(|existing| existing != item);
        items.push(item.to_string());
    }
    if items.len() > cap {
        let overflow = items.len() - cap;
        items.drain(..overflow);
    }
}

/// Everything learned about one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LearningProfile {
    pub word_preferences: BTreeMap<String, i64>,
    pub tone_adjustments: ToneAdjustments,
    pub length_preferences: LengthPreferences,
    pub emoji_style: EmojiStyle,
    pub belief_logs: Vec<BeliefLog>,
    /// Beliefs ever accepted, including evicted ones.
    pub belief_total: u64,
    pub persona_definition: Option<String>,
    pub persona_version: u32,
    /// `belief_total` at the last persona regeneration.
    pub persona_belief_mark: u64,
    pub persona_history: Vec<PersonaVersion>,
    pub writing_style: WritingStyle,
    pub avoided_words: Vec<String>,
    pub latest_learnings: Vec<String>,
    pub engagement_learning: EngagementLearning,
    pub interaction_count: u64,
    pub last_feedback_at: Option<String>,
}

impl LearningProfile {
    /// Whether anything has been learned yet.
    pub fn has_signal(&self) -> bool {
        self.interaction_count > 0 || !self.engagement_learning.is_empty()
    }

    /// Append a belief. Exact duplicates and blank text are ignored.
    ///
    /// Returns true if the belief was stored.
    pub fn add_belief(&mut self, text: &str, source: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.belief_logs.iter().any(|b| b.text == text) {
            return false;
        }
        push_capped(
            &mut self.belief_logs,
            BeliefLog {
                text: text.to_string(),
                source: source.to_string(),
                created_at: Utc::now().to_rfc3339(),
            },
            MAX_BELIEFS,
        );
        self.belief_total += 1;
        true
    }

    pub fn merge_writing_style(&mut self, update: &WritingStyleUpdate) {
        merge_recent(
            &mut self.writing_style.sentence_endings,
            &update.sentence_endings,
            MAX_SENTENCE_ENDINGS,
        );
        merge_recent(
            &mut self.writing_style.catchphrases,
            &update.catchphrases,
            MAX_CATCHPHRASES,
        );
        if let Some(style) = update
            .line_break_style
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            self.writing_style.line_break_style = Some(style.to_string());
        }
    }

    /// Returns false once the list is full or the word is already present.
    pub fn add_avoided_word(&mut self, word: &str) -> bool {
        let word = word.trim();
        if word.is_empty()
            || self.avoided_words.len() >= MAX_AVOIDED_WORDS
            || self.avoided_words.iter().any(|w| w == word)
        {
            return false;
        }
        self.avoided_words.push(word.to_string());
        true
    }

    pub fn add_preferred_word(&mut self, word: &str, weight: i64) {
        let word = word.trim();
        if word.is_empty() {
            return;
        }
        *self.word_preferences.entry(word.to_string()).or_insert(0) += weight;
    }

    /// Count one feedback event.
    pub fn touch(&mut self) {
        self.interaction_count += 1;
        self.last_feedback_at = Some(Utc::now().to_rfc3339());
    }

    /// Apply a deep analysis. Returns the number of new beliefs stored.
    pub fn apply_analysis(&mut self, analysis: &StructuredAnalysis) -> usize {
        let added = analysis
            .beliefs
            .iter()
            .filter(|b| self.add_belief(b, "feedback"))
            .count();
        self.merge_writing_style(&analysis.writing_style);
        for word in &analysis.avoided_words {
            self.add_avoided_word(word);
        }
        for word in &analysis.preferred_words {
            self.add_preferred_word(word, PREFERRED_WORD_WEIGHT);
        }
        self.latest_learnings = analysis.learnings.clone();
        self.touch();
        added
    }

    pub fn should_regenerate_persona(&self) -> bool {
        if self.belief_logs.len() < PERSONA_MIN_BELIEFS {
            return false;
        }
        self.persona_definition.is_none()
            || self.belief_total.saturating_sub(self.persona_belief_mark) >= PERSONA_REFRESH_BELIEFS
    }

    /// Store a freshly generated persona as the next version.
    pub fn apply_persona(&mut self, definition: &str) {
        self.persona_version += 1;
        self.persona_definition = Some(definition.to_string());
        self.persona_belief_mark = self.belief_total;
        push_capped(
            &mut self.persona_history,
            PersonaVersion {
                version: self.persona_version,
                definition: definition.to_string(),
                created_at: Utc::now().to_rfc3339(),
            },
            MAX_PERSONA_HISTORY,
        );
    }

    pub fn belief_texts(&self) -> Vec<String> {
        self.belief_logs.iter().map(|b| b.text.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_belief_cap_is_fifo() {
        let mut profile = LearningProfile::default();
        for i in 0..25 {
            assert!(profile.add_belief(&format!("belief {i}"), "test"));
            assert!(profile.belief_logs.len() <= MAX_BELIEFS);
        }
        assert_eq!(profile.belief_logs.len(), MAX_BELIEFS);
        assert_eq!(profile.belief_logs[0].text, "belief 5");
        assert_eq!(profile.belief_logs[19].text, "belief 24");
        assert_eq!(profile.belief_total, 25);
    }

    #[test]
    fn test_duplicate_belief_ignored() {
        let mut profile = LearningProfile::default();
        assert!(profile.add_belief("地元の食材を大切にしている", "feedback"));
        assert!(!profile.add_belief("地元の食材を大切にしている", "simple"));
        assert!(!profile.add_belief("   ", "simple"));
        assert_eq!(profile.belief_logs.len(), 1);
        assert_eq!(profile.belief_total, 1);
    }

    #[test]
    fn test_persona_trigger() {
        let mut profile = LearningProfile::default();
        for i in 0..4 {
            profile.add_belief(&format!("b{i}"), "t");
            assert!(!profile.should_regenerate_persona());
        }
        profile.add_belief("b4", "t");
        assert!(profile.should_regenerate_persona());
        profile.apply_persona("- v1");
        assert_eq!(profile.persona_version, 1);
        assert!(!profile.should_regenerate_persona());

        profile.add_belief("b5", "t");
        profile.add_belief("b6", "t");
        assert!(!profile.should_regenerate_persona());
        profile.add_belief("b6", "t");
        assert!(!profile.should_regenerate_persona());
        profile.add_belief("b7", "t");
        assert!(profile.should_regenerate_persona());
    }

    #[test]
    fn test_persona_trigger_survives_belief_cap() {
        let mut profile = LearningProfile::default();
        for i in 0..MAX_BELIEFS {
            profile.add_belief(&format!("b{i}"), "t");
        }
        profile.apply_persona("- v1");
        for i in 0..3 {
            profile.add_belief(&format!("new{i}"), "t");
        }
        assert_eq!(profile.belief_logs.len(), MAX_BELIEFS);
        assert!(profile.should_regenerate_persona());
    }

    #[test]
    fn test_persona_history_capped() {
        let mut profile = LearningProfile::default();
        for i in 1..=7 {
            profile.apply_persona(&format!("- v{i}"));
        }
        assert_eq!(profile.persona_version, 7);
        assert_eq!(profile.persona_history.len(), MAX_PERSONA_HISTORY);
        assert_eq!(profile.persona_history[0].version, 3);
        assert_eq!(profile.persona_definition.as_deref(), Some("- v7"));
    }

    #[test]
    fn test_writing_style_merge_keeps_recent() {
        let mut profile = LearningProfile::default();
        let endings = |items: &[&str]| WritingStyleUpdate {
            sentence_endings: items.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        profile.merge_writing_style(&endings(&["です", "ます", "よ", "ね"]));
        profile.merge_writing_style(&endings(&["です", "だよ", "かな"]));
        assert_eq!(
            profile.writing_style.sentence_endings,
            vec!["よ", "ね", "です", "だよ", "かな"]
        );

        let catchphrases: Vec<String> = (0..12).map(|i| format!("c{i}")).collect();
        profile.merge_writing_style(&WritingStyleUpdate {
            catchphrases,
            line_break_style: Some("一文ごとに改行".to_string()),
            ..Default::default()
        });
        assert_eq!(profile.writing_style.catchphrases.len(), MAX_CATCHPHRASES);
        assert_eq!(profile.writing_style.catchphrases[0], "c2");
        assert_eq!(
            profile.writing_style.line_break_style.as_deref(),
            Some("一文ごとに改行")
        );
    }

    #[test]
    fn test_avoided_words_stop_when_full() {
        let mut profile = LearningProfile::default();
        for i in 0..MAX_AVOIDED_WORDS {
            assert!(profile.add_avoided_word(&format!("w{i}")));
        }
        assert!(!profile.add_avoided_word("overflow"));
        assert_eq!(profile.avoided_words.len(), MAX_AVOIDED_WORDS);
        assert_eq!(profile.avoided_words[0], "w0");
    }

    #[test]
    fn test_apply_analysis() {
        let mut profile = LearningProfile::default();
        profile.latest_learnings = vec!["old".to_string()];
        let analysis = StructuredAnalysis {
            beliefs: vec!["手作りにこだわる".to_string()],
            preferred_words: vec!["ほっこり".to_string()],
            avoided_words: vec!["激安".to_string()],
            learnings: vec!["語尾を柔らかく".to_string()],
            ..Default::default()
        };
        assert_eq!(profile.apply_analysis(&analysis), 1);
        assert_eq!(profile.apply_analysis(&analysis), 0);

        assert_eq!(profile.word_preferences["ほっこり"], 10);
        assert_eq!(profile.avoided_words, vec!["激安"]);
        assert_eq!(profile.latest_learnings, vec!["語尾を柔らかく"]);
        assert_eq!(profile.interaction_count, 2);
        assert!(profile.last_feedback_at.is_some());
    }

    #[test]
    fn test_engagement_learning_totals() {
        let mut learning = EngagementLearning::default();
        learning.record_high(PostSummary::from_caption("新作のタルトです🍓🍓", 0.2));
        learning.record_high(PostSummary::from_caption("焼きたてだよ〜🍞", 0.3));
        assert_eq!(learning.high_count, 2);
        assert_eq!(learning.preferred_emoji_count, Some(1.5));
        assert!(learning.preferred_length.is_some());
        assert!(learning.high_er_tone.is_some());

        for _ in 0..12 {
            learning.record_low(PostSummary::from_caption("いつものパンです", 0.01));
        }
        assert_eq!(learning.low_er_posts.len(), MAX_ENGAGEMENT_POSTS);
    }

    #[test]
    fn test_detect_tone() {
        assert_eq!(detect_tone("本日も営業しております。お待ちしています"), Tone::Formal);
        assert_eq!(detect_tone("焼きたてだよ〜！食べにきてね♪"), Tone::Casual);
    }

    #[test]
    fn test_laughter_counts_only_at_line_end() {
        assert_eq!(
            detect_tone("新しいwifiを導入しました。www.example.com からご予約ください"),
            Tone::Formal
        );
        assert_eq!(
            detect_tone("本日も営業します。店長が転びましたｗｗ\nまた来てｗ\nおいしすぎたwww"),
            Tone::Casual
        );
    }

    #[test]
    fn test_profile_json_defaults() {
        let profile: LearningProfile = serde_json::from_str(r#"{"interaction_count": 3}"#).unwrap();
        assert_eq!(profile.interaction_count, 3);
        assert_eq!(profile.emoji_style, EmojiStyle::Moderate);
        assert!(profile.has_signal());
        assert!(!LearningProfile::default().has_signal());
    }
}
