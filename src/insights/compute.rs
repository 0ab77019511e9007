//! Cohort statistics over reported records. Pure, no I/O.

use serde::Serialize;

use crate::db::EngagementMetricRecord;
use crate::pattern::{extract_winning_pattern, WinningPattern, DEFAULT_MIN_COUNT};

const MAX_TOP_HASHTAGS: usize = 10;
const HASHTAG_MIN_OCCURRENCES: usize = 3;
const TOP_POSTS: usize = 20;
const BEST_HOURS: usize = 3;

pub const DEFAULT_AVG_LENGTH: usize = 200;
pub const DEFAULT_AVG_EMOJI_COUNT: f64 = 3.0;
pub const DEFAULT_POSTING_HOURS: [u32; 3] = [12, 18, 20];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashtagInsight {
    pub tag: String,
    pub count: usize,
    pub avg_save_intensity: f64,
}

/// Statistics for one cohort (own store, category or category group).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortInsights {
    pub top_hashtags: Vec<HashtagInsight>,
    pub avg_length: usize,
    pub avg_emoji_count: f64,
    pub top_posts_avg_length: usize,
    pub avg_save_intensity: f64,
    pub top_posts_avg_save_intensity: f64,
    pub winning_pattern: Option<WinningPattern>,
    pub best_posting_hours: Vec<u32>,
    pub sample_size: usize,
    pub avg_engagement_rate: Option<f64>,
}

impl Default for CohortInsights {
    fn default() -> Self {
        Self {
            top_hashtags: Vec::new(),
            avg_length: DEFAULT_AVG_LENGTH,
            avg_emoji_count: DEFAULT_AVG_EMOJI_COUNT,
            top_posts_avg_length: DEFAULT_AVG_LENGTH,
            avg_save_intensity: 0.0,
            top_posts_avg_save_intensity: 0.0,
            winning_pattern: None,
            best_posting_hours: DEFAULT_POSTING_HOURS.to_vec(),
            sample_size: 0,
            avg_engagement_rate: None,
        }
    }
}

impl CohortInsights {
    pub fn has_signal(&self) -> bool {
        self.sample_size > 0
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Hashtags ranked by mean save intensity of the posts using them.
///
/// Tags need `HASHTAG_MIN_OCCURRENCES` uses; if none qualify, any tag seen once does.
fn top_hashtags(records: &[&EngagementMetricRecord]) -> Vec<HashtagInsight> {
    let mut stats: Vec<(String, usize, f64)> = Vec::new();
    for record in records {
        for tag in &record.hashtags {
            match stats.iter_mut().find(|(t, _, _)| t == tag) {
                Some((_, count, total)) => {
                    *count += 1;
                    *total += record.save_intensity;
                }
                None => stats.push((tag.clone(), 1, record.save_intensity)),
            }
        }
    }

    let min_count = if stats.iter().any(|(_, n, _)| *n >= HASHTAG_MIN_OCCURRENCES) {
        HASHTAG_MIN_OCCURRENCES
    } else {
        1
    };

    let mut ranked: Vec<HashtagInsight> = stats
        .into_iter()
        .filter(|(_, count, _)| *count >= min_count)
        .map(|(tag, count, total)| HashtagInsight {
            tag,
            count,
            avg_save_intensity: round_to(total / count as f64, 3),
        })
        .collect();
    ranked.sort_by(|a, b| b.avg_save_intensity.total_cmp(&a.avg_save_intensity));
    ranked.truncate(MAX_TOP_HASHTAGS);
    ranked
}

/// Most frequent posting hours. Equal counts keep first-seen order.
fn best_posting_hours(records: &[&EngagementMetricRecord]) -> Vec<u32> {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for hour in records.iter().filter_map(|r| r.post_hour) {
        match counts.iter_mut().find(|(h, _)| *h == hour) {
            Some((_, n)) => *n += 1,
            None => counts.push((hour, 1)),
        }
    }
    if counts.is_empty() {
        return DEFAULT_POSTING_HOURS.to_vec();
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(BEST_HOURS).map(|(h, _)| h).collect()
}

/// Compute cohort statistics. Unreported records are ignored.
pub fn compute_insights(records: &[EngagementMetricRecord]) -> CohortInsights {
    let mut reported: Vec<&EngagementMetricRecord> =
        records.iter().filter(|r| r.is_reported()).collect();
    if reported.is_empty() {
        return CohortInsights::default();
    }
    reported.sort_by(|a, b| b.save_intensity.total_cmp(&a.save_intensity));

    let top = &reported[..reported.len().min(TOP_POSTS)];
    let owned: Vec<EngagementMetricRecord> = reported.iter().map(|r| (*r).clone()).collect();

    CohortInsights {
        top_hashtags: top_hashtags(&reported),
        avg_length: mean(reported.iter().map(|r| r.post_length as f64))
            .map_or(DEFAULT_AVG_LENGTH, |m| m.round() as usize),
        avg_emoji_count: mean(reported.iter().map(|r| r.emoji_count as f64))
            .map_or(DEFAULT_AVG_EMOJI_COUNT, |m| round_to(m, 1)),
        top_posts_avg_length: mean(top.iter().map(|r| r.post_length as f64))
            .map_or(DEFAULT_AVG_LENGTH, |m| m.round() as usize),
        avg_save_intensity: mean(reported.iter().map(|r| r.save_intensity))
            .map_or(0.0, |m| round_to(m, 3)),
        top_posts_avg_save_intensity: mean(top.iter().map(|r| r.save_intensity))
            .map_or(0.0, |m| round_to(m, 3)),
        winning_pattern: extract_winning_pattern(&owned, DEFAULT_MIN_COUNT),
        best_posting_hours: best_posting_hours(&reported),
        sample_size: reported.len(),
        avg_engagement_rate: mean(
            reported
                .iter()
                .filter(|r| r.has_real_reach())
                .map(|r| r.engagement_rate),
        )
        .map(|m| round_to(m, 2)),
    }
}
