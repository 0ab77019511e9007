//! Outcome reports: record building, validation and outlier screening.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::Serialize;

use crate::category;
use crate::db::EngagementMetricRecord;
use crate::structure;
use crate::validator::{self, MetricBounds, MetricSnapshot};

/// Same-category records the outlier test compares against.
pub const OUTLIER_HISTORY: usize = 30;

/// One user-reported outcome for one caption.
#[derive(Debug, Clone, Default)]
pub struct OutcomeReport {
    pub store_id: String,
    pub category: String,
    pub caption_text: String,
    pub post_id: Option<String>,
    pub likes: u64,
    pub saves: u64,
    pub comments: u64,
    pub reach: Option<u64>,
    /// Engagement rate as the user reported it, in percent.
    pub engagement_rate: Option<f64>,
    pub posted_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    Validation { errors: Vec<String> },
    Outlier { field: String, value: u64, z_score: f64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Validation { errors } => write!(f, "validation failed: {}", errors.join("; ")),
            Rejection::Outlier {
                field,
                value,
                z_score,
            } => write!(f, "{field} {value} is a statistical outlier (z = {z_score:.2})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeResult {
    Recorded {
        id: String,
        updated: bool,
        /// The post already had reported numbers before this report.
        corrected: bool,
    },
    Rejected(Rejection),
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Merge a report into an existing record (same post) or a fresh one.
pub(crate) fn build_record(
    existing: Option<EngagementMetricRecord>,
    report: &OutcomeReport,
) -> EngagementMetricRecord {
    let mut record = match existing {
        Some(mut record) => {
            record.category = category::normalize(&report.category);
            record.category_group = category::group_of(&record.category).to_string();
            if !report.caption_text.trim().is_empty() && report.caption_text != record.caption_text {
                record.caption_text = report.caption_text.clone();
                record.hashtags = structure::extract_hashtags(&record.caption_text);
                record.post_length = structure::char_len(&record.caption_text);
                record.emoji_count = structure::count_emoji(&record.caption_text);
                record.fingerprint = structure::analyze(&record.caption_text);
            }
            record.updated_at = Utc::now().to_rfc3339();
            record
        }
        None => {
            let mut record =
                EngagementMetricRecord::new(&report.store_id, &report.category, &report.caption_text);
            record.post_id = report.post_id.clone();
            record
        }
    };

    record.apply_counts(report.likes, report.saves, report.comments);

    let interactions = report.likes as f64 + report.saves as f64 + report.comments as f64;
    match (report.reach.filter(|r| *r > 0), report.engagement_rate) {
        (Some(reach), rate) => {
            record.reach = Some(reach);
            record.reach_estimated = false;
            record.engagement_rate =
                round_to(rate.unwrap_or(interactions / reach as f64 * 100.0), 2);
        }
        (None, Some(rate)) if rate > 0.0 && interactions > 0.0 => {
            record.reach = Some((interactions * 100.0 / rate).round() as u64);
            record.reach_estimated = true;
            record.engagement_rate = round_to(rate, 2);
        }
        (None, rate) => {
            record.reach = None;
            record.reach_estimated = false;
            record.engagement_rate = round_to(rate.unwrap_or(0.0), 2);
        }
    }

    if let Some(posted_at) = report.posted_at {
        record.post_hour = Some(posted_at.hour());
        record.day_of_week = Some(posted_at.weekday().num_days_from_sunday());
    }
    record
}

/// Validate the record as built, using the rate the user actually reported.
pub(crate) fn validate_record(
    record: &EngagementMetricRecord,
    report: &OutcomeReport,
    bounds: &MetricBounds,
) -> Option<Rejection> {
    let snapshot = MetricSnapshot {
        likes: record.likes_count,
        saves: record.saves_count,
        comments: record.comments_count,
        reach: report.reach,
        engagement_rate: report.engagement_rate,
        post_length: record.post_length,
        emoji_count: record.emoji_count,
        hashtag_count: record.hashtags.len(),
    };
    let result = validator::validate(&snapshot, &record.category, bounds);
    (!result.valid).then_some(Rejection::Validation {
        errors: result.errors,
    })
}

/// Likes and saves against the recent same-category history.
pub(crate) fn screen_outliers(
    record: &EngagementMetricRecord,
    history: &[EngagementMetricRecord],
) -> Option<Rejection> {
    let peers: Vec<&EngagementMetricRecord> =
        history.iter().filter(|r| r.id != record.id).collect();

    let fields: [(&str, u64, fn(&EngagementMetricRecord) -> u64); 2] = [
        ("likes_count", record.likes_count, |r| r.likes_count),
        ("saves_count", record.saves_count, |r| r.saves_count),
    ];
    for (field, value, get) in fields {
        let sample: Vec<f64> = peers.iter().map(|r| get(r) as f64).collect();
        if let Some(z) = validator::z_score(&sample, value as f64) {
            if validator::is_statistical_outlier(&sample, value as f64) {
                return Some(Rejection::Outlier {
                    field: field.to_string(),
                    value,
                    z_score: round_to(z, 2),
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(likes: u64, saves: u64) -> OutcomeReport {
        OutcomeReport {
            store_id: "store-1".to_string(),
            category: "cafe".to_string(),
            caption_text: "季節のタルトが始まりました🍓 #カフェ".to_string(),
            likes,
            saves,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_fresh_record() {
        let mut r = report(100, 20);
        r.post_id = Some("p1".to_string());
        r.posted_at = DateTime::parse_from_rfc3339("2024-06-02T18:30:00+09:00").ok();
        let record = build_record(None, &r);

        assert_eq!(record.category, "カフェ");
        assert_eq!(record.category_group, "飲食");
        assert_eq!(record.post_id.as_deref(), Some("p1"));
        assert_eq!(record.save_intensity, 0.2);
        assert!(record.is_reported());
        assert_eq!(record.hashtags, vec!["#カフェ"]);
        assert_eq!(record.post_hour, Some(18));
        assert_eq!(record.day_of_week, Some(0));
        assert_eq!(record.reach, None);
    }

    #[test]
    fn test_reach_derivation() {
        let mut r = report(80, 10);
        r.comments = 10;
        r.reach = Some(1000);
        let record = build_record(None, &r);
        assert_eq!(record.engagement_rate, 10.0);
        assert!(record.has_real_reach());

        let mut r = report(80, 10);
        r.comments = 10;
        r.engagement_rate = Some(5.0);
        let record = build_record(None, &r);
        assert_eq!(record.reach, Some(2000));
        assert!(record.reach_estimated);
        assert!(!record.has_real_reach());
    }

    #[test]
    fn test_update_keeps_identity() {
        let seeded = EngagementMetricRecord::new("store-1", "カフェ", "季節のタルトが始まりました🍓 #カフェ");
        let id = seeded.id.clone();
        let created = seeded.created_at.clone();
        let record = build_record(Some(seeded), &report(50, 5));
        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created);
        assert_eq!(record.likes_count, 50);
        assert!(record.is_reported());
    }

    #[test]
    fn test_validation_rejection() {
        let mut r = report(99_999, 100);
        r.comments = 20;
        r.reach = Some(5000);
        r.engagement_rate = Some(12.4);
        let record = build_record(None, &r);
        let rejection = validate_record(&record, &r, &MetricBounds::default()).unwrap();
        let Rejection::Validation { errors } = rejection else {
            panic!("expected validation rejection");
        };
        assert!(errors.iter().any(|e| e.contains("likes_count") && e.contains("50000")));
    }

    #[test]
    fn test_huge_count_is_a_validation_rejection() {
        let mut r = report(u64::MAX, 1);
        r.comments = u64::MAX;
        r.engagement_rate = Some(5.0);
        let record = build_record(None, &r);
        assert!(matches!(
            validate_record(&record, &r, &MetricBounds::default()),
            Some(Rejection::Validation { .. })
        ));
    }

    #[test]
    fn test_outlier_screen() {
        let history: Vec<_> = [100, 110, 95, 105]
            .iter()
            .map(|likes| build_record(None, &report(*likes, 10)))
            .collect();

        let spike = build_record(None, &report(500, 10));
        let Some(Rejection::Outlier { field, value, .. }) = screen_outliers(&spike, &history) else {
            panic!("expected outlier");
        };
        assert_eq!(field, "likes_count");
        assert_eq!(value, 500);

        let normal = build_record(None, &report(102, 10));
        assert_eq!(screen_outliers(&normal, &history), None);
        assert_eq!(screen_outliers(&spike, &history[..2]), None);
    }
}
