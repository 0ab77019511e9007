//! Metric validation before persistence.
//!
//! Range checks against per-category bounds, a cross-field engagement-rate
//! consistency check, and a z-score outlier test over recent history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::BoundsOverride;

/// Maximum allowed gap (percentage points) between reported and recomputed engagement rate.
const RATE_TOLERANCE_POINTS: f64 = 10.0;

/// Minimum history size before the outlier test can fire.
const MIN_OUTLIER_HISTORY: usize = 3;

/// |z| above this is an outlier.
const OUTLIER_Z_THRESHOLD: f64 = 3.0;

/// Inclusive bounds for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBounds {
    pub likes_max: u64,
    pub saves_max: u64,
    pub comments_max: u64,
    pub reach_max: u64,
    pub engagement_rate_max: f64,
    pub post_length_min: usize,
    pub post_length_max: usize,
    pub emoji_count_max: usize,
    pub hashtag_count_max: usize,
}

impl Default for MetricBounds {
    fn default() -> Self {
        Self {
            likes_max: 50_000,
            saves_max: 10_000,
            comments_max: 5_000,
            reach_max: 1_000_000,
            engagement_rate_max: 100.0,
            post_length_min: 10,
            post_length_max: 3_000,
            emoji_count_max: 50,
            hashtag_count_max: 30,
        }
    }
}

impl MetricBounds {
    fn apply(mut self, o: &BoundsOverride) -> Self {
        if let Some(v) = o.likes_max {
            self.likes_max = v;
        }
        if let Some(v) = o.saves_max {
            self.saves_max = v;
        }
        if let Some(v) = o.comments_max {
            self.comments_max = v;
        }
        if let Some(v) = o.reach_max {
            self.reach_max = v;
        }
        if let Some(v) = o.engagement_rate_max {
            self.engagement_rate_max = v;
        }
        if let Some(v) = o.post_length_min {
            self.post_length_min = v;
        }
        if let Some(v) = o.post_length_max {
            self.post_length_max = v;
        }
        if let Some(v) = o.emoji_count_max {
            self.emoji_count_max = v;
        }
        if let Some(v) = o.hashtag_count_max {
            self.hashtag_count_max = v;
        }
        self
    }
}

/// Bounds lookup by canonical category, falling back to [`MetricBounds::default`].
#[derive(Debug, Clone, Default)]
pub struct BoundsTable {
    overrides: HashMap<String, MetricBounds>,
}

impl BoundsTable {
    pub fn from_overrides(overrides: &HashMap<String, BoundsOverride>) -> Self {
        let overrides = overrides
            .iter()
            .map(|(category, o)| {
                (
                    crate::category::normalize(category),
                    MetricBounds::default().apply(o),
                )
            })
            .collect();
        Self { overrides }
    }

    pub fn for_category(&self, category: &str) -> MetricBounds {
        self.overrides.get(category).cloned().unwrap_or_default()
    }
}

/// The fields of one report that are subject to validation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub likes: u64,
    pub saves: u64,
    pub comments: u64,
    pub reach: Option<u64>,
    /// Engagement rate as reported by the user, in percent.
    pub engagement_rate: Option<f64>,
    pub post_length: usize,
    pub emoji_count: usize,
    pub hashtag_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

fn check_max<T: PartialOrd + std::fmt::Display>(
    errors: &mut Vec<String>,
    field: &str,
    value: T,
    max: T,
    category: &str,
) {
    if value > max {
        errors.push(format!(
            "{field} {value} exceeds maximum {max} for category {category}"
        ));
    }
}

/// Validate one snapshot against the bounds of `category`.
pub fn validate(snapshot: &MetricSnapshot, category: &str, bounds: &MetricBounds) -> ValidationResult {
    let mut errors = Vec::new();

    check_max(&mut errors, "likes_count", snapshot.likes, bounds.likes_max, category);
    check_max(&mut errors, "saves_count", snapshot.saves, bounds.saves_max, category);
    check_max(
        &mut errors,
        "comments_count",
        snapshot.comments,
        bounds.comments_max,
        category,
    );
    if let Some(reach) = snapshot.reach {
        check_max(&mut errors, "reach", reach, bounds.reach_max, category);
    }
    if let Some(rate) = snapshot.engagement_rate {
        if rate < 0.0 || !rate.is_finite() {
            errors.push(format!("engagement_rate {rate} is below minimum 0"));
        } else {
            check_max(
                &mut errors,
                "engagement_rate",
                rate,
                bounds.engagement_rate_max,
                category,
            );
        }
    }
    if snapshot.post_length < bounds.post_length_min {
        errors.push(format!(
            "post_length {} is below minimum {} for category {category}",
            snapshot.post_length, bounds.post_length_min
        ));
    }
    check_max(
        &mut errors,
        "post_length",
        snapshot.post_length,
        bounds.post_length_max,
        category,
    );
    check_max(
        &mut errors,
        "emoji_count",
        snapshot.emoji_count,
        bounds.emoji_count_max,
        category,
    );
    check_max(
        &mut errors,
        "hashtag_count",
        snapshot.hashtag_count,
        bounds.hashtag_count_max,
        category,
    );

    if let (Some(reported), Some(reach)) = (snapshot.engagement_rate, snapshot.reach) {
        if reach > 0 {
            let interactions =
                snapshot.likes as f64 + snapshot.saves as f64 + snapshot.comments as f64;
            let computed = interactions / reach as f64 * 100.0;
            if (reported - computed).abs() > RATE_TOLERANCE_POINTS {
                errors.push(format!(
                    "engagement_rate {reported:.2} is inconsistent with computed {computed:.2}"
                ));
            }
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

/// Population z-score of `value` against `history`.
///
/// `None` when history is too short or has zero spread.
pub fn z_score(history: &[f64], value: f64) -> Option<f64> {
    if history.len() < MIN_OUTLIER_HISTORY {
        return None;
    }
    let n = history.len() as f64;
    let mean = history.iter().sum::<f64>() / n;
    let variance = history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return None;
    }
    Some((value - mean) / stddev)
}

pub fn is_statistical_outlier(history: &[f64], value: f64) -> bool {
    z_score(history, value)
        .map(|z| z.abs() > OUTLIER_Z_THRESHOLD)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricSnapshot {
        MetricSnapshot {
            likes: 120,
            saves: 15,
            comments: 4,
            reach: Some(2000),
            engagement_rate: Some(6.95),
            post_length: 180,
            emoji_count: 3,
            hashtag_count: 5,
        }
    }

    #[test]
    fn test_valid_snapshot() {
        let result = validate(&snapshot(), "カフェ", &MetricBounds::default());
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_likes_over_bound() {
        let s = MetricSnapshot {
            likes: 99_999,
            saves: 100,
            comments: 20,
            reach: Some(5000),
            engagement_rate: Some(12.4),
            ..snapshot()
        };
        let result = validate(&s, "カフェ", &MetricBounds::default());
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("likes_count") && e.contains("50000")));
    }

    #[test]
    fn test_huge_counts_rejected_without_overflow() {
        let s = MetricSnapshot {
            likes: u64::MAX,
            saves: u64::MAX,
            comments: 1,
            ..snapshot()
        };
        let result = validate(&s, "カフェ", &MetricBounds::default());
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("likes_count")));
    }

    #[test]
    fn test_rate_inconsistency() {
        let s = MetricSnapshot {
            engagement_rate: Some(40.0),
            ..snapshot()
        };
        let result = validate(&s, "カフェ", &MetricBounds::default());
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("inconsistent"));
    }

    #[test]
    fn test_rate_check_skipped_without_reach() {
        let s = MetricSnapshot {
            reach: None,
            engagement_rate: Some(40.0),
            ..snapshot()
        };
        assert!(validate(&s, "カフェ", &MetricBounds::default()).valid);

        let s = MetricSnapshot {
            reach: Some(0),
            engagement_rate: Some(40.0),
            ..snapshot()
        };
        assert!(validate(&s, "カフェ", &MetricBounds::default()).valid);
    }

    #[test]
    fn test_short_post_rejected() {
        let s = MetricSnapshot {
            post_length: 4,
            ..snapshot()
        };
        let result = validate(&s, "カフェ", &MetricBounds::default());
        assert!(result.errors.iter().any(|e| e.starts_with("post_length")));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let s = MetricSnapshot {
            likes: 70_000,
            hashtag_count: 40,
            ..snapshot()
        };
        let bounds = MetricBounds::default();
        assert_eq!(validate(&s, "カフェ", &bounds), validate(&s, "カフェ", &bounds));
    }

    #[test]
    fn test_bounds_table_override() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "cafe".to_string(),
            BoundsOverride {
                likes_max: Some(100),
                ..Default::default()
            },
        );
        let table = BoundsTable::from_overrides(&overrides);
        let cafe = table.for_category("カフェ");
        assert_eq!(cafe.likes_max, 100);
        assert_eq!(cafe.saves_max, 10_000);
        assert_eq!(table.for_category("花屋"), MetricBounds::default());

        let result = validate(&snapshot(), "カフェ", &cafe);
        assert!(!result.valid);
    }

    #[test]
    fn test_outlier_detection() {
        let history = [100.0, 110.0, 95.0, 105.0];
        assert!(is_statistical_outlier(&history, 500.0));
        assert!(!is_statistical_outlier(&history, 104.0));
    }

    #[test]
    fn test_outlier_needs_three_points() {
        assert!(!is_statistical_outlier(&[100.0, 110.0], 1_000_000.0));
        assert!(!is_statistical_outlier(&[], 5.0));
    }

    #[test]
    fn test_outlier_flat_history() {
        assert!(!is_statistical_outlier(&[50.0, 50.0, 50.0], 5000.0));
    }

    #[test]
    fn test_outlier_monotonic() {
        let history = [100.0, 110.0, 95.0, 105.0, 98.0];
        let mut flagged = false;
        for step in 0..200 {
            let value = 100.0 + step as f64;
            let now = is_statistical_outlier(&history, value);
            assert!(!(flagged && !now), "flipped back at {value}");
            flagged |= now;
        }
        assert!(flagged);
    }
}
