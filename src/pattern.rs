//! Winning-pattern extraction over fingerprinted records.

use serde::{Deserialize, Serialize};

use crate::db::EngagementMetricRecord;
use crate::structure::{CtaPosition, HookType};

/// Default minimum number of hook-typed records before a pattern is reported.
pub const DEFAULT_MIN_COUNT: usize = 10;

/// Dominant structure among a set of records. Always derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningPattern {
    pub dominant_hook_type: HookType,
    /// Share of the dominant hook type, in whole percent.
    pub dominant_hook_ratio: u32,
    pub dominant_cta_position: CtaPosition,
    pub average_line_break_density: f64,
    pub average_save_intensity: f64,
    pub sample_size: usize,
}

/// Most frequent value and its count.
///
/// Ties go to the value encountered first, so the result depends on input
/// order. Callers pass records sorted by save intensity, which makes the
/// better-performing candidate win a tie.
fn mode<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Option<(T, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (value, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Summarize the structure of the given records.
///
/// Returns `None` when fewer than `min_count` records have a known hook type.
pub fn extract_winning_pattern(
    records: &[EngagementMetricRecord],
    min_count: usize,
) -> Option<WinningPattern> {
    let typed: Vec<&EngagementMetricRecord> = records
        .iter()
        .filter(|r| r.fingerprint.hook_type != HookType::Unknown)
        .collect();
    if typed.is_empty() || typed.len() < min_count {
        return None;
    }

    let n = typed.len();
    let (dominant_hook_type, hook_count) = mode(typed.iter().map(|r| r.fingerprint.hook_type))?;
    let (dominant_cta_position, _) = mode(typed.iter().map(|r| r.fingerprint.cta_position))?;

    let density_sum: f64 = typed.iter().map(|r| r.fingerprint.line_break_density).sum();
    let intensity_sum: f64 = typed.iter().map(|r| r.save_intensity).sum();

    Some(WinningPattern {
        dominant_hook_type,
        dominant_hook_ratio: (hook_count as f64 / n as f64 * 100.0).round() as u32,
        dominant_cta_position,
        average_line_break_density: round_to(density_sum / n as f64, 4),
        average_save_intensity: round_to(intensity_sum / n as f64, 3),
        sample_size: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hook: HookType, cta: CtaPosition, save_intensity: f64) -> EngagementMetricRecord {
        let mut r = EngagementMetricRecord::new("s", "カフェ", "");
        r.fingerprint.hook_type = hook;
        r.fingerprint.cta_position = cta;
        r.fingerprint.line_break_density = 0.05;
        r.save_intensity = save_intensity;
        r
    }

    #[test]
    fn test_emotion_dominant() {
        let mut records = Vec::new();
        for _ in 0..8 {
            records.push(record(HookType::Emotion, CtaPosition::End, 0.12));
        }
        for _ in 0..4 {
            records.push(record(HookType::Fact, CtaPosition::Early, 0.12));
        }

        let pattern = extract_winning_pattern(&records, 10).unwrap();
        assert_eq!(pattern.dominant_hook_type, HookType::Emotion);
        assert_eq!(pattern.dominant_hook_ratio, 67);
        assert_eq!(pattern.dominant_cta_position, CtaPosition::End);
        assert_eq!(pattern.sample_size, 12);
        assert_eq!(pattern.average_save_intensity, 0.12);
        assert_eq!(pattern.average_line_break_density, 0.05);
    }

    #[test]
    fn test_unknown_hooks_are_filtered() {
        let mut records: Vec<_> = (0..9)
            .map(|_| record(HookType::Question, CtaPosition::None, 0.1))
            .collect();
        for _ in 0..5 {
            records.push(record(HookType::Unknown, CtaPosition::None, 0.9));
        }
        assert!(extract_winning_pattern(&records, 10).is_none());

        records.push(record(HookType::Fact, CtaPosition::Middle, 0.2));
        let pattern = extract_winning_pattern(&records, 10).unwrap();
        assert_eq!(pattern.sample_size, 10);
        assert_eq!(pattern.dominant_hook_type, HookType::Question);
        assert_eq!(pattern.average_save_intensity, 0.11);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_winning_pattern(&[], 0).is_none());
        assert!(extract_winning_pattern(&[], DEFAULT_MIN_COUNT).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let mut records = Vec::new();
        for i in 0..10 {
            let hook = if i % 2 == 0 {
                HookType::TaigenDome
            } else {
                HookType::Emotion
            };
            records.push(record(hook, CtaPosition::End, 0.1));
        }
        let pattern = extract_winning_pattern(&records, 10).unwrap();
        assert_eq!(pattern.dominant_hook_type, HookType::TaigenDome);
        assert_eq!(pattern.dominant_hook_ratio, 50);

        records.reverse();
        let pattern = extract_winning_pattern(&records, 10).unwrap();
        assert_eq!(pattern.dominant_hook_type, HookType::Emotion);
    }
}
