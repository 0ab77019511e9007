//! Renders blended insights as a prompt fragment.

use super::{BlendedInsights, CohortInsights};
use crate::profile::sanitize_fragment;
use crate::structure::{CtaPosition, HookType};

fn hook_label(hook: HookType) -> &'static str {
    match hook {
        HookType::Emotion => "感情を込めた書き出し",
        HookType::Question => "問いかけの書き出し",
        HookType::TaigenDome => "体言止めの書き出し",
        HookType::Fact => "事実・新着情報から入る書き出し",
        HookType::Unknown => "特定の型のない書き出し",
    }
}

fn cta_label(position: CtaPosition) -> &'static str {
    match position {
        CtaPosition::None => "行動の呼びかけなし",
        CtaPosition::Early => "冒頭で行動を呼びかける",
        CtaPosition::Middle => "中盤で行動を呼びかける",
        CtaPosition::End => "最後に行動を呼びかける",
    }
}

fn cohort_section(title: &str, weight: u32, insights: &CohortInsights) -> Option<String> {
    if !insights.has_signal() {
        return None;
    }

    let mut lines = vec![format!(
        "【{}の傾向（参考度{weight}%・{}件）】",
        sanitize_fragment(title),
        insights.sample_size
    )];

    if !insights.top_hashtags.is_empty() {
        let tags: Vec<String> = insights
            .top_hashtags
            .iter()
            .map(|h| sanitize_fragment(&h.tag))
            .collect();
        lines.push(format!("- 保存されやすいハッシュタグ: {}", tags.join(" ")));
    }
    lines.push(format!(
        "- 反応上位の投稿は平均{}文字（全体平均{}文字）",
        insights.top_posts_avg_length, insights.avg_length
    ));
    lines.push(format!("- 絵文字は平均{}個", insights.avg_emoji_count));
    if let Some(pattern) = &insights.winning_pattern {
        lines.push(format!(
            "- よく伸びる構成: {}（{}%）、{}",
            hook_label(pattern.dominant_hook_type),
            pattern.dominant_hook_ratio,
            cta_label(pattern.dominant_cta_position)
        ));
    }
    let hours: Vec<String> = insights
        .best_posting_hours
        .iter()
        .map(|h| format!("{h}時"))
        .collect();
    lines.push(format!("- 投稿が多い時間帯: {}", hours.join("・")));

    Some(lines.join("\n"))
}

/// One section per cohort that has data. Empty when none do.
pub fn render_insight_prompt(blended: &BlendedInsights) -> String {
    let ratio = &blended.blend_ratio;
    let sections: Vec<String> = [
        cohort_section("このお店", ratio.own, &blended.own),
        cohort_section(&blended.category_label, ratio.category, &blended.category),
        cohort_section(&blended.category_group, ratio.group, &blended.group),
    ]
    .into_iter()
    .flatten()
    .collect();

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::BlendRatio;

    fn blended() -> BlendedInsights {
        BlendedInsights {
            own: CohortInsights::default(),
            category: CohortInsights::default(),
            group: CohortInsights::default(),
            category_label: "カフェ".to_string(),
            category_group: "飲食".to_string(),
            blend_ratio: BlendRatio::default(),
        }
    }

    #[test]
    fn test_no_signal_renders_nothing() {
        assert_eq!(render_insight_prompt(&blended()), "");
    }

    #[test]
    fn test_only_cohorts_with_data_render() {
        let mut b = blended();
        b.category.sample_size = 12;
        let text = render_insight_prompt(&b);
        assert!(text.starts_with("【カフェの傾向（参考度30%・12件）】"));
        assert!(!text.contains("このお店"));
        assert!(!text.contains("飲食"));
        assert!(text.contains("12時・18時・20時"));
    }

    #[test]
    fn test_hashtags_are_sanitized() {
        let mut b = blended();
        b.own.sample_size = 1;
        b.own.top_hashtags.push(crate::insights::HashtagInsight {
            tag: "#{evil}".to_string(),
            count: 1,
            avg_save_intensity: 0.1,
        });
        let text = render_insight_prompt(&b);
        assert!(!text.contains('{'));
        assert!(text.contains("#（evil）"));
    }
}
