//! Render profile slices as prompt fragments.
//!
//! Both renderers return an empty string when there is nothing to say; a
//! header is never emitted without at least one bullet under it.

use super::{EmojiStyle, LearningProfile};

const MAX_PREFERRED_WORDS: usize = 5;
const MAX_RENDERED_BELIEFS: usize = 10;
const MAX_RENDERED_AVOIDED: usize = 20;

/// Make user-derived text safe to splice into a prompt template.
pub fn sanitize_fragment(text: &str) -> String {
    sanitize_block(text)
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Like [`sanitize_fragment`] but keeps line breaks.
fn sanitize_block(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '{' => '（',
            '}' => '）',
            '`' => '\'',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|w| format!("「{}」", sanitize_fragment(w)))
        .collect::<String>()
}

fn section(header: &str, bullets: &[String]) -> Option<String> {
    if bullets.is_empty() {
        return None;
    }
    let body = bullets
        .iter()
        .map(|b| format!("- {b}"))
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!("{header}\n{body}"))
}

/// Counter-based preferences plus engagement learning.
pub fn personalization_prompt(profile: &LearningProfile) -> String {
    if !profile.has_signal() {
        return String::new();
    }

    let mut bullets = Vec::new();

    let tone = &profile.tone_adjustments;
    if tone.casual > tone.formal {
        bullets.push(format!(
            "カジュアルで親しみやすい口調を好む（{}回の指摘）",
            tone.casual
        ));
    } else if tone.formal > tone.casual {
        bullets.push(format!("丁寧でフォーマルな口調を好む（{}回の指摘）", tone.formal));
    }

    let length = &profile.length_preferences;
    if length.prefer_short > length.prefer_long {
        bullets.push("短めで簡潔な文章を好む".to_string());
    } else if length.prefer_long > length.prefer_short {
        bullets.push("しっかり説明する長めの文章を好む".to_string());
    }

    match profile.emoji_style {
        EmojiStyle::Minimal => bullets.push("絵文字は控えめにする".to_string()),
        EmojiStyle::Rich => bullets.push("絵文字を多めに使う".to_string()),
        EmojiStyle::Moderate => {}
    }

    let mut words: Vec<(&String, &i64)> = profile.word_preferences.iter().collect();
    words.sort_by(|a, b| b.1.cmp(a.1));
    let top: Vec<String> = words
        .into_iter()
        .filter(|(_, w)| **w > 0)
        .take(MAX_PREFERRED_WORDS)
        .map(|(word, _)| word.clone())
        .collect();
    if !top.is_empty() {
        bullets.push(format!("好んで使う言葉: {}", quoted_list(&top)));
    }

    let learning = &profile.engagement_learning;
    if let Some(length) = learning.preferred_length {
        bullets.push(format!("反応が良かった投稿は平均{length}文字程度"));
    }
    if let Some(emoji) = learning.preferred_emoji_count {
        bullets.push(format!("反応が良かった投稿の絵文字は平均{emoji}個"));
    }
    if let Some(tone) = learning.high_er_tone {
        bullets.push(format!("反応が良かった投稿の口調は{}", tone.label()));
    }

    section("【このお店の好み】", &bullets).unwrap_or_default()
}

/// Persona, beliefs, writing style, avoided words and latest learnings.
pub fn advanced_personalization_prompt(profile: &LearningProfile) -> String {
    if !profile.has_signal() {
        return String::new();
    }

    let mut sections = Vec::new();

    match profile.persona_definition.as_deref().map(sanitize_block) {
        Some(persona) if !persona.is_empty() => {
            sections.push(format!("【お店の人格（v{}）】\n{persona}", profile.persona_version));
        }
        _ => {
            let start = profile.belief_logs.len().saturating_sub(MAX_RENDERED_BELIEFS);
            let beliefs: Vec<String> = profile.belief_logs[start..]
                .iter()
                .map(|b| sanitize_fragment(&b.text))
                .collect();
            sections.extend(section("【お店の価値観】", &beliefs));
        }
    }

    let style = &profile.writing_style;
    let mut style_bullets = Vec::new();
    if !style.sentence_endings.is_empty() {
        style_bullets.push(format!("よく使う語尾: {}", quoted_list(&style.sentence_endings)));
    }
    if !style.catchphrases.is_empty() {
        style_bullets.push(format!("口癖: {}", quoted_list(&style.catchphrases)));
    }
    if let Some(line_break) = &style.line_break_style {
        style_bullets.push(format!("改行: {}", sanitize_fragment(line_break)));
    }
    sections.extend(section("【文体の特徴】", &style_bullets));

    if !profile.avoided_words.is_empty() {
        let avoided: Vec<String> = profile
            .avoided_words
            .iter()
            .take(MAX_RENDERED_AVOIDED)
            .cloned()
            .collect();
        sections.push(format!("【使わない言葉】\n- {}", quoted_list(&avoided)));
    }

    let learnings: Vec<String> = profile
        .latest_learnings
        .iter()
        .map(|l| sanitize_fragment(l))
        .filter(|l| !l.is_empty())
        .collect();
    sections.extend(section("【前回のフィードバックから学んだこと】", &learnings));

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{apply_keyword_feedback, PostSummary};

    #[test]
    fn test_fresh_profile_renders_nothing() {
        let profile = LearningProfile::default();
        assert_eq!(personalization_prompt(&profile), "");
        assert_eq!(advanced_personalization_prompt(&profile), "");
    }

    #[test]
    fn test_interaction_without_content_renders_nothing() {
        let mut profile = LearningProfile::default();
        profile.touch();
        assert_eq!(personalization_prompt(&profile), "");
        assert_eq!(advanced_personalization_prompt(&profile), "");
    }

    #[test]
    fn test_keyword_preferences_render() {
        let mut profile = LearningProfile::default();
        apply_keyword_feedback(&mut profile, "もっとカジュアルに、短めで");
        apply_keyword_feedback(&mut profile, "「ほっこり」を使って");

        let text = personalization_prompt(&profile);
        assert!(text.starts_with("【このお店の好み】\n- "));
        assert!(text.contains("カジュアル"));
        assert!(text.contains("短め"));
        assert!(text.contains("「ほっこり」"));
    }

    #[test]
    fn test_engagement_only_profile_renders() {
        let mut profile = LearningProfile::default();
        profile
            .engagement_learning
            .record_high(PostSummary::from_caption("焼きたてだよ〜🍞", 0.3));
        let text = personalization_prompt(&profile);
        assert!(text.contains("平均"));
        assert!(text.contains("口調はカジュアル"));
    }

    #[test]
    fn test_advanced_prefers_persona_over_beliefs() {
        let mut profile = LearningProfile::default();
        profile.touch();
        profile.add_belief("地元の野菜を使う", "feedback");
        let text = advanced_personalization_prompt(&profile);
        assert!(text.contains("【お店の価値観】\n- 地元の野菜を使う"));

        profile.apply_persona("- 地元愛が強い\n- 親しみやすい");
        let text = advanced_personalization_prompt(&profile);
        assert!(text.contains("【お店の人格（v1）】\n- 地元愛が強い\n- 親しみやすい"));
        assert!(!text.contains("【お店の価値観】"));
    }

    #[test]
    fn test_delimiters_are_sanitized() {
        let mut profile = LearningProfile::default();
        profile.touch();
        profile.add_belief("{caption} を `壊す`\n改行", "feedback");
        profile.latest_learnings = vec!["{x}".to_string()];
        let text = advanced_personalization_prompt(&profile);
        assert!(!text.contains('{'));
        assert!(!text.contains('}'));
        assert!(!text.contains('`'));
        assert!(text.contains("（caption） を '壊す' 改行"));
    }
}
