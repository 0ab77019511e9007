//! Keyword-based feedback learning.
//!
//! Short feedback strings are matched against fixed vocabularies. Counters
//! only ever go up; nothing on this path removes a previous signal.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use super::{EmojiStyle, LearningProfile, Tone};

const CASUAL_WORDS: &[&str] = &[
    "カジュアル",
    "くだけ",
    "砕け",
    "フランク",
    "親しみ",
    "ラフ",
    "ゆるく",
    "タメ口",
    "やわらか",
    "柔らか",
];

const FORMAL_WORDS: &[&str] = &[
    "丁寧",
    "フォーマル",
    "かしこま",
    "敬語",
    "上品",
    "きちんと",
    "硬め",
    "堅め",
];

const SHORT_WORDS: &[&str] = &["短く", "短め", "簡潔", "シンプルに", "コンパクト", "長すぎ"];

const LONG_WORDS: &[&str] = &["長く", "長め", "詳しく", "詳細", "ボリューム", "短すぎ"];

static EMOJI_MINIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"絵文字(を|は)?(減ら|少な|なし|無し|不要|いらない|控え|やめ)").unwrap()
});

static EMOJI_RICH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"絵文字(を|は)?(増や|多め|多く|もっと|たくさん|入れ)").unwrap()
});

static QUOTED_PHRASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"「([^」]{1,30})」").unwrap());

// A quoted phrase followed closely by one of these goes to the avoided list.
static NEGATION_AFTER_QUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.{0,6}?(使わない|使わず|やめ|不要|いらない|禁止|NG|避け|なしで)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthSignal {
    Short,
    Long,
}

/// What one feedback string changed.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct FeedbackSignals {
    pub tones: Vec<Tone>,
    pub lengths: Vec<LengthSignal>,
    pub emoji_style: Option<EmojiStyle>,
    pub preferred_phrases: Vec<String>,
    pub avoided_phrases: Vec<String>,
}

impl FeedbackSignals {
    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
            && self.lengths.is_empty()
            && self.emoji_style.is_none()
            && self.preferred_phrases.is_empty()
            && self.avoided_phrases.is_empty()
    }
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Apply one feedback string to a profile and count the interaction.
pub fn apply_keyword_feedback(profile: &mut LearningProfile, feedback: &str) -> FeedbackSignals {
    let mut signals = FeedbackSignals::default();

    if mentions(feedback, CASUAL_WORDS) {
        profile.tone_adjustments.casual += 1;
        signals.tones.push(Tone::Casual);
    }
    if mentions(feedback, FORMAL_WORDS) {
        profile.tone_adjustments.formal += 1;
        signals.tones.push(Tone::Formal);
    }

    if mentions(feedback, SHORT_WORDS) {
        profile.length_preferences.prefer_short += 1;
        signals.lengths.push(LengthSignal::Short);
    }
    if mentions(feedback, LONG_WORDS) {
        profile.length_preferences.prefer_long += 1;
        signals.lengths.push(LengthSignal::Long);
    }

    if EMOJI_MINIMAL.is_match(feedback) {
        profile.emoji_style = EmojiStyle::Minimal;
        signals.emoji_style = Some(EmojiStyle::Minimal);
    } else if EMOJI_RICH.is_match(feedback) {
        profile.emoji_style = EmojiStyle::Rich;
        signals.emoji_style = Some(EmojiStyle::Rich);
    }

    for caps in QUOTED_PHRASE.captures_iter(feedback) {
        let (Some(whole), Some(phrase)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let phrase = phrase.as_str().trim();
        if phrase.is_empty() {
            continue;
        }
        if NEGATION_AFTER_QUOTE.is_match(&feedback[whole.end()..]) {
            if profile.add_avoided_word(phrase) {
                signals.avoided_phrases.push(phrase.to_string());
            }
        } else {
            profile.add_preferred_word(phrase, 1);
            signals.preferred_phrases.push(phrase.to_string());
        }
    }

    profile.touch();
    signals
}
