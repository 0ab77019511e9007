//! Structural fingerprinting of caption text.
//!
//! Pure functions over a caption: the hashtag block and any trailing advice
//! section are stripped, then the remaining body is classified by its opening
//! line, call-to-action placement and line-break density.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Bodies shorter than this produce an empty fingerprint.
const MIN_BODY_CHARS: usize = 5;

/// Opening lines longer than this never count as noun-ending.
const TAIGEN_DOME_MAX_CHARS: usize = 25;

const OPENING_SNIPPET_CHARS: usize = 30;

/// Opening-line style of a caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    Emotion,
    Question,
    /// Opening line ends on a noun.
    TaigenDome,
    Fact,
    #[default]
    Unknown,
}

impl std::fmt::Display for HookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookType::Emotion => write!(f, "emotion"),
            HookType::Question => write!(f, "question"),
            HookType::TaigenDome => write!(f, "taigen_dome"),
            HookType::Fact => write!(f, "fact"),
            HookType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Relative position of the first call-to-action phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CtaPosition {
    #[default]
    None,
    Early,
    Middle,
    End,
}

impl std::fmt::Display for CtaPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CtaPosition::None => write!(f, "none"),
            CtaPosition::Early => write!(f, "early"),
            CtaPosition::Middle => write!(f, "middle"),
            CtaPosition::End => write!(f, "end"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructuralFingerprint {
    pub hook_type: HookType,
    pub has_call_to_action: bool,
    pub cta_position: CtaPosition,
    pub line_break_density: f64,
    pub opening_snippet: String,
    pub line_count: usize,
    pub average_line_length: f64,
    pub body_length: usize,
}

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#＃]([^\s#＃]+)").unwrap());

// Three or more horizontal-rule characters start the advice section.
static ADVICE_DIVIDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[━─―—\-=＝_＿]{3,}").unwrap());

static FACT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9０-９]|新|本日|今日|明日|今週|今月|限定|【|NEW|New|お知らせ)").unwrap()
});

const QUESTION_ENDINGS: &[&str] = &[
    "ですか",
    "ますか",
    "ませんか",
    "ましたか",
    "でしたか",
    "でしょうか",
    "だろうか",
    "かな",
    "知ってた",
    "知ってる",
];

const EMOTION_WORDS: &[&str] = &[
    "すごい",
    "凄い",
    "スゴい",
    "嬉しい",
    "うれしい",
    "感動",
    "最高",
    "幸せ",
    "しあわせ",
    "驚き",
    "びっくり",
    "大好き",
    "ついに",
    "やった",
    "楽しい",
    "たのしい",
    "美味しい",
    "おいしい",
    "感謝",
    "感激",
    "ワクワク",
    "わくわく",
    "ドキドキ",
    "ありがとう",
    "たまらない",
    "!!",
    "！！",
];

const FACT_WORDS: &[&str] = &[
    "入荷",
    "発売",
    "オープン",
    "開始",
    "登場",
    "受付",
    "営業時間",
    "個限定",
    "円",
    "%",
    "％",
];

// Endings that mark a verb, particle or copula rather than a noun.
const NON_NOUN_ENDINGS: &[&str] = &[
    "ます", "です", "した", "だ", "る", "た", "う", "く", "す", "つ", "ぬ", "ぶ", "む", "ぐ",
    "ね", "よ", "な", "か", "の", "て", "で", "に", "を", "は", "が", "も", "へ", "と", "や",
    "わ", "ぞ", "さ", "い", "ん",
];

// Matched in order; the first phrase present determines the CTA position.
const CTA_PHRASES: &[&str] = &[
    "してください",
    "ください",
    "お待ちしております",
    "お待ちしています",
    "お待ちしてます",
    "お気軽に",
    "ご予約",
    "ご来店",
    "お問い合わせ",
    "詳しくは",
    "保存して",
    "フォロー",
    "プロフィール",
    "リンク",
    "コメント",
    "DM",
    "チェック",
    "来てね",
    "見てね",
    "ぜひ",
];

/// Length in characters.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Hashtags in order of appearance, duplicates kept, normalized to a `#` prefix.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG
        .captures_iter(text)
        .map(|c| format!("#{}", &c[1]))
        .collect()
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF
        | 0x1F000..=0x1F2FF
        | 0x2600..=0x27BF
        | 0x2B00..=0x2BFF
        | 0x3297 | 0x3299)
}

pub fn count_emoji(text: &str) -> usize {
    text.chars().filter(|c| is_emoji(*c)).count()
}

/// Caption body with the advice section and hashtags removed.
pub fn extract_body(caption: &str) -> String {
    let without_advice = match ADVICE_DIVIDER.find(caption) {
        Some(m) => &caption[..m.start()],
        None => caption,
    };
    let without_tags = HASHTAG.replace_all(without_advice, "");
    without_tags
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn trim_trailing_symbols(line: &str) -> &str {
    line.trim_end_matches(|c: char| !c.is_alphanumeric())
}

fn is_question(line: &str) -> bool {
    if line.contains('?') || line.contains('？') {
        return true;
    }
    let core = trim_trailing_symbols(line);
    QUESTION_ENDINGS.iter().any(|e| core.ends_with(e))
}

fn is_emotion(line: &str) -> bool {
    EMOTION_WORDS.iter().any(|w| line.contains(w))
}

fn is_taigen_dome(line: &str) -> bool {
    let core = trim_trailing_symbols(line.trim());
    let Some(last) = core.chars().last() else {
        return false;
    };
    char_len(core) <= TAIGEN_DOME_MAX_CHARS
        && !last.is_ascii()
        && !NON_NOUN_ENDINGS.iter().any(|e| core.ends_with(e))
}

fn is_fact(line: &str) -> bool {
    FACT_PREFIX.is_match(line.trim_start()) || FACT_WORDS.iter().any(|w| line.contains(w))
}

fn classify_hook(first_line: &str) -> HookType {
    if is_question(first_line) {
        HookType::Question
    } else if is_emotion(first_line) {
        HookType::Emotion
    } else if is_taigen_dome(first_line) {
        HookType::TaigenDome
    } else if is_fact(first_line) {
        HookType::Fact
    } else {
        HookType::Unknown
    }
}

fn locate_cta(body: &str, body_chars: usize) -> CtaPosition {
    let Some(byte_offset) = CTA_PHRASES.iter().find_map(|p| body.find(p)) else {
        return CtaPosition::None;
    };
    let ratio = char_len(&body[..byte_offset]) as f64 / body_chars as f64;
    if ratio < 0.4 {
        CtaPosition::Early
    } else if ratio < 0.75 {
        CtaPosition::Middle
    } else {
        CtaPosition::End
    }
}

/// Fingerprint a caption.
pub fn analyze(caption: &str) -> StructuralFingerprint {
    let body = extract_body(caption);
    let body_length = char_len(&body);
    if body_length < MIN_BODY_CHARS {
        return StructuralFingerprint::default();
    }

    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let first_line = lines.first().copied().unwrap_or_default();

    let cta_position = locate_cta(&body, body_length);
    let newlines = body.matches('\n').count();
    let average_line_length = if lines.is_empty() {
        0.0
    } else {
        lines.iter().map(|l| char_len(l)).sum::<usize>() as f64 / lines.len() as f64
    };

    StructuralFingerprint {
        hook_type: classify_hook(first_line),
        has_call_to_action: cta_position != CtaPosition::None,
        cta_position,
        line_break_density: round_to(newlines as f64 / body_length as f64, 4),
        opening_snippet: first_line.chars().take(OPENING_SNIPPET_CHARS).collect(),
        line_count: lines.len(),
        average_line_length: round_to(average_line_length, 1),
        body_length,
    }
}
