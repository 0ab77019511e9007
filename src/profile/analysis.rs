//! Deep feedback analysis through the generation service.
//!
//! Prompts carry a fixed JSON schema; responses are decoded best-effort and
//! any failure is reported as a [`ParseFailure`] instead of an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::generation::{parse_json_object, GenerateOptions, ParseFailure, TextGenerator};

const MAX_ANALYSIS_BELIEFS: usize = 3;
const MAX_LEARNINGS: usize = 3;
const MAX_ENGAGEMENT_BELIEFS: usize = 2;

pub(crate) const ANALYSIS_SYSTEM_PROMPT: &str =
    "あなたは小さなお店のSNS運用を支えるアシスタントです。出力は必ずJSONオブジェクトのみとしてください。";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WritingStyleUpdate {
    pub sentence_endings: Vec<String>,
    pub catchphrases: Vec<String>,
    pub line_break_style: Option<String>,
}

/// Structured result of analysing one piece of feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StructuredAnalysis {
    pub beliefs: Vec<String>,
    pub writing_style: WritingStyleUpdate,
    pub avoided_words: Vec<String>,
    pub preferred_words: Vec<String>,
    /// Human-readable summary of what was learned this time.
    pub learnings: Vec<String>,
}

fn clean(items: Vec<String>, cap: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(cap)
        .collect()
}

impl StructuredAnalysis {
    fn normalized(self) -> Self {
        Self {
            beliefs: clean(self.beliefs, MAX_ANALYSIS_BELIEFS),
            writing_style: WritingStyleUpdate {
                sentence_endings: clean(self.writing_style.sentence_endings, usize::MAX),
                catchphrases: clean(self.writing_style.catchphrases, usize::MAX),
                line_break_style: self.writing_style.line_break_style,
            },
            avoided_words: clean(self.avoided_words, usize::MAX),
            preferred_words: clean(self.preferred_words, usize::MAX),
            learnings: clean(self.learnings, MAX_LEARNINGS),
        }
    }
}

pub fn parse_structured_analysis(text: &str) -> Result<StructuredAnalysis, ParseFailure> {
    parse_json_object::<StructuredAnalysis>(text).map(StructuredAnalysis::normalized)
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EngagementBeliefs {
    beliefs: Vec<String>,
}

/// Beliefs explaining why a post performed well (at most 2).
pub fn parse_engagement_beliefs(text: &str) -> Result<Vec<String>, ParseFailure> {
    parse_json_object::<EngagementBeliefs>(text).map(|b| clean(b.beliefs, MAX_ENGAGEMENT_BELIEFS))
}

pub(crate) fn feedback_prompt(feedback: &str, original: &str, revised: Option<&str>) -> String {
    let revised_section = revised
        .map(|r| format!("\n## 修正後の文章\n{r}\n"))
        .unwrap_or_default();
    format!(
        r#"お店のオーナーが生成された投稿文にフィードバックをしました。
オーナーの価値観・文体の好みを抽出してください。

## 元の文章
{original}
{revised_section}
## フィードバック
{feedback}

次のJSON形式のみで出力してください:
{{
  "beliefs": ["オーナーの価値観や好みを表す短い文（1〜3個）"],
  "writing_style": {{
    "sentence_endings": ["よく使う語尾"],
    "catchphrases": ["口癖・決まり文句"],
    "line_break_style": "改行の好み（なければnull）"
  }},
  "avoided_words": ["避けたい言葉"],
  "preferred_words": ["好んで使う言葉"],
  "learnings": ["今回学んだことの要約（最大3個）"]
}}"#
    )
}

pub(crate) fn persona_prompt(beliefs: &[String]) -> String {
    let list = beliefs
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{}. {}", i + 1, b))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"以下はお店のオーナーについて蓄積された信念のリストです（番号が大きいほど新しい）。
これらを統合し、投稿文を書くときの人格として5つ以内の箇条書きに要約してください。
矛盾する場合は新しい信念を優先してください。箇条書きのみを出力してください。

{list}"#
    )
}

pub(crate) fn engagement_prompt(caption: &str, save_intensity: f64) -> String {
    format!(
        r#"次の投稿は保存率 {save_intensity:.3} と、このお店の平均より大きく反応が良い投稿でした。
反応が良かった理由として考えられる、このお店の投稿方針を1〜2個の短い文で挙げてください。

## 投稿
{caption}

次のJSON形式のみで出力してください:
{{"beliefs": ["方針"]}}"#
    )
}

/// Run deep analysis. `None` on generation or parse failure.
pub(crate) async fn analyze_feedback<G: TextGenerator>(
    generator: &G,
    options: &GenerateOptions,
    feedback: &str,
    original: &str,
    revised: Option<&str>,
) -> Option<StructuredAnalysis> {
    let prompt = feedback_prompt(feedback, original, revised);
    let options = options.clone().with_system_prompt(ANALYSIS_SYSTEM_PROMPT);
    let response = match generator.generate(&prompt, &options).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Feedback analysis call failed");
            return None;
        }
    };
    match parse_structured_analysis(&response) {
        Ok(analysis) => {
            debug!(beliefs = analysis.beliefs.len(), "Parsed feedback analysis");
            Some(analysis)
        }
        Err(e) => {
            warn!(error = %e, "Feedback analysis response unusable");
            None
        }
    }
}
