//! Best-effort JSON object extraction from free-form model output.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Why a structured result could not be read from generated text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseFailure {
    #[error("no JSON object in response")]
    NoJsonObject,

    #[error("malformed JSON object: {0}")]
    Malformed(String),
}

/// The span from the first `{` to the last `}`.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode the first JSON object span of `text` into `T`.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, ParseFailure> {
    let span = find_json_object(text).ok_or(ParseFailure::NoJsonObject)?;
    serde_json::from_str(span).map_err(|e| ParseFailure::Malformed(e.to_string()))
}
