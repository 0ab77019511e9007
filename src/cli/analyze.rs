//! Fingerprint a caption.

use serde::Serialize;

use crate::cli::print_json;
use crate::error::Error;
use crate::structure::{self, StructuralFingerprint};

#[derive(Serialize)]
struct CaptionFeatures {
    length: usize,
    emoji_count: usize,
    hashtags: Vec<String>,
    fingerprint: StructuralFingerprint,
}

/// Run the analyze command. No database or generation service needed.
pub fn run(caption: &str) -> Result<(), Error> {
    print_json(&CaptionFeatures {
        length: structure::char_len(caption),
        emoji_count: structure::count_emoji(caption),
        hashtags: structure::extract_hashtags(caption),
        fingerprint: structure::analyze(caption),
    })
}
