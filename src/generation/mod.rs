//! Text-generation capability.
//!
//! Callers send a prompt with a fixed output-schema instruction and read a
//! best-effort JSON object back out of the free-form response.

mod client;
mod json;
mod types;

pub use client::IpcGenerator;
pub use json::{find_json_object, parse_json_object, ParseFailure};
pub use types::{GenerateOptions, GenerateRequest, GenerateResponse};

use std::future::Future;

use crate::Error;

/// Anything that turns a prompt into generated text.
///
/// Calls are never retried by this crate.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> impl Future<Output = Result<String, Error>> + Send;
}
