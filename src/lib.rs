//! captionist library.
//!
//! Per-store personalization and cross-store engagement insights for a
//! caption-generating bot. The crate exposes prompt fragments; building the
//! final caption prompt is left to the caller.

pub mod category;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod generation;
pub mod insights;
pub mod jobs;
pub mod pattern;
pub mod profile;
pub mod structure;
pub mod validator;

pub use engine::Engine;
pub use error::Error;
