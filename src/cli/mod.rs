//! CLI commands for captionist.

pub mod analyze;
pub mod daemon;
pub mod feedback;
pub mod init;
pub mod insights;
pub mod prompt;
pub mod record;
pub mod reset;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::db::Database;
use crate::engine::Engine;
use crate::error::Error;
use crate::generation::IpcGenerator;

/// captionist - per-store personalization and collective insights for caption generation
#[derive(Parser)]
#[command(name = "captionist")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long, short)]
        force: bool,
    },

    /// Record engagement numbers for a caption
    Record {
        /// Store identifier
        #[arg(long)]
        store: String,

        /// Category label (synonyms are resolved)
        #[arg(long)]
        category: String,

        /// Caption text as posted
        #[arg(long)]
        caption: String,

        /// Post identifier; a later report with the same id updates in place
        #[arg(long)]
        post_id: Option<String>,

        #[arg(long, default_value_t = 0)]
        likes: u64,

        #[arg(long, default_value_t = 0)]
        saves: u64,

        #[arg(long, default_value_t = 0)]
        comments: u64,

        #[arg(long)]
        reach: Option<u64>,

        /// Engagement rate in percent, as shown by the platform
        #[arg(long)]
        rate: Option<f64>,

        /// Posting time (RFC 3339)
        #[arg(long)]
        posted_at: Option<String>,

        /// Only seed an unreported row for the caption
        #[arg(long)]
        seed: bool,
    },

    /// Show own-store, category and group insights
    Insights {
        #[arg(long)]
        store: String,

        #[arg(long)]
        category: String,

        /// Print the prompt fragment instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Show the structural fingerprint of a caption
    Analyze {
        /// Caption text
        caption: String,
    },

    /// Learn from feedback on a generated caption
    Feedback {
        #[arg(long)]
        store: String,

        /// Feedback text
        feedback: String,

        /// Caption the feedback refers to
        #[arg(long, default_value = "")]
        original: String,

        /// Caption after the user's own edits
        #[arg(long)]
        revised: Option<String>,

        /// Keyword learning only, no generation call
        #[arg(long)]
        simple: bool,
    },

    /// Print the full prompt addition for a store
    Prompt {
        #[arg(long)]
        store: String,

        #[arg(long)]
        category: String,

        /// Show the learning profile as JSON instead
        #[arg(long)]
        profile: bool,
    },

    /// Reset or delete everything stored for a store
    Reset {
        #[arg(long)]
        store: String,

        /// Remove the profile entirely instead of resetting it
        #[arg(long)]
        delete: bool,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Run scheduled jobs in the foreground
    Daemon,
}

/// Open the configured database and wire an engine to the generation service.
pub(crate) fn open_engine(config: &Config) -> Result<Engine<IpcGenerator>, Error> {
    let db = Database::open(&config.db_path()?)?.into_shared();
    let generator = IpcGenerator::from_config(&config.generation);
    Ok(Engine::new(db, generator, config))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
