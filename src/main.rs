//! captionist - personalization and collective insights for caption generation.

use clap::{CommandFactory, Parser};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use captionist::cli::{self, record::RecordArgs, Cli, Commands};
use captionist::config::Config;
use captionist::insights::OutcomeReport;
use captionist::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let log_level = match Config::load() {
        Ok(config) => config.daemon.log_level,
        Err(e) => {
            eprintln!("Warning: could not load config: {}", e);
            "info".to_string()
        }
    };
    let directive = format!("captionist={}", log_level)
        .parse::<Directive>()
        .map_err(|e| Error::Config(format!("invalid log level {log_level}: {e}")))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => {
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Init { force }) => {
            cli::init::run(force)?;
        }
        Some(Commands::Record {
            store,
            category,
            caption,
            post_id,
            likes,
            saves,
            comments,
            reach,
            rate,
            posted_at,
            seed,
        }) => {
            let report = OutcomeReport {
                store_id: store,
                category,
                caption_text: caption,
                post_id,
                likes,
                saves,
                comments,
                reach,
                engagement_rate: rate,
                posted_at: None,
            };
            cli::record::run(RecordArgs {
                report,
                posted_at,
                seed,
            })
            .await?;
        }
        Some(Commands::Insights {
            store,
            category,
            text,
        }) => {
            cli::insights::run(&store, &category, text).await?;
        }
        Some(Commands::Analyze { caption }) => {
            cli::analyze::run(&caption)?;
        }
        Some(Commands::Feedback {
            store,
            feedback,
            original,
            revised,
            simple,
        }) => {
            cli::feedback::run(&store, &feedback, &original, revised.as_deref(), simple).await?;
        }
        Some(Commands::Prompt {
            store,
            category,
            profile,
        }) => {
            cli::prompt::run(&store, &category, profile).await?;
        }
        Some(Commands::Reset {
            store,
            delete,
            force,
        }) => {
            cli::reset::run(&store, delete, force).await?;
        }
        Some(Commands::Daemon) => {
            cli::daemon::run().await?;
        }
    }

    Ok(())
}
