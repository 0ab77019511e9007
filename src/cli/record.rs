//! Record engagement numbers.

use chrono::DateTime;

use crate::cli::{open_engine, print_json};
use crate::config::Config;
use crate::error::Error;
use crate::insights::{OutcomeReport, OutcomeResult};

pub struct RecordArgs {
    pub report: OutcomeReport,
    pub posted_at: Option<String>,
    pub seed: bool,
}

/// Run the record command.
pub async fn run(args: RecordArgs) -> Result<(), Error> {
    let config = Config::load()?;
    let engine = open_engine(&config)?;
    let mut report = args.report;

    if args.seed {
        match engine
            .insights()
            .seed_unreported(
                &report.store_id,
                &report.category,
                &report.caption_text,
                report.post_id.as_deref(),
            )
            .await
        {
            Some(id) => println!("Seeded unreported metric {}", id),
            None => println!("Could not seed metric (see log)."),
        }
        return Ok(());
    }

    if let Some(posted_at) = args.posted_at {
        let parsed = DateTime::parse_from_rfc3339(&posted_at)
            .map_err(|e| Error::validation(format!("invalid --posted-at {posted_at}: {e}")))?;
        report.posted_at = Some(parsed);
    }

    let summary = engine.report_outcome(&report).await?;
    print_json(&summary)?;

    if let OutcomeResult::Rejected(rejection) = &summary.result {
        eprintln!("Not recorded: {}", rejection);
        std::process::exit(2);
    }
    Ok(())
}
