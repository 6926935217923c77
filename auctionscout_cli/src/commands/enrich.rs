//! The `enrich` subcommand: valuation-site transaction summaries and unit
//! prices for validated items.

use std::path::Path;

use anyhow::Result;
use auctionscout_lib::{Pipeline, PipelineOptions};
use clap::Args;

use super::{load_config, open_db, shutdown, BrowserArgs, ProgressReporter};

#[derive(Args)]
pub struct EnrichArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Skip the per-unit price lookup (and the login it needs)
    #[arg(long)]
    pub no_unit_prices: bool,

    /// Enrich at most this many items
    #[arg(long)]
    pub limit: Option<i64>,
}

pub async fn run(args: &EnrichArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_db(&args.browser.db)?;
    let targets = db.enrichment_targets(args.limit)?;
    if targets.is_empty() {
        eprintln!("No validated items with a valuation link.");
        return Ok(());
    }
    eprintln!("Enriching {} items", targets.len());
    let browser = args.browser.connect().await?;

    let result: Result<()> = async {
        let options = PipelineOptions {
            unit_prices: !args.no_unit_prices,
            ..PipelineOptions::default()
        };
        let pipeline = Pipeline::new(&browser, &db, &config, options);
        let mut progress = ProgressReporter::new("enrich");
        let report = pipeline.enrich_valuations(&targets, &mut progress).await?;
        progress.finish(&report);
        Ok(())
    }
    .await;

    shutdown(browser).await;
    result
}
