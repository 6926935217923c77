//! The `details` subcommand: rebuild validated items from detail pages.

use std::path::Path;

use anyhow::Result;
use auctionscout_lib::{Pipeline, PipelineOptions};
use clap::Args;

use super::crawl::ListingArgs;
use super::{load_config, open_db, shutdown, BrowserArgs, ProgressReporter};

#[derive(Args)]
pub struct DetailsArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(flatten)]
    pub listing: ListingArgs,

    #[command(flatten)]
    pub steps: DetailSteps,

    /// Process at most this many stored items
    #[arg(long)]
    pub limit: Option<i64>,
}

/// Optional detail-page steps.
#[derive(Args, Clone)]
pub struct DetailSteps {
    /// Skip areas, floors, elevators and approval date
    #[arg(long)]
    pub no_building_info: bool,

    /// Skip the previous round's minimum price
    #[arg(long)]
    pub no_previous_price: bool,
}

impl DetailSteps {
    pub fn options(&self, unit_prices: bool) -> PipelineOptions {
        PipelineOptions {
            building_info: !self.no_building_info,
            previous_price: !self.no_previous_price,
            unit_prices,
        }
    }
}

pub async fn run(args: &DetailsArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_db(&args.browser.db)?;
    let tids = db.auction_tids(args.limit)?;
    eprintln!("Processing {} stored items", tids.len());
    let browser = args.browser.connect().await?;

    let result: Result<()> = async {
        let pipeline = Pipeline::new(&browser, &db, &config, args.steps.options(false));
        pipeline
            .open_listing_session(&args.listing.crawl_options())
            .await?;
        let mut progress = ProgressReporter::new("details");
        let report = pipeline.build_validated_items(&tids, &mut progress).await?;
        progress.finish(&report);
        Ok(())
    }
    .await;

    shutdown(browser).await;
    result
}
