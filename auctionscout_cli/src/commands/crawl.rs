//! The `crawl` subcommand: store new items from the listing site.

use std::path::Path;

use anyhow::Result;
use auctionscout_lib::{CrawlOptions, Pipeline, PipelineOptions};
use clap::Args;

use super::{load_config, open_db, shutdown, BrowserArgs, ProgressReporter};

/// Saved search the original workflow opens.
pub const DEFAULT_FAVORITE_SEARCH: &str = "106099";

#[derive(Args)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(flatten)]
    pub listing: ListingArgs,
}

/// Which listing results to read.
#[derive(Args, Clone)]
pub struct ListingArgs {
    /// Saved search id to open from the favorites menu
    #[arg(long, default_value = DEFAULT_FAVORITE_SEARCH)]
    pub favorite_search: String,

    /// Use the plain search page instead of a saved search
    #[arg(long)]
    pub no_favorite: bool,

    /// Extra result pages to fetch through the listing API
    #[arg(long, default_value = "0")]
    pub extra_pages: u32,
}

impl ListingArgs {
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            favorite_search: (!self.no_favorite).then(|| self.favorite_search.clone()),
            extra_pages: self.extra_pages,
        }
    }
}

pub async fn run(args: &CrawlArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_db(&args.browser.db)?;
    let browser = args.browser.connect().await?;

    let result: Result<()> = async {
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default());
        let mut progress = ProgressReporter::new("crawl");
        let report = pipeline
            .crawl_listing(&args.listing.crawl_options(), &mut progress)
            .await?;
        progress.finish(&report);
        Ok(())
    }
    .await;

    shutdown(browser).await;
    result
}
