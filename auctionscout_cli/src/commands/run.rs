//! The `run` subcommand: crawl, detail and enrichment passes in one session,
//! optionally followed by a KakaoTalk digest of the newly listed items.

use std::path::{Path, PathBuf};

use anyhow::Result;
use auctionscout_lib::{Db, DigestEntry, Pipeline};
use clap::Args;

use super::crawl::ListingArgs;
use super::details::DetailSteps;
use super::{kakao_client, load_config, open_db, shutdown, BrowserArgs, ProgressReporter};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(flatten)]
    pub listing: ListingArgs,

    #[command(flatten)]
    pub steps: DetailSteps,

    /// Skip the per-unit price lookup
    #[arg(long)]
    pub no_unit_prices: bool,

    /// Send a KakaoTalk digest of newly listed items
    #[arg(long)]
    pub notify: bool,

    /// Link attached to the digest
    #[arg(long)]
    pub link: Option<String>,

    /// KakaoTalk token file
    #[arg(long)]
    pub token_file: Option<PathBuf>,
}

pub async fn run(args: &RunArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_db(&args.browser.db)?;
    let browser = args.browser.connect().await?;

    let result: Result<Vec<i64>> = async {
        let options = args.steps.options(!args.no_unit_prices);
        let pipeline = Pipeline::new(&browser, &db, &config, options);

        let mut crawl = ProgressReporter::new("crawl");
        let report = pipeline
            .crawl_listing(&args.listing.crawl_options(), &mut crawl)
            .await?;
        crawl.finish(&report);

        let tids = db.auction_tids(None)?;
        let mut details = ProgressReporter::new("details");
        let report = pipeline.build_validated_items(&tids, &mut details).await?;
        details.finish(&report);

        let targets = db.enrichment_targets(None)?;
        let mut enrich = ProgressReporter::new("enrich");
        let report = pipeline.enrich_valuations(&targets, &mut enrich).await?;
        enrich.finish(&report);

        Ok(crawl.stored)
    }
    .await;

    shutdown(browser).await;
    let new_tids = result?;

    if args.notify {
        if new_tids.is_empty() {
            eprintln!("No new items; nothing to send.");
            return Ok(());
        }
        let client = kakao_client(&config, args.token_file.as_deref())?;
        let entries = digest_entries(&db, &new_tids)?;
        if let Err(e) = client.send_digest(&entries, args.link.as_deref()).await {
            tracing::error!("digest not sent: {}", e);
            eprintln!("Digest not sent: {}", e);
        }
    }
    Ok(())
}

fn digest_entries(db: &Db, tids: &[i64]) -> Result<Vec<DigestEntry>> {
    tids.iter()
        .map(|&tid| {
            let case_number = db.auction_item(tid)?.and_then(|item| item.case_number);
            Ok(DigestEntry { tid, case_number })
        })
        .collect()
}
