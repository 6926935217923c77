//! The `list` subcommand: validated items from the local database.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::open_db;
use crate::output::{print_validated, OutputFormat};

#[derive(Args)]
pub struct ListArgs {
    /// SQLite database path
    #[arg(long, default_value = "auctionscout.db")]
    pub db: PathBuf,

    /// Show only enriched items
    #[arg(long)]
    pub enriched: bool,

    /// Maximum number of items
    #[arg(long)]
    pub limit: Option<i64>,
}

pub fn run(args: &ListArgs, format: &OutputFormat) -> Result<()> {
    let db = open_db(&args.db)?;
    let mut items = db.validated_items(args.limit)?;
    if args.enriched {
        items.retain(|r| r.enriched_at.is_some());
    }
    if items.is_empty() && *format == OutputFormat::Table {
        eprintln!("No validated items.");
        return Ok(());
    }
    print_validated(&items, format)
}
