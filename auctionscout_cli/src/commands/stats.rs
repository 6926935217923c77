//! The `stats` subcommand: row counts and case numbers per year.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::open_db;
use crate::output::{print_stats, OutputFormat};

#[derive(Args)]
pub struct StatsArgs {
    /// SQLite database path
    #[arg(long, default_value = "auctionscout.db")]
    pub db: PathBuf,
}

pub fn run(args: &StatsArgs, format: &OutputFormat) -> Result<()> {
    let db = open_db(&args.db)?;
    let stats = db.stats()?;
    print_stats(&stats, format)
}
