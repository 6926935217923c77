mod commands;
mod logging;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "auctionscout")]
#[command(about = "Scrape real-estate auction listings and valuation data")]
struct Cli {
    /// Output format: table, json, csv or markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// Configuration file (TOML); defaults to ./auctionscout.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for per-run log files
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store new items from the listing site
    Crawl(commands::crawl::CrawlArgs),
    /// Rebuild validated items from the stored listing items' detail pages
    Details(commands::details::DetailsArgs),
    /// Add transaction summaries and unit prices from the valuation site
    Enrich(commands::enrich::EnrichArgs),
    /// Crawl, rebuild details and enrich in one browser session
    Run(commands::run::RunArgs),
    /// Send a KakaoTalk message or digest
    Notify(commands::notify::NotifyArgs),
    /// Obtain KakaoTalk tokens through the authorization-code flow
    KakaoAuth(commands::kakao_auth::KakaoAuthArgs),
    /// List validated items
    List(commands::list::ListArgs),
    /// Show database statistics
    Stats(commands::stats::StatsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let log_file = logging::init(&cli.log_dir)?;
    tracing::debug!("logging to {}", log_file.display());

    let format = OutputFormat::parse(&cli.output);
    let config_path = commands::config_path(cli.config.as_deref());

    match &cli.command {
        Commands::Crawl(args) => commands::crawl::run(args, config_path.as_deref()).await?,
        Commands::Details(args) => commands::details::run(args, config_path.as_deref()).await?,
        Commands::Enrich(args) => commands::enrich::run(args, config_path.as_deref()).await?,
        Commands::Run(args) => commands::run::run(args, config_path.as_deref()).await?,
        Commands::Notify(args) => commands::notify::run(args, config_path.as_deref()).await?,
        Commands::KakaoAuth(args) => commands::kakao_auth::run(args, config_path.as_deref()).await?,
        Commands::List(args) => commands::list::run(args, &format)?,
        Commands::Stats(args) => commands::stats::run(args, &format)?,
    }

    Ok(())
}
