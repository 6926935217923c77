//! CLI subcommand implementations and the pieces they share.

pub mod crawl;
pub mod details;
pub mod enrich;
pub mod kakao_auth;
pub mod list;
pub mod notify;
pub mod run;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use auctionscout_lib::browser::WebDriverBrowser;
use auctionscout_lib::notify::types::DEFAULT_TOKEN_FILE;
use auctionscout_lib::{BatchObserver, BatchReport, Config, Db, ItemOutcome, KakaoClient, TokenStore};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

const DEFAULT_CONFIG_FILE: &str = "auctionscout.toml";

/// Explicit `--config`, else `auctionscout.toml` in the working directory if
/// it exists. `None` means environment variables only.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("loading configuration")?;
    tracing::debug!("configuration: {:?}", config);
    Ok(config)
}

pub fn open_db(path: &Path) -> Result<Db> {
    let db = Db::open(path).with_context(|| format!("opening {}", path.display()))?;
    db.init()?;
    Ok(db)
}

/// Arguments shared by the commands that drive a browser.
#[derive(Args, Clone)]
pub struct BrowserArgs {
    /// WebDriver server (chromedriver) URL
    #[arg(long, default_value = "http://localhost:9515")]
    pub webdriver: String,

    /// Run Chrome without a window
    #[arg(long)]
    pub headless: bool,

    /// SQLite database path
    #[arg(long, default_value = "auctionscout.db")]
    pub db: PathBuf,
}

impl BrowserArgs {
    pub async fn connect(&self) -> Result<WebDriverBrowser> {
        WebDriverBrowser::connect(&self.webdriver, self.headless)
            .await
            .with_context(|| format!("connecting to WebDriver at {}", self.webdriver))
    }
}

/// Close the browser session, logging instead of failing.
pub async fn shutdown(browser: WebDriverBrowser) {
    if let Err(e) = browser.quit().await {
        tracing::warn!("browser session did not close cleanly: {}", e);
    }
}

pub fn kakao_client(config: &Config, token_file: Option<&Path>) -> Result<KakaoClient> {
    let (client_id, redirect_uri) = config.messaging()?;
    let store = TokenStore::new(token_file.unwrap_or_else(|| Path::new(DEFAULT_TOKEN_FILE)));
    Ok(KakaoClient::new(client_id, redirect_uri, store)?)
}

/// Progress bar over one batch; remembers which items were stored.
pub struct ProgressReporter {
    label: &'static str,
    bar: Option<ProgressBar>,
    pub stored: Vec<i64>,
}

impl ProgressReporter {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            bar: None,
            stored: Vec::new(),
        }
    }

    pub fn finish(&self, report: &BatchReport) {
        let summary = describe_report(report);
        if let Some(bar) = &self.bar {
            bar.finish_with_message(summary.clone());
        }
        eprintln!("{} done: {}", self.label, summary);
    }
}

impl BatchObserver for ProgressReporter {
    fn started(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(self.label);
        self.bar = Some(bar);
    }

    fn item_done(&mut self, tid: i64, outcome: &ItemOutcome) {
        if *outcome == ItemOutcome::Stored {
            self.stored.push(tid);
        }
        if let Some(bar) = &self.bar {
            bar.println(format!("  tid {}: {}", tid, describe_outcome(outcome)));
            bar.inc(1);
        }
    }
}

fn describe_outcome(outcome: &ItemOutcome) -> String {
    match outcome {
        ItemOutcome::Stored => "stored".to_string(),
        ItemOutcome::Duplicate => "already known".to_string(),
        ItemOutcome::NotViable => "no recent transactions, skipped".to_string(),
        ItemOutcome::NoData => "no transaction data".to_string(),
        ItemOutcome::Failed(reason) => format!("FAILED: {}", reason),
    }
}

fn describe_report(report: &BatchReport) -> String {
    format!(
        "{} stored, {} duplicate, {} not viable, {} no data, {} failed",
        report.stored, report.duplicates, report.not_viable, report.no_data, report.failed
    )
}
