//! Library layer for auctionscout: text normalizers, page extractors,
//! transaction aggregation, SQLite persistence, the KakaoTalk notifier and
//! the browser-driven scrape pipeline.
//!
//! Browser access goes through the `auctionscout_browser` crate, re-exported
//! here as [`browser`].

pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod listing;
pub mod navigator;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod types;

pub use auctionscout_browser as browser;

pub use aggregate::{summarize, yearly_count, PricePoint, TransactionRecord, TransactionSummary};
pub use config::{Config, ConfigError};
pub use db::{Db, DbError};
pub use error::{NavigationError, PipelineError};
pub use listing::{ListingClient, ListingError, ListingQuery};
pub use navigator::{Navigator, ViewScope};
pub use notify::{DigestEntry, KakaoClient, NotifyError, TokenPair, TokenStore};
pub use pipeline::{BatchObserver, BatchReport, CrawlOptions, ItemOutcome, Pipeline, PipelineOptions};
pub use types::{AuctionItem, DbStats, EnrichmentTarget, InsertOutcome, ValidatedItem, ValidatedRecord};
