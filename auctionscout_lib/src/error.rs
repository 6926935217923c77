//! Error types for navigation and per-item pipeline processing.

use auctionscout_browser::BrowserError;

use crate::config::ConfigError;
use crate::db::DbError;
use crate::listing::ListingError;
use crate::notify::NotifyError;

/// A page did not reach the state a navigation step needs.
#[derive(thiserror::Error, Debug)]
pub enum NavigationError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    /// Every locator for a required control missed.
    #[error("{0} not found on page")]
    Missing(String),
    #[error("login to {0} failed")]
    LoginFailed(&'static str),
}

/// Failure while processing one item (or setting up a batch).
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Listing(#[from] ListingError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl From<BrowserError> for PipelineError {
    fn from(e: BrowserError) -> Self {
        Self::Navigation(NavigationError::Browser(e))
    }
}
