//! Error types for notifier operations.

use thiserror::Error;

/// Errors from the messaging API and the local token store.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("No stored messaging credentials; run `auctionscout kakao-auth` first")]
    NoCredential,
    #[error("Nothing to send: the digest is empty")]
    EmptyDigest,
    #[error("Authorization rejected (HTTP 401)")]
    Unauthorized,
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Token store error: {0}")]
    Store(String),
    #[error("Failed to parse response: {0}")]
    ParseFailed(String),
    #[error("Network error")]
    Network(#[from] reqwest::Error),
}
