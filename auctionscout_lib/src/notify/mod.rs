//! KakaoTalk "send to me" notifier with OAuth token refresh.

pub mod client;
pub mod error;
pub mod types;

pub use client::KakaoClient;
pub use error::NotifyError;
pub use types::{format_digest, DigestEntry, TokenPair, TokenStore};
