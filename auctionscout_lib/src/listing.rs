//! Direct client for the listing site's search endpoint.
//!
//! Replays the XHR the search page issues, authenticated with cookies taken
//! from a logged-in browser session, and parses the returned listing rows.

use std::time::Duration;

use auctionscout_browser::{SessionCookie, USER_AGENT};
use scraper::Html;
use url::Url;

use crate::extract::listing_rows;
use crate::types::AuctionItem;

/// Request timeout for listing API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(thiserror::Error, Debug)]
pub enum ListingError {
    #[error("invalid listing URL {0}")]
    InvalidUrl(String),
    #[error("listing request rejected: {0}")]
    Rejected(String),
    #[error("network error")]
    Network(#[from] reqwest::Error),
}

/// Paging parameters of the search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingQuery {
    pub page_no: u32,
    pub data_size: u32,
    pub page_size: u32,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page_no: 1,
            data_size: 20,
            page_size: 10,
        }
    }
}

pub struct ListingClient {
    client: reqwest::Client,
    api_url: String,
    search_url: String,
    origin: String,
}

impl ListingClient {
    pub fn new(api_url: &str, search_url: &str) -> Result<Self, ListingError> {
        let parsed = Url::parse(api_url).map_err(|_| ListingError::InvalidUrl(api_url.to_string()))?;
        let origin = parsed.origin().ascii_serialization();
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            search_url: search_url.to_string(),
            origin,
        })
    }

    /// Raw response body for one page of search results.
    pub async fn fetch_page_body(
        &self,
        cookies: &[SessionCookie],
        query: &ListingQuery,
    ) -> Result<String, ListingError> {
        let form = [
            ("srchCase", "srchAll".to_string()),
            ("pageNo", query.page_no.to_string()),
            ("dataSize", query.data_size.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        tracing::debug!("POST {} page {}", self.api_url, query.page_no);
        let response = self
            .client
            .post(&self.api_url)
            .header("accept", "application/json, text/plain, */*")
            .header("accept-language", "ko-KR,ko;q=0.9,en;q=0.8")
            .header("referer", &self.search_url)
            .header("origin", &self.origin)
            .header("x-requested-with", "XMLHttpRequest")
            .header("sec-fetch-dest", "empty")
            .header("sec-fetch-mode", "cors")
            .header("sec-fetch-site", "same-origin")
            .header("cookie", cookie_header(cookies))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            let body_snippet: String = body.chars().take(200).collect();
            return Err(ListingError::Rejected(format!(
                "HTTP {}: {}",
                status, body_snippet
            )));
        }
        Ok(response.text().await?)
    }

    /// One page of search results parsed into listing rows.
    pub async fn fetch_page(
        &self,
        cookies: &[SessionCookie],
        query: &ListingQuery,
    ) -> Result<Vec<AuctionItem>, ListingError> {
        let body = self.fetch_page_body(cookies, query).await?;
        let rows = parse_listing_body(&body);
        tracing::info!("listing API returned {} rows", rows.len());
        Ok(rows)
    }
}

fn cookie_header(cookies: &[SessionCookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse a listing response that is either an HTML fragment or a JSON
/// object carrying that fragment in one of its string fields.
pub fn parse_listing_body(body: &str) -> Vec<AuctionItem> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
            let fragment = map
                .values()
                .filter_map(|v| v.as_str())
                .find(|s| s.contains("cntsViewPN"));
            return match fragment {
                Some(html) => listing_rows(&Html::parse_fragment(html)),
                None => Vec::new(),
            };
        }
    }
    listing_rows(&Html::parse_document(body))
}
