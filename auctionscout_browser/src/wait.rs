//! Bounded polling helpers built on top of [`Browser`].
//!
//! All waits use `tokio::time`, so tests running with a paused clock
//! complete instantly.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::{Browser, BrowserError, Locator, ViewHandle};

/// Interval between two probes of the page while waiting.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Wait until `locator` resolves to an element, or fail with
/// [`BrowserError::Timeout`].
pub async fn wait_for<B>(
    browser: &B,
    locator: &Locator,
    timeout: Duration,
) -> Result<B::Element, BrowserError>
where
    B: Browser + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(element) = browser.find(locator).await? {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            return Err(timeout_error(locator.to_string(), timeout));
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Wait until `locator` resolves to at least one element and return all matches.
pub async fn wait_for_all<B>(
    browser: &B,
    locator: &Locator,
    timeout: Duration,
) -> Result<Vec<B::Element>, BrowserError>
where
    B: Browser + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        let found = browser.find_all(locator).await?;
        if !found.is_empty() {
            return Ok(found);
        }
        if Instant::now() >= deadline {
            return Err(timeout_error(locator.to_string(), timeout));
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Wait until a view that is not in `known` shows up and return its handle.
///
/// When several new views appear at once, the last one reported wins.
pub async fn wait_for_new_view<B>(
    browser: &B,
    known: &[ViewHandle],
    timeout: Duration,
) -> Result<ViewHandle, BrowserError>
where
    B: Browser + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        let views = browser.views().await?;
        if let Some(fresh) = views.into_iter().rev().find(|v| !known.contains(v)) {
            return Ok(fresh);
        }
        if Instant::now() >= deadline {
            return Err(timeout_error("a new view".to_string(), timeout));
        }
        sleep(POLL_INTERVAL).await;
    }
}

fn timeout_error(target: String, timeout: Duration) -> BrowserError {
    tracing::debug!("wait for {} expired after {:?}", target, timeout);
    BrowserError::Timeout {
        target,
        timeout_ms: timeout.as_millis(),
    }
}
