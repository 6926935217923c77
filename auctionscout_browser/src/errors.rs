//! Error types for the browser capability.

/// Errors that can occur while driving a browser session.
#[derive(thiserror::Error, Debug)]
pub enum BrowserError {
    /// The WebDriver session could not be created.
    #[error("failed to start browser session: {0}")]
    Session(String),
    /// A WebDriver command failed for a reason other than a missing element.
    #[error("browser command failed: {0}")]
    Command(String),
    /// A bounded wait expired before its target appeared.
    #[error("timed out after {timeout_ms}ms waiting for {target}")]
    Timeout { target: String, timeout_ms: u128 },
    /// An element handle no longer refers to anything on the current page.
    #[error("stale element: {0}")]
    StaleElement(String),
    /// A view handle is not (or no longer) open.
    #[error("no such view: {0}")]
    NoSuchView(String),
    /// Injected script failed or is unknown to the page.
    #[error("script error: {0}")]
    Script(String),
}

impl From<fantoccini::error::CmdError> for BrowserError {
    fn from(e: fantoccini::error::CmdError) -> Self {
        Self::Command(e.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for BrowserError {
    fn from(e: fantoccini::error::NewSessionError) -> Self {
        Self::Session(e.to_string())
    }
}
