//! The browser automation capability consumed by the scraper.

use std::fmt;

use async_trait::async_trait;

use crate::{BrowserError, Locator};

/// Opaque identifier of an open tab or window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewHandle(String);

impl ViewHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cookie of the current browser session, reduced to what HTTP replay needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// DOM-query and interaction capability of a single automation session.
///
/// `find` reports an absent element as `Ok(None)`; only transport or
/// protocol failures are errors. Every method acts on the currently focused
/// view.
#[async_trait]
pub trait Browser: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;
    async fn refresh(&self) -> Result<(), BrowserError>;
    async fn current_url(&self) -> Result<String, BrowserError>;
    async fn title(&self) -> Result<String, BrowserError>;
    /// Serialized DOM of the current page.
    async fn source(&self) -> Result<String, BrowserError>;

    async fn find(&self, locator: &Locator) -> Result<Option<Self::Element>, BrowserError>;
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Element>, BrowserError>;

    async fn attr(&self, element: &Self::Element, name: &str)
        -> Result<Option<String>, BrowserError>;
    async fn is_displayed(&self, element: &Self::Element) -> Result<bool, BrowserError>;

    async fn click(&self, element: &Self::Element) -> Result<(), BrowserError>;
    /// Click through `arguments[0].click()`, bypassing overlays that intercept
    /// a native click.
    async fn script_click(&self, element: &Self::Element) -> Result<(), BrowserError>;
    async fn clear(&self, element: &Self::Element) -> Result<(), BrowserError>;
    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<(), BrowserError>;

    /// Run a page script for its side effects.
    async fn execute(&self, script: &str) -> Result<(), BrowserError>;

    async fn views(&self) -> Result<Vec<ViewHandle>, BrowserError>;
    async fn current_view(&self) -> Result<ViewHandle, BrowserError>;
    async fn switch_to(&self, view: &ViewHandle) -> Result<(), BrowserError>;
    /// Close the focused view. Focus must be moved explicitly afterwards.
    async fn close_view(&self) -> Result<(), BrowserError>;

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError>;
}
