//! Element locators understood by every [`Browser`](crate::Browser) implementation.

use std::fmt;

/// How to find an element on the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// A CSS selector, e.g. `a.tac-box[data-area]`.
    Css(String),
    /// An XPath expression, e.g. `//button[@data-dongnm='103']`.
    XPath(String),
    /// An element id (without the leading `#`).
    Id(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub(crate) fn as_webdriver(&self) -> fantoccini::Locator<'_> {
        match self {
            Self::Css(s) => fantoccini::Locator::Css(s),
            Self::XPath(s) => fantoccini::Locator::XPath(s),
            Self::Id(s) => fantoccini::Locator::Id(s),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={}", s),
            Self::XPath(s) => write!(f, "xpath={}", s),
            Self::Id(s) => write!(f, "id={}", s),
        }
    }
}
