//! Browser automation capability for the auction scraper.
//!
//! The [`Browser`] trait is the seam between navigation logic and a concrete
//! automation backend. [`WebDriverBrowser`] drives Chrome through a WebDriver
//! server; [`fake::FakeBrowser`] is a scripted in-memory stand-in.

mod browser;
mod errors;
pub mod fake;
mod locator;
pub mod wait;
mod webdriver;

pub use self::browser::{Browser, SessionCookie, ViewHandle};
pub use self::errors::BrowserError;
pub use self::locator::Locator;
pub use self::wait::{wait_for, wait_for_all, wait_for_new_view};
pub use self::webdriver::{WebDriverBrowser, USER_AGENT};
