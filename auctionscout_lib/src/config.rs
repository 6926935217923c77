//! Typed run configuration.
//!
//! Loaded once at startup from a TOML file, then overridden field by field
//! from `AUCTIONSCOUT_<FIELD>` environment variables.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use url::Url;

/// Prefix of the environment variables that override file values.
pub const ENV_PREFIX: &str = "AUCTIONSCOUT_";

const DEFAULT_VALUATION_SITE_URL: &str = "https://www.bdsplanet.com";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(String),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("setting {field} is not an http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    listing_site_url: Option<String>,
    listing_api_url: Option<String>,
    listing_search_url: Option<String>,
    valuation_site_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    messaging_client_id: Option<String>,
    messaging_redirect_uri: Option<String>,
}

impl RawConfig {
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut Option<String>); 8] = [
            ("LISTING_SITE_URL", &mut self.listing_site_url),
            ("LISTING_API_URL", &mut self.listing_api_url),
            ("LISTING_SEARCH_URL", &mut self.listing_search_url),
            ("VALUATION_SITE_URL", &mut self.valuation_site_url),
            ("USERNAME", &mut self.username),
            ("PASSWORD", &mut self.password),
            ("MESSAGING_CLIENT_ID", &mut self.messaging_client_id),
            ("MESSAGING_REDIRECT_URI", &mut self.messaging_redirect_uri),
        ];
        for (name, slot) in fields {
            if let Some(value) = lookup(&format!("{}{}", ENV_PREFIX, name)) {
                *slot = Some(value);
            }
        }
    }
}

/// Site URLs and credentials shared by every component of a run.
#[derive(Clone)]
pub struct Config {
    pub listing_site_url: String,
    pub listing_api_url: String,
    pub listing_search_url: String,
    pub valuation_site_url: String,
    pub username: String,
    pub password: String,
    pub messaging_client_id: Option<String>,
    pub messaging_redirect_uri: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listing_site_url", &self.listing_site_url)
            .field("listing_api_url", &self.listing_api_url)
            .field("listing_search_url", &self.listing_search_url)
            .field("valuation_site_url", &self.valuation_site_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("messaging_client_id", &self.messaging_client_id)
            .field("messaging_redirect_uri", &self.messaging_redirect_uri)
            .finish()
    }
}

impl Config {
    /// Load from `path` (when given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                parse_raw(&text)?
            }
            None => RawConfig::default(),
        };
        Self::build(raw, |key| std::env::var(key).ok())
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::build(parse_raw(text)?, |_| None)
    }

    fn build(
        mut raw: RawConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        raw.apply_env(lookup);
        let config = Self {
            listing_site_url: url_field("listing_site_url", raw.listing_site_url)?,
            listing_api_url: url_field("listing_api_url", raw.listing_api_url)?,
            listing_search_url: url_field("listing_search_url", raw.listing_search_url)?,
            valuation_site_url: url_field(
                "valuation_site_url",
                raw.valuation_site_url
                    .or_else(|| Some(DEFAULT_VALUATION_SITE_URL.to_string())),
            )?,
            username: required("username", raw.username)?,
            password: required("password", raw.password)?,
            messaging_client_id: raw.messaging_client_id.filter(|s| !s.trim().is_empty()),
            messaging_redirect_uri: raw
                .messaging_redirect_uri
                .filter(|s| !s.trim().is_empty()),
        };
        Ok(config)
    }

    /// Valuation page address for a link scraped from a detail page.
    ///
    /// The link's path and query are kept and its origin is replaced by
    /// `valuation_site_url`; relative links resolve against the same base.
    pub fn valuation_link(&self, link: &str) -> Result<String, ConfigError> {
        let invalid = || ConfigError::InvalidUrl {
            field: "bdsplanet_link",
            value: link.to_string(),
        };
        let base = Url::parse(&self.valuation_site_url).map_err(|_| invalid())?;
        let scraped = base.join(link.trim()).map_err(|_| invalid())?;
        if !matches!(scraped.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let mut resolved = base.join(scraped.path()).map_err(|_| invalid())?;
        resolved.set_query(scraped.query());
        Ok(resolved.to_string())
    }

    /// Client id and redirect URI, required by the messaging commands.
    pub fn messaging(&self) -> Result<(&str, &str), ConfigError> {
        let client_id = self
            .messaging_client_id
            .as_deref()
            .ok_or(ConfigError::Missing("messaging_client_id"))?;
        let redirect = self
            .messaging_redirect_uri
            .as_deref()
            .ok_or(ConfigError::Missing("messaging_redirect_uri"))?;
        Ok((client_id, redirect))
    }
}

fn parse_raw(text: &str) -> Result<RawConfig, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(field)),
    }
}

fn url_field(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let value = required(field, value)?;
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value),
        _ => Err(ConfigError::InvalidUrl { field, value }),
    }
}
