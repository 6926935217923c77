//! KakaoTalk REST client.

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use super::error::NotifyError;
use super::types::{format_digest, DigestEntry, TextTemplate, TokenPair, TokenStore};

/// Request timeout for messaging API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const AUTH_BASE_URL: &str = "https://kauth.kakao.com";
pub const API_BASE_URL: &str = "https://kapi.kakao.com";

const MEMO_PATH: &str = "/v2/api/talk/memo/default/send";
const TOKEN_PATH: &str = "/oauth/token";
const AUTHORIZE_PATH: &str = "/oauth/authorize";

enum Delivery {
    Sent,
    Expired,
}

/// Client for the "send to me" memo API.
///
/// Tokens live in a [`TokenStore`]; an expired access token is refreshed
/// once per send and the renewed pair is written back.
pub struct KakaoClient {
    client: reqwest::Client,
    client_id: String,
    redirect_uri: String,
    store: TokenStore,
    auth_base_url: String,
    api_base_url: String,
}

impl KakaoClient {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        store: TokenStore,
    ) -> Result<Self, NotifyError> {
        Self::with_base_urls(AUTH_BASE_URL, API_BASE_URL, client_id, redirect_uri, store)
    }

    /// Create a client with custom endpoints (for testing with wiremock).
    pub fn with_base_urls(
        auth_base_url: &str,
        api_base_url: &str,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        store: TokenStore,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(NotifyError::Network)?;
        Ok(Self {
            client,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            store,
            auth_base_url: auth_base_url.trim_end_matches('/').to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Send `message` to the token owner's own chat.
    ///
    /// On HTTP 401 the access token is refreshed exactly once and delivery is
    /// retried exactly once; any other failure is returned as is.
    pub async fn send(&self, message: &str, link: Option<&str>) -> Result<(), NotifyError> {
        let tokens = self.store.load()?.ok_or(NotifyError::NoCredential)?;
        let template = serde_json::to_string(&TextTemplate::new(message, link))
            .map_err(|e| NotifyError::ParseFailed(e.to_string()))?;

        match self.deliver(&tokens.access_token, &template).await? {
            Delivery::Sent => {
                tracing::info!("message sent");
                Ok(())
            }
            Delivery::Expired => {
                tracing::warn!("access token expired, refreshing");
                let refresh_token = tokens
                    .refresh_token
                    .as_deref()
                    .ok_or(NotifyError::Unauthorized)?;
                let renewed = self.refresh(refresh_token).await?;
                match self.deliver(&renewed.access_token, &template).await? {
                    Delivery::Sent => {
                        tracing::info!("message sent with refreshed token");
                        Ok(())
                    }
                    Delivery::Expired => Err(NotifyError::Unauthorized),
                }
            }
        }
    }

    /// Send a digest of newly found items. An empty list is an error and
    /// nothing is sent.
    pub async fn send_digest(
        &self,
        entries: &[DigestEntry],
        link: Option<&str>,
    ) -> Result<(), NotifyError> {
        let message = format_digest(entries, link).ok_or(NotifyError::EmptyDigest)?;
        tracing::info!("sending digest of {} items", entries.len());
        self.send(&message, link).await
    }

    /// URL the user opens to grant the `talk_message` scope.
    pub fn authorize_url(&self) -> Result<String, NotifyError> {
        let mut url = Url::parse(&format!("{}{}", self.auth_base_url, AUTHORIZE_PATH))
            .map_err(|e| NotifyError::Rejected(format!("invalid auth URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "talk_message")
            .append_pair("prompt", "login")
            .append_pair("require_consent", "true");
        Ok(url.to_string())
    }

    /// Exchange an authorization code for a token pair and persist it.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenPair, NotifyError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];
        let tokens = self.token_request(&form).await?;
        self.store.save(&tokens)?;
        tracing::info!("stored new token pair at {}", self.store.path().display());
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, NotifyError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        let mut renewed = self
            .token_request(&form)
            .await
            .map_err(|e| NotifyError::RefreshFailed(e.to_string()))?;
        if renewed.refresh_token.is_none() {
            renewed.refresh_token = Some(refresh_token.to_string());
        }
        self.store.save(&renewed)?;
        Ok(renewed)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenPair, NotifyError> {
        let url = format!("{}{}", self.auth_base_url, TOKEN_PATH);
        let response = self.client.post(&url).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(rejection(status, response).await));
        }
        response
            .json::<TokenPair>()
            .await
            .map_err(|e| NotifyError::ParseFailed(format!("token response: {}", e)))
    }

    async fn deliver(&self, access_token: &str, template: &str) -> Result<Delivery, NotifyError> {
        let url = format!("{}{}", self.api_base_url, MEMO_PATH);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .form(&[("template_object", template)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Delivery::Expired);
        }
        if !status.is_success() {
            return Err(NotifyError::Rejected(rejection(status, response).await));
        }
        Ok(Delivery::Sent)
    }
}

async fn rejection(status: StatusCode, response: reqwest::Response) -> String {
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    let body_snippet = if body.chars().count() > 200 {
        format!("{}...", body.chars().take(200).collect::<String>())
    } else {
        body
    };
    format!("HTTP {}: {}", status, body_snippet)
}
