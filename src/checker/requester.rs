//! HTTP requester for the signup-validation endpoint
//!
//! Issues one GET per call, optionally through an HTTP or SOCKS proxy, and
//! classifies the response into a [`CheckOutcome`]. The requester never
//! touches shared state; failure accounting is the caller's job.

use crate::checker::models::{CheckOutcome, ProxyEndpoint};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default signup-validation endpoint
const DEFAULT_VALIDATE_URL: &str = "https://spclient.wg.spotify.com/signup/public/v1/account";

/// Default timeout for a single validation request in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent for validation requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for the HTTP requester
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    /// Validation endpoint URL (query parameters are appended per request)
    pub validate_url: String,
    /// Timeout for each request
    pub timeout: Duration,
    /// User agent sent with each request
    pub user_agent: String,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            validate_url: DEFAULT_VALIDATE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RequesterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validate_url(mut self, url: String) -> Self {
        self.validate_url = url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Response body of the validation endpoint. Every field is optional so a
/// malformed or partial body degrades to `Unknown` instead of an error.
#[derive(Debug, Default, Deserialize)]
struct ValidateResponse {
    status: Option<i64>,
    #[serde(default)]
    errors: ValidateErrors,
}

#[derive(Debug, Default, Deserialize)]
struct ValidateErrors {
    username: Option<String>,
}

/// Issues a single validation request, possibly through a proxy
#[async_trait]
pub trait EmailValidator: Send + Sync {
    async fn validate(&self, email: &str, proxy: Option<&ProxyEndpoint>) -> CheckOutcome;
}

/// HTTP-backed validator
pub struct HttpRequester {
    config: RequesterConfig,
}

impl HttpRequester {
    pub fn new() -> Self {
        Self {
            config: RequesterConfig::default(),
        }
    }

    pub fn with_config(config: RequesterConfig) -> Self {
        Self { config }
    }

    /// Build a client routed through `proxy` when one is given. The URI
    /// scheme selects the protocol (reqwest handles socks4/socks5/http).
    fn build_client(&self, proxy: Option<&ProxyEndpoint>) -> reqwest::Result<Client> {
        let mut builder = Client::builder()
            .timeout(self.config.timeout)
            .user_agent(&self.config.user_agent);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.uri())?);
        }

        builder.build()
    }
}

impl Default for HttpRequester {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailValidator for HttpRequester {
    async fn validate(&self, email: &str, proxy: Option<&ProxyEndpoint>) -> CheckOutcome {
        let client = match self.build_client(proxy) {
            Ok(client) => client,
            Err(e) => return CheckOutcome::TransportError(e.to_string()),
        };

        let response = match client
            .get(&self.config.validate_url)
            .query(&[("validate", "1"), ("email", email)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return CheckOutcome::TransportError(e.to_string()),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => classify(status, &body),
            Err(e) => CheckOutcome::TransportError(e.to_string()),
        }
    }
}

/// Classify an HTTP response into a check outcome.
///
/// Pure function so the response contract is testable without a server:
/// 429 is rate limiting, any other non-200 is an HTTP error, and a 200
/// body maps `status` 20 to registered, 1 to not registered and anything
/// else (including unparseable bodies) to unknown.
pub fn classify(status: u16, body: &str) -> CheckOutcome {
    match status {
        429 => {
            let parsed: ValidateResponse = serde_json::from_str(body).unwrap_or_default();
            CheckOutcome::RateLimited(parsed.errors.username)
        }
        200 => {
            let parsed: ValidateResponse = serde_json::from_str(body).unwrap_or_default();
            match parsed.status {
                Some(20) => CheckOutcome::Registered,
                Some(1) => CheckOutcome::NotRegistered,
                other => CheckOutcome::Unknown(other),
            }
        }
        code => CheckOutcome::HttpError(code),
    }
}
