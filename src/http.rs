//! Resilient HTTP transport
//!
//! One [`PanelClient`] per account: its own cookie jar, a browser-like
//! default header set, and bounded retry with exponential backoff plus
//! jitter. Server errors (>= 500) and network failures are transient and
//! retried; anything below 500 — 4xx included — is returned as-is and
//! left to the callers' content heuristics.

use std::time::Duration;

use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER};
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Fixed browser user-agent for all panel traffic.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANG: &str = "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7";

/// Transport-level errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("server error: HTTP {0}")]
    ServerError(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Retry behavior for one client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request (first try included).
    pub attempts: u32,
    /// Exponential backoff base, delay = base^(attempt+1) seconds.
    pub backoff_base: f64,
    /// Upper bound of the random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base: 1.7,
            jitter_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based), jitter included.
    fn delay(&self, attempt: u32) -> Duration {
        let base_ms = (self.backoff_base.powi(attempt as i32 + 1) * 1000.0) as u64;
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(base_ms + jitter)
    }
}

/// A fully-read response: status, post-redirect URL, body text and
/// content type. Everything the classification heuristics need.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl PageResponse {
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false)
    }
}

/// HTTP session for one account: cookie jar plus default headers, dropped
/// when the account's processing ends.
pub struct PanelClient {
    client: Client,
    retry: RetryPolicy,
}

impl PanelClient {
    /// Build a client session for the given panel. The Referer default
    /// header points at the panel root, like a browser arriving there.
    pub fn new(base_url: &Url) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANG));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(base_url.as_str())
                .map_err(|e| HttpError::ClientBuild(e.to_string()))?,
        );

        let cookie_jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .cookie_provider(cookie_jar)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy (tests drive this with tight timings).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn get(&self, url: &Url) -> Result<PageResponse, HttpError> {
        self.execute(Method::GET, url, None).await
    }

    pub async fn post_form(
        &self,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<PageResponse, HttpError> {
        self.execute(Method::POST, url, Some(form)).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        form: Option<&[(String, String)]>,
    ) -> Result<PageResponse, HttpError> {
        let mut last_err = HttpError::Network("no attempts made".to_string());

        for attempt in 0..self.retry.attempts {
            match self.send_once(method.clone(), url, form).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    warn!("{} {} attempt {}/{} failed: {}", method, url, attempt + 1, self.retry.attempts, e);
                    last_err = e;
                }
            }

            if attempt + 1 < self.retry.attempts {
                let delay = self.retry.delay(attempt);
                debug!("retrying {} in {}ms", url, delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_err)
    }

    async fn send_once(
        &self,
        method: Method,
        url: &Url,
        form: Option<&[(String, String)]>,
    ) -> Result<PageResponse, HttpError> {
        let mut request = self.client.request(method, url.clone());
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 500 {
            return Err(HttpError::ServerError(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        Ok(PageResponse {
            status,
            final_url,
            content_type,
            body,
        })
    }
}

/// Join a path-with-query onto a panel base URL.
pub fn join_url(base: &Url, path: &str) -> Result<Url, HttpError> {
    base.join(path).map_err(|e| HttpError::InvalidUrl(e.to_string()))
}
