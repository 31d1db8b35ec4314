//! Page retrieval with bounded retry and client-identity rotation.
//!
//! News sites in the region sit behind anti-bot layers that answer 403 or 429
//! to anything that does not look like a browser, and they have routine
//! 5xx hiccups. Every GET in the relay goes through [`PageFetcher`].
//!
//! # Architecture
//!
//! - [`PageFetcher`]: the trait the scrapers and the freshness oracle consume
//! - [`IdentityFetcher`]: one GET under a given `User-Agent`, no retries
//! - [`HttpFetcher`]: `reqwest`-backed [`IdentityFetcher`]
//! - [`RetryFetcher`]: decorator turning any [`IdentityFetcher`] into a
//!   [`PageFetcher`] with bounded retry
//! - [`RetryPolicy`]: attempt budget, fixed backoffs, and the ordered list of
//!   browser identities tried in turn
//!
//! # Retry Strategy
//!
//! - `attempts` tries in total (3 by default), never an unbounded loop
//! - 403/429: rotate to the next `User-Agent`, wait `blocked_backoff`
//! - 5xx and transport errors: wait `error_backoff`, rotate as well
//! - other 4xx: give up immediately

use crate::error::FetchError;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Browser identities presented to upstream sites, tried in order.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

/// Something that can turn a URL into page markup.
///
/// Implemented by [`RetryFetcher`] in production and by in-memory fakes in
/// tests.
// Callers are generic and the runtime drives one run at a time; no `Send` bound.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Fetch the body of `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] once the implementation has given up on `url`.
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// A single GET presenting a chosen client identity.
#[allow(async_fn_in_trait)]
pub trait IdentityFetcher {
    /// Fetch `url` once, sending `user_agent` as the `User-Agent` header.
    ///
    /// # Arguments
    ///
    /// * `url` - Page to retrieve
    /// * `user_agent` - Browser identity for this attempt
    ///
    /// # Errors
    ///
    /// [`FetchError::Status`] for a non-2xx answer, [`FetchError::Transport`]
    /// when no answer (or no body) arrived.
    async fn fetch_as(&self, url: &str, user_agent: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub attempts: usize,
    /// Wait after an anti-bot (403/429) response.
    pub blocked_backoff: Duration,
    /// Wait after a server or transport error.
    pub error_backoff: Duration,
    /// Identities to rotate through. Must not be empty.
    pub user_agents: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            blocked_backoff: Duration::from_millis(1200),
            error_backoff: Duration::from_millis(800),
            user_agents: BROWSER_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RetryPolicy {
    /// Set the attempt budget. Values below 1 are raised to 1.
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Identity to use for `attempt` (0-based) when the first one was `start`.
    pub fn user_agent_for(&self, start: usize, attempt: usize) -> &str {
        let n = self.user_agents.len().max(1);
        self.user_agents
            .get((start + attempt) % n)
            .map(String::as_str)
            .unwrap_or(BROWSER_USER_AGENTS[0])
    }

    /// Pause before retrying after `err`.
    pub fn backoff_for(&self, err: &FetchError) -> Duration {
        if err.is_blocked() {
            self.blocked_backoff
        } else {
            self.error_backoff
        }
    }
}

/// Send `request` and read the body as text, mapping failures onto
/// [`FetchError`] for `url`.
///
/// # Errors
///
/// [`FetchError::Status`] for any non-2xx status, [`FetchError::Transport`]
/// for connection, timeout, or body errors.
pub(crate) async fn send_for_text(url: &str, request: reqwest::RequestBuilder) -> Result<String, FetchError> {
    let transport = |e: reqwest::Error| FetchError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    };
    let resp = request.send().await.map_err(transport)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    resp.text().await.map_err(transport)
}

/// `reqwest`-backed [`IdentityFetcher`] sending browser-like headers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl IdentityFetcher for HttpFetcher {
    async fn fetch_as(&self, url: &str, user_agent: &str) -> Result<String, FetchError> {
        send_for_text(url, self.client.get(url).header(USER_AGENT, user_agent)).await
    }
}

/// Wrapper that adds bounded retry and identity rotation to any
/// [`IdentityFetcher`].
///
/// Each call starts from a random identity in the policy and moves to the
/// next one on every retry, so consecutive attempts never present the same
/// `User-Agent` (given at least two identities).
pub struct RetryFetcher<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryFetcher<T> {
    /// Wrap `inner` with `policy`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let fetcher = RetryFetcher::new(HttpFetcher::new(Duration::from_secs(25))?, RetryPolicy::default());
    /// ```
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetcher")
            .field("attempts", &self.policy.attempts)
            .field("blocked_backoff", &self.policy.blocked_backoff)
            .field("error_backoff", &self.policy.error_backoff)
            .finish()
    }
}

impl<T: IdentityFetcher> PageFetcher for RetryFetcher<T> {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let start = rng().random_range(0..self.policy.user_agents.len().max(1));
        let mut attempt = 0usize;

        loop {
            let user_agent = self.policy.user_agent_for(start, attempt);
            match self.inner.fetch_as(url, user_agent).await {
                Ok(body) => {
                    debug!(
                        attempt,
                        bytes = body.len(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "Fetched page"
                    );
                    return Ok(body);
                }
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= self.policy.attempts {
                        error!(
                            attempt,
                            max = self.policy.attempts,
                            elapsed_ms = t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch_page() giving up"
                        );
                        return Err(e);
                    }
                    let delay = self.policy.backoff_for(&e);
                    warn!(
                        attempt,
                        max = self.policy.attempts,
                        ?delay,
                        error = %e,
                        "fetch_page() attempt failed; rotating identity and backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
