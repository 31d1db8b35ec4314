//! Downstream publishers.
//!
//! The pipeline talks to a [`Publisher`]: authenticate once, then publish
//! candidates one at a time. Authentication failure is the only fatal error
//! in a run; a failed post is logged and the next candidate is tried.
//!
//! # Implementations
//!
//! | Publisher | Target | Notes |
//! |-----------|--------|-------|
//! | [`RedditPublisher`] | A subreddit via the OAuth API | Script-app password grant, optional link flair |
//! | [`DryRunPublisher`] | Logs only | Reports success without posting |
//!
//! # Reddit Flow
//!
//! 1. `POST /api/v1/access_token` (password grant, HTTP basic with app credentials)
//! 2. `GET /api/v1/me` to confirm the token belongs to the bot account
//! 3. `GET /r/{sub}/api/link_flair_v2` to find the flair whose text matches
//!    the configured one (failure here is a warning only)
//! 4. `POST /api/submit` per candidate, `kind=link`, `resubmit=false`
//!
//! Every Reddit call gets the same attempt budget as page fetches. 429, 5xx
//! and transport failures are retried with the policy's backoff; 403 and
//! other 4xx answers are final. A repeated
//! submit of an already-accepted link is refused by Reddit (`resubmit=false`),
//! so a retry never produces a duplicate post.

use crate::error::{FetchError, RelayError};
use crate::fetch::{RetryPolicy, send_for_text};
use crate::models::{Candidate, PublishReceipt};
use crate::utils::truncate_chars;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Reddit rejects titles longer than 300 characters.
pub const MAX_TITLE_CHARS: usize = 290;

pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const OAUTH_BASE: &str = "https://oauth.reddit.com";

// Driven sequentially by the pipeline; no `Send` bound.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Establish credentials. Errors here abort the run.
    async fn authenticate(&mut self) -> Result<(), RelayError>;

    /// Deliver one candidate.
    async fn publish(&self, candidate: &Candidate) -> Result<PublishReceipt, RelayError>;
}

/// Where the Reddit API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditEndpoints {
    /// Password-grant token endpoint.
    pub token_url: String,
    /// Base for bearer-authenticated API calls, without a trailing slash.
    pub oauth_base: String,
}

impl Default for RedditEndpoints {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.to_string(),
            oauth_base: OAUTH_BASE.to_string(),
        }
    }
}

/// Script-app credentials for the bot account.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Me {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FlairTemplate {
    id: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    json: SubmitJson,
}

#[derive(Debug, Deserialize)]
struct SubmitJson {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
    data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    id: Option<String>,
    url: Option<String>,
}

/// Access token from a token-endpoint body. Reddit answers bad passwords with
/// HTTP 200 and an `error` field.
fn parse_token(body: &str) -> Result<String, String> {
    let resp: TokenResponse = serde_json::from_str(body).map_err(|e| format!("token response: {e}"))?;
    match (resp.access_token, resp.error) {
        (Some(token), None) if !token.is_empty() => Ok(token),
        (_, Some(err)) => Err(err),
        _ => Err("token response without access_token".to_string()),
    }
}

fn find_flair_id(body: &str, text: &str) -> Result<Option<String>, serde_json::Error> {
    let templates: Vec<FlairTemplate> = serde_json::from_str(body)?;
    Ok(templates.into_iter().find(|t| t.text == text).map(|t| t.id))
}

/// Shortlink (or permalink) of a submission.
fn parse_submission(body: &str) -> Result<String, String> {
    let resp: SubmitResponse = serde_json::from_str(body).map_err(|e| format!("submit response: {e}"))?;
    if !resp.json.errors.is_empty() {
        let joined = resp
            .json
            .errors
            .iter()
            .map(|e| e.iter().map(|v| v.as_str().unwrap_or_default()).collect::<Vec<_>>().join(": "))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(joined);
    }
    let data = resp.json.data.ok_or("submit response without data")?;
    match (data.id, data.url) {
        (Some(id), _) => Ok(format!("https://redd.it/{id}")),
        (None, Some(url)) => Ok(url),
        (None, None) => Err("submit response without id or url".to_string()),
    }
}

/// Reddit answers 403 for permission problems, which a retry cannot fix.
/// Rate limiting (429), 5xx and transport failures are worth another try.
fn is_retryable_api_error(e: &FetchError) -> bool {
    e.is_transient() || matches!(e, FetchError::Status { status: 429, .. })
}

/// Posts candidates as link submissions to one subreddit.
pub struct RedditPublisher {
    client: reqwest::Client,
    credentials: RedditCredentials,
    endpoints: RedditEndpoints,
    policy: RetryPolicy,
    subreddit: String,
    flair_text: Option<String>,
    token: Option<String>,
    flair_id: Option<String>,
}

impl fmt::Debug for RedditPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditPublisher")
            .field("subreddit", &self.subreddit)
            .field("endpoints", &self.endpoints)
            .field("attempts", &self.policy.attempts)
            .field("flair_text", &self.flair_text)
            .field("flair_id", &self.flair_id)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl RedditPublisher {
    /// Create an unauthenticated publisher for `subreddit`.
    ///
    /// # Arguments
    ///
    /// * `credentials` - Script-app credentials; also supplies the `User-Agent`
    /// * `subreddit` - Target subreddit, without the `r/` prefix
    /// * `flair_text` - Link flair to look up during authentication (empty or `None` skips it)
    /// * `policy` - Attempt budget and `error_backoff` for every Reddit call
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn new(
        credentials: RedditCredentials,
        subreddit: impl Into<String>,
        flair_text: Option<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            credentials,
            endpoints: RedditEndpoints::default(),
            policy,
            subreddit: subreddit.into(),
            flair_text: flair_text.filter(|t| !t.is_empty()),
            token: None,
            flair_id: None,
        })
    }

    /// Point the publisher at a different API host.
    pub fn with_endpoints(mut self, endpoints: RedditEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Send the request produced by `build`, retrying transient failures
    /// within the policy's attempt budget.
    async fn call<F>(&self, url: &str, build: F) -> Result<String, FetchError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            match send_for_text(url, build()).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if !is_retryable_api_error(&e) || attempt >= self.policy.attempts {
                        return Err(e);
                    }
                    let delay = self.policy.backoff_for(&e);
                    warn!(
                        attempt,
                        max = self.policy.attempts,
                        ?delay,
                        error = %e,
                        "Reddit call failed; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn request_token(&self) -> Result<String, String> {
        let c = &self.credentials;
        let url = self.endpoints.token_url.as_str();
        let body = self
            .call(url, || {
                self.client
                    .post(url)
                    .basic_auth(&c.client_id, Some(&c.client_secret))
                    .form(&[
                        ("grant_type", "password"),
                        ("username", c.username.as_str()),
                        ("password", c.password.as_str()),
                    ])
            })
            .await
            .map_err(|e| e.to_string())?;
        parse_token(&body)
    }

    async fn whoami(&self, token: &str) -> Result<String, String> {
        let url = format!("{}/api/v1/me", self.endpoints.oauth_base);
        let body = self
            .call(&url, || self.client.get(&url).bearer_auth(token))
            .await
            .map_err(|e| e.to_string())?;
        let me: Me = serde_json::from_str(&body).map_err(|e| format!("me response: {e}"))?;
        Ok(me.name)
    }

    async fn discover_flair(&self, token: &str, text: &str) -> Result<Option<String>, String> {
        let url = format!(
            "{}/r/{}/api/link_flair_v2",
            self.endpoints.oauth_base,
            urlencoding::encode(&self.subreddit)
        );
        let body = self
            .call(&url, || self.client.get(&url).bearer_auth(token))
            .await
            .map_err(|e| e.to_string())?;
        find_flair_id(&body, text).map_err(|e| e.to_string())
    }
}

impl Publisher for RedditPublisher {
    #[instrument(level = "info", skip_all, fields(subreddit = %self.subreddit))]
    async fn authenticate(&mut self) -> Result<(), RelayError> {
        let token = self.request_token().await.map_err(RelayError::AuthFailure)?;
        let name = self.whoami(&token).await.map_err(RelayError::AuthFailure)?;
        info!(user = %name, "Reddit authentication OK");

        if let Some(text) = self.flair_text.clone() {
            match self.discover_flair(&token, &text).await {
                Ok(Some(id)) => {
                    info!(flair = %text, flair_id = %id, "Found link flair");
                    self.flair_id = Some(id);
                }
                Ok(None) => warn!(flair = %text, "No user-selectable link flair with this text"),
                Err(e) => warn!(flair = %text, error = %e, "Could not fetch link flairs"),
            }
        }
        self.token = Some(token);
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(url = %candidate.url))]
    async fn publish(&self, candidate: &Candidate) -> Result<PublishReceipt, RelayError> {
        let failure = |reason: String| RelayError::PublishFailure {
            url: candidate.url.clone(),
            reason,
        };
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| failure("publisher not authenticated".to_string()))?;

        let title = truncate_chars(&candidate.title, MAX_TITLE_CHARS);
        let mut form: Vec<(&str, &str)> = vec![
            ("api_type", "json"),
            ("kind", "link"),
            ("sr", self.subreddit.as_str()),
            ("title", title.as_str()),
            ("url", candidate.url.as_str()),
            ("resubmit", "false"),
        ];
        if let Some(flair_id) = self.flair_id.as_deref() {
            form.push(("flair_id", flair_id));
        }

        let url = format!("{}/api/submit", self.endpoints.oauth_base);
        let body = self
            .call(&url, || self.client.post(&url).bearer_auth(token).form(&form))
            .await
            .map_err(|e| failure(e.to_string()))?;

        let reference = parse_submission(&body).map_err(failure)?;
        Ok(PublishReceipt { reference })
    }
}

/// Logs what would be posted and reports success.
#[derive(Debug, Default)]
pub struct DryRunPublisher;

impl Publisher for DryRunPublisher {
    async fn authenticate(&mut self) -> Result<(), RelayError> {
        info!("Dry run: skipping authentication");
        Ok(())
    }

    async fn publish(&self, candidate: &Candidate) -> Result<PublishReceipt, RelayError> {
        let title = truncate_chars(&candidate.title, MAX_TITLE_CHARS);
        info!(%title, url = %candidate.url, source = %candidate.source, "Dry run: would post");
        Ok(PublishReceipt {
            reference: format!("dry-run:{}", candidate.url),
        })
    }
}
