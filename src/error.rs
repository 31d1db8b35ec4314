//! Error types for the relay pipeline.
//!
//! Only [`RelayError::AuthFailure`] and [`RelayError::Config`] abort a run.
//! Every other variant is logged at the seam where it occurs and the pipeline
//! moves on to the next source, article, or candidate.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single HTTP GET, after or during retries.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    /// Connection, TLS, timeout, or body decoding failure.
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },
}

impl FetchError {
    /// Whether another attempt (with a different client identity) may succeed.
    ///
    /// Anti-scraping blocks (403), throttling (429), server errors and
    /// transport failures are transient. Other 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        self.is_blocked() || self.is_transient()
    }

    /// Server-side (5xx) or transport failure, independent of who is asking.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => (500..600).contains(status),
            FetchError::Transport { .. } => true,
        }
    }

    /// Whether the failure looks like an anti-bot block rather than an outage.
    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchError::Status { status: 403 | 429, .. })
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("state file {} is malformed: {reason}", path.display())]
    MalformedState { path: PathBuf, reason: String },

    #[error("publishing {url} failed: {reason}")]
    PublishFailure { url: String, reason: String },

    #[error("authentication with the publisher failed: {0}")]
    AuthFailure(String),

    #[error("could not read sources file {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("could not persist state to {}: {source}", path.display())]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RelayError {
    /// Fatal errors terminate the run with a non-zero exit status.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::AuthFailure(_) | RelayError::Config { .. })
    }
}
