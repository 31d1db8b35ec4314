//! Source adapters that turn a [`SourceDefinition`] into [`Candidate`]s.
//!
//! # Supported Source Kinds
//!
//! | Kind | Module | Method | Notes |
//! |------|--------|--------|-------|
//! | `html_index` | [`html_index`] | HTML scraping | Anchors filtered by URL substring |
//! | `rss` | [`rss`] | RSS 2.0 feed | `guid` becomes the stable identifier |
//!
//! Every adapter fetches through a [`PageFetcher`], so anti-bot retries and
//! identity rotation apply to index pages as well as articles. Adapters
//! de-duplicate by exact URL before returning.
//!
//! A failing source never stops the others: [`gather`] logs the failure,
//! records the source name, and moves on.

pub mod html_index;
pub mod rss;

use crate::error::RelayError;
use crate::fetch::PageFetcher;
use crate::models::{Candidate, SourceDefinition, SourceKind};
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument};

/// Fetch candidates from one source.
///
/// # Errors
///
/// Returns [`RelayError::SourceUnavailable`] when the source page cannot be
/// fetched (after retries) or cannot be parsed as its declared kind.
#[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
pub async fn fetch_candidates<F: PageFetcher>(
    source: &SourceDefinition,
    fetcher: &F,
) -> Result<Vec<Candidate>, RelayError> {
    let unavailable = |reason: String| RelayError::SourceUnavailable {
        source_name: source.name.clone(),
        reason,
    };
    let body = fetcher
        .fetch_page(&source.url)
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    let candidates = match source.kind {
        SourceKind::HtmlIndex => html_index::parse_index(source, &body).map_err(unavailable)?,
        SourceKind::Rss => rss::parse_feed(source, &body).map_err(unavailable)?,
    };
    info!(count = candidates.len(), "Found candidates");
    Ok(candidates)
}

/// Fetch every source in order and concatenate their candidates.
///
/// Returns the candidates and the names of the sources that failed.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn gather<F: PageFetcher>(
    sources: &[SourceDefinition],
    fetcher: &F,
) -> (Vec<Candidate>, Vec<String>) {
    let results: Vec<(String, Result<Vec<Candidate>, RelayError>)> = stream::iter(sources)
        .then(|source| async move { (source.name.clone(), fetch_candidates(source, fetcher).await) })
        .collect()
        .await;

    let mut candidates = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(found) => candidates.extend(found),
            Err(e) => {
                error!(source = %name, error = %e, "Source failed; skipping for this run");
                failed.push(name);
            }
        }
    }
    (candidates, failed)
}
