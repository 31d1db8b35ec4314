//! One relay run, end to end.
//!
//! ```text
//! sources ──gather──▶ candidates ──dedupe──▶ unique
//!     ──authenticate──▶ load seen ──select (unseen, fresh, cap)──▶ to_post
//!     ──publish (delay between posts)──▶ save seen (if anything posted)
//! ```
//!
//! Only [`RelayError::AuthFailure`] escapes [`run`]; every other failure is
//! logged with its source or URL and the run carries on.

use crate::aggregate::dedupe;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::fetch::PageFetcher;
use crate::freshness::FreshnessOracle;
use crate::models::{Candidate, PublishReceipt, RunSummary, SourceDefinition};
use crate::publish::Publisher;
use crate::scrapers;
use crate::similarity::SimilarityJudge;
use crate::state::{SeenSet, StateStore};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Unseen, fresh candidates in aggregation order, at most `cap` of them.
///
/// Stops classifying once `cap` are found, so article pages beyond the cap
/// are never fetched. The result equals filtering everything and truncating.
#[instrument(level = "info", skip_all, fields(candidates = candidates.len(), seen = seen.len(), cap))]
pub async fn select<F: PageFetcher>(
    candidates: &[Candidate],
    seen: &SeenSet,
    cap: usize,
    oracle: &FreshnessOracle<'_, F>,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let mut selected = Vec::new();
    for candidate in candidates {
        if selected.len() >= cap {
            break;
        }
        if seen.contains(candidate.identifier()) {
            continue;
        }
        if oracle.classify_at(&candidate.url, &candidate.source, now).await.fresh {
            selected.push(candidate.clone());
        }
    }
    selected
}

/// Post each candidate in order, recording successes in `seen`.
///
/// Returns the receipts of the posts that succeeded and the number that
/// failed. A failed post leaves `seen` untouched.
pub async fn publish_all<P: Publisher>(
    to_post: &[Candidate],
    publisher: &P,
    seen: &mut SeenSet,
    config: &RelayConfig,
) -> (Vec<PublishReceipt>, usize) {
    let mut receipts = Vec::new();
    let mut failed = 0usize;
    for (i, candidate) in to_post.iter().enumerate() {
        match publisher.publish(candidate).await {
            Ok(receipt) => {
                info!(
                    reference = %receipt.reference,
                    title = %truncate_for_log(&candidate.title, 120),
                    source = %candidate.source,
                    "Posted"
                );
                seen.insert(candidate.identifier());
                receipts.push(receipt);
                if i + 1 < to_post.len() && !config.post_delay.is_zero() {
                    sleep(config.post_delay).await;
                }
            }
            Err(e) => {
                error!(url = %candidate.url, source = %candidate.source, error = %e, "Failed to post");
                failed += 1;
            }
        }
    }
    (receipts, failed)
}

/// Execute one run against the given sources.
///
/// # Returns
///
/// A [`RunSummary`] of what was gathered, selected, and posted. Runs that
/// find nothing to post still return `Ok`.
///
/// # Errors
///
/// Only [`RelayError::AuthFailure`] from the publisher, which aborts the run
/// before anything is posted or saved.
#[instrument(level = "info", skip_all)]
pub async fn run<F: PageFetcher, P: Publisher>(
    config: &RelayConfig,
    sources: &[SourceDefinition],
    fetcher: &F,
    publisher: &mut P,
    store: &StateStore,
    now: DateTime<Utc>,
) -> Result<RunSummary, RelayError> {
    let mut summary = RunSummary::default();

    let (gathered, failed_sources) = scrapers::gather(sources, fetcher).await;
    summary.gathered = gathered.len();
    summary.failed_sources = failed_sources;
    if gathered.is_empty() {
        warn!("No items found from any source this run");
        return Ok(summary);
    }

    info!(total = summary.gathered, "[AGG] Total before de-dupe");
    let unique = dedupe(gathered, &SimilarityJudge::new(config.thresholds));
    summary.unique = unique.len();
    info!(total = summary.unique, "[AGG] After cross-source de-dupe");

    publisher.authenticate().await?;

    let mut seen = store.load().await;
    let oracle = FreshnessOracle::new(fetcher, config.max_age_hours, config.unknown_date);
    summary.selected = select(&unique, &seen, config.max_posts_per_run, &oracle, now).await;
    if summary.selected.is_empty() {
        info!("No fresh unseen items to post");
        return Ok(summary);
    }
    info!(
        count = summary.selected.len(),
        cap = config.max_posts_per_run,
        "Will post selected items"
    );

    let (published, failed) = publish_all(&summary.selected, publisher, &mut seen, config).await;
    summary.published = published;
    summary.failed = failed;

    if summary.published.is_empty() {
        info!("Nothing posted");
    } else if config.persist_state {
        if let Err(e) = store.save(&seen).await {
            error!(error = %e, "Could not save seen identifiers; next run may repost");
        }
        info!(count = summary.published.len(), "Posted new items");
    } else {
        info!(count = summary.published.len(), "Posted new items; state not persisted");
    }
    Ok(summary)
}
