//! # Cebu News Relay
//!
//! Collects Cebu local news from several outlets, collapses duplicate coverage
//! of the same story, drops anything older than the freshness horizon, and
//! posts a capped number of new stories to a subreddit.
//!
//! ## Usage
//!
//! ```sh
//! REDDIT_CLIENT_ID=... REDDIT_CLIENT_SECRET=... \
//! REDDIT_USERNAME=... REDDIT_PASSWORD=... cebu_news_relay
//! ```
//!
//! ## Architecture
//!
//! 1. **Gathering**: each source adapter lists candidate articles; a failing
//!    source is skipped
//! 2. **De-duplication**: near-duplicate headlines across sources collapse to
//!    the first one seen
//! 3. **Selection**: already-posted and stale stories are dropped, the rest is
//!    capped
//! 4. **Publishing**: posts go out one at a time with a fixed delay, and the
//!    posted identifiers are saved

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use cebu_news_relay::cli::Cli;
use cebu_news_relay::config;
use cebu_news_relay::fetch::{HttpFetcher, RetryFetcher, RetryPolicy};
use cebu_news_relay::pipeline;
use cebu_news_relay::publish::{DryRunPublisher, RedditPublisher};
use cebu_news_relay::state::StateStore;
use cebu_news_relay::utils::ensure_parent_writable;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("cebu_news_relay starting up");

    let args = Cli::parse();
    debug!(state_file = %args.state_file.display(), sources = ?args.sources, dry_run = args.dry_run, "Parsed CLI arguments");

    // Fail before posting anything if state can never be saved
    if let Err(e) = ensure_parent_writable(&args.state_file).await {
        error!(
            path = %args.state_file.display(),
            error = %e,
            "State directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let sources = config::load_sources(args.sources.as_deref()).await?;
    let relay_config = args.relay_config();
    info!(
        subreddit = %args.subreddit,
        sources = sources.len(),
        max_age_hours = relay_config.max_age_hours,
        max_posts = relay_config.max_posts_per_run,
        unknown_date = ?relay_config.unknown_date,
        "Configuration loaded"
    );

    let retry_policy = RetryPolicy::default().with_attempts(args.retry_attempts);
    let fetcher = RetryFetcher::new(HttpFetcher::new(args.request_timeout())?, retry_policy.clone());
    let store = StateStore::new(&args.state_file);

    let result = if args.dry_run {
        let mut publisher = DryRunPublisher;
        pipeline::run(&relay_config, &sources, &fetcher, &mut publisher, &store, Utc::now()).await
    } else {
        let mut publisher = RedditPublisher::new(
            args.reddit_credentials(),
            args.subreddit.clone(),
            args.flair(),
            retry_policy,
            args.request_timeout(),
        )?;
        pipeline::run(&relay_config, &sources, &fetcher, &mut publisher, &store, Utc::now()).await
    };

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "Run aborted");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        gathered = summary.gathered,
        unique = summary.unique,
        selected = summary.selected.len(),
        posted = summary.published.len(),
        failed = summary.failed,
        failed_sources = ?summary.failed_sources,
        "Execution complete"
    );
    Ok(())
}
