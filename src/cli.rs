//! Command-line interface definitions for the Cebu news relay.
//!
//! Every option can also come from the environment, which is how the
//! scheduled job supplies Reddit credentials.

use crate::config::RelayConfig;
use crate::freshness::UnknownDatePolicy;
use crate::publish::RedditCredentials;
use crate::similarity::{DEFAULT_JACCARD_THRESHOLD, DEFAULT_RATIO_THRESHOLD, SimilarityThresholds};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the relay.
///
/// # Examples
///
/// ```sh
/// # Post up to 5 fresh stories to r/CebuPolitics
/// cebu_news_relay
///
/// # See what would be posted without touching Reddit or the state file
/// cebu_news_relay --dry-run
///
/// # Custom sources and a stricter horizon
/// cebu_news_relay --sources sources.yaml --max-age-hours 12 --unknown-date stale
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON file holding identifiers of already-posted stories
    #[arg(short, long, env = "STATE_FILE", default_value = "posted.json")]
    pub state_file: PathBuf,

    /// YAML file of source definitions (built-in SunStar + CDN when omitted)
    #[arg(long, env = "SOURCES_FILE")]
    pub sources: Option<PathBuf>,

    /// Subreddit to post to
    #[arg(long, env = "SUBREDDIT", default_value = "CebuPolitics")]
    pub subreddit: String,

    /// Link flair text to apply (empty to skip flair)
    #[arg(long, env = "FLAIR_TEXT", default_value = "Local News")]
    pub flair_text: String,

    /// Skip stories older than this many hours (1 to 8760)
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(i64).range(1..=8760))]
    pub max_age_hours: i64,

    /// Maximum number of posts per run
    #[arg(long, default_value_t = 5)]
    pub max_posts: usize,

    /// Token-overlap threshold for treating two headlines as the same story
    #[arg(long, default_value_t = DEFAULT_JACCARD_THRESHOLD)]
    pub jaccard_threshold: f64,

    /// Character-similarity threshold for treating two headlines as the same story
    #[arg(long, default_value_t = DEFAULT_RATIO_THRESHOLD)]
    pub ratio_threshold: f64,

    /// Seconds to wait between posts
    #[arg(long, default_value_t = 8)]
    pub post_delay_secs: u64,

    /// Attempts per page fetch before giving up
    #[arg(long, default_value_t = 3)]
    pub retry_attempts: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 25)]
    pub request_timeout_secs: u64,

    /// How to treat articles whose publication date cannot be found
    #[arg(long, value_enum, default_value = "fresh")]
    pub unknown_date: UnknownDatePolicy,

    /// Log what would be posted; do not authenticate, post, or write state
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, env = "REDDIT_CLIENT_ID", hide_env_values = true)]
    pub reddit_client_id: Option<String>,

    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub reddit_client_secret: Option<String>,

    #[arg(long, env = "REDDIT_USERNAME")]
    pub reddit_username: Option<String>,

    #[arg(long, env = "REDDIT_PASSWORD", hide_env_values = true)]
    pub reddit_password: Option<String>,

    /// Defaults to `CebuNewsBot/1.0 by u/<username>`
    #[arg(long, env = "REDDIT_USER_AGENT")]
    pub reddit_user_agent: Option<String>,
}

impl Cli {
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_age_hours: self.max_age_hours,
            max_posts_per_run: self.max_posts,
            thresholds: SimilarityThresholds {
                jaccard: self.jaccard_threshold,
                ratio: self.ratio_threshold,
            },
            post_delay: Duration::from_secs(self.post_delay_secs),
            unknown_date: self.unknown_date,
            persist_state: !self.dry_run,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reddit credentials. Missing values are passed through as empty strings
    /// so the token request fails as an authentication error.
    pub fn reddit_credentials(&self) -> RedditCredentials {
        let username = self.reddit_username.clone().unwrap_or_default();
        let user_agent = self.reddit_user_agent.clone().unwrap_or_else(|| {
            let who = if username.is_empty() { "bot" } else { username.as_str() };
            format!("CebuNewsBot/1.0 by u/{who}")
        });
        RedditCredentials {
            client_id: self.reddit_client_id.clone().unwrap_or_default(),
            client_secret: self.reddit_client_secret.clone().unwrap_or_default(),
            username,
            password: self.reddit_password.clone().unwrap_or_default(),
            user_agent,
        }
    }

    pub fn flair(&self) -> Option<String> {
        Some(self.flair_text.trim().to_string()).filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["cebu_news_relay"]).unwrap();
        let config = cli.relay_config();
        assert_eq!(config.max_age_hours, 24);
        assert_eq!(config.max_posts_per_run, 5);
        assert_eq!(config.thresholds, SimilarityThresholds::default());
        assert_eq!(config.post_delay, Duration::from_secs(8));
        assert_eq!(config.unknown_date, UnknownDatePolicy::AssumeFresh);
        assert!(config.persist_state);
        assert_eq!(cli.request_timeout(), Duration::from_secs(25));
        assert_eq!(cli.retry_attempts, 3);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "cebu_news_relay",
            "--state-file",
            "/tmp/posted.json",
            "--max-age-hours",
            "12",
            "--max-posts",
            "2",
            "--jaccard-threshold",
            "0.8",
            "--ratio-threshold",
            "0.9",
            "--unknown-date",
            "stale",
            "--dry-run",
            "--flair-text",
            "",
        ])
        .unwrap();
        assert_eq!(cli.state_file, PathBuf::from("/tmp/posted.json"));
        let config = cli.relay_config();
        assert_eq!(config.max_age_hours, 12);
        assert_eq!(config.max_posts_per_run, 2);
        assert_eq!(config.thresholds.jaccard, 0.8);
        assert_eq!(config.thresholds.ratio, 0.9);
        assert_eq!(config.unknown_date, UnknownDatePolicy::AssumeStale);
        assert!(!config.persist_state);
        assert_eq!(cli.flair(), None);
    }

    #[test]
    fn test_user_agent_default_mentions_username() {
        let cli = Cli::try_parse_from(["cebu_news_relay", "--reddit-username", "cebubot"]).unwrap();
        assert_eq!(cli.reddit_credentials().user_agent, "CebuNewsBot/1.0 by u/cebubot");
    }

    #[test]
    fn test_rejects_out_of_range_horizon() {
        for hours in ["0", "-5", "8761", "9223372036854775807"] {
            assert!(
                Cli::try_parse_from(["cebu_news_relay", "--max-age-hours", hours]).is_err(),
                "{hours} should be rejected"
            );
        }
        let cli = Cli::try_parse_from(["cebu_news_relay", "--max-age-hours", "8760"]).unwrap();
        assert_eq!(cli.relay_config().max_age_hours, 8760);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["cebu_news_relay", "--unknown-date", "maybe"]).is_err());
    }
}
