//! Run configuration and source definitions.
//!
//! Everything tunable is collected into [`RelayConfig`] in `main` and handed
//! to the pipeline. Nothing here is global.
//!
//! # Sources File
//!
//! `--sources` points at a YAML list of [`SourceDefinition`]s. Order matters:
//! earlier sources win when two outlets cover the same story.
//!
//! ```yaml
//! - name: SunStar Cebu
//!   url: https://www.sunstar.com.ph/collection/cebu-top-stories
//!   kind: html_index
//!   link_patterns: ["sunstar.com.ph/cebu"]
//! - name: CDN Digital (via Inquirer)
//!   url: https://newsinfo.inquirer.net/category/cdn/cdn-news
//!   kind: html_index
//!   link_patterns: ["cebudailynews.inquirer.net", "/cdn/", "-cdn-"]
//!   skip_title_prefixes: ["read more", "watch", "listen"]
//! ```

use crate::error::RelayError;
use crate::freshness::UnknownDatePolicy;
use crate::models::SourceDefinition;
use crate::similarity::SimilarityThresholds;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

pub const SUNSTAR_TOP: &str = "https://www.sunstar.com.ph/collection/cebu-top-stories";
pub const CDN_NEWSINFO: &str = "https://newsinfo.inquirer.net/category/cdn/cdn-news";

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Articles older than this are not posted.
    pub max_age_hours: i64,
    /// At most this many posts per run.
    pub max_posts_per_run: usize,
    pub thresholds: SimilarityThresholds,
    /// Pause after each successful post.
    pub post_delay: Duration,
    pub unknown_date: UnknownDatePolicy,
    /// Write the seen set back after a run that posted something.
    pub persist_state: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            max_posts_per_run: 5,
            thresholds: SimilarityThresholds::default(),
            post_delay: Duration::from_secs(8),
            unknown_date: UnknownDatePolicy::AssumeFresh,
            persist_state: true,
        }
    }
}

/// SunStar first, then CDN: SunStar's copy of a shared story is preferred.
pub fn default_sources() -> Vec<SourceDefinition> {
    vec![
        SourceDefinition::html_index("SunStar Cebu", SUNSTAR_TOP, &["sunstar.com.ph/cebu"]),
        SourceDefinition::html_index(
            "CDN Digital (via Inquirer)",
            CDN_NEWSINFO,
            &["cebudailynews.inquirer.net", "/cdn/", "-cdn-"],
        )
        .skipping_titles(&["read more", "watch", "listen"]),
    ]
}

pub fn parse_sources(yaml: &str) -> Result<Vec<SourceDefinition>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Read source definitions from `path`, or use the built-in ones.
#[instrument(level = "info")]
pub async fn load_sources(path: Option<&Path>) -> Result<Vec<SourceDefinition>, RelayError> {
    let Some(path) = path else {
        return Ok(default_sources());
    };
    let config_err = |reason: String| RelayError::Config {
        path: path.to_path_buf(),
        reason,
    };
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| config_err(e.to_string()))?;
    let sources = parse_sources(&text).map_err(|e| config_err(e.to_string()))?;
    if sources.is_empty() {
        return Err(config_err("no sources defined".to_string()));
    }
    info!(count = sources.len(), "Loaded source definitions");
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    #[test]
    fn test_defaults() {
        let c = RelayConfig::default();
        assert_eq!(c.max_age_hours, 24);
        assert_eq!(c.max_posts_per_run, 5);
        assert_eq!(c.thresholds.jaccard, 0.75);
        assert_eq!(c.thresholds.ratio, 0.82);
        assert_eq!(c.post_delay, Duration::from_secs(8));
        assert_eq!(c.unknown_date, UnknownDatePolicy::AssumeFresh);
        assert!(c.persist_state);
    }

    #[test]
    fn test_default_sources_order() {
        let s = default_sources();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].name, "SunStar Cebu");
        assert_eq!(s[1].name, "CDN Digital (via Inquirer)");
        assert_eq!(s[1].skip_title_prefixes, vec!["read more", "watch", "listen"]);
    }

    #[test]
    fn test_parse_sources_yaml() {
        let yaml = r#"
- name: SunStar Cebu
  url: https://www.sunstar.com.ph/collection/cebu-top-stories
  kind: html_index
  link_patterns: ["sunstar.com.ph/cebu"]
- name: Cebu Feed
  url: https://feed.example/rss
  kind: rss
"#;
        let s = parse_sources(yaml).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s[1].kind, SourceKind::Rss);
    }

    #[tokio::test]
    async fn test_load_sources_without_path_uses_defaults() {
        let s = load_sources(None).await.unwrap();
        assert_eq!(s.len(), 2);
    }

    #[tokio::test]
    async fn test_load_sources_errors_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        let err = load_sources(Some(missing.as_path())).await.unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));

        let empty = dir.path().join("empty.yaml");
        std::fs::write(&empty, "[]").unwrap();
        let err = load_sources(Some(empty.as_path())).await.unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "- name: x\n  kind: carrier_pigeon\n").unwrap();
        assert!(load_sources(Some(bad.as_path())).await.is_err());
    }
}
