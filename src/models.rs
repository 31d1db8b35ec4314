//! Data models shared across the relay pipeline.
//!
//! - [`Candidate`]: one article reference produced by a source adapter
//! - [`SourceDefinition`]: where and how a source adapter finds candidates
//! - [`PublishReceipt`]: what the publisher reports back on success
//! - [`RunSummary`]: counters and selections for a single run

use crate::normalize::NormalizedTitle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A news article reference before de-duplication and freshness filtering.
///
/// The normalized form of the title is computed once at construction and
/// cached, so the O(n²) similarity scan never re-normalizes a title.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The headline as it appeared on the source page or feed.
    pub title: String,
    /// Absolute URL of the article.
    pub url: String,
    /// Display name of the source that produced this candidate.
    pub source: String,
    /// Stable identifier supplied by the source (RSS `guid`), if any.
    pub id: Option<String>,
    normalized: NormalizedTitle,
}

impl Candidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        let title = title.into();
        let normalized = NormalizedTitle::new(&title);
        Self {
            title,
            url: url.into(),
            source: source.into(),
            id: None,
            normalized,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Identifier recorded in the seen set: the source id when present,
    /// otherwise the URL.
    pub fn identifier(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.url)
    }

    pub fn normalized(&self) -> &NormalizedTitle {
        &self.normalized
    }
}

/// How a source exposes its article list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// An HTML page whose anchors link to articles.
    HtmlIndex,
    /// An RSS 2.0 feed.
    Rss,
}

/// Configuration for one news source.
///
/// Sources are tried in the order they are listed. That order is also the
/// tie-break preference when two sources cover the same story.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceDefinition {
    /// Name used in logs and stored on each candidate.
    pub name: String,
    /// Page or feed URL to fetch.
    pub url: String,
    pub kind: SourceKind,
    /// Keep only links whose absolute URL contains one of these substrings.
    /// An empty list keeps every link.
    #[serde(default)]
    pub link_patterns: Vec<String>,
    /// Anchor texts starting with any of these (case-insensitive) are skipped.
    #[serde(default)]
    pub skip_title_prefixes: Vec<String>,
    /// Anchor texts must be strictly longer than this many characters.
    #[serde(default = "default_min_title_chars")]
    pub min_title_chars: usize,
}

fn default_min_title_chars() -> usize {
    6
}

impl SourceDefinition {
    pub fn html_index(name: &str, url: &str, link_patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind: SourceKind::HtmlIndex,
            link_patterns: link_patterns.iter().map(|p| p.to_string()).collect(),
            skip_title_prefixes: Vec::new(),
            min_title_chars: default_min_title_chars(),
        }
    }

    pub fn rss(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind: SourceKind::Rss,
            link_patterns: Vec::new(),
            skip_title_prefixes: Vec::new(),
            min_title_chars: default_min_title_chars(),
        }
    }

    pub fn skipping_titles(mut self, prefixes: &[&str]) -> Self {
        self.skip_title_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// Returned by a publisher after a confirmed successful post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Where the published item can be found (e.g. a Reddit shortlink).
    pub reference: String,
}

/// Publication instant and verdict for one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub fresh: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Outcome of one relay run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Candidates gathered from all sources before cross-source de-dupe.
    pub gathered: usize,
    /// Candidates left after cross-source de-dupe.
    pub unique: usize,
    /// Candidates chosen for publication, in aggregation order.
    pub selected: Vec<Candidate>,
    /// References of the posts that succeeded.
    pub published: Vec<PublishReceipt>,
    /// Number of candidates whose publish call failed.
    pub failed: usize,
    /// Sources that could not be fetched this run.
    pub failed_sources: Vec<String>,
}
