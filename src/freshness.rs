//! Publication-date inference and the fresh/stale decision.
//!
//! # Resolution Order
//!
//! 1. Fetch the article and probe page metadata (`article:published_time`,
//!    `og:pubdate`, `pubdate`, `datePublished`, `<time datetime>`, then the
//!    visible `<time>` text)
//! 2. Infer a date from the URL path (`/2025/10/21/` or `-2025-10-21-`)
//! 3. Fall back to the configured [`UnknownDatePolicy`]
//!
//! All instants are normalized to UTC.

use crate::fetch::PageFetcher;
use crate::models::Freshness;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};

/// What to do with an article whose publication instant cannot be found.
///
/// Unknown-format pages are common and silently dropping real news is worse
/// than occasionally reposting a day-old story, so the default is
/// [`UnknownDatePolicy::AssumeFresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum UnknownDatePolicy {
    #[default]
    #[value(name = "fresh")]
    AssumeFresh,
    #[value(name = "stale")]
    AssumeStale,
}

/// `(selector, attribute)` pairs probed in order for a publication timestamp.
const META_PROBES: &[(&str, &str)] = &[
    (r#"meta[property="article:published_time"]"#, "content"),
    (r#"meta[name="article:published_time"]"#, "content"),
    (r#"meta[property="og:pubdate"]"#, "content"),
    (r#"meta[name="pubdate"]"#, "content"),
    (r#"meta[itemprop="datePublished"]"#, "content"),
    ("time[datetime]", "datetime"),
    (r#"span[itemprop="datePublished"]"#, "content"),
];

static META_SELECTORS: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    META_PROBES
        .iter()
        .map(|(sel, attr)| (Selector::parse(sel).unwrap(), *attr))
        .collect()
});
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());

static RE_URL_SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(20\d{2})/(\d{1,2})/(\d{1,2})/").unwrap());
static RE_URL_DASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(20\d{2})-(\d{1,2})-(\d{1,2})(?:-|/|$)").unwrap());

/// Parse a machine (ISO-8601/RFC 3339) or feed (RFC 2822) timestamp into UTC.
///
/// Values without any zone information are taken to be UTC. Date-only values
/// resolve to midnight UTC.
pub fn parse_any_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // offsets without a colon (+0800), a space instead of the `T`, no seconds
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M%:z",
        "%Y-%m-%dT%H:%M%z",
        "%Y-%m-%d %H:%M%:z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%MZ",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Date embedded in an article URL, as midnight UTC. Impossible calendar
/// dates are ignored.
pub fn infer_date_from_url(url: &str) -> Option<DateTime<Utc>> {
    [&*RE_URL_SLASH_DATE, &*RE_URL_DASH_DATE]
        .into_iter()
        .find_map(|re| {
            let caps = re.captures(url)?;
            let y = caps[1].parse().ok()?;
            let m = caps[2].parse().ok()?;
            let d = caps[3].parse().ok()?;
            let date = NaiveDate::from_ymd_opt(y, m, d)?;
            date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n))
        })
}

/// First parseable publication timestamp in an article's markup.
pub fn extract_published_from_html(html: &str) -> Option<DateTime<Utc>> {
    let document = Html::parse_document(html);

    for (selector, attr) in META_SELECTORS.iter() {
        if let Some(value) = document
            .select(selector)
            .next()
            .and_then(|el| el.value().attr(attr))
        {
            if let Some(dt) = parse_any_datetime(value) {
                return Some(dt);
            }
        }
    }

    let time_text = document
        .select(&TIME_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())?;
    parse_any_datetime(&time_text)
}

/// `now - published <= max_age`. Future-dated items are fresh.
pub fn is_within_horizon(published: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    now - published <= max_age
}

/// Decides whether an article is recent enough to publish.
#[derive(Debug)]
pub struct FreshnessOracle<'a, F> {
    fetcher: &'a F,
    max_age: Duration,
    unknown: UnknownDatePolicy,
}

impl<'a, F: PageFetcher> FreshnessOracle<'a, F> {
    /// Oracle fetching article pages through `fetcher`.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Source of article markup
    /// * `max_age_hours` - Freshness horizon; values too large for a
    ///   [`Duration`] mean "no horizon"
    /// * `unknown` - Verdict for articles without a discoverable date
    pub fn new(fetcher: &'a F, max_age_hours: i64, unknown: UnknownDatePolicy) -> Self {
        Self {
            fetcher,
            max_age: Duration::try_hours(max_age_hours).unwrap_or(Duration::MAX),
            unknown,
        }
    }

    /// Publication instant of an article: page metadata first, URL second.
    ///
    /// A failed page fetch is logged and falls through to the URL.
    pub async fn published_at(&self, url: &str, source: &str) -> Option<DateTime<Utc>> {
        match self.fetcher.fetch_page(url).await {
            Ok(html) => {
                if let Some(dt) = extract_published_from_html(&html) {
                    return Some(dt);
                }
            }
            Err(e) => {
                warn!(%source, %url, error = %e, "Article fetch for date lookup failed");
            }
        }
        infer_date_from_url(url)
    }

    /// Classify against the horizon as of `now`.
    #[instrument(level = "info", skip(self, now))]
    pub async fn classify_at(&self, url: &str, source: &str, now: DateTime<Utc>) -> Freshness {
        match self.published_at(url, source).await {
            Some(published) => {
                let fresh = is_within_horizon(published, now, self.max_age);
                info!(
                    %published,
                    age_minutes = (now - published).num_minutes(),
                    fresh,
                    "Resolved publication date"
                );
                Freshness {
                    fresh,
                    published_at: Some(published),
                }
            }
            None => {
                let fresh = self.unknown == UnknownDatePolicy::AssumeFresh;
                info!(fresh, policy = ?self.unknown, "No publication date found; applying policy");
                Freshness {
                    fresh,
                    published_at: None,
                }
            }
        }
    }

    /// Classify against the horizon as of the current time.
    pub async fn classify(&self, url: &str, source: &str) -> Freshness {
        self.classify_at(url, source, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeFetcher;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn page_with_meta(value: &str) -> String {
        format!(
            r#"<html><head><meta property="article:published_time" content="{value}"></head><body></body></html>"#
        )
    }

    #[test]
    fn test_parse_iso_with_z() {
        assert_eq!(parse_any_datetime("2025-10-22T09:15:00Z"), Some(utc(2025, 10, 22, 9, 15, 0)));
    }

    #[test]
    fn test_parse_iso_with_offsets() {
        let expected = Some(utc(2025, 10, 22, 1, 15, 0));
        assert_eq!(parse_any_datetime("2025-10-22T09:15:00+08:00"), expected);
        assert_eq!(parse_any_datetime("2025-10-22T09:15:00+0800"), expected);
        assert_eq!(parse_any_datetime("2025-10-22 09:15:00+08:00"), expected);
        assert_eq!(parse_any_datetime("  2025-10-22T09:15:00.123+08:00 ").map(|d| d.timestamp()), expected.map(|d| d.timestamp()));
    }

    #[test]
    fn test_parse_iso_without_seconds() {
        let expected = Some(utc(2025, 10, 22, 1, 15, 0));
        assert_eq!(parse_any_datetime("2025-10-22T09:15+08:00"), expected);
        assert_eq!(parse_any_datetime("2025-10-22T09:15+0800"), expected);
        assert_eq!(parse_any_datetime("2025-10-22 09:15+08:00"), expected);
        assert_eq!(parse_any_datetime("2025-10-22T01:15Z"), expected);
        assert_eq!(parse_any_datetime("2025-10-22T01:15"), expected);
        assert_eq!(parse_any_datetime("2025-10-22 01:15"), expected);
    }

    #[test]
    fn test_parse_naive_and_date_only_as_utc() {
        assert_eq!(parse_any_datetime("2025-10-22T09:15:00"), Some(utc(2025, 10, 22, 9, 15, 0)));
        assert_eq!(parse_any_datetime("2025-10-22 09:15:00"), Some(utc(2025, 10, 22, 9, 15, 0)));
        assert_eq!(parse_any_datetime("2025-10-22"), Some(utc(2025, 10, 22, 0, 0, 0)));
    }

    #[test]
    fn test_parse_rfc2822_feed_dates() {
        assert_eq!(
            parse_any_datetime("Tue, 21 Oct 2025 09:15:00 +0800"),
            Some(utc(2025, 10, 21, 1, 15, 0))
        );
        assert_eq!(
            parse_any_datetime("Tue, 21 Oct 2025 09:15:00 GMT"),
            Some(utc(2025, 10, 21, 9, 15, 0))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_any_datetime(""), None);
        assert_eq!(parse_any_datetime("   "), None);
        assert_eq!(parse_any_datetime("3 hours ago"), None);
        assert_eq!(parse_any_datetime("October 21, 2025"), None);
        assert_eq!(parse_any_datetime("2025-13-40"), None);
    }

    #[test]
    fn test_url_slash_date() {
        assert_eq!(
            infer_date_from_url("https://www.sunstar.com.ph/cebu/2025/10/21"),
            None,
            "needs a trailing slash after the day"
        );
        assert_eq!(
            infer_date_from_url("https://newsinfo.inquirer.net/2025/10/21/council-approves-budget"),
            Some(utc(2025, 10, 21, 0, 0, 0))
        );
        assert_eq!(
            infer_date_from_url("https://example.com/2025/1/5/story"),
            Some(utc(2025, 1, 5, 0, 0, 0))
        );
    }

    #[test]
    fn test_url_dash_date() {
        assert_eq!(
            infer_date_from_url("https://example.com/cebu/story-2025-10-21-flooding"),
            Some(utc(2025, 10, 21, 0, 0, 0))
        );
        assert_eq!(
            infer_date_from_url("https://example.com/cebu/story-2025-10-21"),
            Some(utc(2025, 10, 21, 0, 0, 0))
        );
        assert_eq!(
            infer_date_from_url("https://example.com/cebu/story-2025-10-21/amp"),
            Some(utc(2025, 10, 21, 0, 0, 0))
        );
    }

    #[test]
    fn test_url_invalid_or_missing_date() {
        assert_eq!(infer_date_from_url("https://example.com/2025/02/30/story"), None);
        assert_eq!(infer_date_from_url("https://example.com/cebu/local-news/123456"), None);
        assert_eq!(infer_date_from_url("https://example.com/1999/10/21/old"), None);
    }

    #[test]
    fn test_url_slash_pattern_checked_first() {
        assert_eq!(
            infer_date_from_url("https://example.com/2025/10/21/story-2024-01-01-x"),
            Some(utc(2025, 10, 21, 0, 0, 0))
        );
    }

    #[test]
    fn test_extract_meta_probe_order() {
        let html = r#"<html><head>
            <meta name="pubdate" content="2025-10-20T00:00:00Z">
            <meta property="article:published_time" content="2025-10-21T08:00:00+08:00">
        </head></html>"#;
        assert_eq!(extract_published_from_html(html), Some(utc(2025, 10, 21, 0, 0, 0)));
    }

    #[test]
    fn test_extract_skips_unparseable_probe() {
        let html = r#"<html><head>
            <meta property="article:published_time" content="yesterday">
            <meta itemprop="datePublished" content="2025-10-21T10:00:00Z">
        </head></html>"#;
        assert_eq!(extract_published_from_html(html), Some(utc(2025, 10, 21, 10, 0, 0)));
    }

    #[test]
    fn test_extract_time_element() {
        let html = r#"<html><body><time datetime="2025-10-21T10:00:00Z">Oct 21</time></body></html>"#;
        assert_eq!(extract_published_from_html(html), Some(utc(2025, 10, 21, 10, 0, 0)));

        let html = r#"<html><body><p>x</p><time> 2025-10-21 10:00:00 </time></body></html>"#;
        assert_eq!(extract_published_from_html(html), Some(utc(2025, 10, 21, 10, 0, 0)));
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_published_from_html("<html><body><p>hi</p></body></html>"), None);
        assert_eq!(extract_published_from_html("<time>3 hours ago</time>"), None);
    }

    #[test]
    fn test_horizon_boundaries() {
        let now = utc(2025, 10, 22, 12, 0, 0);
        let horizon = Duration::hours(24);
        assert!(is_within_horizon(now - Duration::hours(23), now, horizon));
        assert!(is_within_horizon(now - Duration::hours(24), now, horizon));
        assert!(!is_within_horizon(now - Duration::hours(25), now, horizon));
        assert!(is_within_horizon(now + Duration::hours(3), now, horizon));
    }

    #[tokio::test]
    async fn test_classify_fresh_and_stale_from_meta() {
        let now = utc(2025, 10, 22, 12, 0, 0);
        let fresh_at = (now - Duration::hours(23)).to_rfc3339();
        let stale_at = (now - Duration::hours(25)).to_rfc3339();
        let fetcher = FakeFetcher::new()
            .page("https://n.example/fresh", &page_with_meta(&fresh_at))
            .page("https://n.example/stale", &page_with_meta(&stale_at));
        let oracle = FreshnessOracle::new(&fetcher, 24, UnknownDatePolicy::AssumeFresh);

        let f = oracle.classify_at("https://n.example/fresh", "test", now).await;
        assert!(f.fresh);
        assert_eq!(f.published_at, Some(now - Duration::hours(23)));

        let s = oracle.classify_at("https://n.example/stale", "test", now).await;
        assert!(!s.fresh);
        assert_eq!(s.published_at, Some(now - Duration::hours(25)));
    }

    #[tokio::test]
    async fn test_classify_uses_current_time() {
        let recent = (Utc::now() - Duration::hours(2)).to_rfc3339();
        let fetcher = FakeFetcher::new()
            .page("https://n.example/recent", &page_with_meta(&recent))
            .page("https://n.example/old", &page_with_meta("2020-01-01T00:00:00Z"));
        let oracle = FreshnessOracle::new(&fetcher, 24, UnknownDatePolicy::AssumeFresh);
        assert!(oracle.classify("https://n.example/recent", "test").await.fresh);
        assert!(!oracle.classify("https://n.example/old", "test").await.fresh);
    }

    #[tokio::test]
    async fn test_huge_horizon_does_not_overflow() {
        let now = utc(2025, 10, 22, 12, 0, 0);
        let fetcher = FakeFetcher::new().page("https://n.example/old", &page_with_meta("2001-01-01T00:00:00Z"));
        for hours in [i64::MAX, i64::MAX / 2] {
            let oracle = FreshnessOracle::new(&fetcher, hours, UnknownDatePolicy::AssumeStale);
            assert!(oracle.classify_at("https://n.example/old", "test", now).await.fresh);
        }
    }

    #[tokio::test]
    async fn test_classify_unknown_date_defaults_fresh() {
        let now = utc(2025, 10, 22, 12, 0, 0);
        let fetcher = FakeFetcher::new().page("https://n.example/story", "<html><body>no dates</body></html>");
        let oracle = FreshnessOracle::new(&fetcher, 24, UnknownDatePolicy::default());
        let f = oracle.classify_at("https://n.example/story", "test", now).await;
        assert!(f.fresh);
        assert_eq!(f.published_at, None);
    }

    #[tokio::test]
    async fn test_classify_unknown_date_stale_policy() {
        let now = utc(2025, 10, 22, 12, 0, 0);
        let fetcher = FakeFetcher::new().page("https://n.example/story", "<html></html>");
        let oracle = FreshnessOracle::new(&fetcher, 24, UnknownDatePolicy::AssumeStale);
        assert!(!oracle.classify_at("https://n.example/story", "test", now).await.fresh);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_url() {
        let now = utc(2025, 10, 22, 12, 0, 0);
        let url = "https://n.example/2025/10/10/old-story/";
        let fetcher = FakeFetcher::new().failing(url, 503);
        let oracle = FreshnessOracle::new(&fetcher, 24, UnknownDatePolicy::AssumeFresh);
        let f = oracle.classify_at(url, "test", now).await;
        assert!(!f.fresh);
        assert_eq!(f.published_at, Some(utc(2025, 10, 10, 0, 0, 0)));
        assert_eq!(fetcher.requested(url), 1);
    }

    #[tokio::test]
    async fn test_meta_wins_over_url_date() {
        let now = utc(2025, 10, 22, 12, 0, 0);
        let url = "https://n.example/2025/10/01/story/";
        let fetcher = FakeFetcher::new().page(url, &page_with_meta("2025-10-22T06:00:00Z"));
        let oracle = FreshnessOracle::new(&fetcher, 24, UnknownDatePolicy::AssumeStale);
        let f = oracle.classify_at(url, "test", now).await;
        assert!(f.fresh);
        assert_eq!(f.published_at, Some(utc(2025, 10, 22, 6, 0, 0)));
    }
}
