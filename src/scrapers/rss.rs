//! RSS 2.0 feed adapter.
//!
//! Each `<item>` with both a title and a link becomes a candidate. The item's
//! `<guid>` is carried as the candidate's stable identifier so that a story
//! whose URL gains tracking parameters is still recognized as already posted.

use crate::models::{Candidate, SourceDefinition};
use itertools::Itertools;
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Extract candidates from an RSS 2.0 document. Items without a title or
/// link are skipped.
///
/// # Errors
///
/// Returns the deserialization message when `xml` is not an RSS document.
pub fn parse_feed(source: &SourceDefinition, xml: &str) -> Result<Vec<Candidate>, String> {
    let rss: Rss = from_str(xml).map_err(|e| format!("parsing rss: {e}"))?;

    let candidates: Vec<Candidate> = rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let title = item.title?.split_whitespace().join(" ");
            let link = item.link?.trim().to_string();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            let candidate = Candidate::new(title, link, source.name.clone());
            match item.guid.map(|g| g.value.trim().to_string()) {
                Some(id) if !id.is_empty() => Some(candidate.with_id(id)),
                _ => Some(candidate),
            }
        })
        .unique_by(|c| c.url.clone())
        .collect();

    debug!(source = %source.name, count = candidates.len(), "Parsed feed");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> SourceDefinition {
        SourceDefinition::rss("Cebu Feed", "https://feed.example/rss")
    }

    #[test]
    fn test_parse_feed_items() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Cebu Feed</title>
    <link>https://feed.example/</link>
    <item>
      <title><![CDATA[Cebu flooding displaces hundreds]]></title>
      <link>https://feed.example/2025/10/21/flooding/</link>
      <guid isPermaLink="false">feed-1001</guid>
      <pubDate>Tue, 21 Oct 2025 09:15:00 +0800</pubDate>
    </item>
    <item>
      <title>Mandaue mayor opens
        new public market</title>
      <link>https://feed.example/market</link>
    </item>
    <item>
      <title>No link, dropped</title>
    </item>
    <item>
      <link>https://feed.example/no-title</link>
    </item>
  </channel>
</rss>"#;

        let out = parse_feed(&feed(), xml).unwrap();
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].title, "Cebu flooding displaces hundreds");
        assert_eq!(out[0].url, "https://feed.example/2025/10/21/flooding/");
        assert_eq!(out[0].identifier(), "feed-1001");
        assert_eq!(out[0].source, "Cebu Feed");

        assert_eq!(out[1].title, "Mandaue mayor opens new public market");
        assert_eq!(out[1].identifier(), "https://feed.example/market");
    }

    #[test]
    fn test_empty_channel() {
        let xml = r#"<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        assert!(parse_feed(&feed(), xml).unwrap().is_empty());
    }

    #[test]
    fn test_not_a_feed() {
        assert!(parse_feed(&feed(), "<html><body>blocked</body></html>").is_err());
    }
}
