//! HTML index-page adapter.
//!
//! Collection pages (SunStar's "Cebu Top Stories", Inquirer's CDN category)
//! link to many things: articles, section fronts, "Read more" buttons, social
//! shares. This adapter keeps anchors whose resolved URL matches one of the
//! source's `link_patterns` and whose text looks like a headline.
//!
//! # URL Pattern
//!
//! Relative hrefs are resolved against the index page URL, so
//! `/cebu/local-news/slug` on `https://www.sunstar.com.ph/collection/...`
//! becomes `https://www.sunstar.com.ph/cebu/local-news/slug`.

use crate::models::{Candidate, SourceDefinition};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Extract candidates from an index page. Fails only if the source URL itself
/// is not a valid base.
pub fn parse_index(source: &SourceDefinition, html: &str) -> Result<Vec<Candidate>, String> {
    let base = Url::parse(&source.url).map_err(|e| format!("invalid source url: {e}"))?;
    let document = Html::parse_document(html);

    let candidates: Vec<Candidate> = document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            let resolved = base.join(href).ok()?.to_string();
            if !matches_link_patterns(source, &resolved) {
                return None;
            }
            let title = a.text().collect::<String>();
            let title = title.split_whitespace().join(" ");
            if !looks_like_headline(source, &title) {
                return None;
            }
            Some(Candidate::new(title, resolved, source.name.clone()))
        })
        .unique_by(|c| c.url.clone())
        .collect();

    debug!(source = %source.name, count = candidates.len(), "Parsed index page");
    Ok(candidates)
}

fn matches_link_patterns(source: &SourceDefinition, url: &str) -> bool {
    source.link_patterns.is_empty() || source.link_patterns.iter().any(|p| url.contains(p.as_str()))
}

fn looks_like_headline(source: &SourceDefinition, title: &str) -> bool {
    if title.chars().count() <= source.min_title_chars {
        return false;
    }
    let lowered = title.to_lowercase();
    !source
        .skip_title_prefixes
        .iter()
        .any(|p| lowered.starts_with(&p.to_lowercase()))
}
