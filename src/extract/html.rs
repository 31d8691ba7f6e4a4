// src/extract/html.rs
// =============================================================================
// This module pulls candidate links out of fetched HTML.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (tolerant of broken markup)
// - Supports CSS selectors for finding elements
//
// And the `url` crate to resolve relative hrefs against the page URL, so
// that "/docs" found on https://example.com/a becomes
// https://example.com/docs before it reaches the frontier.
// =============================================================================

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use super::LinkExtractor;
use crate::error::ExtractError;

// Extracts every <a href> on a page
//
// Hrefs are resolved against the page URL when it parses; if it doesn't,
// they are passed through as written and the fetcher will reject the
// ones that are not absolute. Anchors, mailto:, tel:, javascript: and
// other non-HTTP targets are dropped here.
#[derive(Debug, Clone)]
pub struct HtmlLinkExtractor {
    selector: Selector,
}

impl Default for HtmlLinkExtractor {
    fn default() -> Self {
        Self {
            // Constant selector, known to be valid
            selector: Selector::parse("a[href]").expect("a[href] is a valid selector"),
        }
    }
}

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, page_url: &str, content: &str) -> Result<HashSet<String>, ExtractError> {
        let document = Html::parse_document(content);
        let base = Url::parse(page_url).ok();

        let links = document
            .select(&self.selector)
            .filter_map(|element| element.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty() && !href.starts_with('#'))
            .filter_map(|href| resolve_href(base.as_ref(), href))
            .collect();

        Ok(links)
    }
}

// Resolves a possibly-relative href
//
// Examples (base = "https://example.com/page/"):
//   "/docs"              -> Some("https://example.com/docs")
//   "../other"           -> Some("https://example.com/other")
//   "https://other.com"  -> Some("https://other.com/")
//   "mailto:a@b.c"       -> None (not HTTP)
fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match (Url::parse(href), base) {
        (Ok(url), _) => url,
        (Err(_), Some(base)) => base.join(href).ok()?,
        // No usable base: hand the raw href on unchanged
        (Err(_), None) => return Some(href.to_string()),
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
