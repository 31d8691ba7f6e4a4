// src/extract/mod.rs
// =============================================================================
// Link extraction.
//
// The engine does not care how links are found; it only needs something
// that turns a page into candidate URL strings. `HtmlLinkExtractor` is the
// default, built on scraper.
//
// Submodules:
// - html: <a href> extraction with relative-link resolution
// =============================================================================

use std::collections::HashSet;

use crate::error::ExtractError;

mod html;

pub use html::HtmlLinkExtractor;

// Finds candidate links in fetched content.
//
// `page_url` is the URL the content came from, available for resolving
// relative links; implementations are free to ignore it. An Err is treated
// by the engine as "no links found" for that page.
//
// Called from worker tasks, hence Send + Sync.
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, page_url: &str, content: &str) -> Result<HashSet<String>, ExtractError>;
}
