// src/lib.rs
// =============================================================================
// A bounded-concurrency web crawler.
//
// Give it a seed URL and it fetches pages, pulls out their links, skips
// anything it has already seen and keeps at most max_workers fetches in
// flight, until it runs out of links, is stopped, or hits its deadline.
//
// Modules:
// - crawl: frontier, worker pool, engine and callbacks
// - fetch: the PageFetcher trait and the reqwest-backed HttpFetcher
// - extract: the LinkExtractor trait and the scraper-backed HtmlLinkExtractor
// - storage: where crawled pages are kept
// - config / error: knobs and error types
// =============================================================================

pub mod config;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod storage;

pub use config::CrawlConfig;
pub use crawl::{
    CrawlEngine, CrawlSummary, CrawlingCallback, EngineState, StopHandle, StopReason,
};
pub use error::{EngineError, FetchError};
pub use extract::{HtmlLinkExtractor, LinkExtractor};
pub use fetch::{HttpFetcher, PageFetcher};
pub use storage::{MemoryStorage, Storage, StoredPage};
