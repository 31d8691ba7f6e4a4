// src/crawl/mod.rs
// =============================================================================
// This module holds the crawling engine.
//
// Submodules:
// - frontier: visited set + pending queue, the dedup choke point
// - pool: fixed-capacity worker pool with hard cancellation
// - callback: progress reporting contract
// - engine: session lifecycle and the coordinator that drives the crawl
//
// Data flow:
//   start(seed) -> frontier -> pool -> fetcher -> storage + callback
//               -> extractor -> coordinator -> frontier -> pool ...
// =============================================================================

mod callback;
mod engine;
mod frontier;
mod pool;

pub use callback::{CrawlingCallback, NoopCallback};
pub use engine::{
    CrawlEngine, CrawlEngineBuilder, CrawlSummary, EngineState, StopHandle, StopReason,
};
pub use frontier::Frontier;
pub use pool::{Job, WorkerPool};
