// src/crawl/callback.rs
// =============================================================================
// How the engine reports progress to whoever started the crawl.
//
// Callbacks run on whichever tokio worker finished the page; nothing here
// promises a particular thread. A UI that needs its own thread must hand
// the event over itself.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::pool::WorkerPool;

pub trait CrawlingCallback: Send + Sync {
    /// A page was fetched with 200 OK and stored
    fn on_page_crawling_completed(&self, url: &str);

    /// A page could not be fetched; `error_code` is the HTTP status for
    /// non-OK responses and -1 for I/O level failures
    fn on_page_crawling_failed(&self, url: &str, error_code: i32);

    /// The session is over, by exhaustion, stop or deadline. Fires once.
    fn on_crawling_completed(&self);
}

/// Ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl CrawlingCallback for NoopCallback {
    fn on_page_crawling_completed(&self, _url: &str) {}
    fn on_page_crawling_failed(&self, _url: &str, _error_code: i32) {}
    fn on_crawling_completed(&self) {}
}

// Per-session wrapper around the user's callback.
//
// Page events are dropped once the session's pool is shutting down, and
// the completion event goes through at most once.
pub(crate) struct CallbackGate {
    inner: Arc<dyn CrawlingCallback>,
    pool: WorkerPool,
    completed: AtomicBool,
}

impl CallbackGate {
    pub(crate) fn new(inner: Arc<dyn CrawlingCallback>, pool: WorkerPool) -> Self {
        Self {
            inner,
            pool,
            completed: AtomicBool::new(false),
        }
    }

    pub(crate) fn page_completed(&self, url: &str) {
        if !self.pool.is_shutting_down() {
            self.inner.on_page_crawling_completed(url);
        }
    }

    pub(crate) fn page_failed(&self, url: &str, error_code: i32) {
        if !self.pool.is_shutting_down() {
            self.inner.on_page_crawling_failed(url, error_code);
        }
    }

    // Returns false if the completion had already been delivered
    pub(crate) fn crawling_completed(&self) -> bool {
        if self.completed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.on_crawling_completed();
        true
    }
}
