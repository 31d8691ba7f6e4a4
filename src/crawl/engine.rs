// src/crawl/engine.rs
// =============================================================================
// The crawl engine: ties the frontier, the worker pool and the fetcher
// together and runs one crawl session at a time.
//
// How a session runs:
// 1. start(seed, true) builds a fresh Frontier and WorkerPool and spawns a
//    coordinator task that owns both
// 2. The coordinator dispatches work units to the pool, never more than
//    max_workers in flight
// 3. Each unit fetches its page, stores it, fires the page callback, extracts
//    links and posts one UnitFinished message back to the coordinator
// 4. The coordinator is the only reader of that channel: it marks the URL
//    visited, enqueues the new links and refills the pool
// 5. The session ends when the frontier drains, stop() is called, or the
//    deadline passes; on_crawling_completed fires exactly once after every
//    worker has exited
//
// Because only the coordinator touches the frontier, dedup needs no lock,
// and refill decisions are serialized: two workers finishing together can't
// both see the same free slots and over-submit.
// =============================================================================

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::callback::{CallbackGate, CrawlingCallback, NoopCallback};
use super::frontier::Frontier;
use super::pool::WorkerPool;
use crate::config::CrawlConfig;
use crate::error::{EngineError, FetchError};
use crate::extract::{HtmlLinkExtractor, LinkExtractor};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::storage::{MemoryStorage, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    /// Stop requested, workers still draining
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left to crawl
    Exhausted,
    /// stop() or a StopHandle
    Stopped,
    /// The session ran for max_duration
    DeadlineElapsed,
}

// What a finished session did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub seed: String,
    /// Pages fetched and stored, including ones that finished while the
    /// session was stopping (their page callback may have been muted)
    pub crawled: usize,
    pub failed: usize,
    pub visited: usize,
    pub reason: StopReason,
    pub elapsed: Duration,
}

// Requests a stop from anywhere (a Ctrl-C handler, another task).
//
// Only signals; the engine's wait() or stop() is what awaits the drain.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

// Messages into the coordinator
enum Signal {
    UnitFinished { url: String, outcome: UnitOutcome },
    Discovered(String),
}

enum UnitOutcome {
    Fetched { links: Vec<String> },
    Failed(FetchError),
}

struct Session {
    stop: StopHandle,
    signals: mpsc::UnboundedSender<Signal>,
    coordinator: JoinHandle<CrawlSummary>,
}

pub struct CrawlEngine {
    config: CrawlConfig,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn LinkExtractor>,
    storage: Arc<dyn Storage>,
    callback: Arc<dyn CrawlingCallback>,
    session: Option<Session>,
}

pub struct CrawlEngineBuilder {
    config: CrawlConfig,
    fetcher: Option<Arc<dyn PageFetcher>>,
    extractor: Option<Arc<dyn LinkExtractor>>,
    storage: Option<Arc<dyn Storage>>,
    callback: Option<Arc<dyn CrawlingCallback>>,
}

impl CrawlEngineBuilder {
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn callback(mut self, callback: Arc<dyn CrawlingCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    // Validates the config and fills in defaults for anything not set:
    // HttpFetcher, HtmlLinkExtractor, MemoryStorage, NoopCallback
    pub fn build(self) -> Result<CrawlEngine, EngineError> {
        self.config.validate()?;

        let fetcher: Arc<dyn PageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&self.config)?),
        };

        Ok(CrawlEngine {
            fetcher,
            extractor: self
                .extractor
                .unwrap_or_else(|| Arc::new(HtmlLinkExtractor::new())),
            storage: self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new())),
            callback: self.callback.unwrap_or_else(|| Arc::new(NoopCallback)),
            config: self.config,
            session: None,
        })
    }
}

impl CrawlEngine {
    pub fn builder(config: CrawlConfig) -> CrawlEngineBuilder {
        CrawlEngineBuilder {
            config,
            fetcher: None,
            extractor: None,
            storage: None,
            callback: None,
        }
    }

    // Starts crawling `url`.
    //
    // is_root = true begins a new session: storage is cleared, a fresh
    // frontier and pool are created and the deadline is armed. Fails with
    // SessionActive if the previous session has not fully wound down.
    //
    // is_root = false feeds `url` into the running session through the
    // usual dedup. It is silently dropped if that session is stopping.
    //
    // Must be called from inside a tokio runtime.
    pub fn start(&mut self, url: &str, is_root: bool) -> Result<(), EngineError> {
        if !is_root {
            let session = self.session.as_ref().ok_or(EngineError::NoSession)?;
            if session.signals.send(Signal::Discovered(url.to_string())).is_err() {
                tracing::debug!(url, "session already finished, dropping URL");
            }
            return Ok(());
        }

        if let Some(session) = &self.session {
            if !session.coordinator.is_finished() {
                return Err(EngineError::SessionActive);
            }
        }
        self.session = None;

        self.storage.clear();

        let pool = WorkerPool::new(
            self.config.core_workers,
            self.config.max_workers,
            self.config.keep_alive,
        );
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let stop = StopHandle::default();

        let unit = Arc::new(UnitContext {
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            storage: Arc::clone(&self.storage),
            callback: CallbackGate::new(Arc::clone(&self.callback), pool.clone()),
            signals: signals_tx.clone(),
        });

        let started_at = Instant::now();
        let coordinator = Coordinator {
            seed: url.to_string(),
            frontier: Frontier::new(),
            pool,
            unit,
            signals: signals_rx,
            stop: stop.token.clone(),
            started_at,
            deadline: started_at + self.config.max_duration,
            crawled: 0,
            failed: 0,
        };

        tracing::info!(
            seed = url,
            max_workers = self.config.max_workers,
            max_duration = ?self.config.max_duration,
            "starting crawl"
        );

        self.session = Some(Session {
            stop,
            signals: signals_tx,
            coordinator: tokio::spawn(coordinator.run()),
        });

        Ok(())
    }

    // Stops the running session and waits until every worker has exited,
    // so no callback fires after this returns.
    //
    // Returns Ok(None) when there is nothing to stop.
    pub async fn stop(&mut self) -> Result<Option<CrawlSummary>, EngineError> {
        match &self.session {
            Some(session) => session.stop.stop(),
            None => return Ok(None),
        }
        self.wait().await.map(Some)
    }

    // Waits for the current session to end on its own (exhaustion, deadline,
    // or a StopHandle) and returns its summary
    pub async fn wait(&mut self) -> Result<CrawlSummary, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NoSession)?;
        let result = (&mut session.coordinator).await;
        self.session = None;
        Ok(result?)
    }

    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.session.as_ref().map(|session| session.stop.clone())
    }

    pub fn state(&self) -> EngineState {
        match &self.session {
            None => EngineState::Idle,
            Some(session) if session.coordinator.is_finished() => EngineState::Idle,
            Some(session) if session.stop.is_stopped() => EngineState::Stopping,
            Some(_) => EngineState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl Drop for CrawlEngine {
    // An abandoned session still gets its pool cancelled
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.stop.stop();
        }
    }
}

// Everything a work unit needs, shared by all units of a session
struct UnitContext {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn LinkExtractor>,
    storage: Arc<dyn Storage>,
    callback: CallbackGate,
    signals: mpsc::UnboundedSender<Signal>,
}

impl UnitContext {
    // Fetch, store, report, extract; then tell the coordinator we're done.
    //
    // UnitFinished is posted even if a collaborator panics, otherwise the
    // URL would stay in flight and the session could never drain.
    async fn run(self: Arc<Self>, url: String) {
        let outcome = match AssertUnwindSafe(self.fetcher.fetch(&url)).catch_unwind().await {
            Ok(Ok(content)) => {
                let links = panic::catch_unwind(AssertUnwindSafe(|| self.process(&url, &content)))
                    .unwrap_or_else(|_| {
                        tracing::error!("page processing panicked, no links taken");
                        Vec::new()
                    });
                UnitOutcome::Fetched { links }
            }
            Ok(Err(err)) => {
                tracing::warn!(%err, "page fetch failed");
                self.callback.page_failed(&url, err.code());
                UnitOutcome::Failed(err)
            }
            Err(_) => {
                let err = FetchError::Panicked;
                tracing::error!(%err, "page fetch failed");
                self.callback.page_failed(&url, err.code());
                UnitOutcome::Failed(err)
            }
        };

        // The coordinator only goes away once the pool is cancelled
        let _ = self.signals.send(Signal::UnitFinished { url, outcome });
    }

    fn process(&self, url: &str, content: &str) -> Vec<String> {
        self.storage.save(url, content);
        self.callback.page_completed(url);

        match self.extractor.extract(url, content) {
            Ok(links) => links.into_iter().filter(|link| !link.is_empty()).collect(),
            Err(err) => {
                tracing::debug!(%err, "no links taken from page");
                Vec::new()
            }
        }
    }
}

// Owns the frontier and the pool for one session
struct Coordinator {
    seed: String,
    frontier: Frontier,
    pool: WorkerPool,
    unit: Arc<UnitContext>,
    signals: mpsc::UnboundedReceiver<Signal>,
    stop: CancellationToken,
    started_at: Instant,
    deadline: Instant,
    crawled: usize,
    failed: usize,
}

impl Coordinator {
    async fn run(mut self) -> CrawlSummary {
        let seed = self.seed.clone();
        self.frontier.try_enqueue(&seed);
        self.refill();

        let reason = self.drive().await;

        self.pool.cancel_all();
        self.pool.join().await;
        self.drain_finished();
        self.unit.callback.crawling_completed();

        let summary = CrawlSummary {
            seed,
            crawled: self.crawled,
            failed: self.failed,
            visited: self.frontier.visited_len(),
            reason,
            elapsed: self.started_at.elapsed(),
        };

        tracing::info!(
            reason = ?summary.reason,
            crawled = summary.crawled,
            failed = summary.failed,
            elapsed = ?summary.elapsed,
            "crawl finished"
        );

        summary
    }

    async fn drive(&mut self) -> StopReason {
        loop {
            if self.frontier.is_quiescent() {
                return StopReason::Exhausted;
            }

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return StopReason::Stopped,
                _ = tokio::time::sleep_until(self.deadline) => {
                    tracing::info!("crawl deadline reached");
                    return StopReason::DeadlineElapsed;
                }
                Some(signal) = self.signals.recv() => {
                    self.handle(signal);
                    self.refill();
                }
            }
        }
    }

    // Counts units that finished while the session was winding down.
    //
    // Once the fetch returns, a unit runs to completion without yielding, so
    // every page that reached storage is in the channel by the time the pool
    // has joined. Their links are not followed.
    fn drain_finished(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            if let Signal::UnitFinished { url, outcome } = signal {
                self.frontier.mark_visited(&url);
                match outcome {
                    UnitOutcome::Fetched { .. } => self.crawled += 1,
                    UnitOutcome::Failed(_) => self.failed += 1,
                }
            }
        }
    }

    fn handle(&mut self, signal: Signal) {
        match signal {
            Signal::Discovered(url) => {
                if !url.is_empty() {
                    self.frontier.try_enqueue(&url);
                }
            }
            Signal::UnitFinished { url, outcome } => {
                self.frontier.mark_visited(&url);

                match outcome {
                    UnitOutcome::Fetched { links } => {
                        self.crawled += 1;
                        let found = links.len();
                        let fresh = links
                            .iter()
                            .filter(|link| self.frontier.try_enqueue(link))
                            .count();
                        tracing::debug!(%url, found, fresh, "page crawled");
                    }
                    UnitOutcome::Failed(err) => {
                        self.failed += 1;
                        tracing::debug!(%url, code = err.code(), "page failed, not retrying");
                    }
                }
            }
        }
    }

    // Fills free worker slots from the front of the frontier.
    //
    // Occupancy comes from our own in-flight count rather than the pool's
    // active count: a unit posts UnitFinished slightly before its worker is
    // released, so the pool's figure can lag behind and stall the crawl.
    fn refill(&mut self) {
        let free = self
            .pool
            .max_workers()
            .saturating_sub(self.frontier.in_flight_len());
        if free == 0 || self.frontier.is_empty() {
            return;
        }

        let batch = self.frontier.dequeue_up_to(free);
        let dispatched = batch.len();
        for url in batch {
            self.dispatch(url);
        }

        tracing::trace!(
            dispatched,
            pending = self.frontier.pending_len(),
            in_flight = self.frontier.in_flight_len(),
            pool_slots = self.pool.available_slots(),
            "refilled worker pool"
        );
    }

    fn dispatch(&mut self, url: String) {
        if self.pool.is_shutting_down() {
            self.frontier.mark_visited(&url);
            return;
        }

        let span = tracing::info_span!("work_unit", url = %url);
        let job = Arc::clone(&self.unit)
            .run(url.clone())
            .instrument(span)
            .boxed();

        if let Err(err) = self.pool.submit(job) {
            tracing::debug!(%url, %err, "work unit dropped");
            self.frontier.mark_visited(&url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};

    // Serves a fixed map of url -> html; anything else is a 404
    struct FixedSite {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for FixedSite {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or(FetchError::NonOkStatus(404))
        }
    }

    fn engine_for(pages: &[(&str, &str)]) -> CrawlEngine {
        let pages = pages
            .iter()
            .map(|(url, html)| (url.to_string(), html.to_string()))
            .collect();
        CrawlEngine::builder(CrawlConfig::default())
            .fetcher(Arc::new(FixedSite { pages }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_page_crawl() {
        let mut engine = engine_for(&[("https://a.example/", "<p>no links</p>")]);
        assert_eq!(engine.state(), EngineState::Idle);

        engine.start("https://a.example/", true).unwrap();
        let summary = engine.wait().await.unwrap();

        assert_eq!(summary.reason, StopReason::Exhausted);
        assert_eq!(summary.crawled, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.visited, 1);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.storage().list().len(), 1);
    }

    #[tokio::test]
    async fn test_relative_links_are_followed() {
        let mut engine = engine_for(&[
            ("https://a.example/", r#"<a href="/b">b</a>"#),
            ("https://a.example/b", r#"<a href="/">home</a>"#),
        ]);

        engine.start("https://a.example/", true).unwrap();
        let summary = engine.wait().await.unwrap();

        assert_eq!(summary.crawled, 2);
        assert_eq!(summary.visited, 2);
    }

    #[tokio::test]
    async fn test_non_root_start_without_session() {
        let mut engine = engine_for(&[]);
        let result = engine.start("https://a.example/", false);
        assert!(matches!(result, Err(EngineError::NoSession)));
        assert!(matches!(engine.wait().await, Err(EngineError::NoSession)));
        assert!(engine.stop().await.unwrap().is_none());
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let config = CrawlConfig {
            max_workers: 0,
            ..CrawlConfig::default()
        };
        let result = CrawlEngine::builder(config).build();
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    struct PanickingExtractor;

    impl LinkExtractor for PanickingExtractor {
        fn extract(&self, page_url: &str, _content: &str) -> Result<HashSet<String>, ExtractError> {
            panic!("extractor blew up on {}", page_url);
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl PageFetcher for PanickingFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            panic!("fetcher blew up on {}", url);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_extractor_does_not_stall_session() {
        let pages = HashMap::from([("https://a.example/".to_string(), "<p>a</p>".to_string())]);
        let config = CrawlConfig {
            max_duration: Duration::from_secs(2),
            ..CrawlConfig::default()
        };
        let mut engine = CrawlEngine::builder(config)
            .fetcher(Arc::new(FixedSite { pages }))
            .extractor(Arc::new(PanickingExtractor))
            .build()
            .unwrap();

        engine.start("https://a.example/", true).unwrap();
        let summary = engine.wait().await.unwrap();

        assert_eq!(summary.reason, StopReason::Exhausted);
        assert!(summary.elapsed < Duration::from_secs(1));
        assert_eq!(summary.crawled, 1);
        assert_eq!(engine.storage().list().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_fetcher_counts_as_failure() {
        let config = CrawlConfig {
            max_duration: Duration::from_secs(2),
            ..CrawlConfig::default()
        };
        let mut engine = CrawlEngine::builder(config)
            .fetcher(Arc::new(PanickingFetcher))
            .build()
            .unwrap();

        engine.start("https://a.example/", true).unwrap();
        let summary = engine.wait().await.unwrap();

        assert_eq!(summary.reason, StopReason::Exhausted);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.visited, 1);
    }

    // Serves A, then stops the session from inside B's fetch and still
    // returns B's content
    struct StopsDuringFetch {
        stop: parking_lot::Mutex<Option<StopHandle>>,
    }

    #[async_trait]
    impl PageFetcher for StopsDuringFetch {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            if url == "https://a.example/" {
                return Ok(r#"<a href="/b">b</a>"#.to_string());
            }
            loop {
                if let Some(stop) = self.stop.lock().as_ref() {
                    stop.stop();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Ok("<p>b</p>".to_string())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_page_finished_during_stop_is_counted() {
        let fetcher = Arc::new(StopsDuringFetch {
            stop: parking_lot::Mutex::new(None),
        });
        let mut engine = CrawlEngine::builder(CrawlConfig::default())
            .fetcher(fetcher.clone())
            .build()
            .unwrap();

        engine.start("https://a.example/", true).unwrap();
        *fetcher.stop.lock() = engine.stop_handle();
        let summary = engine.wait().await.unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(engine.storage().list().len(), 2);
        assert_eq!(summary.crawled, 2);
        assert_eq!(summary.visited, 2);
    }
}
