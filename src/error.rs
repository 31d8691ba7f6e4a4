// src/error.rs
// =============================================================================
// Error types for the crawler library.
//
// The taxonomy follows the crawl lifecycle:
// - FetchError: one URL could not be fetched (terminal for that URL only)
// - ExtractError: a page's links could not be extracted (swallowed)
// - PoolError: the worker pool refused a job (engine lifecycle, not a page)
// - ConfigError: the crawl configuration is unusable
// - EngineError: a session could not be started or driven
//
// The binary wraps all of these in anyhow::Error; the library keeps them
// typed so callers can match on them.
// =============================================================================

use thiserror::Error;

/// Callback error code for failures that have no HTTP status.
pub const IO_ERROR_CODE: i32 = -1;

// Why a single page fetch failed.
//
// None of these abort the crawl. The engine reports them through
// `CrawlingCallback::on_page_crawling_failed` and never retries the URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The URL could not be parsed or is not http/https; nothing was sent
    #[error("malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    /// Connecting or reading took longer than the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Any other I/O level failure (refused, reset, DNS, TLS...)
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server answered with something other than 200 OK
    #[error("HTTP {0}")]
    NonOkStatus(u16),

    /// The server answered 200 OK but sent no content
    #[error("empty response body")]
    EmptyResponse,

    /// The fetcher panicked; the page is treated like any other failure
    #[error("fetcher panicked")]
    Panicked,
}

impl FetchError {
    // The code handed to `on_page_crawling_failed`:
    // the HTTP status for non-OK responses, -1 for everything else
    pub fn code(&self) -> i32 {
        match self {
            FetchError::NonOkStatus(status) => i32::from(*status),
            _ => IO_ERROR_CODE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("could not extract links: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// `cancel_all` has been called; the pool takes no more work
    #[error("worker pool is shutting down")]
    ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_workers must be greater than 0")]
    NoWorkers,

    #[error("core_workers ({core}) must not exceed max_workers ({max})")]
    CoreAboveMax { core: usize, max: usize },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// A root crawl was requested while the previous session is still draining
    #[error("a crawl session is still running; stop it and wait for it to finish first")]
    SessionActive,

    /// A non-root URL was submitted, or a session awaited, with no session
    #[error("no crawl session has been started")]
    NoSession,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The default HTTP client could not be built
    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The coordinator task panicked or was aborted
    #[error("crawl coordinator failed: {0}")]
    Coordinator(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_ok_status_reports_status_code() {
        assert_eq!(FetchError::NonOkStatus(404).code(), 404);
        assert_eq!(FetchError::NonOkStatus(503).code(), 503);
    }

    #[test]
    fn test_io_failures_report_minus_one() {
        let failures = [
            FetchError::Timeout,
            FetchError::Connection("reset".to_string()),
            FetchError::EmptyResponse,
            FetchError::Panicked,
            FetchError::MalformedUrl {
                url: "nope".to_string(),
                reason: "relative URL without a base".to_string(),
            },
        ];
        for failure in failures {
            assert_eq!(failure.code(), IO_ERROR_CODE, "{failure}");
        }
    }
}
