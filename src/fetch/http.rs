// src/fetch/http.rs
// =============================================================================
// This module downloads one page over HTTP(S).
//
// Key functionality:
// - Validates the URL before anything touches the network
// - Makes a single GET request with separate connect and read timeouts
// - Treats anything but 200 OK as a failure carrying the status code
// - Classifies transport failures (timeout vs. everything else)
//
// There are no retries here: a failed fetch is final for that URL.
//
// Rust concepts:
// - async-trait: lets the engine hold any fetcher behind Arc<dyn PageFetcher>
// - Result<T, E>: every failure is a typed FetchError
// =============================================================================

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::CrawlConfig;
use crate::error::FetchError;

// Anything that can turn a URL into page content.
//
// The engine only ever talks to this trait, so tests can swap in an
// in-memory site and the CLI uses the reqwest-backed HttpFetcher below.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

// Fetches pages with a shared reqwest client
//
// The client is built once and reused for every request (connection pooling).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    // Builds a fetcher from the crawl configuration
    //
    // Fails only if reqwest cannot set up its TLS backend.
    pub fn new(config: &CrawlConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout);
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        let client = builder.build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let target = parse_fetchable_url(url)?;

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(categorize_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::NonOkStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(categorize_error)?;
        if body.is_empty() {
            return Err(FetchError::EmptyResponse);
        }

        Ok(body)
    }
}

// Parses the URL and makes sure it is something we can GET
//
// Returns MalformedUrl for unparseable strings (including relative links
// that reached the frontier unresolved) and for non-HTTP schemes such as
// mailto: or javascript:.
fn parse_fetchable_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::MalformedUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::MalformedUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

// Categorizes reqwest errors into the two transport failure kinds
//
// Timeouts are reported separately because they usually mean a slow server
// rather than a dead one; callers see -1 for both.
fn categorize_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Connection(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&CrawlConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/index.html")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<a href=\"/next\">next</a>")
            .create_async()
            .await;

        let body = fetcher()
            .fetch(&format!("{}/index.html", server.url()))
            .await
            .unwrap();

        assert_eq!(body, "<a href=\"/next\">next</a>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_plain_get_has_no_user_agent_by_default() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", mockito::Matcher::Missing)
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let body = fetcher().fetch(&format!("{}/", server.url())).await;

        assert_eq!(body, Ok("hello".to_string()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_configured_user_agent_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", "crawler-test/1.0")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let config = CrawlConfig {
            user_agent: Some("crawler-test/1.0".to_string()),
            ..CrawlConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();

        assert!(fetcher.fetch(&format!("{}/", server.url())).await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("Error")
            .create_async()
            .await;

        let result = fetcher()
            .fetch(&format!("{}/missing", server.url()))
            .await;

        assert_eq!(result, Err(FetchError::NonOkStatus(404)));
    }

    #[tokio::test]
    async fn test_non_200_success_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/created")
            .with_status(201)
            .with_body("made it")
            .create_async()
            .await;

        let result = fetcher()
            .fetch(&format!("{}/created", server.url()))
            .await;

        assert_eq!(result, Err(FetchError::NonOkStatus(201)));
    }

    #[tokio::test]
    async fn test_empty_body_is_its_own_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/blank")
            .with_status(200)
            .create_async()
            .await;

        let result = fetcher().fetch(&format!("{}/blank", server.url())).await;

        assert_eq!(result, Err(FetchError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_malformed_url_is_not_requested() {
        let result = fetcher().fetch("/relative/link").await;
        assert!(matches!(result, Err(FetchError::MalformedUrl { .. })));

        let result = fetcher().fetch("mailto:someone@example.com").await;
        assert!(matches!(result, Err(FetchError::MalformedUrl { .. })));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = fetcher().fetch(&format!("http://{}/", addr)).await;

        match result {
            Err(FetchError::Connection(_)) | Err(FetchError::Timeout) => {}
            other => panic!("expected a transport failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // Accepts connections but never writes a response
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = CrawlConfig {
            read_timeout: Duration::from_millis(200),
            ..CrawlConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();

        let started = std::time::Instant::now();
        let result = fetcher.fetch(&format!("http://{}/", addr)).await;

        // Some hyper versions surface the read timeout as a plain I/O error,
        // so only the bound on elapsed time is strict
        assert!(matches!(
            result,
            Err(FetchError::Timeout) | Err(FetchError::Connection(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
