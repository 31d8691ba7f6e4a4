// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API: the struct below *is* the argument list, and
// clap generates parsing, --help and --version from it.
//
// Every flag has a default matching CrawlConfig::default(), so
// `web-crawler https://example.com` behaves like the library defaults.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use web_crawler::config::{
    CrawlConfig, DEFAULT_CORE_WORKERS, DEFAULT_MAX_DURATION, DEFAULT_MAX_WORKERS,
    DEFAULT_READ_TIMEOUT,
};

#[derive(Parser, Debug)]
#[command(
    name = "web-crawler",
    version,
    about = "Crawl a website from a seed URL with a bounded pool of workers",
    long_about = "web-crawler fetches the seed page, follows every link it finds and keeps \
                  going until there is nothing new to fetch, the time limit runs out, or you \
                  press Ctrl-C. At most --max-workers pages are fetched at once."
)]
pub struct Cli {
    /// Seed URL to start crawling from (e.g., https://example.com)
    pub url: String,

    /// Print the summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Stop the crawl after this many seconds
    #[arg(long, default_value_t = DEFAULT_MAX_DURATION.as_secs())]
    pub max_duration: u64,

    /// Maximum number of pages fetched at the same time
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,

    /// Workers kept warm between bursts
    #[arg(long, default_value_t = DEFAULT_CORE_WORKERS)]
    pub core_workers: usize,

    /// Connect and read timeout per request, in seconds
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// User-Agent header sent with every request (none unless given)
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Write every crawled page (url + content) to this file as JSON
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn crawl_config(&self) -> CrawlConfig {
        let timeout = Duration::from_secs(self.timeout);
        CrawlConfig {
            core_workers: self.core_workers,
            max_workers: self.max_workers,
            connect_timeout: timeout,
            read_timeout: timeout,
            max_duration: Duration::from_secs(self.max_duration),
            user_agent: self.user_agent.clone(),
            ..CrawlConfig::default()
        }
    }
}
