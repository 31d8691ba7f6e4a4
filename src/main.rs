// src/main.rs
// =============================================================================
// This is the entry point of the web-crawler CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Install the tracing subscriber (RUST_LOG overrides the default filter)
// 3. Start a root crawl and print progress as pages come in
// 4. Stop early on Ctrl-C; otherwise wait for exhaustion or the deadline
// 5. Print the summary and exit with a proper code
//    (0 = all pages fetched, 1 = some pages failed, 2 = error)
// =============================================================================

mod cli;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use web_crawler::{CrawlEngine, CrawlSummary, CrawlingCallback, MemoryStorage, Storage};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing()?;

    let storage = Arc::new(MemoryStorage::new());
    let progress = Arc::new(ProgressReporter::new(!cli.json));

    let mut engine = CrawlEngine::builder(cli.crawl_config())
        .storage(storage.clone())
        .callback(progress.clone())
        .build()
        .context("could not set up the crawler")?;

    if !cli.json {
        println!("🔍 Crawling: {}", cli.url);
        let config = engine.config();
        println!(
            "⏱️  Time limit: {}s, {} workers max",
            config.max_duration.as_secs(),
            config.max_workers
        );
    }

    engine.start(&cli.url, true)?;

    // Ctrl-C only requests the stop; wait() below still drains the workers
    if let Some(stopper) = engine.stop_handle() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stopper.stop();
            }
        });
    }

    let summary = engine.wait().await?;

    if let Some(path) = &cli.output {
        let pages = serde_json::to_string_pretty(&storage.list())?;
        std::fs::write(path, pages)
            .with_context(|| format!("could not write pages to {}", path.display()))?;
    }

    print_summary(&summary, cli.json)?;

    if summary.failed > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("web_crawler=info,warn"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

// Prints a running count as pages complete
struct ProgressReporter {
    verbose: bool,
    crawled: AtomicUsize,
}

impl ProgressReporter {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            crawled: AtomicUsize::new(0),
        }
    }
}

impl CrawlingCallback for ProgressReporter {
    fn on_page_crawling_completed(&self, _url: &str) {
        let crawled = self.crawled.fetch_add(1, Ordering::Relaxed) + 1;
        if self.verbose {
            println!("   {} pages crawled so far", crawled);
        }
    }

    fn on_page_crawling_failed(&self, url: &str, error_code: i32) {
        if self.verbose {
            println!("   ❌ {} (code {})", url, error_code);
        }
    }

    fn on_crawling_completed(&self) {
        if self.verbose {
            println!("\n✅ Crawling finished");
        }
    }
}

fn print_summary(summary: &CrawlSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!();
    println!("📊 Summary:");
    println!("   Seed:     {}", summary.seed);
    println!("   Reason:   {:?}", summary.reason);
    println!("   ✅ Crawled: {}", summary.crawled);
    println!("   ❌ Failed:  {}", summary.failed);
    println!("   📋 Visited: {}", summary.visited);
    println!("   ⏱️  Took:    {:.1}s", summary.elapsed.as_secs_f64());
    Ok(())
}
