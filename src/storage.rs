// src/storage.rs
// =============================================================================
// Where successfully crawled pages end up.
//
// The engine saves every page it fetched with a 200 and clears the store
// when a new root crawl starts. Anything that can hold (url, content) pairs
// can plug in; MemoryStorage is the built-in one and is what the CLI dumps
// to JSON at the end of a run.
// =============================================================================

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPage {
    pub url: String,
    pub content: String,
}

// Persists crawled pages.
//
// `save` is called from worker tasks while the crawl runs, so
// implementations must be Send + Sync and should not block for long.
pub trait Storage: Send + Sync {
    fn save(&self, url: &str, content: &str);
    fn clear(&self);
    fn list(&self) -> Vec<StoredPage>;
}

/// Keeps pages in memory, in the order they were saved
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pages: Mutex<Vec<StoredPage>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn save(&self, url: &str, content: &str) {
        self.pages.lock().push(StoredPage {
            url: url.to_string(),
            content: content.to_string(),
        });
    }

    fn clear(&self) {
        self.pages.lock().clear();
    }

    fn list(&self) -> Vec<StoredPage> {
        self.pages.lock().clone()
    }
}
