// src/crawl/frontier.rs
// =============================================================================
// The frontier: what has been crawled, what is being crawled, and what is
// waiting to be crawled.
//
// Three collections, always disjoint:
// - pending:   discovered, not yet handed to a worker (FIFO, so the crawl is
//              breadth-first)
// - in_flight: handed to a worker, result not reported yet
// - visited:   fetch attempted, success or failure; never retried
//
// Only the session coordinator owns a Frontier, so there is no lock here:
// every mutation already happens on one task.
//
// Rust concepts:
// - HashSet: O(1) membership checks for dedup
// - VecDeque: cheap push_back / pop_front for the queue
// =============================================================================

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct Frontier {
    visited: HashSet<String>,
    pending: VecDeque<String>,
    // Mirrors `pending` for O(1) "already queued?" checks
    queued: HashSet<String>,
    in_flight: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    // Forgets everything, ready for a brand new root crawl.
    //
    // CrawlEngine builds a fresh Frontier per root session instead, so this
    // is for callers that keep one Frontier across crawls.
    pub fn reset(&mut self) {
        self.visited.clear();
        self.pending.clear();
        self.queued.clear();
        self.in_flight.clear();
    }

    // The single dedup choke point.
    //
    // Returns false (and does nothing) if the URL has been visited, is being
    // fetched right now, or is already waiting in the queue.
    pub fn try_enqueue(&mut self, url: &str) -> bool {
        if self.visited.contains(url) || self.in_flight.contains(url) || self.queued.contains(url) {
            return false;
        }

        self.queued.insert(url.to_string());
        self.pending.push_back(url.to_string());
        true
    }

    // Records that a fetch of `url` was attempted, whatever the outcome
    pub fn mark_visited(&mut self, url: &str) {
        self.in_flight.remove(url);
        if self.queued.remove(url) {
            self.pending.retain(|queued| queued != url);
        }
        self.visited.insert(url.to_string());
    }

    // Takes up to `n` URLs off the front of the queue and marks them in flight.
    //
    // Never blocks; returns an empty Vec when nothing is pending.
    pub fn dequeue_up_to(&mut self, n: usize) -> Vec<String> {
        let take = n.min(self.pending.len());
        let batch: Vec<String> = self.pending.drain(..take).collect();

        for url in &batch {
            self.queued.remove(url);
            self.in_flight.insert(url.clone());
        }

        batch
    }

    /// True when nothing is waiting to be dispatched
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True when nothing is waiting and nothing is being fetched
    pub fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}
