// src/fetch/mod.rs
// =============================================================================
// Page fetching.
//
// Submodules:
// - http: the PageFetcher trait and its reqwest implementation
// =============================================================================

mod http;

pub use http::{HttpFetcher, PageFetcher};
