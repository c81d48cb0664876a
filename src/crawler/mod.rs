//! Crawler module: frontier, fetching, parsing and the crawl engine
//!
//! This module contains the core crawling logic, including:
//! - The frontier with its visited-once guarantees
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - The engine driving the per-URL pipeline and checkpoints

mod engine;
mod fetcher;
mod frontier;
mod parser;

pub use engine::{CrawlEngine, CrawlReport};
pub(crate) use engine::text_fingerprint;
pub use fetcher::{
    build_http_client, fetch_with_retry, FetchError, FetchedResource, Fetcher, HttpFetcher,
    RetryPolicy,
};
pub use frontier::{Frontier, FrontierSnapshot};
pub use parser::{
    accessible_name, document_text, extract_labeled_links, extract_links, parse_document,
    resolve_link, LabeledLinks,
};
