//! Admin-Crawler: a bounded crawler for government web domains
//!
//! This crate walks a fixed set of administrative websites, sorts every resource
//! it finds into a storage bucket, resolves script-gated legal pages to their
//! machine-readable documents and keeps a fingerprinted link graph that is
//! checkpointed periodically so an interrupted crawl can be resumed.

pub mod config;
pub mod crawler;
pub mod legal;
pub mod output;
pub mod resource;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fetch failed on every attempt of the retry budget
    #[error("Transport error for {url} after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: crawler::FetchError,
    },

    /// Rendering or resolution of a gated page failed
    #[error("Escalation failed for {url}: {message}")]
    Escalation { url: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("Frontier is empty")]
    FrontierEmpty,

    #[error("Frontier invariant violated: {0}")]
    FrontierInvariant(String),

    #[error("Invalid stage transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: state::Stage,
        to: state::Stage,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] legal::CatalogError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, CrawlReport, Frontier};
pub use resource::{classify, fingerprint, Payload, ResourceKind};
pub use state::Stage;
pub use storage::{CrawlEntry, KnowledgeStore};
