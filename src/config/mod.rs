//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! All sections are optional, so a crawl can also run from defaults plus CLI flags.
//!
//! # Example
//!
//! ```no_run
//! use admin_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Checkpoint every {} pages", config.crawler.checkpoint_interval);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, ExhaustedPolicy, FilterConfig, LegalConfig, OutputConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, MAX_WORKERS};
