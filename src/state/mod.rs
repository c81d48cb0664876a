//! State module for tracking crawl progress
//!
//! This module provides the per-URL stage machine of the crawl pipeline.
//!
//! # Components
//!
//! - `Stage`: The stage a URL is in (queued, fetching, classifying, ..., done)
//! - `StageTracker`: Follows one URL through the pipeline and rejects illegal transitions

mod stage;

pub use stage::{Stage, StageTracker};
