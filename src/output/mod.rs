//! Output module: on-disk layout of crawled resources and crawl statistics

mod stats;
mod writer;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use writer::{LayoutStatus, OutputLayout, CATALOG_FILE, CHECKPOINT_FILE, OVERVIEW_DIR};
