use serde::Deserialize;

/// Main configuration structure for the crawler
///
/// Every section is optional; a missing section falls back to the defaults
/// used for the ASTRA / Fedlex crawl.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub filter: FilterConfig,
    pub output: OutputConfig,
    pub legal: LegalConfig,
}

/// What the engine does with a URL whose fetch failed on every attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustedPolicy {
    /// Record the URL as skipped and keep crawling
    #[default]
    Skip,
    /// Checkpoint and stop the crawl with the transport error
    Abort,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// URLs seeded into an empty frontier
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// Number of URLs processed concurrently
    pub workers: usize,

    /// Extra fetch attempts after the first failure
    pub retries: u32,

    /// Delay between fetch attempts (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Completed URLs between two checkpoints
    #[serde(rename = "checkpoint-interval")]
    pub checkpoint_interval: usize,

    #[serde(rename = "fetch-timeout-secs")]
    pub fetch_timeout_secs: u64,

    #[serde(rename = "render-timeout-secs")]
    pub render_timeout_secs: u64,

    #[serde(rename = "on-exhausted")]
    pub on_exhausted: ExhaustedPolicy,

    /// Substrings a URL must contain to be fetched; empty means unrestricted
    pub scope: Vec<String>,

    /// Treat unclassified resources served as text/html as markup
    #[serde(rename = "sniff-content-type")]
    pub sniff_content_type: bool,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_urls: vec!["https://www.astra.admin.ch/astra/de/home.html".to_string()],
            workers: 4,
            retries: 1,
            retry_delay_ms: 5000,
            checkpoint_interval: 400,
            fetch_timeout_secs: 30,
            render_timeout_secs: 60,
            on_exhausted: ExhaustedPolicy::Skip,
            scope: vec![
                "astra/de".to_string(),
                "classified-compilation".to_string(),
                "fedlex".to_string(),
            ],
            sniff_content_type: true,
            user_agent: format!("admin-crawler/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Link filter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Apply the pattern to extracted links
    pub enabled: bool,

    /// Regular expression searched anywhere in an absolute link
    pub pattern: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: "astra/de|classified-compilation|fedlex".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the bucket directories and the `_overview` checkpoint directory
    #[serde(rename = "write-dir")]
    pub write_dir: String,

    /// Write fetched resources to disk
    pub write: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_dir: "./crawled_data".to_string(),
            write: true,
        }
    }
}

/// Legal document resolution configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LegalConfig {
    /// Phrase whose presence marks a page as requiring script execution
    #[serde(rename = "gate-marker")]
    pub gate_marker: String,

    #[serde(rename = "sparql-endpoint")]
    pub sparql_endpoint: String,

    /// Catalog entries between two catalog snapshots
    #[serde(rename = "catalog-checkpoint-interval")]
    pub catalog_checkpoint_interval: usize,
}

impl Default for LegalConfig {
    fn default() -> Self {
        Self {
            gate_marker: "nur mit einem Javascript-fähigen Browser".to_string(),
            sparql_endpoint: "https://fedlex.data.admin.ch/sparqlendpoint".to_string(),
            catalog_checkpoint_interval: 50,
        }
    }
}
