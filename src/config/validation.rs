use crate::config::types::{Config, CrawlerConfig, FilterConfig, LegalConfig, OutputConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Upper bound for the worker pool
pub const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_filter_config(&config.filter)?;
    validate_output_config(&config.output)?;
    validate_legal_config(&config.legal)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-interval must be >= 1".to_string(),
        ));
    }

    if config.fetch_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.render_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "render-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    for start_url in &config.start_urls {
        validate_start_url(start_url)?;
    }

    Ok(())
}

/// Start URLs must be absolute http(s) URLs
fn validate_start_url(start_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Start URL '{}' must use the http or https scheme",
            start_url
        )));
    }

    Ok(())
}

/// Validates the link filter
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "filter pattern cannot be empty while the filter is enabled".to_string(),
        ));
    }

    Regex::new(&config.pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", config.pattern, e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.write_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "write-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates legal resolution configuration
fn validate_legal_config(config: &LegalConfig) -> Result<(), ConfigError> {
    if config.gate_marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "gate-marker cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.sparql_endpoint).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid sparql-endpoint '{}': {}",
            config.sparql_endpoint, e
        ))
    })?;

    if config.catalog_checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "catalog-checkpoint-interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = Config::default();
        config.crawler.workers = 0;
        assert!(validate(&config).is_err());

        config.crawler.workers = MAX_WORKERS + 1;
        assert!(validate(&config).is_err());

        config.crawler.workers = MAX_WORKERS;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_checkpoint_interval_rejected() {
        let mut config = Config::default();
        config.crawler.checkpoint_interval = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_start_url() {
        assert!(validate_start_url("https://www.astra.admin.ch/astra/de/home.html").is_ok());
        assert!(validate_start_url("http://localhost:8080/").is_ok());

        assert!(validate_start_url("not a url").is_err());
        assert!(validate_start_url("ftp://example.com/file").is_err());
    }

    #[test]
    fn test_invalid_filter_pattern() {
        let mut config = Config::default();
        config.filter.pattern = "astra/(de".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));

        // A disabled filter is not compiled
        config.filter.enabled = false;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_gate_marker_rejected() {
        let mut config = Config::default();
        config.legal.gate_marker = "  ".to_string();
        assert!(validate(&config).is_err());
    }
}
