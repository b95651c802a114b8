use crate::config::types::{
    Config, ContentConfig, CrawlConfig, OutputConfig, RenderConfig, RetryConfig, ScopeConfig,
    WaitKind,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
///
/// A missing root URL is not an error here; it may still be supplied on
/// the command line and is checked when settings are resolved.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_scope_config(&config.scope)?;
    validate_render_config(&config.render)?;
    validate_retry_config(&config.retry)?;
    validate_content_config(&config.content)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if let Some(root) = &config.root_url {
        validate_http_url(root, "root-url")?;
    }

    if config.concurrency_limit < 1 || config.concurrency_limit > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency-limit must be between 1 and 64, got {}",
            config.concurrency_limit
        )));
    }

    Ok(())
}

/// Validates scope configuration
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    for pattern in &config.extra_hosts {
        validate_domain_pattern(pattern)?;
    }

    for path in &config.exclude_paths {
        if path.trim().is_empty() || path.contains("://") {
            return Err(ConfigError::Validation(format!(
                "exclude-paths entries must be URL paths, got '{}'",
                path
            )));
        }
    }

    Ok(())
}

/// Validates browser and render-wait configuration
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 1000ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.wait == WaitKind::Selector {
        match &config.wait_selector {
            Some(selector) => validate_selector(selector)?,
            None => {
                return Err(ConfigError::Validation(
                    "wait = \"selector\" requires wait-selector".to_string(),
                ))
            }
        }
    }

    let wait_bound = match config.wait {
        WaitKind::NetworkIdle => config.idle_ms,
        WaitKind::Fixed => config.fixed_wait_ms,
        _ => 0,
    };
    if wait_bound >= config.timeout_ms {
        return Err(ConfigError::Validation(format!(
            "render wait of {}ms can never finish within timeout-ms ({}ms)",
            wait_bound, config.timeout_ms
        )));
    }

    if let Some(browser_url) = &config.browser_url {
        validate_http_url(browser_url, "browser-url")?;
    }

    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(
            "viewport dimensions must be non-zero".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }
    Ok(())
}

/// Validates content configuration
fn validate_content_config(config: &ContentConfig) -> Result<(), ConfigError> {
    for selector in config.selectors.iter().chain(&config.exclude_selectors) {
        validate_selector(selector)?;
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.ledger_path.as_deref() == Some("") {
        return Err(ConfigError::Validation(
            "ledger-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidSelector(selector.to_string()))
}

/// Validates a host pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
