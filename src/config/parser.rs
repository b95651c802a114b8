use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use docharvest::config::load_config;
///
/// let config = load_config(Path::new("docharvest.toml")).unwrap();
/// println!("Max depth: {}", config.crawl.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The configuration is serialized back to TOML first, so the hash covers
/// command-line overrides as well as the file, and ignores formatting and
/// comments. It is stored with every run to detect a changed configuration
/// on resume.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash
/// * `Err(ConfigError)` - The configuration could not be serialized
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let canonical = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(&config)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::WaitKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawl]
root-url = "https://example.com/docs/"
max-depth = 2
concurrency-limit = 8
request-delay-ms = 250

[scope]
extra-hosts = ["*.example.com"]
exclude-paths = ["/docs/archive"]

[render]
wait = "selector"
wait-selector = "article"
timeout-ms = 15000

[retry]
max-attempts = 3
backoff-ms = 200

[content]
selectors = [".theme-doc-markdown"]
exclude-selectors = [".edit-this-page"]

[output]
directory = "./out"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(
            config.crawl.root_url.as_deref(),
            Some("https://example.com/docs/")
        );
        assert_eq!(config.crawl.max_depth, 2);
        assert_eq!(config.crawl.concurrency_limit, 8);
        assert_eq!(config.crawl.max_pages, 100);
        assert_eq!(config.render.wait, WaitKind::Selector);
        assert_eq!(config.render.wait_selector.as_deref(), Some("article"));
        assert!(config.render.headless);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.content.selectors, vec![".theme-doc-markdown"]);
        assert_eq!(config.content.min_content_chars, 100);
        assert_eq!(config.output.directory, "./out");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.crawl.root_url.is_none());
        assert_eq!(config.crawl.max_depth, 3);
        assert_eq!(config.render.wait, WaitKind::NetworkIdle);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/docharvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = parse_config("[crawl]\nmax-dpeth = 3\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_wait_policy_rejected() {
        let result = parse_config("[render]\nwait = \"eventually\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[crawl]\nconcurrency-limit = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let a = parse_config("[crawl]\nmax-depth = 2\n").unwrap();
        let b = parse_config("# comment\n[crawl]\nmax-depth    = 2\n").unwrap();
        let c = parse_config("[crawl]\nmax-depth = 5\n").unwrap();

        let hash_a = compute_config_hash(&a).unwrap();
        assert_eq!(hash_a.len(), 64);
        assert_eq!(hash_a, compute_config_hash(&b).unwrap());
        assert_ne!(hash_a, compute_config_hash(&c).unwrap());
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config("[crawl]\nroot-url = \"https://example.com/\"\n");
        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(hash, compute_config_hash(&config).unwrap());
    }
}
