use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_trawl::config::load_config;
///
/// let config = load_config(Path::new("trawl.toml")).unwrap();
/// println!("Sources: {}", config.sources.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored with each tracker run so changed settings are visible between runs.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
///
/// The file is read once, so the hash always matches the parsed content.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkMode;
    use crate::state::SourceKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[user-agent]
crawler-name = "TestTrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./out.db"
summary-path = "./summary.md"

[[source]]
kind = "filesystem"
location = "/data"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();

        assert_eq!(config.crawler.max_depth, None);
        assert!(!config.crawler.interrupt_on_error);
        assert_eq!(config.crawler.sink_mode, SinkMode::Shared);
        assert!(!config.filesystem.follow_symlinks);
        assert!(config.filesystem.ignore_hidden);
        assert!(config.filesystem.skip_bundles);
        assert!(!config.hyperlink.allow_cross_origin);
        assert_eq!(config.hyperlink.request_timeout, 30);
        assert!(config.tracker.database_path.is_none());
        assert_eq!(config.sources[0].source_kind(), Some(SourceKind::Filesystem));
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
[crawler]
max-depth = 3
interrupt-on-error = true
verbose = true
sink-mode = "per-entity"

[filter]
include = ["*.example.com", "/data/"]
exclude = ["ads.example.com"]

[filesystem]
follow-symlinks = true
ignore-hidden = false

[hyperlink]
allow-cross-origin = true
request-timeout = 5

[user-agent]
crawler-name = "TestTrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[tracker]
database-path = "./tracker.db"

[output]
database-path = "./out.db"
summary-path = "./summary.md"

[[source]]
kind = "filesystem"
location = "/data"

[[source]]
kind = "feed"
location = "https://example.com/feed.xml"
"#;
        let file = create_temp_config(content);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, Some(3));
        assert!(config.crawler.interrupt_on_error);
        assert_eq!(config.crawler.sink_mode, SinkMode::PerEntity);
        assert_eq!(config.filter.include.len(), 2);
        assert!(config.filesystem.follow_symlinks);
        assert!(!config.filesystem.ignore_hidden);
        assert!(config.filesystem.skip_bundles);
        assert!(config.hyperlink.allow_cross_origin);
        assert_eq!(config.tracker.database_path.as_deref(), Some("./tracker.db"));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/trawl.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let result = parse_config("this is not valid TOML {{{");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_sink_mode_rejected() {
        let content = format!("[crawler]\nsink-mode = \"sometimes\"\n{}", MINIMAL);
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation_errors_surface() {
        let content = MINIMAL.replace("/data", "");
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::Validation(_))
        ));

        let content = format!("[filter]\nexclude = [\"bad*pattern\"]\n{}", MINIMAL);
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }
}
