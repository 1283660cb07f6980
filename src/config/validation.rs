//! Configuration validation utilities.

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Check that `s` is a valid Prometheus metric name segment.
///
/// # Examples
///
/// ```
/// use powerscope::config::is_valid_metric_name;
///
/// assert!(is_valid_metric_name("node"));
/// assert!(is_valid_metric_name("_mac_01"));
/// assert!(!is_valid_metric_name("1node"));
/// assert!(!is_valid_metric_name("node-exporter"));
/// ```
pub fn is_valid_metric_name(s: &str) -> bool {
    static METRIC_NAME_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = METRIC_NAME_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("failed to compile metric name regex")
    });

    regex.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_name_valid() {
        assert!(is_valid_metric_name("node"));
        assert!(is_valid_metric_name("Node_1"));
    }

    #[test]
    fn test_metric_name_invalid() {
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("9lives"));
        assert!(!is_valid_metric_name("with space"));
        assert!(!is_valid_metric_name("colon:name"));
    }
}
