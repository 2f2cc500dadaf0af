use std::path::PathBuf;
use thiserror::Error;

/// Configuration error.
///
/// Every variant is fatal: configuration problems are reported once at
/// startup and never recovered from.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config document is not valid YAML.
    #[error("failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A top-level section is absent or is not a mapping.
    #[error("missing or malformed '{0}' section")]
    MissingSection(String),

    /// A required key is absent.
    #[error("missing '{key}' option in '{section}' section")]
    MissingField { section: String, key: String },

    /// A key is present but has the wrong type or an unusable value.
    #[error("invalid '{key}' option in '{section}' section: {reason}")]
    InvalidField {
        section: String,
        key: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingField {
            section: "pipeline".to_string(),
            key: "retries".to_string(),
        };
        assert_eq!(err.to_string(), "missing 'retries' option in 'pipeline' section");

        let err = ConfigError::invalid("http", "url", "must not be empty");
        assert!(err.to_string().contains("'url'"));
        assert!(err.to_string().contains("must not be empty"));
    }
}
