//! Error types for reloadable-config.

use std::path::PathBuf;

/// Result type alias for reloadable-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Boxed error returned by subscriber handlers and scheduled job bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when loading, watching or reconfiguring.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to load configuration from a source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// A configuration file could not be parsed into its target type.
    #[error("Failed to parse {} as {target}: {message}", file.display())]
    ParseError {
        /// The file being read
        file: PathBuf,
        /// Name of the configuration type being constructed
        target: &'static str,
        /// Parser or deserializer message
        message: String,
    },

    /// Failed to deserialize configuration.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// File watching failed to initialize or run.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// The OS dropped change notifications; the watch loop cannot recover.
    #[error("Change notifications overflowed under {}", .0.display())]
    EventOverflow(PathBuf),

    /// A `${...}` placeholder had no value and no fallback.
    #[error("Unresolved placeholder '{key}' in '{text}'")]
    UnresolvedPlaceholder {
        /// The property key that was looked up
        key: String,
        /// The text containing the placeholder
        text: String,
    },

    /// A scheduled job declaration could not be turned into a trigger.
    #[error("Invalid trigger for job '{job}': {reason}")]
    InvalidTrigger {
        /// Job identifier
        job: String,
        /// Why the trigger was rejected
        reason: String,
    },

    /// Attempted to use a feature that is not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(&'static str),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    pub(crate) fn invalid_trigger(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTrigger {
            job: job.into(),
            reason: reason.into(),
        }
    }
}

impl From<notify::Error> for ConfigError {
    fn from(err: notify::Error) -> Self {
        ConfigError::WatchError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ConfigError::ParseError {
            file: PathBuf::from("/etc/app/config.yml"),
            target: "SecurityConfig",
            message: "missing field `domain`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse /etc/app/config.yml as SecurityConfig: missing field `domain`"
        );
    }

    #[test]
    fn test_invalid_trigger_display() {
        let err = ConfigError::invalid_trigger("nightly", "fixed rate must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid trigger for job 'nightly': fixed rate must be greater than zero"
        );
    }
}
