#![forbid(unsafe_code)]

//! Runtime configuration for the [`Looper`](crate::Looper).
//!
//! # Loading
//!
//! ```toml
//! # kioto.toml
//! worker_threads = 4
//! worker_thread_name = "app-worker"
//! ```
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_toml_file("kioto.toml")?;
//! let config = RuntimeConfig::from_json_str(json)?;
//! ```
//!
//! Missing keys fall back to [`RuntimeConfig::default`].

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Tunables for the worker side of the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RuntimeConfig {
    /// Number of worker threads running producers.
    pub worker_threads: usize,
    /// Worker thread name prefix; threads are named `{prefix}-{index}`.
    pub worker_thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            worker_thread_name: "kioto-worker".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.validated()
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.worker_threads == 0 {
            errors.push("worker_threads must be > 0".into());
        }
        if self.worker_thread_name.trim().is_empty() {
            errors.push("worker_thread_name must not be empty".into());
        }
        errors
    }

    #[cfg(feature = "config")]
    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Failure to load a [`RuntimeConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.worker_thread_name, "kioto-worker");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn validate_catches_zero_workers() {
        let config = RuntimeConfig {
            worker_threads: 0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().iter().any(|e| e.contains("worker_threads")));
    }

    #[test]
    fn validate_catches_blank_name() {
        let config = RuntimeConfig {
            worker_thread_name: "  ".into(),
            ..RuntimeConfig::default()
        };
        assert!(
            config
                .validate()
                .iter()
                .any(|e| e.contains("worker_thread_name"))
        );
    }

    #[test]
    fn validation_error_display_joins_messages() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation errors: a; b");
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_partial_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("worker_threads = 4").unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.worker_thread_name, "kioto-worker");
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_round_trips_through_serde() {
        let config = RuntimeConfig {
            worker_threads: 3,
            worker_thread_name: "io".into(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(RuntimeConfig::from_json_str(&json).unwrap(), config);
    }

    #[cfg(feature = "config")]
    #[test]
    fn invalid_values_are_rejected_on_load() {
        let err = RuntimeConfig::from_toml_str("worker_threads = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
