//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Longest accepted artifact title, in characters.
pub const DEFAULT_MAX_TITLE_LENGTH: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub max_title_length: usize,
    /// Parent of the per-invocation scratch directories.
    pub work_dir: PathBuf,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_title_length: DEFAULT_MAX_TITLE_LENGTH,
            work_dir: std::env::temp_dir(),
        }
    }
}

impl DispatcherConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OPENRS_MAX_TITLE_LENGTH") {
            if let Ok(len) = val.parse() {
                config.max_title_length = len;
            }
        }

        if let Ok(val) = std::env::var("OPENRS_WORK_DIR") {
            if !val.is_empty() {
                config.work_dir = PathBuf::from(val);
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_title_length == 0 {
            return Err("max_title_length must be > 0".to_string());
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err("work_dir must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_title_length, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_title_length_is_invalid() {
        let config = DispatcherConfig {
            max_title_length: 0,
            ..DispatcherConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
