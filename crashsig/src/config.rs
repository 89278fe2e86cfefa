//! Signature engine configuration.
//!
//! The thresholds below were tuned empirically against real crash
//! databases. They are exposed so deployments can experiment, but the
//! defaults are what existing signature consumers expect: changing them
//! changes which reports cluster together.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classification::DEFAULT_TOP_FRAMES;
use crate::domain::ConfigError;

/// Tunable thresholds for signature construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Frames retained by the unwind filter.
    pub top_frames: usize,

    /// Minimum retained frames for a symbolic signature.
    pub min_symbolic_frames: usize,

    /// Resolved entries after which the address signature stops collecting.
    pub max_address_frames: usize,

    /// Minimum resolved entries when every lookup succeeded.
    pub min_address_frames: usize,

    /// Minimum resolved entries when at least one lookup failed.
    pub min_address_frames_with_failures: usize,

    /// Reject when `resolved < failed * max_failure_ratio_denominator`.
    ///
    /// The default of 4 tolerates roughly 20% failed lookups.
    pub max_failure_ratio_denominator: usize,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            top_frames: DEFAULT_TOP_FRAMES,
            min_symbolic_frames: 2,
            max_address_frames: 15,
            min_address_frames: 3,
            min_address_frames_with_failures: 6,
            max_failure_ratio_denominator: 4,
        }
    }
}

impl SignatureConfig {
    /// Load a JSON config file; missing fields keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file can't be read, isn't valid JSON, or fails
    /// [`SignatureConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every signature vacuous.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("top_frames", self.top_frames),
            ("min_symbolic_frames", self.min_symbolic_frames),
            ("max_address_frames", self.max_address_frames),
            ("min_address_frames", self.min_address_frames),
            ("min_address_frames_with_failures", self.min_address_frames_with_failures),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
        }

        if self.min_symbolic_frames > self.top_frames {
            return Err(ConfigError::Invalid(format!(
                "min_symbolic_frames ({}) exceeds top_frames ({})",
                self.min_symbolic_frames, self.top_frames
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SignatureConfig::default();
        assert_eq!(config.top_frames, 5);
        assert_eq!(config.max_address_frames, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_address_frames": 20}}"#).unwrap();

        let config = SignatureConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_address_frames, 20);
        assert_eq!(config.top_frames, 5);
        assert_eq!(config.min_address_frames_with_failures, 6);
    }

    #[test]
    fn test_zero_cap_rejected() {
        let config = SignatureConfig { top_frames: 0, ..SignatureConfig::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("top_frames"));
    }

    #[test]
    fn test_symbolic_minimum_above_cap_rejected() {
        let config = SignatureConfig { min_symbolic_frames: 6, ..SignatureConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(SignatureConfig::from_file(file.path()), Err(ConfigError::Json(_))));
    }
}
