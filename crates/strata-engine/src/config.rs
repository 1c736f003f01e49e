//! Engine configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_record::DecodeMode;

/// Dispatcher configuration
///
/// ```toml
/// input_mode = "lenient"
/// validate_step_output = true
/// warnings_as_errors = false
/// require_format_marker = false
/// max_steps = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// How undeclared attributes in stored records are treated
    pub input_mode: DecodeMode,
    /// Strict-decode every step output against the next descriptor
    pub validate_step_output: bool,
    /// Fail migrations that produced warnings
    pub warnings_as_errors: bool,
    /// Refuse heuristic format detection for ambiguous versions
    pub require_format_marker: bool,
    /// Upper bound on plan length
    pub max_steps: usize,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With input decode mode
    #[inline]
    #[must_use]
    pub fn with_input_mode(mut self, mode: DecodeMode) -> Self {
        self.input_mode = mode;
        self
    }

    /// With step output validation toggled
    #[inline]
    #[must_use]
    pub fn with_step_output_validation(mut self, enabled: bool) -> Self {
        self.validate_step_output = enabled;
        self
    }

    /// With warnings promoted to errors
    #[inline]
    #[must_use]
    pub fn with_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    /// With explicit format markers required for ambiguous versions
    #[inline]
    #[must_use]
    pub fn with_required_format_marker(mut self, required: bool) -> Self {
        self.require_format_marker = required;
        self
    }

    /// With plan length limit
    #[inline]
    #[must_use]
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// Returns error on malformed TOML, unknown keys or invalid values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns error if `max_steps` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_mode: DecodeMode::Strict,
            validate_step_output: true,
            warnings_as_errors: false,
            require_format_marker: false,
            max_steps: 64,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML is malformed or has unknown keys
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}
