//! Pool policy configuration.
//!
//! A [`Policy`] controls whether released buffers are kept for reuse, how
//! large a retained buffer may be, and whether quarantine is swept
//! automatically. It can be built in code or loaded from a TOML file:
//!
//! ```toml
//! retain_on_release = true
//! max_retained_length = 4096
//! auto_maintain = false
//! per_class_limit = 32
//! ```

use serde::Deserialize;
use std::path::Path;

/// Default cap on the capacity (in elements) of a retained buffer.
pub const DEFAULT_MAX_RETAINED_LENGTH: usize = 4096;

/// Default cap on idle buffers kept per size class and element type.
pub const DEFAULT_PER_CLASS_LIMIT: usize = 32;

/// Retention and maintenance policy for a [`Pool`](crate::Pool).
///
/// Changing the policy of a live pool affects subsequent operations only;
/// buffers already on a free list stay there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Keep released buffers on the free lists. When false every released
    /// buffer is dropped once it leaves quarantine.
    #[serde(default = "default_retain_on_release")]
    pub retain_on_release: bool,

    /// Buffers with a capacity above this many elements are never retained.
    /// Also bounds the total retained elements of a single size class.
    #[serde(default = "default_max_retained_length")]
    pub max_retained_length: usize,

    /// Sweep quarantine right after every retirement instead of waiting for
    /// an explicit [`Pool::maintain`](crate::Pool::maintain).
    #[serde(default)]
    pub auto_maintain: bool,

    /// Maximum number of idle buffers per size class and element type.
    #[serde(default = "default_per_class_limit")]
    pub per_class_limit: usize,
}

fn default_retain_on_release() -> bool {
    true
}

fn default_max_retained_length() -> usize {
    DEFAULT_MAX_RETAINED_LENGTH
}

fn default_per_class_limit() -> usize {
    DEFAULT_PER_CLASS_LIMIT
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            retain_on_release: default_retain_on_release(),
            max_retained_length: default_max_retained_length(),
            auto_maintain: false,
            per_class_limit: default_per_class_limit(),
        }
    }
}

impl Policy {
    /// Create a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable retention of released buffers.
    pub fn with_retain_on_release(mut self, enabled: bool) -> Self {
        self.retain_on_release = enabled;
        self
    }

    /// Set the largest retained buffer capacity, in elements.
    pub fn with_max_retained_length(mut self, length: usize) -> Self {
        self.max_retained_length = length;
        self
    }

    /// Enable or disable automatic quarantine sweeps.
    pub fn with_auto_maintain(mut self, enabled: bool) -> Self {
        self.auto_maintain = enabled;
        self
    }

    /// Set the idle buffer count cap per size class.
    pub fn with_per_class_limit(mut self, limit: usize) -> Self {
        self.per_class_limit = limit;
        self
    }

    /// Whether a buffer of `capacity` elements may be retained at all.
    #[inline]
    pub fn may_retain(&self, capacity: usize) -> bool {
        self.retain_on_release && capacity <= self.max_retained_length
    }

    /// Parse a policy from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a policy from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }
}

/// Errors from loading a [`Policy`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(String),
    /// The file is not a valid policy.
    #[error("failed to parse config: {0}")]
    Parse(String),
}
