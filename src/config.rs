//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;

use crate::cache::{validate_region, DEFAULT_REGION, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Region used when a caller does not name one
    pub default_region: String,
    /// Maximum allowed key length in bytes
    pub max_key_length: usize,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_REGION` - Region for unqualified keys (default: "Default")
    /// - `CACHE_MAX_KEY_LENGTH` - Maximum key length in bytes (default: 256)
    pub fn from_env() -> Self {
        Self {
            default_region: env::var("CACHE_DEFAULT_REGION")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            max_key_length: env::var("CACHE_MAX_KEY_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_KEY_LENGTH),
        }
    }

    /// Sets the region used for unqualified keys.
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    /// Checks that the configuration can back a cache instance.
    pub fn validate(&self) -> Result<()> {
        validate_region(&self.default_region)?;
        if self.max_key_length == 0 {
            return Err(CacheError::invalid("max_key_length must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_string(),
            max_key_length: MAX_KEY_LENGTH,
        }
    }
}
