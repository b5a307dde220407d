//! Cache Entry Module
//!
//! Defines cache keys, stored entries and the expiration policy attached to them.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::cache::MAX_REGION_LENGTH;
use crate::error::{CacheError, Result};
use crate::monitor::ChangeMonitor;

// == Cache Key ==
/// A key qualified by the region it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub region: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(region: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.key)
    }
}

// == Cache Entry ==
/// A stored value together with its access timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// When the entry was written
    pub added: DateTime<Utc>,
    /// Last read that refreshed the sliding clock (equals `added` until then)
    pub last_accessed: DateTime<Utc>,
    /// The stored value
    pub value: T,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry stamped with `now` for both timestamps.
    pub fn new(value: T, now: DateTime<Utc>) -> Self {
        Self {
            added: now,
            last_accessed: now,
            value,
        }
    }
}

// == Expiration Policy ==
/// The persisted half of a cache policy.
///
/// A zero (or negative) sliding window and an absent absolute deadline both
/// mean "disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    pub sliding_expiration: Duration,
    pub absolute_expiration: Option<DateTime<Utc>>,
}

impl ExpirationPolicy {
    /// Returns true if reads refresh a sliding window.
    pub fn has_sliding(&self) -> bool {
        self.sliding_expiration > Duration::zero()
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self {
            sliding_expiration: Duration::zero(),
            absolute_expiration: None,
        }
    }
}

// == Cache Policy ==
/// Expiration settings plus the change monitors to arm when the entry is set.
///
/// Monitors are consumed by `set`; they are never persisted and cannot be
/// attached to an entry afterwards.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    pub expiration: ExpirationPolicy,
    pub change_monitors: Vec<ChangeMonitor>,
}

impl CachePolicy {
    /// A policy that never expires by time.
    pub fn none() -> Self {
        Self::default()
    }

    /// Expire once `window` has passed without a read.
    pub fn sliding(window: Duration) -> Self {
        Self::default().with_sliding(window)
    }

    /// Expire at a fixed point in time.
    pub fn absolute(deadline: DateTime<Utc>) -> Self {
        Self::default().with_absolute(deadline)
    }

    pub fn with_sliding(mut self, window: Duration) -> Self {
        self.expiration.sliding_expiration = window;
        self
    }

    pub fn with_absolute(mut self, deadline: DateTime<Utc>) -> Self {
        self.expiration.absolute_expiration = Some(deadline);
        self
    }

    pub fn with_change_monitor(mut self, monitor: ChangeMonitor) -> Self {
        self.change_monitors.push(monitor);
        self
    }
}

// == Validation ==
/// Rejects blank keys and keys longer than `max_len` bytes.
pub fn validate_key(key: &str, max_len: usize) -> Result<()> {
    if key.trim().is_empty() {
        return Err(CacheError::invalid("Key cannot be blank"));
    }
    if key.len() > max_len {
        return Err(CacheError::invalid(format!(
            "Key exceeds maximum length of {} bytes",
            max_len
        )));
    }
    Ok(())
}

/// Accepts only names usable as a column-family identifier.
pub fn validate_region(region: &str) -> Result<()> {
    let mut chars = region.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_alpha
        || region.len() > MAX_REGION_LENGTH
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CacheError::invalid(format!(
            "Unsupported region '{}': expected [A-Za-z][A-Za-z0-9_]* up to {} chars",
            region, MAX_REGION_LENGTH
        )));
    }
    Ok(())
}
