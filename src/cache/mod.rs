//! Cache Module
//!
//! Provides an expiring object cache over a pluggable storage backend, with
//! sliding and absolute expiration evaluated lazily on read.

mod clock;
mod codec;
mod entry;
mod expiration;
mod service;
mod stats;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{decode, encode, touch, DecodedRecord};
pub use entry::{
    validate_key, validate_region, CacheEntry, CacheKey, CachePolicy, ExpirationPolicy,
};
pub use expiration::{evaluate, Evaluation};
pub use service::ObjectCache;
pub use stats::{CacheStats, StatsRecorder};

// == Public Constants ==
/// Region used when a caller does not name one
pub const DEFAULT_REGION: &str = "Default";

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum region name length (column-family identifier limit)
pub const MAX_REGION_LENGTH: usize = 48;
