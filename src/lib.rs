//! Column Cache - An expiring object cache over wide-column storage
//!
//! Stores typed values with sliding and absolute expiration in a pluggable
//! storage backend. Expiration is evaluated lazily on read, and change
//! monitors evict entries when an external source changes.

pub mod cache;
pub mod config;
pub mod error;
pub mod monitor;
pub mod storage;
pub mod tasks;

pub use cache::{CachePolicy, ObjectCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use monitor::{ChangeMonitor, LocalChangeNotifier};
pub use storage::{CacheStorage, InMemoryStorage};
