//! Storage Module
//!
//! The storage backend contract the cache runs on, plus an in-memory backend.
//!
//! A backend partitions records by region (a column family in a wide-column
//! store) and addresses them by key within the region. Transport, replication
//! and timeouts belong to the backend.

mod memory;
mod record;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::{InMemoryStorage, StorageOpCounts};
pub use record::{
    Fields, StorageRecord, FIELD_ABSOLUTE_EXPIRATION, FIELD_ADDED, FIELD_LAST_ACCESSED,
    FIELD_SLIDING_EXPIRATION, FIELD_VALUE, ITEM, POLICY,
};

/// Key-value storage backend, addressed per (region, key).
///
/// Implementations report I/O failures as `CacheError::StorageUnavailable`.
#[async_trait]
pub trait CacheStorage: Send + Sync + Debug {
    /// Writes the whole record, replacing any existing one.
    async fn write(&self, region: &str, key: &str, record: StorageRecord) -> Result<()>;

    async fn read(&self, region: &str, key: &str) -> Result<Option<StorageRecord>>;

    /// Deletes the record. Deleting an absent key is not an error.
    async fn delete(&self, region: &str, key: &str) -> Result<()>;

    /// Deletes every record in the region, returning how many were removed.
    async fn delete_all(&self, region: &str) -> Result<usize>;
}
