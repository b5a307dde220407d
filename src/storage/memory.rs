//! In-Memory Storage Module
//!
//! A region-partitioned HashMap backend, used for tests and single-process setups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::storage::{CacheStorage, StorageRecord};

/// Number of mutating calls a backend has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageOpCounts {
    pub writes: u64,
    pub deletes: u64,
}

// == In-Memory Storage ==
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// region -> key -> record
    regions: RwLock<HashMap<String, HashMap<String, StorageRecord>>>,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of write and delete calls served so far.
    pub fn op_counts(&self) -> StorageOpCounts {
        StorageOpCounts {
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Returns the number of records currently held in `region`.
    pub async fn region_len(&self, region: &str) -> usize {
        self.regions
            .read()
            .await
            .get(region)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl CacheStorage for InMemoryStorage {
    async fn write(&self, region: &str, key: &str, record: StorageRecord) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.regions
            .write()
            .await
            .entry(region.to_string())
            .or_default()
            .insert(key.to_string(), record);
        Ok(())
    }

    async fn read(&self, region: &str, key: &str) -> Result<Option<StorageRecord>> {
        Ok(self
            .regions
            .read()
            .await
            .get(region)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn delete(&self, region: &str, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        if let Some(records) = self.regions.write().await.get_mut(region) {
            records.remove(key);
        }
        Ok(())
    }

    async fn delete_all(&self, region: &str) -> Result<usize> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .regions
            .write()
            .await
            .remove(region)
            .map_or(0, |records| records.len()))
    }
}
