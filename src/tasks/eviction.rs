//! Change-Monitor Eviction Task
//!
//! Background task that deletes the keys reported by fired change monitors.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, StatsRecorder};
use crate::storage::CacheStorage;

/// Spawns a background task that evicts every key received on `evictions`.
///
/// Each eviction is an unconditional delete: the entry's expiration policy is
/// not consulted. A failed delete is logged and the task moves on to the next
/// key. The task ends when every sender is dropped.
///
/// # Arguments
/// * `storage` - Backend the cache reads and writes
/// * `stats` - Counters shared with the owning cache
/// * `evictions` - Keys whose change monitor fired
///
/// # Returns
/// A JoinHandle for the spawned task, which the owning registry aborts when
/// it is dropped.
///
/// # Example
/// ```ignore
/// let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
/// let handle = spawn_eviction_task(storage, stats, receiver);
/// sender.send(CacheKey::new("Default", "user:42"))?;
/// // Later, during teardown:
/// handle.abort();
/// ```
pub fn spawn_eviction_task(
    storage: Arc<dyn CacheStorage>,
    stats: Arc<StatsRecorder>,
    mut evictions: UnboundedReceiver<CacheKey>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Starting change-monitor eviction task");

        while let Some(key) = evictions.recv().await {
            match storage.delete(&key.region, &key.key).await {
                Ok(()) => {
                    stats.record_monitor_eviction();
                    info!("Change monitor evicted {}", key);
                }
                Err(e) => warn!("Change monitor eviction of {} failed: {}", key, e),
            }
        }

        debug!("Eviction channel closed, stopping task");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, Result};
    use crate::storage::{Fields, InMemoryStorage, StorageRecord, ITEM};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn record() -> StorageRecord {
        let mut record = StorageRecord::new();
        record.insert(ITEM, Fields::new());
        record
    }

    async fn wait_for_evictions(stats: &StatsRecorder, expected: u64) {
        for _ in 0..100 {
            if stats.snapshot().monitor_evictions >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_eviction_task_deletes_reported_keys() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.write("Default", "doomed", record()).await.unwrap();
        storage.write("Default", "kept", record()).await.unwrap();

        let stats = Arc::new(StatsRecorder::new());
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = spawn_eviction_task(storage.clone(), stats.clone(), receiver);

        sender.send(CacheKey::new("Default", "doomed")).unwrap();
        wait_for_evictions(&stats, 1).await;

        assert!(storage.read("Default", "doomed").await.unwrap().is_none());
        assert!(storage.read("Default", "kept").await.unwrap().is_some());
        assert_eq!(stats.snapshot().monitor_evictions, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_eviction_task_stops_when_senders_drop() {
        let storage = Arc::new(InMemoryStorage::new());
        let stats = Arc::new(StatsRecorder::new());
        let (sender, receiver) = mpsc::unbounded_channel::<CacheKey>();
        let handle = spawn_eviction_task(storage, stats, receiver);

        drop(sender);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should stop once the channel closes")
            .unwrap();
    }

    #[derive(Debug)]
    struct UnreachableStorage;

    #[async_trait]
    impl CacheStorage for UnreachableStorage {
        async fn write(&self, _: &str, _: &str, _: StorageRecord) -> Result<()> {
            Err(CacheError::StorageUnavailable("down".to_string()))
        }
        async fn read(&self, _: &str, _: &str) -> Result<Option<StorageRecord>> {
            Err(CacheError::StorageUnavailable("down".to_string()))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<()> {
            Err(CacheError::StorageUnavailable("down".to_string()))
        }
        async fn delete_all(&self, _: &str) -> Result<usize> {
            Err(CacheError::StorageUnavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_eviction_task_survives_storage_errors() {
        let stats = Arc::new(StatsRecorder::new());
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = spawn_eviction_task(Arc::new(UnreachableStorage), stats.clone(), receiver);

        sender.send(CacheKey::new("Default", "a")).unwrap();
        sender.send(CacheKey::new("Default", "b")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_finished(), "Task should keep running after errors");
        assert_eq!(stats.snapshot().monitor_evictions, 0);

        handle.abort();
    }
}
