//! Cache Service Module
//!
//! The public cache facade: typed get/set/remove over a storage backend, with
//! expiration evaluated lazily on read and change monitors armed on set.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::codec::{self, DecodedRecord};
use crate::cache::{
    evaluate, validate_key, validate_region, CacheEntry, CacheKey, CachePolicy, CacheStats,
    Clock, Evaluation, StatsRecorder, SystemClock,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::monitor::{ChangeMonitor, MonitorRegistry};
use crate::storage::{CacheStorage, FIELD_VALUE, ITEM};

// == Object Cache ==
/// An expiring cache of `T` values over a storage backend.
///
/// The cache holds no entries itself: every operation goes to storage, and
/// nothing expires until a read finds it expired. Read-then-write sequences
/// (the sliding refresh in `get`, `add_or_get_existing`) are not atomic, so
/// concurrent callers may lose a LastAccessed update or both insert.
/// The sliding refresh writes back the whole record it read: a `remove`,
/// monitor eviction or `set` landing between that read and write is undone,
/// bringing back the deleted entry or the previous value.
///
/// Dropping the cache unsubscribes every change monitor it armed.
#[derive(Debug)]
pub struct ObjectCache<T> {
    storage: Arc<dyn CacheStorage>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    stats: Arc<StatsRecorder>,
    monitors: MonitorRegistry,
    _value: PhantomData<fn() -> T>,
}

impl<T> ObjectCache<T>
where
    T: Serialize + DeserializeOwned,
{
    // == Constructor ==
    /// Creates a cache on the wall clock.
    ///
    /// Must be called from within a Tokio runtime: the change-monitor
    /// eviction task is spawned here.
    pub fn new(storage: Arc<dyn CacheStorage>, config: CacheConfig) -> Result<Self> {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(
        storage: Arc<dyn CacheStorage>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let stats = Arc::new(StatsRecorder::new());
        let monitors = MonitorRegistry::new(storage.clone(), stats.clone());

        Ok(Self {
            storage,
            clock,
            config,
            stats,
            monitors,
            _value: PhantomData,
        })
    }

    // == Get ==
    /// Returns the value for `key`, or `None` if it is absent or expired.
    ///
    /// An expired entry is deleted. A read inside a sliding window writes the
    /// refreshed LastAccessed back to storage.
    pub async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<T>> {
        let cache_key = self.resolve(key, region)?;
        let now = self.clock.now();

        let Some(mut record) = self.storage.read(&cache_key.region, &cache_key.key).await? else {
            return Ok(self.miss(&cache_key));
        };

        let (entry, policy) = match codec::decode::<T>(&record)? {
            DecodedRecord::Present { entry, policy } => (entry, policy),
            DecodedRecord::Absent => return Ok(self.miss(&cache_key)),
        };

        match evaluate(&entry, policy.as_ref(), now) {
            Evaluation::Expired => {
                self.storage
                    .delete(&cache_key.region, &cache_key.key)
                    .await?;
                self.stats.record_expiration();
                info!("Evicted expired entry {}", cache_key);
                Ok(self.miss(&cache_key))
            }
            Evaluation::ValidRefresh => {
                codec::touch(&mut record, now);
                self.storage
                    .write(&cache_key.region, &cache_key.key, record)
                    .await?;
                self.stats.record_refresh();
                self.stats.record_hit();
                debug!("Cache hit on {} (sliding window refreshed)", cache_key);
                Ok(Some(entry.value))
            }
            Evaluation::Valid => {
                self.stats.record_hit();
                debug!("Cache hit on {}", cache_key);
                Ok(Some(entry.value))
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any existing entry, and arms the
    /// policy's change monitors.
    ///
    /// A value that serializes to `null` is rejected with `InvalidArgument`.
    pub async fn set(
        &self,
        key: &str,
        value: T,
        policy: CachePolicy,
        region: Option<&str>,
    ) -> Result<()> {
        let cache_key = self.resolve(key, region)?;
        self.store(&cache_key, &value, policy).await
    }

    // == Add Or Get Existing ==
    /// Returns the live value for `key` if there is one; otherwise stores
    /// `value` and returns it.
    pub async fn add_or_get_existing(
        &self,
        key: &str,
        value: T,
        policy: CachePolicy,
        region: Option<&str>,
    ) -> Result<T> {
        if let Some(existing) = self.get(key, region).await? {
            return Ok(existing);
        }
        let cache_key = self.resolve(key, region)?;
        self.store(&cache_key, &value, policy).await?;
        Ok(value)
    }

    // == Remove ==
    /// Deletes `key` and returns the value it held, if it was live.
    ///
    /// An absent or expired key returns `None` without a further delete.
    pub async fn remove(&self, key: &str, region: Option<&str>) -> Result<Option<T>> {
        let removed = self.get(key, region).await?;
        if removed.is_some() {
            let cache_key = self.resolve(key, region)?;
            self.storage
                .delete(&cache_key.region, &cache_key.key)
                .await?;
            self.stats.record_removal();
            debug!("Removed {}", cache_key);
        }
        Ok(removed)
    }

    // == Contains ==
    /// Returns true if `get` would return a value. Like `get`, this refreshes
    /// a sliding window and deletes an expired entry.
    pub async fn contains(&self, key: &str, region: Option<&str>) -> Result<bool> {
        Ok(self.get(key, region).await?.is_some())
    }

    // == Get Many ==
    /// Returns the live values among `keys`; absent and expired keys are
    /// left out of the map.
    pub async fn get_many<I, K>(&self, keys: I, region: Option<&str>) -> Result<HashMap<String, T>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut values = HashMap::new();
        for key in keys {
            let key = key.as_ref();
            if let Some(value) = self.get(key, region).await? {
                values.insert(key.to_string(), value);
            }
        }
        Ok(values)
    }

    // == Clean Cache ==
    /// Deletes every entry in the region, returning how many were removed.
    ///
    /// Retaining recent entries is not supported: passing `max_age` fails with
    /// `UnsupportedOperation` and deletes nothing.
    pub async fn clean_cache(
        &self,
        region: Option<&str>,
        max_age: Option<Duration>,
    ) -> Result<usize> {
        if max_age.is_some() {
            return Err(CacheError::UnsupportedOperation(
                "clean_cache with max_age (retaining recent entries)",
            ));
        }
        let region = region.unwrap_or(&self.config.default_region);
        validate_region(region)?;

        let removed = self.storage.delete_all(region).await?;
        info!("Cleaned region {}: {} entries removed", region, removed);
        Ok(removed)
    }

    // == Unsupported ==
    /// Counting entries would need a full scan of the backend.
    pub fn count(&self, _region: Option<&str>) -> Result<u64> {
        Err(CacheError::UnsupportedOperation("count"))
    }

    /// Enumerating keys would need a full scan of the backend.
    pub fn keys(&self, _region: Option<&str>) -> Result<Vec<String>> {
        Err(CacheError::UnsupportedOperation("key enumeration"))
    }

    /// Monitors over cache entries themselves are not supported; bind a
    /// `ChangeMonitor` to an external notifier instead.
    pub fn create_change_monitor(
        &self,
        _keys: &[&str],
        _region: Option<&str>,
    ) -> Result<ChangeMonitor> {
        Err(CacheError::UnsupportedOperation("create_change_monitor"))
    }

    // == Introspection ==
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Number of change monitors armed by this cache that have not fired.
    pub fn armed_monitors(&self) -> usize {
        self.monitors.armed_count()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn resolve(&self, key: &str, region: Option<&str>) -> Result<CacheKey> {
        validate_key(key, self.config.max_key_length)?;
        let region = region.unwrap_or(&self.config.default_region);
        validate_region(region)?;
        Ok(CacheKey::new(region, key))
    }

    fn miss(&self, cache_key: &CacheKey) -> Option<T> {
        self.stats.record_miss();
        debug!("Cache miss on {}", cache_key);
        None
    }

    async fn store(&self, cache_key: &CacheKey, value: &T, policy: CachePolicy) -> Result<()> {
        let entry = CacheEntry::new(value, self.clock.now());
        let record = codec::encode(&entry, &policy.expiration)?;

        let is_null = record
            .get(ITEM)
            .and_then(|item| item.get(FIELD_VALUE))
            .map_or(true, Value::is_null);
        if is_null {
            return Err(CacheError::invalid(format!(
                "Value for {} serializes to null and cannot be cached",
                cache_key
            )));
        }

        self.storage
            .write(&cache_key.region, &cache_key.key, record)
            .await?;
        debug!("Stored {}", cache_key);

        self.monitors.arm(cache_key, policy.change_monitors);
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::storage::{InMemoryStorage, StorageRecord, FIELD_SLIDING_EXPIRATION, POLICY};
    use async_trait::async_trait;

    fn cache_with_clock() -> (ObjectCache<String>, Arc<InMemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(InMemoryStorage::new());
        let clock = Arc::new(ManualClock::default());
        let cache =
            ObjectCache::with_clock(storage.clone(), CacheConfig::default(), clock.clone())
                .unwrap();
        (cache, storage, clock)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (cache, _, _) = cache_with_clock();

        cache
            .set("key1", "value1".to_string(), CachePolicy::none(), None)
            .await
            .unwrap();

        assert_eq!(
            cache.get("key1", None).await.unwrap(),
            Some("value1".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (cache, _, _) = cache_with_clock();

        assert_eq!(cache.get("nonexistent", None).await.unwrap(), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_overwrite_resets_timestamps() {
        let (cache, _, clock) = cache_with_clock();
        let policy = || CachePolicy::sliding(Duration::seconds(10));

        cache.set("key1", "v1".into(), policy(), None).await.unwrap();
        clock.advance(Duration::seconds(8));
        cache.set("key1", "v2".into(), policy(), None).await.unwrap();
        clock.advance(Duration::seconds(8));

        assert_eq!(cache.get("key1", None).await.unwrap(), Some("v2".into()));
    }

    #[tokio::test]
    async fn test_blank_key_rejected() {
        let (cache, _, _) = cache_with_clock();

        let result = cache.set("  ", "v".into(), CachePolicy::none(), None).await;
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
        assert!(matches!(
            cache.get("", None).await,
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_key_too_long() {
        let (cache, _, _) = cache_with_clock();
        let long_key = "x".repeat(cache.config().max_key_length + 1);

        let result = cache.set(&long_key, "v".into(), CachePolicy::none(), None).await;
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_unsupported_region_rejected() {
        let (cache, _, _) = cache_with_clock();

        let result = cache
            .set("k", "v".into(), CachePolicy::none(), Some("bad region"))
            .await;
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_null_value_rejected() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache: ObjectCache<Option<String>> =
            ObjectCache::new(storage.clone(), CacheConfig::default()).unwrap();

        let result = cache.set("k", None, CachePolicy::none(), None).await;

        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
        assert_eq!(storage.op_counts().writes, 0);
    }

    #[tokio::test]
    async fn test_clean_cache_with_max_age_is_rejected() {
        let (cache, storage, _) = cache_with_clock();
        cache.set("k", "v".into(), CachePolicy::none(), None).await.unwrap();

        let result = cache.clean_cache(None, Some(Duration::minutes(5))).await;

        assert!(matches!(result, Err(CacheError::UnsupportedOperation(_))));
        assert_eq!(storage.region_len("Default").await, 1);
    }

    #[tokio::test]
    async fn test_enumeration_is_unsupported() {
        let (cache, _, _) = cache_with_clock();

        assert!(matches!(
            cache.count(None),
            Err(CacheError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            cache.keys(None),
            Err(CacheError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            cache.create_change_monitor(&["k"], None),
            Err(CacheError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_or_get_existing() {
        let (cache, storage, _) = cache_with_clock();

        let first = cache
            .add_or_get_existing("k", "first".into(), CachePolicy::none(), None)
            .await
            .unwrap();
        let second = cache
            .add_or_get_existing("k", "second".into(), CachePolicy::none(), None)
            .await
            .unwrap();

        assert_eq!(first, "first");
        assert_eq!(second, "first");
        assert_eq!(storage.op_counts().writes, 1);
    }

    #[tokio::test]
    async fn test_add_or_get_existing_replaces_expired() {
        let (cache, _, clock) = cache_with_clock();

        cache
            .set("k", "old".into(), CachePolicy::sliding(Duration::seconds(1)), None)
            .await
            .unwrap();
        clock.advance(Duration::seconds(2));

        let value = cache
            .add_or_get_existing("k", "new".into(), CachePolicy::none(), None)
            .await
            .unwrap();
        assert_eq!(value, "new");
        assert_eq!(cache.get("k", None).await.unwrap(), Some("new".into()));
    }

    #[tokio::test]
    async fn test_valid_read_without_sliding_does_not_write() {
        let (cache, storage, _) = cache_with_clock();
        cache.set("k", "v".into(), CachePolicy::none(), None).await.unwrap();

        cache.get("k", None).await.unwrap();
        cache.get("k", None).await.unwrap();

        assert_eq!(storage.op_counts().writes, 1);
    }

    #[tokio::test]
    async fn test_sliding_read_writes_refresh() {
        let (cache, storage, _) = cache_with_clock();
        cache
            .set("k", "v".into(), CachePolicy::sliding(Duration::seconds(30)), None)
            .await
            .unwrap();

        cache.get("k", None).await.unwrap();

        assert_eq!(storage.op_counts().writes, 2);
        assert_eq!(cache.stats().refreshes, 1);
    }

    #[tokio::test]
    async fn test_record_without_item_reads_as_absent() {
        let (cache, storage, _) = cache_with_clock();
        storage
            .write("Default", "orphan", StorageRecord::new())
            .await
            .unwrap();

        assert_eq!(cache.get("orphan", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_out_of_range_stored_window_reads_as_no_policy() {
        let (cache, storage, _) = cache_with_clock();
        cache.set("k", "v".into(), CachePolicy::none(), None).await.unwrap();

        let mut record = storage.read("Default", "k").await.unwrap().unwrap();
        record
            .get_mut(POLICY)
            .unwrap()
            .insert(FIELD_SLIDING_EXPIRATION.into(), Value::from(i64::MIN));
        storage.write("Default", "k", record).await.unwrap();

        assert_eq!(cache.get("k", None).await.unwrap(), Some("v".to_string()));
        assert!(cache.contains("k", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_sub_millisecond_window_expires() {
        let (cache, _, clock) = cache_with_clock();
        cache
            .set(
                "k",
                "v".into(),
                CachePolicy::sliding(Duration::microseconds(500)),
                None,
            )
            .await
            .unwrap();

        clock.advance(Duration::days(30));

        assert_eq!(cache.get("k", None).await.unwrap(), None);
    }

    #[derive(Debug)]
    struct UnreachableStorage;

    #[async_trait]
    impl CacheStorage for UnreachableStorage {
        async fn write(&self, _: &str, _: &str, _: StorageRecord) -> Result<()> {
            Err(CacheError::StorageUnavailable("connection refused".to_string()))
        }
        async fn read(&self, _: &str, _: &str) -> Result<Option<StorageRecord>> {
            Err(CacheError::StorageUnavailable("connection refused".to_string()))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<()> {
            Err(CacheError::StorageUnavailable("connection refused".to_string()))
        }
        async fn delete_all(&self, _: &str) -> Result<usize> {
            Err(CacheError::StorageUnavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let cache: ObjectCache<String> =
            ObjectCache::new(Arc::new(UnreachableStorage), CacheConfig::default()).unwrap();

        assert!(matches!(
            cache.get("k", None).await,
            Err(CacheError::StorageUnavailable(_))
        ));
        assert!(matches!(
            cache.set("k", "v".into(), CachePolicy::none(), None).await,
            Err(CacheError::StorageUnavailable(_))
        ));
        assert!(matches!(
            cache.clean_cache(None, None).await,
            Err(CacheError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = CacheConfig::default().with_default_region("9lives");
        let result = ObjectCache::<String>::new(Arc::new(InMemoryStorage::new()), config);
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }
}
