//! Entry Codec Module
//!
//! Maps a typed entry and its expiration policy onto a `StorageRecord` and back.
//!
//! Timestamps are stored as Unix milliseconds. The sliding window is stored in
//! milliseconds with 0 meaning disabled, and a disabled absolute deadline is
//! stored as `i64::MIN`.

use chrono::{DateTime, Duration, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheEntry, ExpirationPolicy};
use crate::error::Result;
use crate::storage::{
    Fields, StorageRecord, FIELD_ABSOLUTE_EXPIRATION, FIELD_ADDED, FIELD_LAST_ACCESSED,
    FIELD_SLIDING_EXPIRATION, FIELD_VALUE, ITEM, POLICY,
};

/// Stored value of a disabled absolute deadline
const ABSOLUTE_DISABLED: i64 = i64::MIN;

/// Result of decoding a stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord<T> {
    /// The record has an entry; `policy` is `None` when the Policy
    /// sub-record is missing or unreadable.
    Present {
        entry: CacheEntry<T>,
        policy: Option<ExpirationPolicy>,
    },
    /// The record has no Item sub-record.
    Absent,
}

// == Encode ==
/// Builds the storage record for an entry and its policy.
pub fn encode<T: Serialize>(
    entry: &CacheEntry<T>,
    policy: &ExpirationPolicy,
) -> Result<StorageRecord> {
    let mut item = Fields::new();
    item.insert(FIELD_ADDED.into(), entry.added.timestamp_millis().into());
    item.insert(
        FIELD_LAST_ACCESSED.into(),
        entry.last_accessed.timestamp_millis().into(),
    );
    item.insert(FIELD_VALUE.into(), serde_json::to_value(&entry.value)?);

    // A positive window shorter than 1ms must not collapse onto the 0 sentinel
    let sliding_ms = if policy.has_sliding() {
        policy.sliding_expiration.num_milliseconds().max(1)
    } else {
        0
    };
    let absolute_ms = policy
        .absolute_expiration
        .map_or(ABSOLUTE_DISABLED, |deadline| deadline.timestamp_millis());

    let mut stored_policy = Fields::new();
    stored_policy.insert(FIELD_SLIDING_EXPIRATION.into(), sliding_ms.into());
    stored_policy.insert(FIELD_ABSOLUTE_EXPIRATION.into(), absolute_ms.into());

    let mut record = StorageRecord::new();
    record.insert(ITEM, item);
    record.insert(POLICY, stored_policy);
    Ok(record)
}

// == Decode ==
/// Reads an entry and its policy back out of a storage record.
///
/// An Item sub-record with missing or mistyped fields is a
/// `CacheError::Serialization`.
pub fn decode<T: DeserializeOwned>(record: &StorageRecord) -> Result<DecodedRecord<T>> {
    let Some(item) = record.get(ITEM) else {
        return Ok(DecodedRecord::Absent);
    };

    let added = timestamp_field(item, FIELD_ADDED)?;
    let last_accessed = timestamp_field(item, FIELD_LAST_ACCESSED)?;
    let value = item
        .get(FIELD_VALUE)
        .ok_or_else(|| missing_field(FIELD_VALUE))?;
    let value = T::deserialize(value)?;

    Ok(DecodedRecord::Present {
        entry: CacheEntry {
            added,
            last_accessed,
            value,
        },
        policy: record.get(POLICY).and_then(decode_policy),
    })
}

// == Touch ==
/// Moves the entry's LastAccessed stamp to `now`, leaving everything else
/// untouched. Returns false if the record has no Item sub-record.
pub fn touch(record: &mut StorageRecord, now: DateTime<Utc>) -> bool {
    match record.get_mut(ITEM) {
        Some(item) => {
            item.insert(FIELD_LAST_ACCESSED.into(), now.timestamp_millis().into());
            true
        }
        None => false,
    }
}

fn decode_policy(fields: &Fields) -> Option<ExpirationPolicy> {
    let sliding_ms = fields.get(FIELD_SLIDING_EXPIRATION)?.as_i64()?;
    let absolute_expiration = match fields.get(FIELD_ABSOLUTE_EXPIRATION)? {
        Value::Null => None,
        value => match value.as_i64()? {
            ABSOLUTE_DISABLED => None,
            ms => Some(DateTime::from_timestamp_millis(ms)?),
        },
    };
    Some(ExpirationPolicy {
        sliding_expiration: Duration::try_milliseconds(sliding_ms)?,
        absolute_expiration,
    })
}

fn timestamp_field(fields: &Fields, name: &'static str) -> Result<DateTime<Utc>> {
    let ms = fields
        .get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing_field(name))?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        serde_json::Error::custom(format!("{} is out of range: {}", name, ms)).into()
    })
}

fn missing_field(name: &'static str) -> serde_json::Error {
    serde_json::Error::custom(format!("Item is missing or has a malformed '{}' field", name))
}
