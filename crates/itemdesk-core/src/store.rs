use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::record::{ItemFields, ItemRecord, RecordId};

/// The trait that all storage backends implement.
///
/// Single-record operations are atomic. The store owns identity assignment
/// and timestamps; callers never set `id`, `createdAt` or `updatedAt`.
pub trait RecordStore: Send + Sync {
    /// Persist a record.
    ///
    /// With `id = None` a new record is inserted: the store assigns the id
    /// and sets `createdAt = updatedAt = now`. With `Some(id)` the stored
    /// fields are replaced, `createdAt` is kept and `updatedAt` refreshed;
    /// fails with `NotFound` if the record does not exist.
    fn put(&self, id: Option<RecordId>, fields: ItemFields) -> Result<RecordId, StoreError>;

    /// Get a record by ID.
    fn get(&self, id: RecordId) -> Result<Option<ItemRecord>, StoreError>;

    /// Delete a record and the relationship edges that originate at it.
    /// Records pointing at it are left untouched.
    fn delete(&self, id: RecordId) -> Result<(), StoreError>;

    /// All records, newest `createdAt` first.
    fn list(&self) -> Result<Vec<ItemRecord>, StoreError>;

    /// Ids of records whose `parentItemId` is `parent`.
    fn children(&self, parent: RecordId) -> Result<Vec<RecordId>, StoreError>;

    /// Ids of records listing `target` in their `dependencies`.
    fn dependents(&self, target: RecordId) -> Result<Vec<RecordId>, StoreError>;

    fn exists(&self, id: RecordId) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }
}

/// Errors from the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Current time at the millisecond precision every backend persists.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

/// A refreshed `updatedAt`, strictly later than `previous`.
pub(crate) fn refreshed(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_millis();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::NotFound(uuid::Uuid::nil());
        assert!(err.to_string().contains("not found"));

        let err = StoreError::Storage("disk full".into());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn refreshed_is_strictly_later() {
        let future = now_millis() + Duration::seconds(60);
        let next = refreshed(future);
        assert!(next > future);
        assert_eq!(next.timestamp_subsec_micros() % 1000, 0);
    }
}
