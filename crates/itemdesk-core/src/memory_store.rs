use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::record::{ItemFields, ItemRecord, RecordId};
use crate::store::{now_millis, refreshed, RecordStore, StoreError};

struct Entry {
    record: ItemRecord,
    // Insertion order, breaks ties between equal `createdAt` values.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<RecordId, Entry>,
    next_seq: u64,
}

/// In-process store backed by a hash map. Used by tests and by callers that
/// do not need durability.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn put(&self, id: Option<RecordId>, fields: ItemFields) -> Result<RecordId, StoreError> {
        let mut inner = self.write()?;
        match id {
            None => {
                let id = Uuid::new_v4();
                let now = now_millis();
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.entries.insert(
                    id,
                    Entry {
                        record: ItemRecord {
                            id,
                            fields,
                            created_at: now,
                            updated_at: now,
                        },
                        seq,
                    },
                );
                Ok(id)
            }
            Some(id) => {
                let entry = inner.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
                entry.record.updated_at = refreshed(entry.record.updated_at);
                entry.record.fields = fields;
                Ok(id)
            }
        }
    }

    fn get(&self, id: RecordId) -> Result<Option<ItemRecord>, StoreError> {
        Ok(self.read()?.entries.get(&id).map(|e| e.record.clone()))
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        // Outgoing edges live on the record itself and go with it.
        self.write()?
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<ItemRecord>, StoreError> {
        let inner = self.read()?;
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(entries.into_iter().map(|e| e.record.clone()).collect())
    }

    fn children(&self, parent: RecordId) -> Result<Vec<RecordId>, StoreError> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| e.record.fields.parent_item_id == Some(parent))
            .map(|e| e.record.id)
            .collect())
    }

    fn dependents(&self, target: RecordId) -> Result<Vec<RecordId>, StoreError> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| e.record.fields.dependencies.contains(&target))
            .map(|e| e.record.id)
            .collect())
    }
}
