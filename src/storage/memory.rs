//! In-memory record store.

use super::{RecordStore, StoreStats};
use crate::error::{MeetspotError, Result};
use crate::types::{EntityId, EntityRecord};
use rustc_hash::FxHashMap;

/// In-memory record store using a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: FxHashMap<EntityId, EntityRecord>,
    stats: StoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial capacity hint
    pub fn with_capacity(capacity: usize) -> Self {
        let mut store = Self::new();
        store.data.reserve(capacity);
        store
    }
}

impl RecordStore for MemoryStore {
    fn put(&mut self, record: EntityRecord) -> Result<()> {
        self.data.insert(record.id.clone(), record);
        self.stats.record_count = self.data.len();
        self.stats.operations_count += 1;
        Ok(())
    }

    fn get(&self, id: &EntityId) -> Result<EntityRecord> {
        self.data
            .get(id)
            .cloned()
            .ok_or_else(|| MeetspotError::NotFound(id.to_string()))
    }

    fn delete(&mut self, id: &EntityId) -> Result<EntityRecord> {
        let record = self
            .data
            .remove(id)
            .ok_or_else(|| MeetspotError::NotFound(id.to_string()))?;
        self.stats.record_count = self.data.len();
        self.stats.operations_count += 1;
        Ok(record)
    }

    fn contains(&self, id: &EntityId) -> Result<bool> {
        Ok(self.data.contains_key(id))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.data.len())
    }

    fn records(&self) -> Result<Box<dyn Iterator<Item = EntityRecord> + '_>> {
        Ok(Box::new(self.data.values().cloned()))
    }

    fn stats(&self) -> Result<StoreStats> {
        Ok(self.stats.clone())
    }
}
