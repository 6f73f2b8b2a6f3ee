//! Record store adapter.
//!
//! [`RecordStore`] is the boundary to durable storage: put, get and delete
//! whole [`EntityRecord`]s by id, nothing else. The crate ships
//! [`MemoryStore`]; with the `snapshot` feature a store's contents can be
//! dumped to and restored from a [`SnapshotFile`].

use crate::error::Result;
use crate::types::{EntityId, EntityRecord};

mod memory;
#[cfg(feature = "snapshot")]
mod snapshot;

pub use memory::MemoryStore;
#[cfg(feature = "snapshot")]
pub use snapshot::SnapshotFile;

/// Trait for record store implementations.
///
/// Implementations are pass-throughs with no business logic: `put`
/// overwrites, `get` and `delete` report missing ids as `NotFound`.
pub trait RecordStore: Send + Sync {
    /// Store `record` under its id, replacing any previous record.
    fn put(&mut self, record: EntityRecord) -> Result<()>;

    /// Fetch a record by id.
    fn get(&self, id: &EntityId) -> Result<EntityRecord>;

    /// Remove a record and return it.
    fn delete(&mut self, id: &EntityId) -> Result<EntityRecord>;

    /// Check if a record exists
    fn contains(&self, id: &EntityId) -> Result<bool>;

    /// Number of stored records
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterator over all stored records
    fn records(&self) -> Result<Box<dyn Iterator<Item = EntityRecord> + '_>>;

    /// Store statistics
    fn stats(&self) -> Result<StoreStats>;
}

/// Record store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of records
    pub record_count: usize,
    /// Number of operations performed
    pub operations_count: u64,
}
