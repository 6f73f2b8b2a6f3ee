//! Database facade tying the spatial index and the record store together.
//!
//! `DB` owns a [`SpatialIndex`] and a boxed [`RecordStore`], each behind a
//! `parking_lot::RwLock`. Locks are always taken index first, then store,
//! and writes are ordered so a reader can never see an index entry whose
//! record is missing:
//!
//! - insert: index write lock, duplicate check, store put, index insert
//! - delete: index write lock, index delete, store delete
//! - nearest: index read lock and store read lock for the whole query

pub mod meetings;

use crate::compute::validation::{validate_distance, validate_point};
use crate::config::Config;
use crate::error::{MeetspotError, Result};
use crate::index::SpatialIndex;
use crate::query::{NearestQuery, QueryPlanner, QueryStats};
use crate::storage::{MemoryStore, RecordStore};
#[cfg(feature = "snapshot")]
use crate::storage::SnapshotFile;
use crate::types::{DbStats, EntityId, EntityRecord, Neighbor};
use parking_lot::RwLock;
#[cfg(feature = "snapshot")]
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Counters {
    inserts: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
}

/// Thread-safe spatial record database.
///
/// `DB` is `Send + Sync`; share it across threads with `Arc<DB>`.
///
/// # Examples
///
/// ```rust
/// use meetspot::{DB, EntityRecord, GeoPoint, NearestQuery};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = DB::memory()?;
///
/// let record = EntityRecord::new("courage", "Courage", GeoPoint::new(51.0117555, -114.0837796))
///     .with_attribute("weekday", 3i64)
///     .with_sort_key(1140.0);
/// db.insert(record)?;
///
/// let hits = db.nearest(NearestQuery::new(GeoPoint::new(51.05, -114.05), 10_000.0))?;
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].id.as_str(), "courage");
/// # Ok(())
/// # }
/// ```
pub struct DB {
    index: RwLock<SpatialIndex>,
    store: RwLock<Box<dyn RecordStore>>,
    planner: QueryPlanner,
    config: Config,
    counters: Counters,
    #[cfg(feature = "snapshot")]
    snapshot: Option<SnapshotFile>,
}

impl DB {
    /// Creates a new in-memory database.
    pub fn memory() -> Result<Self> {
        Self::memory_with_config(Config::default())
    }

    /// Create an in-memory database with custom configuration
    pub fn memory_with_config(config: Config) -> Result<Self> {
        Self::from_store(config, Box::new(MemoryStore::new()))
    }

    /// Opens a database backed by a snapshot file, loading it if present.
    /// Call [`DB::save_snapshot`] to persist.
    #[cfg(feature = "snapshot")]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    #[cfg(feature = "snapshot")]
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        crate::builder::DBBuilder::new()
            .config(config)
            .snapshot_path(path.as_ref())
            .build()
    }

    /// Create a database builder for advanced configuration.
    pub fn builder() -> crate::builder::DBBuilder {
        crate::builder::DBBuilder::new()
    }

    /// Wraps an existing store, indexing every record it already holds.
    pub fn from_store(config: Config, store: Box<dyn RecordStore>) -> Result<Self> {
        config.validate().map_err(MeetspotError::InvalidInput)?;

        let mut index = SpatialIndex::new(config.key_precision)?;
        for record in store.records()? {
            validate_point(&record.point)?;
            index.insert(record.id.clone(), &record.point)?;
        }
        if !index.is_empty() {
            log::info!("Indexed {} existing records", index.len());
        }

        Ok(Self {
            index: RwLock::new(index),
            store: RwLock::new(store),
            planner: QueryPlanner::new(config.grid_precision)?,
            config,
            counters: Counters::default(),
            #[cfg(feature = "snapshot")]
            snapshot: None,
        })
    }

    #[cfg(feature = "snapshot")]
    pub(crate) fn set_snapshot(&mut self, snapshot: SnapshotFile) {
        self.snapshot = Some(snapshot);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store `record` and index its point.
    ///
    /// Fails with `DuplicateId` if the id is already present; re-inserting
    /// an entity means deleting it first.
    pub fn insert(&self, record: EntityRecord) -> Result<()> {
        validate_point(&record.point)?;

        let mut index = self.index.write();
        if index.contains(&record.id) {
            return Err(MeetspotError::DuplicateId(record.id.to_string()));
        }

        let id = record.id.clone();
        let point = record.point;
        let mut store = self.store.write();
        store.put(record)?;

        if let Err(e) = index.insert(id.clone(), &point) {
            store.delete(&id)?;
            return Err(e);
        }

        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove an entity from the index and the store.
    ///
    /// A missing id is a `NotFound` error, not a no-op.
    pub fn delete(&self, id: &EntityId) -> Result<EntityRecord> {
        let mut index = self.index.write();
        index.delete(id)?;

        let record = self.store.write().delete(id).map_err(|e| match e {
            MeetspotError::NotFound(_) => {
                MeetspotError::Consistency(format!("indexed entity {} had no stored record", id))
            }
            other => other,
        })?;

        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(record)
    }

    pub fn get(&self, id: &EntityId) -> Result<EntityRecord> {
        self.store.read().get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Validates `distance_meters` and caps it at the configured maximum.
    pub fn clamp_distance(&self, distance_meters: f64) -> Result<f64> {
        validate_distance(distance_meters)?;
        let cap = self.config.max_distance_cap_meters;
        if distance_meters > cap {
            log::warn!(
                "Requested distance {} m exceeds cap; clamping to {} m",
                distance_meters,
                cap
            );
            return Ok(cap);
        }
        Ok(distance_meters)
    }

    /// Nearest entities matching `query`, nearest first.
    ///
    /// The radius is clamped to `max_distance_cap_meters` regardless of the
    /// caller's value.
    pub fn nearest(&self, query: NearestQuery) -> Result<Vec<Neighbor>> {
        self.nearest_with_stats(query).map(|(neighbors, _)| neighbors)
    }

    pub fn nearest_with_stats(&self, mut query: NearestQuery) -> Result<(Vec<Neighbor>, QueryStats)> {
        query.max_distance_meters = self.clamp_distance(query.max_distance_meters)?;
        self.counters.queries.fetch_add(1, Ordering::Relaxed);

        let index = self.index.read();
        let store = self.store.read();
        self.planner.nearest_with_stats(&index, &**store, &query)
    }

    /// Query hits joined with their stored records, read under the same
    /// locks as the query itself.
    pub fn nearest_records(&self, query: NearestQuery) -> Result<Vec<(Neighbor, EntityRecord)>> {
        let mut query = query;
        query.max_distance_meters = self.clamp_distance(query.max_distance_meters)?;
        self.counters.queries.fetch_add(1, Ordering::Relaxed);

        let index = self.index.read();
        let store = self.store.read();
        let neighbors = self.planner.nearest(&index, &**store, &query)?;

        neighbors
            .into_iter()
            .map(|neighbor| {
                let record = store.get(&neighbor.id).map_err(|e| match e {
                    MeetspotError::NotFound(_) => {
                        MeetspotError::Consistency(format!("invalid entity id: {}", neighbor.id))
                    }
                    other => other,
                })?;
                Ok((neighbor, record))
            })
            .collect()
    }

    pub fn stats(&self) -> Result<DbStats> {
        let index = self.index.read();
        let store = self.store.read();
        let index_stats = index.stats();
        Ok(DbStats {
            record_count: store.len()?,
            index_entries: index_stats.entries,
            distinct_keys: index_stats.distinct_keys,
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            queries: self.counters.queries.load(Ordering::Relaxed),
        })
    }

    /// Write all records to the configured snapshot file.
    #[cfg(feature = "snapshot")]
    pub fn save_snapshot(&self) -> Result<usize> {
        let Some(snapshot) = &self.snapshot else {
            return Err(MeetspotError::InvalidInput(
                "No snapshot path configured for this database".to_string(),
            ));
        };

        let records: Vec<EntityRecord> = {
            let _index = self.index.read();
            self.store.read().records()?.collect()
        };
        snapshot.save(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;
    use std::sync::Arc;
    use std::thread;

    fn record(id: &str, lat: f64, lng: f64) -> EntityRecord {
        EntityRecord::new(id, id, GeoPoint::new(lat, lng))
    }

    #[test]
    fn test_insert_get_delete() {
        let db = DB::memory().unwrap();
        db.insert(record("a", 51.05, -114.05)).unwrap();

        assert!(db.contains(&"a".into()));
        assert_eq!(db.get(&"a".into()).unwrap().name, "a");

        let removed = db.delete(&"a".into()).unwrap();
        assert_eq!(removed.id.as_str(), "a");
        assert!(db.is_empty());
        assert!(matches!(db.get(&"a".into()), Err(MeetspotError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_insert_rejected_without_overwrite() {
        let db = DB::memory().unwrap();
        db.insert(record("a", 51.05, -114.05)).unwrap();
        let mut other = record("a", 40.0, -74.0);
        other.name = "other".into();

        let err = db.insert(other).unwrap_err();
        assert!(matches!(err, MeetspotError::DuplicateId(_)));
        assert_eq!(db.get(&"a".into()).unwrap().point, GeoPoint::new(51.05, -114.05));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let db = DB::memory().unwrap();
        assert!(matches!(
            db.delete(&"ghost".into()),
            Err(MeetspotError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_point_rejected_before_store() {
        let db = DB::memory().unwrap();
        assert!(db.insert(record("bad", 95.0, 0.0)).is_err());
        assert_eq!(db.stats().unwrap().record_count, 0);
    }

    #[test]
    fn test_distance_is_clamped() {
        let db = DB::memory().unwrap();
        assert_eq!(db.clamp_distance(1_000_000.0).unwrap(), 50_000.0);
        assert_eq!(db.clamp_distance(10.0).unwrap(), 10.0);
        assert!(db.clamp_distance(-5.0).is_err());
    }

    #[test]
    fn test_from_store_indexes_existing_records() {
        let mut store = MemoryStore::new();
        store.put(record("a", 51.05, -114.05)).unwrap();
        store.put(record("b", 51.06, -114.05)).unwrap();

        let db = DB::from_store(Config::default(), Box::new(store)).unwrap();
        assert_eq!(db.len(), 2);
        let hits = db
            .nearest(NearestQuery::new(GeoPoint::new(51.05, -114.05), 5_000.0))
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_stats_counters() {
        let db = DB::memory().unwrap();
        db.insert(record("a", 1.0, 1.0)).unwrap();
        db.insert(record("b", 1.0, 1.0)).unwrap();
        db.delete(&"a".into()).unwrap();
        db.nearest(NearestQuery::new(GeoPoint::new(1.0, 1.0), 10.0)).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.index_entries, 1);
        assert_eq!(stats.inserts, 2);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.queries, 1);
    }

    #[test]
    fn test_concurrent_inserts_and_queries() {
        let db = Arc::new(DB::memory().unwrap());
        let mut handles = Vec::new();

        for t in 0..4 {
            let db = Arc::clone(&db);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("t{}-{}", t, i);
                    let lat = 51.0 + i as f64 * 0.0005;
                    db.insert(record(&id, lat, -114.05)).unwrap();
                    db.nearest(NearestQuery::new(GeoPoint::new(51.0, -114.05), 2_000.0))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = db.stats().unwrap();
        assert_eq!(stats.record_count, 400);
        assert_eq!(stats.index_entries, 400);
    }

    /// Memory store whose reads start failing with an I/O error after a
    /// fixed number of successful `get` calls.
    struct FlakyStore {
        inner: MemoryStore,
        reads_left: std::sync::atomic::AtomicUsize,
    }

    impl RecordStore for FlakyStore {
        fn put(&mut self, record: EntityRecord) -> Result<()> {
            self.inner.put(record)
        }

        fn get(&self, id: &EntityId) -> Result<EntityRecord> {
            let left = self.reads_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(std::io::Error::other("disk went away").into());
            }
            self.reads_left.store(left - 1, Ordering::SeqCst);
            self.inner.get(id)
        }

        fn delete(&mut self, id: &EntityId) -> Result<EntityRecord> {
            self.inner.delete(id)
        }

        fn contains(&self, id: &EntityId) -> Result<bool> {
            self.inner.contains(id)
        }

        fn len(&self) -> Result<usize> {
            self.inner.len()
        }

        fn records(&self) -> Result<Box<dyn Iterator<Item = EntityRecord> + '_>> {
            self.inner.records()
        }

        fn stats(&self) -> Result<crate::storage::StoreStats> {
            self.inner.stats()
        }
    }

    #[test]
    fn test_store_errors_keep_their_kind() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            reads_left: std::sync::atomic::AtomicUsize::new(1),
        };
        let db = DB::from_store(Config::default(), Box::new(store)).unwrap();
        db.insert(record("a", 51.05, -114.05)).unwrap();

        // The planner's read succeeds, the join read fails.
        let err = db
            .nearest_records(NearestQuery::new(GeoPoint::new(51.05, -114.05), 100.0))
            .unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_save_snapshot_without_path_fails() {
        #[cfg(feature = "snapshot")]
        assert!(DB::memory().unwrap().save_snapshot().is_err());
    }
}
