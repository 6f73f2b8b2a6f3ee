//! Ordered spatial index mapping geohash keys to entity ids.
//!
//! Entries live in a `BTreeMap<SpatialKey, BTreeSet<EntityId>>`, so every
//! cell of the grid at a coarser precision is a contiguous key range and can
//! be enumerated with a prefix scan in `O(log N + matches)`. A reverse map
//! from id to key makes deletes and duplicate checks constant time.

use crate::compute::grid::{self, MAX_PRECISION, SpatialKey};
use crate::error::{MeetspotError, Result};
use crate::types::{EntityId, GeoPoint};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Bound, RangeBounds};

/// Default key precision; about 5m x 5m cells.
pub const DEFAULT_KEY_PRECISION: usize = 9;

/// Counters describing index occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of live entries (one per entity)
    pub entries: usize,
    /// Number of distinct spatial keys in use
    pub distinct_keys: usize,
    /// Key precision
    pub precision: usize,
}

/// Geohash-ordered index of entity locations.
///
/// Not synchronized; [`crate::DB`] wraps it in a read-write lock.
///
/// ```
/// use meetspot::{GeoPoint, SpatialIndex, SpatialKey};
///
/// let mut index = SpatialIndex::new(9).unwrap();
/// index.insert("a".into(), &GeoPoint::new(51.05, -114.05)).unwrap();
/// assert!(index.insert("a".into(), &GeoPoint::new(0.0, 0.0)).is_err());
///
/// let key = index.key_of(&"a".into()).unwrap().clone();
/// let prefix = SpatialKey::from(&key.as_str()[..5]);
/// assert_eq!(index.range_scan_prefix(&prefix).len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    entries: BTreeMap<SpatialKey, BTreeSet<EntityId>>,
    keys_by_id: FxHashMap<EntityId, SpatialKey>,
    precision: usize,
}

impl SpatialIndex {
    /// Create an index that keys points at `precision` geohash characters.
    pub fn new(precision: usize) -> Result<Self> {
        if !(1..=MAX_PRECISION).contains(&precision) {
            return Err(MeetspotError::InvalidInput(format!(
                "Key precision must be between 1 and {}, got: {}",
                MAX_PRECISION, precision
            )));
        }
        Ok(Self {
            entries: BTreeMap::new(),
            keys_by_id: FxHashMap::default(),
            precision,
        })
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn len(&self) -> usize {
        self.keys_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys_by_id.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.keys_by_id.contains_key(id)
    }

    pub fn key_of(&self, id: &EntityId) -> Option<&SpatialKey> {
        self.keys_by_id.get(id)
    }

    /// Index `id` at `point`. Fails with `DuplicateId` if `id` is already indexed.
    pub fn insert(&mut self, id: EntityId, point: &GeoPoint) -> Result<SpatialKey> {
        if self.keys_by_id.contains_key(&id) {
            return Err(MeetspotError::DuplicateId(id.to_string()));
        }

        let key = grid::encode(point, self.precision)?;
        self.entries
            .entry(key.clone())
            .or_default()
            .insert(id.clone());
        self.keys_by_id.insert(id, key.clone());

        Ok(key)
    }

    /// Remove the entry for `id`. Missing ids are reported as `NotFound`.
    pub fn delete(&mut self, id: &EntityId) -> Result<SpatialKey> {
        let Some(key) = self.keys_by_id.remove(id) else {
            return Err(MeetspotError::NotFound(id.to_string()));
        };

        if let Some(ids) = self.entries.get_mut(&key) {
            ids.remove(id);
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }

        Ok(key)
    }

    /// All `(key, id)` entries whose key lies in `range`, in key order.
    pub fn range_scan<R>(&self, range: R) -> Vec<(SpatialKey, EntityId)>
    where
        R: RangeBounds<SpatialKey>,
    {
        self.entries
            .range(range)
            .flat_map(|(key, ids)| ids.iter().map(move |id| (key.clone(), id.clone())))
            .collect()
    }

    /// All entries whose key starts with `prefix`, i.e. every entity inside
    /// the grid cell `prefix` names.
    pub fn range_scan_prefix(&self, prefix: &SpatialKey) -> Vec<(SpatialKey, EntityId)> {
        let mut out = Vec::new();
        self.for_each_in_prefix(prefix, |key, id| out.push((key.clone(), id.clone())));
        out
    }

    /// Visits entries under `prefix` without allocating a result vector.
    pub fn for_each_in_prefix<F>(&self, prefix: &SpatialKey, mut visit: F)
    where
        F: FnMut(&SpatialKey, &EntityId),
    {
        let range = (Bound::Included(prefix.clone()), Bound::Unbounded);
        for (key, ids) in self.entries.range(range) {
            if !key.has_prefix(prefix) {
                break;
            }
            ids.iter().for_each(|id| visit(key, id));
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.keys_by_id.len(),
            distinct_keys: self.entries.len(),
            precision: self.precision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = SpatialIndex::new(DEFAULT_KEY_PRECISION).unwrap();
        let p = GeoPoint::new(51.0832877, -114.1278038);
        let key = index.insert(id("miracles"), &p).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains(&id("miracles")));
        assert_eq!(index.key_of(&id("miracles")), Some(&key));
        assert_eq!(key, grid::encode(&p, DEFAULT_KEY_PRECISION).unwrap());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut index = SpatialIndex::new(DEFAULT_KEY_PRECISION).unwrap();
        index.insert(id("a"), &GeoPoint::new(1.0, 1.0)).unwrap();
        let err = index.insert(id("a"), &GeoPoint::new(2.0, 2.0)).unwrap_err();
        assert!(matches!(err, MeetspotError::DuplicateId(_)));
        // First entry untouched.
        assert_eq!(
            index.key_of(&id("a")),
            Some(&grid::encode(&GeoPoint::new(1.0, 1.0), DEFAULT_KEY_PRECISION).unwrap())
        );
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut index = SpatialIndex::new(DEFAULT_KEY_PRECISION).unwrap();
        let err = index.delete(&id("ghost")).unwrap_err();
        assert!(matches!(err, MeetspotError::NotFound(_)));
    }

    #[test]
    fn test_delete_then_reinsert() {
        let mut index = SpatialIndex::new(DEFAULT_KEY_PRECISION).unwrap();
        index.insert(id("a"), &GeoPoint::new(1.0, 1.0)).unwrap();
        index.delete(&id("a")).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.stats().distinct_keys, 0);

        index.insert(id("a"), &GeoPoint::new(2.0, 2.0)).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_collisions_share_a_key() {
        let mut index = SpatialIndex::new(5).unwrap();
        let p = GeoPoint::new(51.05, -114.05);
        index.insert(id("a"), &p).unwrap();
        index.insert(id("b"), &p).unwrap();

        let stats = index.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.distinct_keys, 1);

        index.delete(&id("a")).unwrap();
        assert_eq!(index.stats().distinct_keys, 1);
        assert!(index.contains(&id("b")));
    }

    #[test]
    fn test_prefix_scan_is_cell_scan() {
        let mut index = SpatialIndex::new(DEFAULT_KEY_PRECISION).unwrap();
        let calgary = GeoPoint::new(51.05, -114.05);
        let nearby = GeoPoint::new(51.0501, -114.0501);
        let far = GeoPoint::new(40.7128, -74.0060);
        index.insert(id("c1"), &calgary).unwrap();
        index.insert(id("c2"), &nearby).unwrap();
        index.insert(id("nyc"), &far).unwrap();

        let cell = grid::encode(&calgary, 5).unwrap();
        let ids: Vec<_> = index
            .range_scan_prefix(&cell)
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&id("nyc")));
    }

    #[test]
    fn test_range_scan_interval() {
        let mut index = SpatialIndex::new(DEFAULT_KEY_PRECISION).unwrap();
        index.insert(id("a"), &GeoPoint::new(10.0, 10.0)).unwrap();
        index.insert(id("b"), &GeoPoint::new(-10.0, -10.0)).unwrap();

        assert_eq!(index.range_scan(..).len(), 2);

        let key_a = index.key_of(&id("a")).unwrap().clone();
        let only_a = index.range_scan(key_a.clone()..=key_a);
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].1, id("a"));
    }

    #[test]
    fn test_invalid_precision() {
        assert!(SpatialIndex::new(0).is_err());
        assert!(SpatialIndex::new(13).is_err());
    }
}
