//! Core data types: points, identifiers, attribute values and entity records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A geographic point in degrees.
///
/// Field names follow the wire format used by the meeting API
/// (`{"latitude": .., "longitude": ..}`). Use [`GeoPoint::to_geo`] to get a
/// `geo::Point` (x = longitude, y = latitude) for distance computations.
///
/// ```
/// use meetspot::GeoPoint;
///
/// let calgary = GeoPoint::new(51.05, -114.05);
/// let p = calgary.to_geo();
/// assert_eq!(p.x(), -114.05);
/// assert_eq!(p.y(), 51.05);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(point: geo::Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

/// Opaque entity identifier. Ordering is used to break distance ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Scalar attribute stored alongside an entity.
///
/// Integers and numbers compare numerically against each other, so
/// `Integer(3)` is a member of `[Number(3.0)]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Integer(i64),
    Number(f64),
}

impl AttributeValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            AttributeValue::Integer(v) => v as f64,
            AttributeValue::Number(v) => v,
        }
    }

    /// Numeric equality across variants.
    pub fn same_value(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<u8> for AttributeValue {
    fn from(v: u8) -> Self {
        AttributeValue::Integer(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

/// A stored entity: location, named attributes, a sort key and a name.
///
/// Records are never mutated in place. Re-inserting means delete + insert so
/// the spatial index stays consistent with the stored point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub point: GeoPoint,
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Secondary scalar for range filtering, e.g. minute of day.
    pub sort_key: f64,
    pub name: String,
}

impl EntityRecord {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            id: id.into(),
            point,
            attributes: BTreeMap::new(),
            sort_key: 0.0,
            name: name.into(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_sort_key(mut self, sort_key: f64) -> Self {
        self.sort_key = sort_key;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// One query hit: the entity, where it is, and how far from the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: EntityId,
    pub point: GeoPoint,
    pub distance_meters: f64,
}

/// Counters exposed by [`crate::DB::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbStats {
    pub record_count: usize,
    pub index_entries: usize,
    pub distinct_keys: usize,
    pub inserts: u64,
    pub deletes: u64,
    pub queries: u64,
}
