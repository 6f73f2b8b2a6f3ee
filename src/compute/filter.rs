//! Declarative attribute filters.
//!
//! A [`Filter`] is a conjunction of [`Predicate`] leaves. It is plain data,
//! so the same filter evaluates identically against in-memory candidates
//! and persisted records, and it serializes to JSON for logs and tests.
//!
//! ```
//! use meetspot::{EntityRecord, GeoPoint};
//! use meetspot::compute::filter::{Field, Filter};
//!
//! let filter = Filter::new()
//!     .gte(Field::SortKey, 0.0)
//!     .lt(Field::SortKey, 1440.0)
//!     .in_set(Field::attribute("weekday"), [2i64, 3]);
//!
//! let record = EntityRecord::new("m1", "Miracles", GeoPoint::new(51.08, -114.12))
//!     .with_attribute("weekday", 2i64)
//!     .with_sort_key(720.0);
//! assert!(filter.matches(&record));
//! ```

use crate::types::{AttributeValue, EntityRecord};
use serde::{Deserialize, Serialize};

/// Which value of a record a predicate reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// The record's `sort_key`.
    SortKey,
    /// A named entry of the record's attribute map.
    Attribute(String),
}

impl Field {
    pub fn attribute(name: impl Into<String>) -> Self {
        Field::Attribute(name.into())
    }

    fn resolve(&self, record: &EntityRecord) -> Option<AttributeValue> {
        match self {
            Field::SortKey => Some(AttributeValue::Number(record.sort_key)),
            Field::Attribute(name) => record.attribute(name).copied(),
        }
    }
}

/// A single filter leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// `gte <= value < lt`; a missing bound is unbounded.
    Range {
        field: Field,
        gte: Option<f64>,
        lt: Option<f64>,
    },
    /// Value equals one of `values`.
    In {
        field: Field,
        values: Vec<AttributeValue>,
    },
}

impl Predicate {
    /// Evaluates the leaf. A field the record does not carry fails the leaf.
    pub fn matches(&self, record: &EntityRecord) -> bool {
        match self {
            Predicate::Range { field, gte, lt } => {
                let Some(value) = field.resolve(record) else {
                    return false;
                };
                let v = value.as_f64();
                gte.is_none_or(|low| v >= low) && lt.is_none_or(|high| v < high)
            }
            Predicate::In { field, values } => {
                let Some(value) = field.resolve(record) else {
                    return false;
                };
                values.iter().any(|candidate| candidate.same_value(&value))
            }
        }
    }
}

/// Conjunction of predicates. The empty filter accepts every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter that accepts everything.
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// `field >= low`.
    pub fn gte(self, field: Field, low: f64) -> Self {
        self.with(Predicate::Range {
            field,
            gte: Some(low),
            lt: None,
        })
    }

    /// `field < high`.
    pub fn lt(self, field: Field, high: f64) -> Self {
        self.with(Predicate::Range {
            field,
            gte: None,
            lt: Some(high),
        })
    }

    /// `low <= field < high` as one leaf.
    pub fn range(self, field: Field, low: f64, high: f64) -> Self {
        self.with(Predicate::Range {
            field,
            gte: Some(low),
            lt: Some(high),
        })
    }

    /// `field ∈ values`.
    pub fn in_set<V, I>(self, field: Field, values: I) -> Self
    where
        V: Into<AttributeValue>,
        I: IntoIterator<Item = V>,
    {
        self.with(Predicate::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, record: &EntityRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
