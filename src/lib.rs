//! Embedded geospatial nearest-neighbor engine for meeting lookups.
//!
//! Records carry a point, numeric attributes and a sort key. A geohash index
//! plus ring expansion over grid cells answers "closest N within R meters
//! matching a filter" queries.
//!
//! ```rust
//! use meetspot::{DB, EntityRecord, Filter, Field, GeoPoint, NearestQuery};
//!
//! let db = DB::memory()?;
//! db.insert(
//!     EntityRecord::new("amna", "AMNA", GeoPoint::new(51.02723, -113.9928005))
//!         .with_attribute("weekday", 3i64)
//!         .with_sort_key(480.0),
//! )?;
//!
//! let query = NearestQuery::new(GeoPoint::new(51.05, -114.05), 10_000.0)
//!     .with_limit(10)
//!     .with_filter(Filter::new().in_set(Field::attribute("weekday"), [2i64, 3]));
//! let nearby = db.nearest(query)?;
//! assert_eq!(nearby[0].id.as_str(), "amna");
//! # Ok::<(), meetspot::MeetspotError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod query;
pub mod storage;
pub mod types;

pub use builder::DBBuilder;
pub use config::Config;
pub use db::DB;
pub use db::meetings::{Meeting, MeetingHit, MeetingQuery, Meetings, NewMeeting, TimeFilter};
pub use error::{MeetspotError, Result};

pub use compute::filter::{Field, Filter, Predicate};
pub use compute::grid::{GridCell, SpatialKey};
pub use index::SpatialIndex;
pub use query::{NearestQuery, QueryPlanner, QueryStats};

pub use types::{AttributeValue, DbStats, EntityId, EntityRecord, GeoPoint, Neighbor};

pub use storage::{MemoryStore, RecordStore, StoreStats};

#[cfg(feature = "snapshot")]
pub use storage::SnapshotFile;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{DB, DBBuilder, MeetspotError, Result};

    pub use crate::{EntityId, EntityRecord, GeoPoint, Neighbor};

    pub use crate::{Field, Filter, NearestQuery};

    pub use crate::{MeetingQuery, Meetings, NewMeeting, TimeFilter};

    pub use crate::{Config, MemoryStore, RecordStore};
}
