//! Database builder for flexible configuration
//!
//! Lets callers pick the record store and an optional snapshot path before
//! the index is built.

use crate::config::Config;
use crate::db::DB;
use crate::error::Result;
#[cfg(feature = "snapshot")]
use crate::storage::SnapshotFile;
use crate::storage::{MemoryStore, RecordStore};
#[cfg(feature = "snapshot")]
use std::path::PathBuf;

/// Builder for a [`DB`] with a custom store, configuration or snapshot file.
///
/// # Examples
///
/// ```rust
/// use meetspot::{Config, DBBuilder};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = DBBuilder::new()
///     .config(Config::default().with_grid_precision(4))
///     .build()?;
/// assert_eq!(db.config().grid_precision, 4);
/// # Ok(())
/// # }
/// ```
pub struct DBBuilder {
    #[cfg(feature = "snapshot")]
    snapshot_path: Option<PathBuf>,
    store: Option<Box<dyn RecordStore>>,
    config: Config,
}

impl DBBuilder {
    /// Create a new builder with default in-memory configuration.
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "snapshot")]
            snapshot_path: None,
            store: None,
            config: Config::default(),
        }
    }

    /// Set the snapshot path. An existing snapshot is loaded on build;
    /// [`DB::save_snapshot`] writes back to the same path.
    #[cfg(feature = "snapshot")]
    pub fn snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Set the database configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use a custom record store. Records it already holds are indexed.
    pub fn store(mut self, store: Box<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the database.
    pub fn build(self) -> Result<DB> {
        #[cfg_attr(not(feature = "snapshot"), allow(unused_mut))]
        let mut store = self
            .store
            .unwrap_or_else(|| Box::new(MemoryStore::new()));

        #[cfg(feature = "snapshot")]
        let snapshot = match self.snapshot_path {
            Some(path) => {
                let snapshot = SnapshotFile::new(path);
                for record in snapshot.load()? {
                    store.put(record)?;
                }
                Some(snapshot)
            }
            None => None,
        };

        #[cfg_attr(not(feature = "snapshot"), allow(unused_mut))]
        let mut db = DB::from_store(self.config, store)?;

        #[cfg(feature = "snapshot")]
        if let Some(snapshot) = snapshot {
            db.set_snapshot(snapshot);
        }

        Ok(db)
    }
}

impl Default for DBBuilder {
    fn default() -> Self {
        Self::new()
    }
}
