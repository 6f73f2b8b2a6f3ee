//! Compute layer: pure functions the index and the query planner build on.
//!
//! - [`grid`]: geohash grid cells and spatial keys
//! - [`distance`]: haversine distance and pruning bounds
//! - [`filter`]: declarative attribute predicates
//! - [`validation`]: boundary checks for incoming requests
//!
//! Nothing here touches storage.

pub mod distance;
pub mod filter;
pub mod grid;
pub mod validation;
