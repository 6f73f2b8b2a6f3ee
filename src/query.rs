//! Nearest-neighbour query planner.
//!
//! Starting from the grid cell that contains the query point, the planner
//! scans concentric rings of cells outwards. Each cell is one prefix scan of
//! the [`SpatialIndex`]; candidates are joined with the [`RecordStore`],
//! filtered, ranked by haversine distance and kept in a bounded max-heap of
//! `limit` entries. Expansion stops as soon as no unvisited cell can hold
//! anything closer than the radius or the current K-th best hit.
//!
//! Rings are clipped to the bounding box of the search circle, and the grid
//! is coarsened until that box holds at most [`MAX_WINDOW_CELLS`] cells, so
//! the work per query is bounded by the radius even near the poles.

use crate::compute::distance::{
    cap_extent_degrees, haversine_meters, min_distance_outside, min_distance_to_rect,
};
use crate::compute::filter::Filter;
use crate::compute::grid::{self, CellWindow, GridCell, MAX_PRECISION, MIN_PRECISION};
use crate::compute::validation::{validate_distance, validate_point};
use crate::error::{MeetspotError, Result};
use crate::index::SpatialIndex;
use crate::storage::RecordStore;
use crate::types::{EntityId, GeoPoint, Neighbor};
use geo::{Rect, coord};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A nearest-neighbour request.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    pub point: GeoPoint,
    pub max_distance_meters: f64,
    pub limit: usize,
    pub filter: Filter,
}

impl NearestQuery {
    /// Query around `point` within `max_distance_meters`, no filter, unbounded limit.
    pub fn new(point: GeoPoint, max_distance_meters: f64) -> Self {
        Self {
            point,
            max_distance_meters,
            limit: usize::MAX,
            filter: Filter::accept_all(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// Upper bound on the grid cells one query may visit.
pub const MAX_WINDOW_CELLS: u64 = 4096;

/// Work counters for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Grid precision the rings were expanded at
    pub precision: usize,
    /// Rings expanded, including ring 0
    pub rings: u64,
    pub cells_scanned: u64,
    /// Cells skipped because they lie entirely beyond the cutoff
    pub cells_pruned: u64,
    pub candidates: u64,
    pub filtered_out: u64,
    pub beyond_radius: u64,
}

#[derive(Debug, Clone)]
struct Ranked {
    distance: f64,
    id: EntityId,
    point: GeoPoint,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Keeps the `limit` best candidates by (distance, id). The heap top is the
/// current worst, evicted first.
#[derive(Debug)]
struct BestK {
    heap: BinaryHeap<Ranked>,
    limit: usize,
}

impl BestK {
    fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit.min(1024)),
            limit,
        }
    }

    fn offer(&mut self, candidate: Ranked) {
        if self.heap.len() < self.limit {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    fn is_full(&self) -> bool {
        self.heap.len() >= self.limit
    }

    /// Distance beyond which nothing can enter the result set.
    fn cutoff(&self, max_distance: f64) -> f64 {
        match self.heap.peek() {
            Some(worst) if self.is_full() => worst.distance.min(max_distance),
            _ => max_distance,
        }
    }

    fn into_sorted(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|r| Neighbor {
                id: r.id,
                point: r.point,
                distance_meters: r.distance,
            })
            .collect()
    }
}

/// Ring-expansion planner over a fixed grid precision.
#[derive(Debug, Clone, Copy)]
pub struct QueryPlanner {
    grid_precision: usize,
}

impl QueryPlanner {
    pub fn new(grid_precision: usize) -> Result<Self> {
        if !(1..=MAX_PRECISION).contains(&grid_precision) {
            return Err(MeetspotError::InvalidInput(format!(
                "Grid precision must be between 1 and {}, got: {}",
                MAX_PRECISION, grid_precision
            )));
        }
        Ok(Self { grid_precision })
    }

    pub fn grid_precision(&self) -> usize {
        self.grid_precision
    }

    /// Closest matches to `query.point`, nearest first, ties by id.
    pub fn nearest<S>(
        &self,
        index: &SpatialIndex,
        store: &S,
        query: &NearestQuery,
    ) -> Result<Vec<Neighbor>>
    where
        S: RecordStore + ?Sized,
    {
        self.nearest_with_stats(index, store, query)
            .map(|(neighbors, _)| neighbors)
    }

    /// Like [`QueryPlanner::nearest`], also returning work counters.
    pub fn nearest_with_stats<S>(
        &self,
        index: &SpatialIndex,
        store: &S,
        query: &NearestQuery,
    ) -> Result<(Vec<Neighbor>, QueryStats)>
    where
        S: RecordStore + ?Sized,
    {
        validate_point(&query.point)?;
        validate_distance(query.max_distance_meters)?;
        if index.precision() < self.grid_precision {
            return Err(MeetspotError::InvalidInput(format!(
                "Grid precision {} is finer than index key precision {}",
                self.grid_precision,
                index.precision()
            )));
        }

        let mut stats = QueryStats::default();
        let mut best = BestK::new(query.limit);
        if query.limit == 0 || index.is_empty() {
            return Ok((Vec::new(), stats));
        }

        let max_distance = query.max_distance_meters;
        let (origin, window) = self.search_window(&query.point, max_distance)?;
        stats.precision = origin.precision();
        let last_ring = window.last_ring(&origin);
        let mut cell_ids = Vec::new();
        let mut k = 0u64;

        loop {
            stats.rings += 1;

            for cell in origin.ring_within(k, &window) {
                if min_distance_to_rect(&query.point, &cell.bounds()) > best.cutoff(max_distance) {
                    stats.cells_pruned += 1;
                    continue;
                }

                stats.cells_scanned += 1;
                cell_ids.clear();
                index.for_each_in_prefix(&cell.key()?, |_, id| cell_ids.push(id.clone()));

                for id in cell_ids.drain(..) {
                    stats.candidates += 1;

                    let record = store.get(&id).map_err(|e| match e {
                        MeetspotError::NotFound(_) => MeetspotError::Consistency(format!(
                            "index entry {} has no stored record",
                            id
                        )),
                        other => other,
                    })?;

                    if !query.filter.matches(&record) {
                        stats.filtered_out += 1;
                        continue;
                    }

                    let distance = haversine_meters(&query.point, &record.point);
                    if distance > max_distance {
                        stats.beyond_radius += 1;
                        continue;
                    }

                    best.offer(Ranked {
                        distance,
                        id,
                        point: record.point,
                    });
                }
            }

            if k >= last_ring {
                break;
            }
            let bound = unvisited_bound(&origin, &window, &query.point, k);
            if bound.is_infinite() || bound > max_distance {
                break;
            }
            if best.is_full() && best.cutoff(max_distance) < bound {
                break;
            }
            k += 1;
        }

        let neighbors = best.into_sorted();
        log::debug!(
            "nearest({:.6}, {:.6}, r={}m): {} hits, {} rings, {} cells scanned, {} pruned, {} candidates",
            query.point.latitude,
            query.point.longitude,
            max_distance,
            neighbors.len(),
            stats.rings,
            stats.cells_scanned,
            stats.cells_pruned,
            stats.candidates
        );

        Ok((neighbors, stats))
    }

    /// Origin cell and the window of cells a search of `radius_meters`
    /// around `point` can touch. Falls back to coarser grids until the
    /// window holds at most [`MAX_WINDOW_CELLS`] cells.
    fn search_window(&self, point: &GeoPoint, radius_meters: f64) -> Result<(GridCell, CellWindow)> {
        let (lat_half, lon_half) = cap_extent_degrees(point, radius_meters);
        let mut precision = self.grid_precision;
        loop {
            let origin = GridCell::containing(point, precision)?;
            let window = CellWindow::around(&origin, point, lat_half, lon_half);
            if precision == MIN_PRECISION || window.cell_count(precision) <= MAX_WINDOW_CELLS {
                if precision < self.grid_precision {
                    log::debug!(
                        "Search window at ({:.4}, {:.4}) too wide for precision {}; using {}",
                        point.latitude,
                        point.longitude,
                        self.grid_precision,
                        precision
                    );
                }
                return Ok((origin, window));
            }
            precision -= 1;
        }
    }
}

/// Lower bound on the distance from `point` to any window cell outside rings `0..=k`.
fn unvisited_bound(origin: &GridCell, window: &CellWindow, point: &GeoPoint, k: u64) -> f64 {
    let precision = origin.precision();
    let w = grid::cell_width_degrees(precision);
    let h = grid::cell_height_degrees(precision);

    let (ox, oy, k) = (origin.x() as i64, origin.y() as i64, k as i64);
    let covered = Rect::new(
        coord! {
            x: -180.0 + (ox - k) as f64 * w,
            y: (-90.0 + (oy - k) as f64 * h).max(-90.0),
        },
        coord! {
            x: -180.0 + (ox + k + 1) as f64 * w,
            y: (-90.0 + (oy + k + 1) as f64 * h).min(90.0),
        },
    );

    min_distance_outside(
        point,
        &covered,
        window.all_columns || k >= window.max_dx as i64,
        oy + k >= window.max_y as i64,
        oy - k <= window.min_y as i64,
    )
}
