//! Geohash grid indexer.
//!
//! A geohash of `p` characters interleaves `5p` bits: `ceil(5p/2)` longitude
//! bits and `floor(5p/2)` latitude bits. Reading those bits back as two
//! integers gives a regular grid of `2^lon_bits` columns by `2^lat_bits`
//! rows. [`GridCell`] is a cell of that grid; its geohash string is the
//! [`SpatialKey`] used by the index.
//!
//! Keys are always produced from the cell centre, so the string and the
//! integer coordinates can never disagree, and a cell key at precision `p`
//! is a prefix of every key at a finer precision inside that cell.

use crate::compute::validation::validate_point;
use crate::error::{MeetspotError, Result};
use crate::types::GeoPoint;
use geo::{Rect, coord};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_PRECISION: usize = 1;
pub const MAX_PRECISION: usize = 12;

/// Sortable, locality-preserving key (a geohash string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpatialKey(String);

impl SpatialKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn precision(&self) -> usize {
        self.0.len()
    }

    pub fn has_prefix(&self, prefix: &SpatialKey) -> bool {
        self.0.starts_with(prefix.as_str())
    }
}

impl fmt::Display for SpatialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SpatialKey {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl From<&str> for SpatialKey {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

fn check_precision(precision: usize) -> Result<()> {
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        return Err(MeetspotError::InvalidInput(format!(
            "Geohash precision must be between {} and {}, got: {}",
            MIN_PRECISION, MAX_PRECISION, precision
        )));
    }
    Ok(())
}

fn lon_bits(precision: usize) -> u32 {
    (5 * precision as u32).div_ceil(2)
}

fn lat_bits(precision: usize) -> u32 {
    5 * precision as u32 / 2
}

/// Number of longitude columns at `precision`.
pub fn columns(precision: usize) -> u64 {
    1u64 << lon_bits(precision)
}

/// Number of latitude rows at `precision`.
pub fn rows(precision: usize) -> u64 {
    1u64 << lat_bits(precision)
}

/// Cell width in degrees of longitude.
pub fn cell_width_degrees(precision: usize) -> f64 {
    360.0 / columns(precision) as f64
}

/// Cell height in degrees of latitude.
pub fn cell_height_degrees(precision: usize) -> f64 {
    180.0 / rows(precision) as f64
}

/// Maps `value` in `[min, min + span]` onto `0..n`, clamping the top edge
/// (longitude 180, latitude 90) into the last slot.
fn slot(value: f64, min: f64, span: f64, n: u64) -> u64 {
    let scaled = ((value - min) / span * n as f64).floor();
    if scaled <= 0.0 {
        0
    } else if scaled >= n as f64 {
        n - 1
    } else {
        scaled as u64
    }
}

/// One cell of the geohash grid at a given precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    x: u64,
    y: u64,
    precision: usize,
}

impl GridCell {
    /// The cell containing `point` at `precision`.
    pub fn containing(point: &GeoPoint, precision: usize) -> Result<Self> {
        check_precision(precision)?;
        validate_point(point)?;

        Ok(Self {
            x: slot(point.longitude, -180.0, 360.0, columns(precision)),
            y: slot(point.latitude, -90.0, 180.0, rows(precision)),
            precision,
        })
    }

    /// Cell at integer grid coordinates; `x` wraps around the antimeridian.
    /// Returns `None` for rows outside the grid.
    pub fn at(x: i64, y: i64, precision: usize) -> Option<Self> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return None;
        }
        if y < 0 || y >= rows(precision) as i64 {
            return None;
        }
        Some(Self {
            x: x.rem_euclid(columns(precision) as i64) as u64,
            y: y as u64,
            precision,
        })
    }

    pub fn x(&self) -> u64 {
        self.x
    }

    pub fn y(&self) -> u64 {
        self.y
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Cell rectangle in degrees (x = longitude, y = latitude).
    pub fn bounds(&self) -> Rect<f64> {
        let w = cell_width_degrees(self.precision);
        let h = cell_height_degrees(self.precision);
        let min_lon = -180.0 + self.x as f64 * w;
        let min_lat = -90.0 + self.y as f64 * h;
        Rect::new(
            coord! { x: min_lon, y: min_lat },
            coord! { x: min_lon + w, y: min_lat + h },
        )
    }

    pub fn center(&self) -> GeoPoint {
        let c = self.bounds().center();
        GeoPoint::new(c.y, c.x)
    }

    /// Geohash string of this cell.
    pub fn key(&self) -> Result<SpatialKey> {
        let center = self.center();
        let hash = geohash::encode(
            geohash::Coord {
                x: center.longitude,
                y: center.latitude,
            },
            self.precision,
        )?;
        Ok(SpatialKey(hash))
    }

    /// The coarser cell at `precision` that contains this one.
    pub fn parent(&self, precision: usize) -> Result<Self> {
        check_precision(precision)?;
        if precision > self.precision {
            return Err(MeetspotError::InvalidInput(format!(
                "Parent precision {} is finer than cell precision {}",
                precision, self.precision
            )));
        }
        Ok(Self {
            x: self.x >> (lon_bits(self.precision) - lon_bits(precision)),
            y: self.y >> (lat_bits(self.precision) - lat_bits(precision)),
            precision,
        })
    }

    /// Cells at Chebyshev distance `k` from this one (ring 0 is the cell
    /// itself). Longitude wraps; rows past the poles are dropped; a ring
    /// wider than the globe yields each column once.
    pub fn ring(&self, k: u64) -> Vec<GridCell> {
        if k == 0 {
            return vec![*self];
        }

        let cols = columns(self.precision) as i64;
        let (cx, cy, k) = (self.x as i64, self.y as i64, k as i64);
        let full_width = 2 * k + 1 >= cols;

        let mut seen = FxHashSet::default();
        let mut cells = Vec::new();
        let mut push = |x: i64, y: i64| {
            if let Some(cell) = GridCell::at(x, y, self.precision)
                && seen.insert((cell.x, cell.y))
            {
                cells.push(cell);
            }
        };

        for dy in -k..=k {
            let y = cy + dy;
            if dy.abs() == k {
                if full_width {
                    (0..cols).for_each(|x| push(x, y));
                } else {
                    (-k..=k).for_each(|dx| push(cx + dx, y));
                }
            } else {
                push(cx - k, y);
                push(cx + k, y);
            }
        }

        cells
    }

    /// Like [`GridCell::ring`], restricted to `window`.
    ///
    /// When the window spans every column, ring `k` is the two full rows at
    /// `dy = ±k` instead of a Chebyshev square, so a polar search walks a
    /// handful of rows rather than thousands of rings.
    pub fn ring_within(&self, k: u64, window: &CellWindow) -> Vec<GridCell> {
        let (cx, cy, k) = (self.x as i64, self.y as i64, k as i64);
        let (min_y, max_y) = (window.min_y as i64, window.max_y as i64);
        let mut cells = Vec::new();

        if window.all_columns {
            let cols = columns(self.precision) as i64;
            let ring_rows = if k == 0 { vec![cy] } else { vec![cy - k, cy + k] };
            for y in ring_rows.into_iter().filter(|y| (min_y..=max_y).contains(y)) {
                cells.extend((0..cols).filter_map(|x| GridCell::at(x, y, self.precision)));
            }
            return cells;
        }

        // 2 * max_dx + 1 < columns here, so no column is produced twice.
        let max_dx = window.max_dx as i64;
        let kx = k.min(max_dx);
        for y in (cy - k).max(min_y)..=(cy + k).min(max_y) {
            if (y - cy).abs() == k {
                cells.extend((-kx..=kx).filter_map(|dx| GridCell::at(cx + dx, y, self.precision)));
            } else if k <= max_dx {
                cells.extend(GridCell::at(cx - k, y, self.precision));
                cells.extend(GridCell::at(cx + k, y, self.precision));
            }
        }
        cells
    }
}

/// Block of cells a bounded search around one cell can touch: rows
/// `min_y..=max_y` and, unless `all_columns`, columns within `max_dx` of the
/// centre column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWindow {
    pub min_y: u64,
    pub max_y: u64,
    pub max_dx: u64,
    pub all_columns: bool,
}

impl CellWindow {
    /// Window around `center` covering every point within `lat_half`
    /// degrees of latitude and `lon_half` degrees of longitude of `point`.
    /// `lon_half == None` means every longitude. One extra cell of margin
    /// is kept on each side.
    pub fn around(center: &GridCell, point: &GeoPoint, lat_half: f64, lon_half: Option<f64>) -> Self {
        let p = center.precision;
        let rows = rows(p);
        let cols = columns(p);

        let min_y = slot(point.latitude - lat_half, -90.0, 180.0, rows).saturating_sub(1);
        let max_y = (slot(point.latitude + lat_half, -90.0, 180.0, rows) + 1).min(rows - 1);

        let max_dx = match lon_half {
            Some(half) => (half / cell_width_degrees(p)).ceil() as u64 + 1,
            None => cols,
        };
        let all_columns = 2 * max_dx + 1 >= cols;

        Self {
            min_y,
            max_y,
            max_dx: if all_columns { cols / 2 } else { max_dx },
            all_columns,
        }
    }

    /// Number of cells in the window at `precision`.
    pub fn cell_count(&self, precision: usize) -> u64 {
        let width = if self.all_columns {
            columns(precision)
        } else {
            2 * self.max_dx + 1
        };
        (self.max_y - self.min_y + 1) * width
    }

    /// Largest ring index around `center` that still reaches into the window.
    pub fn last_ring(&self, center: &GridCell) -> u64 {
        let rows_out = (center.y - self.min_y).max(self.max_y - center.y);
        if self.all_columns {
            rows_out
        } else {
            rows_out.max(self.max_dx)
        }
    }
}

/// Geohash key of `point` at `precision`.
///
/// ```
/// use meetspot::GeoPoint;
/// use meetspot::compute::grid::encode;
///
/// let a = encode(&GeoPoint::new(51.0832877, -114.1278038), 7).unwrap();
/// let b = encode(&GeoPoint::new(51.0832877, -114.1278038), 7).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.precision(), 7);
/// ```
pub fn encode(point: &GeoPoint, precision: usize) -> Result<SpatialKey> {
    GridCell::containing(point, precision)?.key()
}
