//! Slippy-map tile coordinates and region expansion.
//!
//! Converts geographic positions into Web Mercator tile indices and expands
//! a `(lat, lon, radius)` disc into the concrete list of tiles a download job
//! has to fetch.
//!
//! # Square footprint
//!
//! [`expand_region`] enumerates the square neighbourhood of tiles around the
//! centre tile, not a true disc. `radius_km` is therefore an approximate
//! radius: the corners of the square extend past it. Job totals depend on
//! this enumeration, so it must not be tightened to a circle.

use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;

/// Mean equatorial circumference of the Earth in kilometres.
pub const EARTH_CIRCUMFERENCE_KM: f64 = 40_075.017;

/// Deepest zoom level accepted for download jobs.
pub const MAX_ZOOM: u8 = 22;

/// Latitude limit of the Web Mercator projection, in degrees.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// A tile address in the standard slippy-map scheme.
///
/// Renders as `zoom/x/y`, the same shape as the HTTP route and the keys
/// reported by [`TileStore::batch_check_tiles`](crate::store::TileStore::batch_check_tiles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Whether `x` and `y` fall inside the `2^zoom` grid.
    pub fn is_valid(&self) -> bool {
        if self.zoom > 31 {
            return false;
        }
        let n = 1u64 << self.zoom;
        u64::from(self.x) < n && u64::from(self.y) < n
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Convert a position in degrees to tile indices at `zoom`.
///
/// Returns the raw projected indices. They can fall outside `[0, 2^zoom)` for
/// `lon = 180` or latitudes beyond the projection limit; callers clip.
pub fn deg_to_tile(lat: f64, lon: f64, zoom: u8) -> (i64, i64) {
    let n = 2f64.powi(i32::from(zoom));
    let lat_rad = lat * PI / 180.0;

    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    (x as i64, y as i64)
}

/// Approximate edge length in kilometres of a tile at `zoom` and `lat`.
pub fn tile_footprint_km(zoom: u8, lat: f64) -> f64 {
    let n = 2f64.powi(i32::from(zoom));
    EARTH_CIRCUMFERENCE_KM / n * (lat * PI / 180.0).cos()
}

/// Number of tiles to either side of the centre tile that cover `radius_km`.
fn radius_in_tiles(radius_km: f64, zoom: u8, lat: f64) -> i64 {
    let footprint = tile_footprint_km(zoom, lat);
    if footprint <= 0.0 || !footprint.is_finite() {
        return 0;
    }
    (radius_km / footprint).ceil() as i64
}

/// Inclusive `(x_min, x_max, y_min, y_max)` of the square at `zoom`, clipped
/// to the grid.
fn square_bounds(lat: f64, lon: f64, zoom: u8, radius_km: f64) -> (i64, i64, i64, i64) {
    let last = (1i64 << zoom) - 1;
    let (cx, cy) = deg_to_tile(lat, lon, zoom);
    let cx = cx.clamp(0, last);
    let cy = cy.clamp(0, last);
    let radius = radius_in_tiles(radius_km, zoom, lat);

    (
        cx.saturating_sub(radius).max(0),
        cx.saturating_add(radius).min(last),
        cy.saturating_sub(radius).max(0),
        cy.saturating_add(radius).min(last),
    )
}

/// Number of tiles [`expand_region`] would return, without enumerating them.
pub fn region_tile_count(
    lat: f64,
    lon: f64,
    min_zoom: u8,
    max_zoom: u8,
    radius_km: f64,
) -> u64 {
    (min_zoom..=max_zoom)
        .map(|zoom| {
            let (x_min, x_max, y_min, y_max) = square_bounds(lat, lon, zoom, radius_km);
            let width = (x_max - x_min + 1) as u64;
            let height = (y_max - y_min + 1) as u64;
            width.saturating_mul(height)
        })
        .fold(0u64, u64::saturating_add)
}

/// Expand a disc into every tile of its square neighbourhood, zoom by zoom.
///
/// Order is deterministic: ascending zoom, then `x`, then `y`. Tiles outside
/// the `[0, 2^zoom)` grid are clipped. The result can be huge for deep zoom
/// ranges; check [`region_tile_count`] first.
pub fn expand_region(
    lat: f64,
    lon: f64,
    min_zoom: u8,
    max_zoom: u8,
    radius_km: f64,
) -> Vec<TileCoord> {
    let mut tiles = Vec::new();

    for zoom in min_zoom..=max_zoom {
        let (x_min, x_max, y_min, y_max) = square_bounds(lat, lon, zoom, radius_km);

        for x in x_min..=x_max {
            for y in y_min..=y_max {
                tiles.push(TileCoord::new(zoom, x as u32, y as u32));
            }
        }
    }

    tiles
}
