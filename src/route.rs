//! Great-circle route sampling and nearest-point lookup.

use crate::geo::{self, GeoPoint};

/// Default number of samples along a route polyline.
pub const DEFAULT_ROUTE_SAMPLES: usize = 200;

/// Ordered polyline approximating the great circle between two airports.
///
/// Index `i` of an `n`-point path sits at fraction `i / (n - 1)` of the way
/// from departure to arrival. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    points: Vec<GeoPoint>,
}

/// Closest path sample to a position, with the heading along the path there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub index: usize,
    pub point: GeoPoint,
    pub bearing: f64,
}

impl RoutePath {
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<GeoPoint> {
        self.points.get(index).copied()
    }

    pub fn departure(&self) -> Option<GeoPoint> {
        self.points.first().copied()
    }

    pub fn arrival(&self) -> Option<GeoPoint> {
        self.points.last().copied()
    }

    /// Heading from sample `index` toward the following sample. The last
    /// sample looks back at its predecessor and reports that segment's
    /// heading instead.
    pub fn heading_at(&self, index: usize) -> f64 {
        let len = self.points.len();
        if len < 2 || index >= len {
            return 0.0;
        }
        if index + 1 < len {
            geo::bearing(self.points[index], self.points[index + 1])
        } else {
            geo::bearing(self.points[index - 1], self.points[index])
        }
    }
}

/// Sample `count` points along the great circle from `departure` to
/// `arrival`, spaced at even fractions 0, 1/(count-1), ..., 1.
///
/// `count` below 2 is raised to 2 so both endpoints are always present.
pub fn sample(departure: GeoPoint, arrival: GeoPoint, count: usize) -> RoutePath {
    let count = count.max(2);
    let step = 1.0 / (count - 1) as f64;

    let points = (0..count)
        .map(|i| {
            // Pin the last fraction to exactly 1.0 instead of accumulating step error
            let fraction = if i == count - 1 { 1.0 } else { i as f64 * step };
            geo::interpolate_great_circle(departure, arrival, fraction)
        })
        .collect();

    RoutePath { points }
}

/// Find the path sample closest to `position` and the path heading there.
///
/// Distance is planar squared distance in lat/lng degrees, not great-circle
/// distance; route samples are dense enough for this to pick the right
/// neighbourhood. Ties resolve to the lowest index. `None` for an empty path.
pub fn nearest_point_and_bearing(path: &RoutePath, position: GeoPoint) -> Option<NearestPoint> {
    let mut best: Option<(usize, f64)> = None;

    for (index, point) in path.points.iter().enumerate() {
        let d_lat = point.latitude - position.latitude;
        let d_lng = point.longitude - position.longitude;
        let dist_sq = d_lat * d_lat + d_lng * d_lng;

        match best {
            Some((_, best_dist)) if dist_sq >= best_dist => {}
            _ => best = Some((index, dist_sq)),
        }
    }

    let (index, _) = best?;
    Some(NearestPoint {
        index,
        point: path.points[index],
        bearing: path.heading_at(index),
    })
}
