//! Shared geodesic math for the globe.
//!
//! Converts geographic coordinates onto the render sphere, interpolates
//! along great circles, and computes bearings and distances. Everything
//! here is pure and works in `f64`; callers narrow to `f32` only when
//! building Bevy transforms.

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Earth radius in kilometers (mean radius)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Below this central angle (radians) two points are treated as identical
const COINCIDENT_EPSILON: f64 = 1e-12;

// =============================================================================
// Types
// =============================================================================

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Rejected coordinate input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoError {
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

impl fmt::Display for GeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoError::InvalidCoordinate { latitude, longitude } => {
                write!(f, "invalid coordinate ({}, {})", latitude, longitude)
            }
        }
    }
}

impl std::error::Error for GeoError {}

impl GeoPoint {
    /// Validated constructor. NaN, infinite, or out-of-range values are rejected.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if valid {
            Ok(Self { latitude, longitude })
        } else {
            Err(GeoError::InvalidCoordinate { latitude, longitude })
        }
    }

    /// Build from optional telemetry fields; `None` when either is absent
    /// or invalid.
    pub fn from_optional(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Self::new(latitude?, longitude?).ok()
    }

    /// Embedding on the unit sphere with +Z through the north pole.
    /// Used for interpolation only; rendering goes through [`to_cartesian`].
    fn to_unit_vector(self) -> DVec3 {
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
    }

    fn from_unit_vector(v: DVec3) -> Self {
        let latitude = v.z.atan2((v.x * v.x + v.y * v.y).sqrt()).to_degrees();
        let longitude = normalize_longitude(v.y.atan2(v.x).to_degrees());
        Self { latitude, longitude }
    }
}

// =============================================================================
// Sphere Mapping
// =============================================================================

/// Map a geographic point onto a sphere of `radius`.
///
/// phi = (90 - lat) and theta = (lng + 180), both in radians. The sign
/// pattern matches the equirectangular earth texture, so lat/lng (0, 0)
/// lands on +X and the north pole on +Y.
pub fn to_cartesian(point: GeoPoint, radius: f64) -> DVec3 {
    let phi = (90.0 - point.latitude) * (PI / 180.0);
    let theta = (point.longitude + 180.0) * (PI / 180.0);

    DVec3::new(
        -radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 { wrapped - 360.0 } else { wrapped }
}

// =============================================================================
// Geodesic Functions
// =============================================================================

/// Point at `fraction` of the way along the great circle from `start` to `end`.
///
/// Spherical linear interpolation of the unit-sphere embeddings, weighted by
/// sin((1-f)d)/sin(d) and sin(fd)/sin(d) where d is the central angle.
/// Fractions of exactly 0 and 1 return the endpoints unchanged, and
/// coincident endpoints return `start` for every fraction.
pub fn interpolate_great_circle(start: GeoPoint, end: GeoPoint, fraction: f64) -> GeoPoint {
    let f = fraction.clamp(0.0, 1.0);
    if f == 0.0 {
        return start;
    }
    if f == 1.0 {
        return end;
    }
    if start == end {
        return start;
    }

    let a = start.to_unit_vector();
    let b = end.to_unit_vector();
    let d = a.cross(b).length().atan2(a.dot(b));

    if d < COINCIDENT_EPSILON {
        return start;
    }

    let sin_d = d.sin();
    if PI - d < COINCIDENT_EPSILON {
        // Antipodal: every great circle through `start` reaches `end`.
        // Take the one heading toward the nearer pole.
        let axis = if a.z.abs() < 0.999 { DVec3::Z } else { DVec3::X };
        let perp = (axis - a * a.dot(axis)).normalize();
        let angle = f * PI;
        return GeoPoint::from_unit_vector(a * angle.cos() + perp * angle.sin());
    }

    let weight_a = ((1.0 - f) * d).sin() / sin_d;
    let weight_b = (f * d).sin() / sin_d;
    GeoPoint::from_unit_vector(a * weight_a + b * weight_b)
}

/// Initial bearing (forward azimuth) from `from` toward `to`.
/// Returns degrees in [0, 360), clockwise from north. Identical points give 0.
pub fn bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    if from == to {
        return 0.0;
    }

    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let x = delta_lon.sin() * lat2_rad.cos();
    let y = lat1_rad.cos() * lat2_rad.sin()
        - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    let degrees = (x.atan2(y).to_degrees() + 360.0) % 360.0;
    // 360 - tiny rounds up to 360.0 in f64
    if degrees >= 360.0 { 0.0 } else { degrees }
}

/// Great-circle distance in kilometers using the haversine formula.
pub fn haversine_distance_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}
