//! Scene state: the table of renderable globe entities and their transforms.
//!
//! The table is the single owner of every entity's pose. The render sync in
//! `globe` reads it once per frame and mirrors it onto Bevy entities; nothing
//! else holds references to markers or the route curve.

use bevy::math::{DMat3, DQuat, DVec3};
use bevy::prelude::*;
use std::collections::BTreeMap;

use crate::geo::{self, GeoError, GeoPoint};
use crate::route::RoutePath;

/// Height of the route curve above the globe surface, as a fraction of the
/// aircraft marker altitude.
const ROUTE_LIFT_FACTOR: f64 = 0.2;

/// Which end of the route an airport marker sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AirportRole {
    Departure,
    Arrival,
}

/// Key of the entity table. There is at most one entity of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SceneEntityKind {
    Globe,
    RouteCurve,
    AirportMarker(AirportRole),
    AircraftMarker,
}

/// Position and orientation in globe space (Y through the north pole).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl EntityTransform {
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    /// Narrow to an `f32` Bevy transform.
    pub fn to_transform(&self) -> Transform {
        Transform {
            translation: self.translation.as_vec3(),
            rotation: self.rotation.as_quat(),
            scale: Vec3::ONE,
        }
    }
}

/// One row of the entity table.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntity {
    pub transform: EntityTransform,
    /// Geographic anchor, for markers
    pub location: Option<GeoPoint>,
    /// Compass heading in degrees, aircraft only
    pub heading: Option<f64>,
    /// Polyline vertices in globe space, route curve only
    pub geometry: Vec<DVec3>,
}

impl SceneEntity {
    fn at(transform: EntityTransform) -> Self {
        Self {
            transform,
            location: None,
            heading: None,
            geometry: Vec::new(),
        }
    }
}

/// Local tangent frame at a point on the sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentBasis {
    pub up: DVec3,
    pub east: DVec3,
    pub north: DVec3,
}

impl TangentBasis {
    /// Frame at `position`: up is the normalized radius, east is
    /// perpendicular to both the pole axis and up, north = up x east.
    pub fn at(position: DVec3) -> Self {
        let up = position.normalize_or(DVec3::Y);
        // Degenerate at the poles; any horizontal east works there
        let east = DVec3::Y.cross(up).try_normalize().unwrap_or(DVec3::Z);
        let north = up.cross(east);
        Self { up, east, north }
    }

    /// Rotation taking local axes (X = east, Y = up, -Z = north) into globe space.
    pub fn rotation(&self) -> DQuat {
        DQuat::from_mat3(&DMat3::from_cols(self.east, self.up, -self.north))
    }
}

/// The explicit entity table plus the fixed geometry parameters it needs.
#[derive(Debug, Clone)]
pub struct SceneState {
    entities: BTreeMap<SceneEntityKind, SceneEntity>,
    globe_radius: f64,
    marker_altitude: f64,
    model_correction: DQuat,
    revision: u64,
}

impl SceneState {
    /// New scene containing only the globe.
    ///
    /// `model_correction` is applied last, in model space, to align the
    /// aircraft asset's own forward axis with local -Z.
    pub fn new(globe_radius: f64, marker_altitude: f64, model_correction: DQuat) -> Self {
        let mut entities = BTreeMap::new();
        entities.insert(SceneEntityKind::Globe, SceneEntity::at(EntityTransform::IDENTITY));
        Self {
            entities,
            globe_radius,
            marker_altitude,
            model_correction,
            revision: 0,
        }
    }

    pub fn marker_radius(&self) -> f64 {
        self.globe_radius + self.marker_altitude
    }

    /// Bumped on every mutation; the render sync compares it against the
    /// last revision it mirrored.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, kind: SceneEntityKind) -> Option<&SceneEntity> {
        self.entities.get(&kind)
    }

    pub fn contains(&self, kind: SceneEntityKind) -> bool {
        self.entities.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SceneEntityKind, &SceneEntity)> {
        self.entities.iter()
    }

    pub fn aircraft(&self) -> Option<&SceneEntity> {
        self.get(SceneEntityKind::AircraftMarker)
    }

    /// Replace the route curve and reposition both airport markers.
    /// An empty path removes them instead.
    pub fn set_route(&mut self, path: &RoutePath) {
        let (Some(departure), Some(arrival)) = (path.departure(), path.arrival()) else {
            self.remove_route();
            return;
        };

        let curve_radius = self.globe_radius + self.marker_altitude * ROUTE_LIFT_FACTOR;
        let geometry: Vec<DVec3> = path
            .points()
            .iter()
            .map(|p| geo::to_cartesian(*p, curve_radius))
            .collect();

        let mut curve = SceneEntity::at(EntityTransform::IDENTITY);
        curve.geometry = geometry;
        self.entities.insert(SceneEntityKind::RouteCurve, curve);

        for (role, point) in [(AirportRole::Departure, departure), (AirportRole::Arrival, arrival)] {
            let position = geo::to_cartesian(point, self.marker_radius());
            let mut marker = SceneEntity::at(EntityTransform {
                translation: position,
                rotation: TangentBasis::at(position).rotation(),
            });
            marker.location = Some(point);
            self.entities.insert(SceneEntityKind::AirportMarker(role), marker);
        }

        self.revision += 1;
    }

    /// Place the aircraft marker at `position`, facing `heading_degrees`
    /// (clockwise from north) in the local tangent plane.
    ///
    /// The new transform is computed completely before the table row is
    /// replaced. Invalid input leaves the previous pose untouched.
    pub fn set_aircraft_pose(&mut self, position: GeoPoint, heading_degrees: f64) -> Result<(), GeoError> {
        let position = GeoPoint::new(position.latitude, position.longitude)?;
        if !heading_degrees.is_finite() {
            return Err(GeoError::InvalidCoordinate {
                latitude: position.latitude,
                longitude: position.longitude,
            });
        }

        let transform = self.aircraft_transform(position, heading_degrees);
        let mut entity = SceneEntity::at(transform);
        entity.location = Some(position);
        entity.heading = Some(heading_degrees);
        self.entities.insert(SceneEntityKind::AircraftMarker, entity);
        self.revision += 1;
        Ok(())
    }

    /// Transform for the aircraft marker without touching the table.
    pub fn aircraft_transform(&self, position: GeoPoint, heading_degrees: f64) -> EntityTransform {
        let translation = geo::to_cartesian(position, self.marker_radius());
        let basis = TangentBasis::at(translation);
        // Compass headings turn clockwise seen from above, i.e. negative about up
        let heading = DQuat::from_rotation_y(-heading_degrees.to_radians());

        EntityTransform {
            translation,
            rotation: basis.rotation() * heading * self.model_correction,
        }
    }

    /// Remove the route curve, airport markers, and aircraft. Idempotent;
    /// the globe stays.
    pub fn clear(&mut self) {
        let before = self.entities.len();
        self.entities.retain(|kind, _| *kind == SceneEntityKind::Globe);
        if self.entities.len() != before {
            self.revision += 1;
        }
    }

    /// Remove the route curve and airport markers, keeping the aircraft.
    pub fn remove_route(&mut self) {
        let removed = [
            SceneEntityKind::RouteCurve,
            SceneEntityKind::AirportMarker(AirportRole::Departure),
            SceneEntityKind::AirportMarker(AirportRole::Arrival),
        ]
        .iter()
        .filter(|kind| self.entities.remove(*kind).is_some())
        .count();
        if removed > 0 {
            self.revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route;

    const EPS: f64 = 1e-9;
    const LHR: GeoPoint = GeoPoint { latitude: 51.4700, longitude: -0.4543 };
    const JFK: GeoPoint = GeoPoint { latitude: 40.6413, longitude: -73.7781 };

    fn scene() -> SceneState {
        SceneState::new(2.0, 0.05, DQuat::IDENTITY)
    }

    #[test]
    fn new_scene_has_only_globe() {
        let scene = scene();
        assert!(scene.contains(SceneEntityKind::Globe));
        assert_eq!(scene.iter().count(), 1);
    }

    #[test]
    fn set_route_places_markers_and_curve() {
        let mut scene = scene();
        let path = route::sample(LHR, JFK, 20);
        scene.set_route(&path);

        let dep = scene.get(SceneEntityKind::AirportMarker(AirportRole::Departure)).unwrap();
        assert_eq!(dep.location, Some(LHR));
        assert!((dep.transform.translation.length() - 2.05).abs() < EPS);
        let arr = scene.get(SceneEntityKind::AirportMarker(AirportRole::Arrival)).unwrap();
        assert_eq!(arr.location, Some(JFK));

        let curve = scene.get(SceneEntityKind::RouteCurve).unwrap();
        assert_eq!(curve.geometry.len(), 20);
        for v in &curve.geometry {
            assert!((v.length() - 2.01).abs() < EPS);
        }
    }

    #[test]
    fn set_route_replaces_previous_route() {
        let mut scene = scene();
        scene.set_route(&route::sample(LHR, JFK, 20));
        scene.set_route(&route::sample(JFK, LHR, 5));
        let dep = scene.get(SceneEntityKind::AirportMarker(AirportRole::Departure)).unwrap();
        assert_eq!(dep.location, Some(JFK));
        assert_eq!(scene.get(SceneEntityKind::RouteCurve).unwrap().geometry.len(), 5);
    }

    #[test]
    fn tangent_basis_is_orthonormal() {
        for p in [LHR, JFK, GeoPoint { latitude: -60.0, longitude: 170.0 }, GeoPoint { latitude: 90.0, longitude: 0.0 }] {
            let basis = TangentBasis::at(geo::to_cartesian(p, 2.0));
            assert!((basis.up.length() - 1.0).abs() < EPS);
            assert!((basis.east.length() - 1.0).abs() < EPS);
            assert!((basis.north.length() - 1.0).abs() < EPS);
            assert!(basis.up.dot(basis.east).abs() < EPS);
            assert!(basis.up.dot(basis.north).abs() < EPS);
            assert!(basis.east.dot(basis.north).abs() < EPS);
        }
    }

    #[test]
    fn tangent_basis_points_north_and_east() {
        let origin = geo::to_cartesian(GeoPoint { latitude: 0.0, longitude: 0.0 }, 1.0);
        let basis = TangentBasis::at(origin);
        assert!((basis.north - DVec3::Y).length() < EPS);

        // East is the direction of increasing longitude
        let a = geo::to_cartesian(GeoPoint { latitude: 10.0, longitude: 20.0 }, 1.0);
        let b = geo::to_cartesian(GeoPoint { latitude: 10.0, longitude: 20.001 }, 1.0);
        let east = TangentBasis::at(a).east;
        assert!((b - a).normalize().dot(east) > 0.999);
    }

    #[test]
    fn aircraft_pose_sits_above_surface() {
        let mut scene = scene();
        scene.set_aircraft_pose(LHR, 0.0).unwrap();
        let aircraft = scene.aircraft().unwrap();
        assert!((aircraft.transform.translation.length() - 2.05).abs() < EPS);
        assert_eq!(aircraft.heading, Some(0.0));
        assert_eq!(aircraft.location, Some(LHR));
    }

    #[test]
    fn aircraft_forward_follows_heading() {
        let scene = scene();
        let p = GeoPoint { latitude: 30.0, longitude: 45.0 };
        let basis = TangentBasis::at(geo::to_cartesian(p, 1.0));

        let north = scene.aircraft_transform(p, 0.0).rotation * DVec3::NEG_Z;
        assert!((north - basis.north).length() < 1e-9);

        let east = scene.aircraft_transform(p, 90.0).rotation * DVec3::NEG_Z;
        assert!((east - basis.east).length() < 1e-9);

        let up = scene.aircraft_transform(p, 137.0).rotation * DVec3::Y;
        assert!((up - basis.up).length() < 1e-9);
    }

    #[test]
    fn model_correction_is_applied_in_model_space() {
        let corrected = SceneState::new(2.0, 0.05, DQuat::from_rotation_y(std::f64::consts::PI));
        let p = GeoPoint { latitude: 0.0, longitude: 0.0 };
        let basis = TangentBasis::at(geo::to_cartesian(p, 1.0));
        // A model whose nose is +Z ends up facing north at heading 0
        let nose = corrected.aircraft_transform(p, 0.0).rotation * DVec3::Z;
        assert!((nose - basis.north).length() < 1e-9);
    }

    #[test]
    fn invalid_pose_keeps_previous() {
        let mut scene = scene();
        scene.set_aircraft_pose(LHR, 10.0).unwrap();
        let before = scene.aircraft().cloned();
        let revision = scene.revision();

        let bad = GeoPoint { latitude: f64::NAN, longitude: 0.0 };
        assert!(scene.set_aircraft_pose(bad, 0.0).is_err());
        assert!(scene.set_aircraft_pose(JFK, f64::NAN).is_err());
        assert_eq!(scene.aircraft().cloned(), before);
        assert_eq!(scene.revision(), revision);
    }

    #[test]
    fn clear_is_idempotent_and_keeps_globe() {
        let mut scene = scene();
        scene.set_route(&route::sample(LHR, JFK, 10));
        scene.set_aircraft_pose(LHR, 0.0).unwrap();

        scene.clear();
        let revision = scene.revision();
        assert_eq!(scene.iter().count(), 1);
        assert!(scene.contains(SceneEntityKind::Globe));

        scene.clear();
        assert_eq!(scene.revision(), revision);
        assert_eq!(scene.iter().count(), 1);
    }

    #[test]
    fn entity_transform_narrows_to_bevy() {
        let t = EntityTransform {
            translation: DVec3::new(1.0, 2.0, 3.0),
            rotation: DQuat::IDENTITY,
        }
        .to_transform();
        assert_eq!(t.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::ONE);
    }
}
