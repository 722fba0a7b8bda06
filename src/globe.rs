//! Rendering surface: camera, lights, the textured globe, and the mirror of
//! the scene table onto Bevy entities.

use bevy::math::DQuat;
use bevy::prelude::*;
use bevy::window::WindowResized;
use std::collections::HashMap;

use crate::camera::{OrbitCamera, OrbitState};
use crate::config::AppConfig;
use crate::scene::{AirportRole, SceneEntityKind, SceneState};
use crate::tracker::FlightView;

// =============================================================================
// Constants
// =============================================================================

const EARTH_TEXTURE: &str = "earth_texture.jpg";
const AIRCRAFT_MODEL: &str = "airplane.glb#Scene0";

const CAMERA_FOV_DEGREES: f32 = 75.0;
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 1000.0;

const AIRPORT_MARKER_RADIUS: f32 = 0.02;
const AIRCRAFT_SCALE: f32 = 0.015;

const DEPARTURE_COLOR: Color = Color::srgb(0.0, 1.0, 0.0);
const ARRIVAL_COLOR: Color = Color::srgb(1.0, 0.27, 0.0);
const ROUTE_COLOR: Color = Color::srgb(1.0, 0.85, 0.2);

/// Bevy's UV sphere has its poles on ±Z and texture u=0 on +X. Turning
/// mesh (X, Y, Z) into (-X, Z, Y) puts the north pole on +Y and lat/lng
/// (0, 0) on +X, matching [`crate::geo::to_cartesian`].
pub fn globe_rotation() -> Quat {
    Quat::from_mat3(&Mat3::from_cols(Vec3::NEG_X, Vec3::Z, Vec3::Y))
}

pub fn globe_mesh(radius: f32) -> Mesh {
    Sphere::new(radius).mesh().uv(64, 32)
}

/// The airplane model's nose points along +Z; Bevy's forward is -Z.
pub fn aircraft_model_correction() -> DQuat {
    DQuat::from_rotation_y(std::f64::consts::PI)
}

// =============================================================================
// Components and Resources
// =============================================================================

#[derive(Component)]
pub struct GlobeMesh;

/// Bevy entity mirroring one row of the scene table.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneBinding(pub SceneEntityKind);

#[derive(Resource)]
pub struct GlobeAssets {
    pub aircraft: Handle<Scene>,
    pub marker_mesh: Handle<Mesh>,
    pub departure_material: Handle<StandardMaterial>,
    pub arrival_material: Handle<StandardMaterial>,
}

/// Which table rows currently have a Bevy entity, and the scene revision
/// last mirrored.
#[derive(Resource, Default)]
pub struct SceneBindings {
    entities: HashMap<SceneEntityKind, Entity>,
    mirrored_revision: Option<u64>,
}

/// Work needed to bring the bound entities in line with the scene table.
#[derive(Debug, Default, PartialEq)]
pub struct SyncPlan {
    pub spawn: Vec<SceneEntityKind>,
    pub update: Vec<SceneEntityKind>,
    pub despawn: Vec<SceneEntityKind>,
}

/// Rows that get their own Bevy entity. The globe is spawned once at
/// startup and the route curve is drawn with gizmos.
fn is_bound_kind(kind: SceneEntityKind) -> bool {
    matches!(kind, SceneEntityKind::AirportMarker(_) | SceneEntityKind::AircraftMarker)
}

pub fn plan_sync<T>(scene: &SceneState, bound: &HashMap<SceneEntityKind, T>) -> SyncPlan {
    let mut plan = SyncPlan::default();
    for (kind, _) in scene.iter() {
        if !is_bound_kind(*kind) {
            continue;
        }
        if bound.contains_key(kind) {
            plan.update.push(*kind);
        } else {
            plan.spawn.push(*kind);
        }
    }
    let mut stale: Vec<SceneEntityKind> = bound
        .keys()
        .filter(|kind| !scene.contains(**kind))
        .copied()
        .collect();
    stale.sort();
    plan.despawn = stale;
    plan
}

/// Aspect ratio for a window size, `None` while minimised.
pub fn aspect_ratio(width: f32, height: f32) -> Option<f32> {
    (width > 0.0 && height > 0.0).then(|| width / height)
}

// =============================================================================
// Systems
// =============================================================================

pub fn setup_globe(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    asset_server: Res<AssetServer>,
    config: Res<AppConfig>,
    orbit: Res<OrbitState>,
) {
    commands.spawn((
        Name::new("Globe Camera"),
        OrbitCamera,
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: CAMERA_FOV_DEGREES.to_radians(),
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
            ..default()
        }),
        orbit.transform(),
    ));

    let globe_material = materials.add(StandardMaterial {
        base_color_texture: Some(asset_server.load(EARTH_TEXTURE)),
        unlit: true,
        ..default()
    });
    commands.spawn((
        Name::new("Globe"),
        GlobeMesh,
        Mesh3d(meshes.add(globe_mesh(config.globe.radius as f32))),
        MeshMaterial3d(globe_material),
        Transform::from_rotation(globe_rotation()),
    ));

    commands.insert_resource(GlobalAmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
        ..default()
    });
    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            illuminance: 3000.0,
            ..default()
        },
        Transform::from_xyz(5.0, 3.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.insert_resource(GlobeAssets {
        aircraft: asset_server.load(AIRCRAFT_MODEL),
        marker_mesh: meshes.add(Sphere::new(AIRPORT_MARKER_RADIUS).mesh().uv(16, 8)),
        departure_material: materials.add(StandardMaterial {
            base_color: DEPARTURE_COLOR,
            unlit: true,
            ..default()
        }),
        arrival_material: materials.add(StandardMaterial {
            base_color: ARRIVAL_COLOR,
            unlit: true,
            ..default()
        }),
    });
    info!("Globe ready (radius {})", config.globe.radius);
}

/// Mirror the scene table onto Bevy entities whenever its revision moves.
///
/// The aircraft model is spawned only once its glTF scene has loaded; until
/// then the revision is left unmirrored so the next frame tries again.
pub fn sync_scene_entities(
    mut commands: Commands,
    view: Option<Res<FlightView>>,
    assets: Option<Res<GlobeAssets>>,
    asset_server: Res<AssetServer>,
    mut bindings: ResMut<SceneBindings>,
    mut transforms: Query<&mut Transform, With<SceneBinding>>,
) {
    let (Some(view), Some(assets)) = (view, assets) else {
        return;
    };
    let scene = view.scene();
    if bindings.mirrored_revision == Some(scene.revision()) {
        return;
    }

    let plan = plan_sync(scene, &bindings.entities);
    let mut complete = true;

    for kind in plan.despawn {
        if let Some(entity) = bindings.entities.remove(&kind) {
            commands.entity(entity).despawn();
        }
    }

    for kind in plan.update {
        let (Some(row), Some(entity)) = (scene.get(kind), bindings.entities.get(&kind)) else {
            continue;
        };
        if let Ok(mut transform) = transforms.get_mut(*entity) {
            *transform = bound_transform(kind, row.transform.to_transform());
        }
    }

    for kind in plan.spawn {
        let Some(row) = scene.get(kind) else {
            continue;
        };
        let transform = bound_transform(kind, row.transform.to_transform());
        let entity = match kind {
            SceneEntityKind::AirportMarker(role) => {
                let (name, material) = match role {
                    AirportRole::Departure => ("Departure Marker", assets.departure_material.clone()),
                    AirportRole::Arrival => ("Arrival Marker", assets.arrival_material.clone()),
                };
                commands
                    .spawn((
                        Name::new(name),
                        SceneBinding(kind),
                        Mesh3d(assets.marker_mesh.clone()),
                        MeshMaterial3d(material),
                        transform,
                    ))
                    .id()
            }
            SceneEntityKind::AircraftMarker => {
                if !asset_server.is_loaded_with_dependencies(&assets.aircraft) {
                    complete = false;
                    continue;
                }
                debug!("Spawning aircraft model");
                commands
                    .spawn((
                        Name::new("Aircraft"),
                        SceneBinding(kind),
                        SceneRoot(assets.aircraft.clone()),
                        transform,
                    ))
                    .id()
            }
            SceneEntityKind::Globe | SceneEntityKind::RouteCurve => continue,
        };
        bindings.entities.insert(kind, entity);
    }

    if complete {
        bindings.mirrored_revision = Some(scene.revision());
    }
}

fn bound_transform(kind: SceneEntityKind, transform: Transform) -> Transform {
    match kind {
        SceneEntityKind::AircraftMarker => transform.with_scale(Vec3::splat(AIRCRAFT_SCALE)),
        _ => transform,
    }
}

pub fn draw_route(mut gizmos: Gizmos, view: Option<Res<FlightView>>) {
    let Some(view) = view else {
        return;
    };
    let Some(curve) = view.scene().get(SceneEntityKind::RouteCurve) else {
        return;
    };
    gizmos.linestrip(curve.geometry.iter().map(|v| v.as_vec3()), ROUTE_COLOR);
}

/// Keep the perspective aspect ratio matched to the window.
pub fn handle_window_resize(
    mut resize_events: MessageReader<WindowResized>,
    mut projections: Query<&mut Projection, With<OrbitCamera>>,
) {
    for event in resize_events.read() {
        let Some(aspect) = aspect_ratio(event.width, event.height) else {
            continue;
        };
        for mut projection in projections.iter_mut() {
            if let Projection::Perspective(ref mut perspective) = *projection {
                perspective.aspect_ratio = aspect;
            }
        }
    }
}

/// Keeps Bevy entities in line with the scene table. Runs after fetch
/// results and the animation tick so a frame shows that frame's pose.
pub struct SceneMirrorPlugin;

impl Plugin for SceneMirrorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneBindings>().add_systems(
            Update,
            sync_scene_entities
                .after(crate::telemetry::connection::apply_feed_results)
                .after(crate::tracker::advance_animation),
        );
    }
}

pub struct GlobePlugin;

impl Plugin for GlobePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(SceneMirrorPlugin)
            .add_systems(Startup, setup_globe)
            .add_systems(Update, (draw_route, handle_window_resize));
    }
}
