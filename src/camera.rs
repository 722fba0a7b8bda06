use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::EguiContexts;

// =============================================================================
// Constants
// =============================================================================

/// Fraction of the pending rotation applied each frame; the rest carries over.
pub const DAMPING_FACTOR: f32 = 0.05;

pub const DEFAULT_DISTANCE: f32 = 5.0;
const MIN_DISTANCE: f32 = 2.5;
const MAX_DISTANCE: f32 = 20.0;

/// Radians of orbit per pixel of drag
const ORBIT_SENSITIVITY: f32 = 0.01;
const ZOOM_SENSITIVITY: f32 = 0.1;
const MAX_PITCH: f32 = 1.55;

// =============================================================================
// Components and Resources
// =============================================================================

/// Marker for the camera orbiting the globe.
#[derive(Component)]
pub struct OrbitCamera;

/// Orbit around the globe centre. Yaw 0 and pitch 0 put the camera on +Z.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct OrbitState {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    /// Rotation still to be applied, drained by damping
    pending_yaw: f32,
    pending_pitch: f32,
}

impl Default for OrbitState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: DEFAULT_DISTANCE,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
        }
    }
}

impl OrbitState {
    /// Queue rotation for a drag of `delta` pixels.
    pub fn drag(&mut self, delta: Vec2) {
        self.pending_yaw -= delta.x * ORBIT_SENSITIVITY;
        self.pending_pitch += delta.y * ORBIT_SENSITIVITY;
    }

    /// Zoom by `lines` scroll lines; positive moves closer.
    pub fn zoom(&mut self, lines: f32) {
        let scale = (1.0 - lines * ZOOM_SENSITIVITY).max(0.1);
        self.distance = (self.distance * scale).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Apply one frame of damped rotation.
    pub fn step(&mut self) {
        self.yaw = (self.yaw + self.pending_yaw * DAMPING_FACTOR).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + self.pending_pitch * DAMPING_FACTOR).clamp(-MAX_PITCH, MAX_PITCH);
        self.pending_yaw *= 1.0 - DAMPING_FACTOR;
        self.pending_pitch *= 1.0 - DAMPING_FACTOR;
    }

    pub fn is_settled(&self) -> bool {
        self.pending_yaw.abs() < 1e-4 && self.pending_pitch.abs() < 1e-4
    }

    pub fn transform(&self) -> Transform {
        let position = Vec3::new(
            self.distance * self.pitch.cos() * self.yaw.sin(),
            self.distance * self.pitch.sin(),
            self.distance * self.pitch.cos() * self.yaw.cos(),
        );
        Transform::from_translation(position).looking_at(Vec3::ZERO, Vec3::Y)
    }
}

// =============================================================================
// Systems
// =============================================================================

/// Drag to rotate, scroll to zoom. Ignored while the pointer is over a panel.
pub fn handle_orbit_input(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut scroll_events: MessageReader<MouseWheel>,
    mut state: ResMut<OrbitState>,
    mut contexts: EguiContexts,
) {
    if let Ok(ctx) = contexts.ctx_mut() {
        if ctx.is_pointer_over_area() {
            mouse_motion.clear();
            scroll_events.clear();
            return;
        }
    }

    if mouse_button.pressed(MouseButton::Left) {
        for event in mouse_motion.read() {
            state.drag(event.delta);
        }
    } else {
        mouse_motion.clear();
    }

    for event in scroll_events.read() {
        let lines = match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y * 0.01,
        };
        state.zoom(lines);
    }
}

pub fn update_orbit_camera(
    mut state: ResMut<OrbitState>,
    mut camera: Query<&mut Transform, With<OrbitCamera>>,
) {
    if !state.is_settled() {
        state.step();
    }
    if let Ok(mut transform) = camera.single_mut() {
        *transform = state.transform();
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrbitState>()
            .add_systems(Update, (handle_orbit_input, update_orbit_camera.after(handle_orbit_input)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_sits_on_positive_z() {
        let t = OrbitState::default().transform();
        assert!((t.translation - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
        // Looking at the origin
        assert!((t.forward().as_vec3() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn drag_is_applied_gradually() {
        let mut state = OrbitState::default();
        state.drag(Vec2::new(-100.0, 0.0));
        state.step();
        let first = state.yaw;
        assert!((first - 1.0 * DAMPING_FACTOR).abs() < 1e-5);

        state.step();
        let second = state.yaw - first;
        assert!(second < first);
        assert!(second > 0.0);
    }

    #[test]
    fn damping_converges_to_full_drag() {
        let mut state = OrbitState::default();
        state.drag(Vec2::new(-50.0, 0.0));
        for _ in 0..500 {
            state.step();
        }
        assert!(state.is_settled());
        assert!((state.yaw - 0.5).abs() < 1e-3);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut state = OrbitState::default();
        state.drag(Vec2::new(0.0, 100_000.0));
        for _ in 0..100 {
            state.step();
        }
        assert!(state.pitch <= MAX_PITCH);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut state = OrbitState::default();
        state.zoom(1.0);
        assert!(state.distance < DEFAULT_DISTANCE);
        for _ in 0..100 {
            state.zoom(5.0);
        }
        assert_eq!(state.distance, MIN_DISTANCE);
        for _ in 0..100 {
            state.zoom(-5.0);
        }
        assert_eq!(state.distance, MAX_DISTANCE);
    }
}
