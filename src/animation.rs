//! Route animation: advances a progress cursor along the sampled route once
//! per frame and pushes the resulting aircraft pose into the scene.

use bevy::prelude::*;

use crate::geo::{self, GeoPoint};
use crate::route::RoutePath;
use crate::scene::SceneState;

/// Default cursor speed: one full route every 20 seconds.
pub const DEFAULT_ANIMATION_SPEED: f64 = 0.05;

/// Token for the per-frame tick subscription. While the driver holds one,
/// the frame loop keeps calling [`AnimationDriver::tick`]; dropping it via
/// [`AnimationDriver::stop`] cancels the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(u64);

/// Progress cursor in [0, 1) and whether the tick loop is live.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimationState {
    pub progress: f64,
    pub is_running: bool,
}

/// Pose derived from the cursor on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatedPose {
    pub index: usize,
    pub position: GeoPoint,
    pub heading: f64,
}

#[derive(Debug, Clone)]
pub struct AnimationDriver {
    state: AnimationState,
    /// Progress units per second of wall-clock time
    speed: f64,
    last_tick: Option<f64>,
    handle: Option<FrameHandle>,
    next_handle: u64,
}

impl AnimationDriver {
    pub fn new(speed: f64) -> Self {
        Self {
            state: AnimationState::default(),
            speed,
            last_tick: None,
            handle: None,
            next_handle: 1,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.is_some()
    }

    /// Subscribe to frame ticks. Returns the live handle; starting an
    /// already running driver keeps its current handle.
    pub fn start(&mut self) -> FrameHandle {
        if let Some(handle) = self.handle {
            return handle;
        }
        let handle = FrameHandle(self.next_handle);
        self.next_handle += 1;
        self.handle = Some(handle);
        self.state.is_running = true;
        self.last_tick = None;
        debug!("Route animation started ({:?})", handle);
        handle
    }

    /// Cancel the frame subscription. The cursor keeps its position.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Route animation stopped ({:?})", handle);
        }
        self.state.is_running = false;
        self.last_tick = None;
    }

    /// Rewind the cursor to the departure end. The next tick measures its
    /// delta from scratch.
    pub fn reset(&mut self) {
        self.state.progress = 0.0;
        self.last_tick = None;
    }

    /// One frame. `now_secs` is a monotonic wall-clock reading.
    ///
    /// The first tick after a start or reset advances by zero. The cursor
    /// wraps to 0 as soon as it reaches 1, and the wrapping tick still
    /// updates the pose. Returns `None` without touching the scene when the
    /// driver is stopped or the path is empty.
    pub fn tick(&mut self, now_secs: f64, path: &RoutePath, scene: &mut SceneState) -> Option<AnimatedPose> {
        if self.handle.is_none() || path.is_empty() {
            return None;
        }

        let delta = match self.last_tick {
            Some(previous) => (now_secs - previous).max(0.0),
            None => 0.0,
        };
        self.last_tick = Some(now_secs);

        let mut progress = self.state.progress + delta * self.speed;
        if !progress.is_finite() || progress >= 1.0 {
            progress = 0.0;
        }
        self.state.progress = progress;

        let pose = pose_at(path, progress)?;
        if let Err(e) = scene.set_aircraft_pose(pose.position, pose.heading) {
            warn!("Skipping animated pose: {}", e);
            return None;
        }
        Some(pose)
    }
}

impl Default for AnimationDriver {
    fn default() -> Self {
        Self::new(DEFAULT_ANIMATION_SPEED)
    }
}

/// Map a cursor value onto a path sample and the heading toward the next one.
pub fn pose_at(path: &RoutePath, progress: f64) -> Option<AnimatedPose> {
    let len = path.len();
    if len == 0 {
        return None;
    }
    let last = len - 1;
    let index = ((progress * last as f64).floor().max(0.0) as usize).min(last);
    let next = (index + 1).min(last);

    let position = path.get(index)?;
    let heading = geo::bearing(position, path.get(next)?);
    Some(AnimatedPose { index, position, heading })
}
