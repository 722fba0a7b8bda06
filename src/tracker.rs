//! The tracked flight: scene, route and animation state plus the handlers
//! that move it between states.
//!
//! Fetch completions call [`FlightView::on_telemetry`] and
//! [`FlightView::on_route`]; the frame loop calls [`FlightView::on_frame`].
//! Nothing here touches the network or the clock directly.

use bevy::math::DQuat;
use bevy::prelude::*;

use crate::animation::{AnimatedPose, AnimationDriver, AnimationState};
use crate::config::{AppConfig, GlobeConfig};
use crate::geo::{self, GeoError, GeoPoint};
use crate::route::{self, RoutePath};
use crate::scene::SceneState;
use crate::telemetry::client::{FlightSample, RouteData};

/// Who currently decides where the aircraft marker sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseSource {
    /// No marker placed yet
    None,
    /// Raw telemetry, no route loaded
    Telemetry,
    /// Telemetry snapped onto the loaded route
    RouteSnapped,
    /// Animation cursor along the loaded route
    Animation,
}

impl std::fmt::Display for PoseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            PoseSource::None => "Not placed",
            PoseSource::Telemetry => "Live position",
            PoseSource::RouteSnapped => "Snapped to route",
            PoseSource::Animation => "Animated along route",
        };
        f.write_str(text)
    }
}

/// Snapshot of how the marker is being driven, for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingStatus {
    pub source: PoseSource,
    /// Animation cursor in [0, 1), only while the animation runs
    pub progress: Option<f64>,
    /// Route sample the marker sits on, with the route's sample count
    pub route_sample: Option<(usize, usize)>,
}

#[derive(Resource, Debug, Clone)]
pub struct FlightView {
    scene: SceneState,
    animation: AnimationDriver,
    route: Option<RoutePath>,
    route_data: Option<RouteData>,
    sample: Option<FlightSample>,
    route_index: Option<usize>,
    route_samples: usize,
    animate: bool,
    torn_down: bool,
}

impl FlightView {
    pub fn new(settings: &GlobeConfig, model_correction: DQuat) -> Self {
        Self {
            scene: SceneState::new(settings.radius, settings.marker_altitude, model_correction),
            animation: AnimationDriver::new(settings.animation_speed),
            route: None,
            route_data: None,
            sample: None,
            route_index: None,
            route_samples: settings.route_samples,
            animate: settings.animate,
            torn_down: false,
        }
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn route(&self) -> Option<&RoutePath> {
        self.route.as_ref()
    }

    pub fn route_data(&self) -> Option<&RouteData> {
        self.route_data.as_ref()
    }

    pub fn sample(&self) -> Option<&FlightSample> {
        self.sample.as_ref()
    }

    pub fn animation_state(&self) -> AnimationState {
        self.animation.state()
    }

    pub fn tracking_status(&self) -> TrackingStatus {
        let state = self.animation_state();
        TrackingStatus {
            source: self.pose_source(),
            progress: state.is_running.then_some(state.progress),
            route_sample: self
                .route()
                .zip(self.route_index)
                .map(|(path, index)| (index, path.len())),
        }
    }

    /// The frame loop needs to keep ticking.
    pub fn is_animating(&self) -> bool {
        self.animation.is_scheduled()
    }

    pub fn animate(&self) -> bool {
        self.animate
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn pose_source(&self) -> PoseSource {
        if self.scene.aircraft().is_none() {
            PoseSource::None
        } else if self.route.is_none() {
            PoseSource::Telemetry
        } else if self.animation.is_scheduled() {
            PoseSource::Animation
        } else {
            PoseSource::RouteSnapped
        }
    }

    /// A route resolved. Builds the path, replaces the route in the scene,
    /// rewinds the animation and places the aircraft at its starting pose.
    ///
    /// Invalid airport coordinates reject the route and keep the previous one.
    pub fn on_route(&mut self, data: RouteData) -> Result<(), GeoError> {
        if self.torn_down {
            return Ok(());
        }
        let departure = data.departure.point()?;
        let arrival = data.arrival.point()?;

        let path = route::sample(departure, arrival, self.route_samples);
        self.scene.set_route(&path);
        info!(
            "Route {} -> {} loaded ({} samples)",
            data.departure.code,
            data.arrival.code,
            path.len()
        );

        self.animation.reset();
        if self.animate {
            self.animation.start();
        } else {
            self.animation.stop();
        }

        // The animation always starts from the departure end. Otherwise
        // telemetry snapped onto the path, else the departure end.
        let snapped = if self.animate {
            None
        } else {
            self.sample_position()
                .and_then(|p| route::nearest_point_and_bearing(&path, p))
        };
        let (index, point, heading) = snapped
            .map(|nearest| (nearest.index, nearest.point, nearest.bearing))
            .unwrap_or((0, departure, path.heading_at(0)));
        match self.scene.set_aircraft_pose(point, heading) {
            Ok(()) => self.route_index = Some(index),
            Err(e) => warn!("Could not place aircraft on new route: {}", e),
        }

        self.route = Some(path);
        self.route_data = Some(data);
        Ok(())
    }

    /// A telemetry sample arrived. It replaces the previous sample wholesale.
    ///
    /// With no route the marker goes straight to the reported position. With
    /// a route and animation off, the position is snapped onto the route.
    /// While the animation runs it owns the marker and telemetry only
    /// updates the stored sample.
    pub fn on_telemetry(&mut self, sample: FlightSample) {
        if self.torn_down {
            return;
        }
        let previous = self.sample_position();
        self.sample = Some(sample);

        if self.animation.is_scheduled() {
            return;
        }
        let Some(position) = self.sample_position() else {
            debug!("Telemetry sample has no position, keeping marker");
            return;
        };

        let (point, heading, index) = match &self.route {
            Some(path) => match route::nearest_point_and_bearing(path, position) {
                Some(nearest) => (nearest.point, nearest.bearing, Some(nearest.index)),
                None => return,
            },
            None => (position, self.heading_from(previous, position), None),
        };

        match self.scene.set_aircraft_pose(point, heading) {
            Ok(()) => self.route_index = index,
            Err(e) => warn!("Rejected telemetry position: {}", e),
        }
    }

    /// One rendered frame at monotonic time `now_secs`.
    pub fn on_frame(&mut self, now_secs: f64) -> Option<AnimatedPose> {
        if self.torn_down {
            return None;
        }
        let path = self.route.as_ref()?;
        let pose = self.animation.tick(now_secs, path, &mut self.scene)?;
        self.route_index = Some(pose.index);
        Some(pose)
    }

    /// Turn route animation on or off. Switching off hands the marker back
    /// to telemetry snapped onto the route.
    pub fn set_animate(&mut self, animate: bool) {
        if self.animate == animate {
            return;
        }
        self.animate = animate;
        if self.route.is_none() || self.torn_down {
            return;
        }

        if animate {
            self.animation.start();
        } else {
            self.animation.stop();
            if let Some(sample) = self.sample.take() {
                self.on_telemetry(sample);
            }
        }
    }

    /// Drop the route: stop the animation, remove the curve and airport
    /// markers. The aircraft falls back to raw telemetry if there is any.
    pub fn clear_route(&mut self) {
        self.animation.stop();
        self.animation.reset();
        self.scene.remove_route();
        if let Some(data) = self.route_data.take() {
            info!("Route {} -> {} cleared", data.departure.code, data.arrival.code);
        }
        self.route = None;
        self.route_index = None;

        if let Some(position) = self.sample_position() {
            let heading = self.heading_from(None, position);
            if let Err(e) = self.scene.set_aircraft_pose(position, heading) {
                warn!("Rejected telemetry position: {}", e);
            }
        }
    }

    /// Forget everything about the current flight. Used when a new search
    /// starts or a search fails.
    pub fn reset(&mut self) {
        self.animation.stop();
        self.animation.reset();
        self.route = None;
        self.route_data = None;
        self.sample = None;
        self.route_index = None;
        self.scene.clear();
    }

    /// Stop the frame subscription for good. Later fetch completions and
    /// frame ticks are ignored.
    pub fn teardown(&mut self) {
        self.animation.stop();
        self.torn_down = true;
        debug!("Flight view torn down");
    }

    fn sample_position(&self) -> Option<GeoPoint> {
        self.sample.as_ref().and_then(|s| s.position)
    }

    /// Heading for a telemetry-placed marker: toward the new position from
    /// the previous one, else whatever the marker had, else north.
    fn heading_from(&self, previous: Option<GeoPoint>, position: GeoPoint) -> f64 {
        match previous {
            Some(prev) if prev != position => geo::bearing(prev, position),
            _ => self
                .scene
                .aircraft()
                .and_then(|a| a.heading)
                .unwrap_or(0.0),
        }
    }
}

fn init_flight_view(mut commands: Commands, config: Res<AppConfig>) {
    commands.insert_resource(FlightView::new(
        &config.globe,
        crate::globe::aircraft_model_correction(),
    ));
}

fn animation_scheduled(view: Option<Res<FlightView>>) -> bool {
    view.is_some_and(|v| v.is_animating())
}

/// Frame tick for the route animation, on wall-clock time.
pub fn advance_animation(time: Res<Time<Real>>, mut view: ResMut<FlightView>) {
    view.on_frame(time.elapsed_secs_f64());
}

pub struct TrackerPlugin;

impl Plugin for TrackerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, init_flight_view)
            .add_systems(
                Update,
                advance_animation
                    .run_if(animation_scheduled)
                    .after(crate::telemetry::connection::apply_feed_results),
            );
    }
}
