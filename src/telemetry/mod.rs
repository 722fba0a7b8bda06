pub mod client;
pub mod connection;
pub mod gate;

pub use connection::{FlightFeed, SearchState};

use bevy::prelude::*;

use connection::{apply_feed_results, poll_tracked_flight, setup_flight_feed, teardown_on_exit};

/// Background flight and route fetching, polling, and application of the
/// results to the tracked flight.
pub struct TelemetryPlugin;

impl Plugin for TelemetryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_flight_feed)
            .add_systems(
                Update,
                (poll_tracked_flight, apply_feed_results.after(poll_tracked_flight)),
            )
            .add_systems(Last, teardown_on_exit);
    }
}
