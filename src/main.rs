use bevy::prelude::*;
use bevy_egui::EguiPlugin;

mod animation;
mod camera;
mod config;
mod geo;
mod globe;
mod panels;
mod route;
mod scene;
mod telemetry;
mod tracker;
mod units;

use camera::CameraPlugin;
use config::ConfigPlugin;
use globe::GlobePlugin;
use panels::PanelsPlugin;
use telemetry::TelemetryPlugin;
use tracker::TrackerPlugin;

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Flight Globe - Live Flight Tracker".to_string(),
                    resolution: (1280, 720).into(),
                    ..default()
                }),
                ..default()
            }),
            EguiPlugin::default(),
            ConfigPlugin,
        ))
        .insert_resource(ClearColor(Color::BLACK))
        .add_plugins((
            CameraPlugin,
            GlobePlugin,
            TrackerPlugin,
            TelemetryPlugin,
            PanelsPlugin,
        ))
        .run();
}
