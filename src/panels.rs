use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use crate::telemetry::client::{FlightRecord, FlightSample, RouteData};
use crate::telemetry::{FlightFeed, SearchState};
use crate::tracker::{FlightView, TrackingStatus};
use crate::units::{Degrees, Kilometers, KmPerHour, Meters};

const UNKNOWN: &str = "Unknown";
const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 60, 60);

const MODEL_CREDIT: &str = "Very cute airplane by Akash Rudra";
const MODEL_LICENSE_URL: &str = "https://creativecommons.org/licenses/by/3.0/";
const MODEL_SOURCE_URL: &str = "https://poly.pizza/m/3UtIosDm9u-";

/// Contents of the flight number field.
#[derive(Resource, Default, Debug, Clone)]
pub struct SearchForm {
    pub flight_number: String,
}

/// Whether the aircraft model credits are expanded.
#[derive(Resource, Default, Debug, Clone)]
pub struct AttributionNotice {
    pub open: bool,
}

/// Render the search panel. Returns the flight number when the user
/// submits the form.
pub fn render_search_panel_ui(
    ctx: &egui::Context,
    form: &mut SearchForm,
    search: &SearchState,
    tracked: Option<&str>,
) -> Option<String> {
    let mut submitted = None;

    egui::Window::new("Flight Search")
        .anchor(egui::Align2::LEFT_TOP, [12.0, 12.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut form.flight_number)
                    .hint_text("Flight number")
                    .desired_width(180.0),
            );
            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            let label = if search.is_loading { "Searching..." } else { "Track Flight" };
            let clicked = ui
                .add_enabled(!search.is_loading, egui::Button::new(label))
                .clicked();

            if (clicked || enter) && !search.is_loading && !form.flight_number.trim().is_empty() {
                submitted = Some(form.flight_number.trim().to_string());
            }

            ui.label(
                egui::RichText::new("Enter airline code and number, e.g. BA123")
                    .small()
                    .weak(),
            );

            if let Some(error) = &search.error {
                ui.colored_label(ERROR_COLOR, error);
            } else if let (Some(number), false) = (tracked, search.is_loading) {
                ui.label(format!("Tracking {}", number));
            }
        });

    submitted
}

/// The "i" toggle in the bottom corner and the CC-BY credits for the
/// aircraft model it opens.
pub fn render_attribution_ui(ctx: &egui::Context, notice: &mut AttributionNotice) {
    egui::Area::new(egui::Id::new("attribution_toggle"))
        .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -12.0])
        .show(ctx, |ui| {
            let toggle = ui
                .button(egui::RichText::new("i").italics())
                .on_hover_text("Copyright information");
            if toggle.clicked() {
                notice.open = !notice.open;
            }
        });

    if !notice.open {
        return;
    }
    egui::Window::new("Credits")
        .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -48.0])
        .resizable(false)
        .collapsible(false)
        .open(&mut notice.open)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(MODEL_CREDIT);
                ui.hyperlink_to("[CC-BY]", MODEL_LICENSE_URL);
            });
            ui.horizontal(|ui| {
                ui.label("via");
                ui.hyperlink_to("Poly Pizza", MODEL_SOURCE_URL);
            });
        });
}

fn speed_text(sample: Option<&FlightSample>) -> String {
    sample
        .and_then(|s| s.speed)
        .map(|v| KmPerHour(v).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn altitude_text(sample: Option<&FlightSample>) -> String {
    sample
        .and_then(|s| s.altitude)
        .map(|v| Meters(v).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn position_text(sample: Option<&FlightSample>) -> String {
    sample
        .and_then(|s| s.position)
        .map(|p| format!("{:.4}, {:.4}", p.latitude, p.longitude))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { UNKNOWN } else { value }
}

/// Render the flight information panel. `animate` is the route animation
/// toggle; returns true when the user flipped it.
pub fn render_info_panel_ui(
    ctx: &egui::Context,
    record: &FlightRecord,
    route: Option<&RouteData>,
    status: &TrackingStatus,
    animate: &mut bool,
) -> bool {
    let sample = record.telemetry.as_ref();
    let flight_status = sample.map(|s| s.status.to_string()).unwrap_or_else(|| UNKNOWN.to_string());
    let mut changed = false;

    egui::Window::new("Flight Information")
        .anchor(egui::Align2::RIGHT_TOP, [-12.0, 12.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            egui::Grid::new("flight_info_grid")
                .num_columns(2)
                .spacing([12.0, 4.0])
                .show(ui, |ui| {
                    let rows = [
                        ("Flight:", or_unknown(record.display_flight()).to_string()),
                        ("Airline:", or_unknown(record.display_airline()).to_string()),
                        ("From:", or_unknown(record.display_departure()).to_string()),
                        ("To:", or_unknown(record.display_arrival()).to_string()),
                        ("Status:", flight_status.clone()),
                        ("Speed:", speed_text(sample)),
                        ("Altitude:", altitude_text(sample)),
                        ("Position:", position_text(sample)),
                        ("Marker:", status.source.to_string()),
                    ];
                    for (label, value) in rows {
                        ui.label(label);
                        ui.label(value);
                        ui.end_row();
                    }
                });

            if let Some(route) = route {
                ui.separator();
                ui.label(format!("{} ({})", route.departure.name, route.departure.code));
                ui.label(format!("{} ({})", route.arrival.name, route.arrival.code));
                if let Some(distance) = route.distance_km() {
                    ui.label(format!("Distance: {}", Kilometers(distance)));
                }
                if let Some(bearing) = route.initial_bearing() {
                    let bearing = Degrees(bearing);
                    ui.label(format!("Bearing: {} {}", bearing, bearing.to_cardinal()));
                }
                if let Some(progress) = status.progress {
                    ui.label(format!("Progress: {:.0}%", progress * 100.0));
                }
                if let Some((index, len)) = status.route_sample {
                    ui.label(format!("Route sample: {} / {}", index + 1, len));
                }
                changed = ui.checkbox(animate, "Animate route").changed();
            }
        });

    changed
}

/// Bevy system drawing both panels and forwarding user actions.
pub fn render_flight_panels(
    mut contexts: EguiContexts,
    mut form: ResMut<SearchForm>,
    mut notice: ResMut<AttributionNotice>,
    feed: Option<ResMut<FlightFeed>>,
    view: Option<ResMut<FlightView>>,
) {
    let (Some(mut feed), Some(mut view)) = (feed, view) else {
        return;
    };
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };

    render_attribution_ui(ctx, &mut notice);

    let submitted = render_search_panel_ui(ctx, &mut form, feed.search_state(), feed.tracked());
    if let Some(number) = submitted {
        info!("Tracking flight {}", number);
        feed.search(&number, &mut view);
    }

    let Some(record) = feed.search_state().record.clone() else {
        return;
    };
    let mut animate = view.animate();
    let status = view.tracking_status();
    if render_info_panel_ui(ctx, &record, view.route_data(), &status, &mut animate) {
        view.set_animate(animate);
    }
}

pub struct PanelsPlugin;

impl Plugin for PanelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SearchForm>()
            .init_resource::<AttributionNotice>()
            .add_systems(EguiPrimaryContextPass, render_flight_panels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::telemetry::client::{Airport, FlightStatus};
    use crate::tracker::PoseSource;
    use chrono::Utc;
    use egui_kittest::Harness;
    use egui_kittest::kittest::Queryable;

    #[derive(Default)]
    struct SearchPanel {
        form: SearchForm,
        search: SearchState,
        tracked: Option<String>,
        submitted: Option<String>,
    }

    fn search_harness(panel: SearchPanel) -> Harness<'static, SearchPanel> {
        Harness::new_state(
            |ctx, panel: &mut SearchPanel| {
                if let Some(number) = render_search_panel_ui(
                    ctx,
                    &mut panel.form,
                    &panel.search,
                    panel.tracked.as_deref(),
                ) {
                    panel.submitted = Some(number);
                }
            },
            panel,
        )
    }

    fn record() -> FlightRecord {
        FlightRecord {
            flight_number: Some("117".into()),
            flight_iata: Some("BA117".into()),
            dep_iata: Some("LHR".into()),
            arr_iata: Some("JFK".into()),
            airline_iata: Some("BA".into()),
            telemetry: Some(FlightSample {
                position: Some(GeoPoint { latitude: 53.21234, longitude: -20.5 }),
                altitude: Some(10972.8),
                speed: Some(905.2),
                status: FlightStatus::Active,
                received_at: Utc::now(),
            }),
            ..Default::default()
        }
    }

    fn telemetry_status() -> TrackingStatus {
        TrackingStatus { source: PoseSource::Telemetry, progress: None, route_sample: None }
    }

    fn route() -> RouteData {
        RouteData {
            departure: Airport { code: "LHR".into(), name: "London Heathrow".into(), latitude: 51.47, longitude: -0.4543 },
            arrival: Airport { code: "JFK".into(), name: "John F. Kennedy".into(), latitude: 40.6413, longitude: -73.7781 },
            distance: Some(5555.0),
            bearing: None,
        }
    }

    #[test]
    fn search_panel_submits_flight_number() {
        let mut panel = SearchPanel::default();
        panel.form.flight_number = " ba117 ".into();
        let mut harness = search_harness(panel);

        harness.get_by_label("Track Flight").click();
        harness.run();
        assert_eq!(harness.state().submitted.as_deref(), Some("ba117"));
    }

    #[test]
    fn search_panel_ignores_empty_input() {
        let mut harness = search_harness(SearchPanel::default());
        harness.get_by_label("Track Flight").click();
        harness.run();
        assert_eq!(harness.state().submitted, None);
    }

    #[test]
    fn search_panel_shows_loading_and_error() {
        let loading = SearchPanel {
            search: SearchState { is_loading: true, ..Default::default() },
            ..Default::default()
        };
        let harness = search_harness(loading);
        harness.get_by_label("Searching...");

        let failed = SearchPanel {
            search: SearchState {
                error: Some("No flight found with that number".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let harness = search_harness(failed);
        harness.get_by_label("Track Flight");
        harness.get_by_label("No flight found with that number");
    }

    #[test]
    fn search_panel_shows_tracked_flight() {
        let tracking = SearchPanel {
            tracked: Some("BA117".into()),
            ..Default::default()
        };
        let harness = search_harness(tracking);
        harness.get_by_label("Tracking BA117");

        let searching = SearchPanel {
            search: SearchState { is_loading: true, ..Default::default() },
            tracked: Some("BA117".into()),
            ..Default::default()
        };
        let harness = search_harness(searching);
        assert!(harness.query_by_label("Tracking BA117").is_none());
    }

    fn attribution_harness() -> Harness<'static, AttributionNotice> {
        Harness::new_state(
            |ctx, notice: &mut AttributionNotice| render_attribution_ui(ctx, notice),
            AttributionNotice::default(),
        )
    }

    #[test]
    fn attribution_is_hidden_until_toggled() {
        let mut harness = attribution_harness();
        assert!(harness.query_by_label(MODEL_CREDIT).is_none());

        harness.get_by_label("i").click();
        harness.run();
        assert!(harness.state().open);
        harness.get_by_label(MODEL_CREDIT);
        harness.get_by_label("[CC-BY]");
        harness.get_by_label("Poly Pizza");

        harness.get_by_label("i").click();
        harness.run();
        assert!(!harness.state().open);
        assert!(harness.query_by_label(MODEL_CREDIT).is_none());
    }

    #[test]
    fn info_panel_renders_flight_details() {
        let harness = Harness::new_state(
            |ctx, animate: &mut bool| {
                render_info_panel_ui(ctx, &record(), None, &telemetry_status(), animate);
            },
            true,
        );

        harness.get_by_label("Flight:");
        harness.get_by_label("BA117");
        harness.get_by_label("Airline:");
        harness.get_by_label("BA");
        harness.get_by_label("From:");
        harness.get_by_label("LHR");
        harness.get_by_label("To:");
        harness.get_by_label("JFK");
        harness.get_by_label("Active");
        harness.get_by_label("905 km/h");
        harness.get_by_label("10973 m");
        harness.get_by_label("53.2123, -20.5000");
        harness.get_by_label("Marker:");
        harness.get_by_label("Live position");
    }

    #[test]
    fn info_panel_reports_missing_telemetry_as_unknown() {
        let mut record = record();
        record.telemetry = None;
        record.airline_iata = None;
        let harness = Harness::new_state(
            |ctx, animate: &mut bool| {
                let status = TrackingStatus { source: PoseSource::None, progress: None, route_sample: None };
                render_info_panel_ui(ctx, &record, None, &status, animate);
            },
            true,
        );
        harness.get_by_label("Speed:");
        // Airline, Status, Speed, Altitude and Position all fall back
        assert_eq!(harness.query_all_by_label("Unknown").count(), 5);
    }

    #[test]
    fn info_panel_shows_route_and_toggles_animation() {
        let mut harness = Harness::new_state(
            |ctx, animate: &mut bool| {
                let status = TrackingStatus {
                    source: PoseSource::Animation,
                    progress: Some(0.42),
                    route_sample: Some((84, 200)),
                };
                render_info_panel_ui(ctx, &record(), Some(&route()), &status, animate);
            },
            true,
        );
        harness.get_by_label("London Heathrow (LHR)");
        harness.get_by_label("John F. Kennedy (JFK)");
        harness.get_by_label("Distance: 5555 km");
        harness.get_by_label("Animated along route");
        harness.get_by_label("Progress: 42%");
        harness.get_by_label("Route sample: 85 / 200");

        harness.get_by_label("Animate route").click();
        harness.run();
        assert!(!*harness.state());
    }
}
