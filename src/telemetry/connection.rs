use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::{AppConfig, FeedConfig};
use crate::tracker::FlightView;
use super::client::{self, FetchError, FlightRecord, RouteData};
use super::gate::{RequestGate, Ticket};

/// Work for the background fetch thread.
#[derive(Debug)]
pub enum FeedCommand {
    Flight {
        ticket: Ticket,
        number: String,
        is_search: bool,
    },
    Route {
        ticket: Ticket,
        endpoint: String,
        departure: String,
        arrival: String,
    },
    Shutdown,
}

/// A completed fetch, tagged with the ticket it was issued under.
#[derive(Debug)]
pub enum FeedResult {
    Flight {
        ticket: Ticket,
        is_search: bool,
        result: Result<FlightRecord, FetchError>,
    },
    Route {
        ticket: Ticket,
        result: Result<RouteData, FetchError>,
    },
}

/// What the search panel shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub is_loading: bool,
    pub error: Option<String>,
    pub record: Option<FlightRecord>,
}

/// Frame-side end of the fetch pipeline. Issues tickets, sends commands to
/// the worker and applies whatever comes back through the gates.
#[derive(Resource)]
pub struct FlightFeed {
    commands: mpsc::UnboundedSender<FeedCommand>,
    results: Receiver<FeedResult>,
    flight_gate: RequestGate,
    route_gate: RequestGate,
    route_endpoint: Option<String>,
    /// Flight number being polled
    tracked: Option<String>,
    /// Airport pair of the current or requested route
    route_codes: Option<(String, String)>,
    search: SearchState,
    poll_timer: Timer,
}

impl FlightFeed {
    pub fn new(
        commands: mpsc::UnboundedSender<FeedCommand>,
        results: Receiver<FeedResult>,
        config: &FeedConfig,
    ) -> Self {
        let interval = Duration::from_millis(config.refresh_interval_ms.max(1));
        Self {
            commands,
            results,
            flight_gate: RequestGate::new(),
            route_gate: RequestGate::new(),
            route_endpoint: config.route_endpoint.clone(),
            tracked: None,
            route_codes: None,
            search: SearchState::default(),
            poll_timer: Timer::new(interval, TimerMode::Repeating),
        }
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    pub fn tracked(&self) -> Option<&str> {
        self.tracked.as_deref()
    }

    /// Start tracking a flight. Everything from the previous search becomes
    /// stale and the view is cleared.
    pub fn search(&mut self, input: &str, view: &mut FlightView) {
        let number = input.trim().to_ascii_uppercase();
        view.reset();
        self.route_gate.close();
        self.route_codes = None;
        self.search = SearchState::default();

        if let Err(e) = client::parse_flight_number(&number) {
            warn!("{}", e);
            self.flight_gate.close();
            self.tracked = None;
            self.search.error = Some(e.to_string());
            return;
        }

        let ticket = self.flight_gate.begin_session();
        debug!("Search {} issued as {:?}", number, ticket);
        self.search.is_loading = true;
        self.tracked = Some(number.clone());
        self.poll_timer.reset();
        self.send(FeedCommand::Flight { ticket, number, is_search: true });
    }

    /// Re-fetch the tracked flight within the current session.
    pub fn poll(&mut self) {
        if self.search.is_loading {
            return;
        }
        let Some(number) = self.tracked.clone() else {
            return;
        };
        let ticket = self.flight_gate.issue();
        debug!("Poll {} issued as {:?}", number, ticket);
        self.send(FeedCommand::Flight { ticket, number, is_search: false });
    }

    /// Advance the poll timer; polls when it fires.
    pub fn tick_poll(&mut self, delta: Duration) {
        if self.poll_timer.tick(delta).just_finished() {
            self.poll();
        }
    }

    /// Apply every result that has arrived so far without blocking.
    pub fn drain(&mut self, view: &mut FlightView) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.results.try_recv() {
            if self.apply(result, view) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one result. Returns false when the gate discarded it.
    pub fn apply(&mut self, result: FeedResult, view: &mut FlightView) -> bool {
        match result {
            FeedResult::Flight { ticket, is_search, result } => {
                if !self.flight_gate.accept(ticket) {
                    debug!("Discarding stale flight result {:?}", ticket);
                    return false;
                }
                match result {
                    Ok(record) => self.apply_record(record, view),
                    Err(e) if is_search => {
                        warn!("Flight search failed: {}", e);
                        self.tracked = None;
                        self.search = SearchState {
                            is_loading: false,
                            error: Some(e.to_string()),
                            record: None,
                        };
                        view.reset();
                    }
                    Err(e) => warn!("Flight poll failed, keeping last state: {}", e),
                }
            }
            FeedResult::Route { ticket, result } => {
                if !self.route_gate.accept(ticket) {
                    debug!("Discarding stale route result {:?}", ticket);
                    return false;
                }
                match result {
                    Ok(data) => {
                        if let Err(e) = view.on_route(data) {
                            warn!("Rejected route: {}", e);
                        }
                    }
                    Err(e) => warn!("Route lookup failed: {}", e),
                }
            }
        }
        true
    }

    /// Close both gates and stop the worker. Anything still in flight is
    /// ignored from here on.
    pub fn teardown(&mut self, view: &mut FlightView) {
        if view.is_torn_down() {
            return;
        }
        if self.flight_gate.is_pending() || self.route_gate.is_pending() {
            debug!("Discarding in-flight flight requests");
        }
        self.flight_gate.close();
        self.route_gate.close();
        self.tracked = None;
        self.send(FeedCommand::Shutdown);
        view.teardown();
    }

    fn apply_record(&mut self, record: FlightRecord, view: &mut FlightView) {
        self.search.is_loading = false;
        self.search.error = None;

        if let Some(sample) = record.telemetry.clone() {
            view.on_telemetry(sample);
        }

        let codes = record.route_codes();
        if codes != self.route_codes {
            self.route_codes = codes.clone();
            match codes {
                Some((departure, arrival)) => self.request_route(departure, arrival),
                None => view.clear_route(),
            }
        }

        self.search.record = Some(record);
    }

    fn request_route(&mut self, departure: String, arrival: String) {
        let Some(endpoint) = self.route_endpoint.clone() else {
            debug!("No route endpoint configured, skipping {} -> {}", departure, arrival);
            return;
        };
        let ticket = self.route_gate.begin_session();
        debug!("Route {} -> {} issued as {:?}", departure, arrival, ticket);
        self.send(FeedCommand::Route { ticket, endpoint, departure, arrival });
    }

    fn send(&self, command: FeedCommand) {
        if self.commands.send(command).is_err() {
            warn!("Fetch worker is not running");
        }
    }
}

/// Spawn the fetch worker on its own thread with a tokio runtime. Each
/// command runs as a separate task, so results can come back out of order.
pub fn spawn_fetch_worker(
    config: &FeedConfig,
) -> (mpsc::UnboundedSender<FeedCommand>, Receiver<FeedResult>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = crossbeam_channel::unbounded();

    let endpoint = config.flight_endpoint.clone();
    let api_key = config.resolved_api_key();
    if api_key.is_none() {
        warn!("No API key configured; set {} or feed.api_key", crate::config::API_KEY_ENV);
    }

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime for fetch worker");

        rt.block_on(run_worker(endpoint, api_key, command_rx, result_tx));
    });

    (command_tx, result_rx)
}

async fn run_worker(
    endpoint: String,
    api_key: Option<String>,
    mut commands: mpsc::UnboundedReceiver<FeedCommand>,
    results: Sender<FeedResult>,
) {
    info!("Fetch worker started, flight endpoint {}", endpoint);
    let http = reqwest::Client::new();

    while let Some(command) = commands.recv().await {
        match command {
            FeedCommand::Flight { ticket, number, is_search } => {
                let (http, endpoint, api_key, results) =
                    (http.clone(), endpoint.clone(), api_key.clone(), results.clone());
                tokio::spawn(async move {
                    let result =
                        client::fetch_flight(&http, &endpoint, api_key.as_deref(), &number).await;
                    // Receiver gone means the app is shutting down
                    let _ = results.send(FeedResult::Flight { ticket, is_search, result });
                });
            }
            FeedCommand::Route { ticket, endpoint, departure, arrival } => {
                let (http, results) = (http.clone(), results.clone());
                tokio::spawn(async move {
                    let result = client::fetch_route(&http, &endpoint, &departure, &arrival).await;
                    let _ = results.send(FeedResult::Route { ticket, result });
                });
            }
            FeedCommand::Shutdown => break,
        }
    }

    info!("Fetch worker stopped");
}

/// Start the worker and insert the [`FlightFeed`] resource.
pub fn setup_flight_feed(mut commands: Commands, config: Res<AppConfig>) {
    let (command_tx, result_rx) = spawn_fetch_worker(&config.feed);
    commands.insert_resource(FlightFeed::new(command_tx, result_rx, &config.feed));
}

pub fn poll_tracked_flight(time: Res<Time>, feed: Option<ResMut<FlightFeed>>) {
    let Some(mut feed) = feed else {
        return;
    };
    feed.tick_poll(time.delta());
}

pub fn apply_feed_results(feed: Option<ResMut<FlightFeed>>, view: Option<ResMut<FlightView>>) {
    let (Some(mut feed), Some(mut view)) = (feed, view) else {
        return;
    };
    feed.drain(&mut view);
}

pub fn teardown_on_exit(
    mut exit: MessageReader<AppExit>,
    feed: Option<ResMut<FlightFeed>>,
    view: Option<ResMut<FlightView>>,
) {
    if exit.read().next().is_none() {
        return;
    }
    let (Some(mut feed), Some(mut view)) = (feed, view) else {
        return;
    };
    feed.teardown(&mut view);
}
