use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

use crate::geo::{self, GeoError, GeoPoint};

// =============================================================================
// Domain Types
// =============================================================================

/// Reported flight status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlightStatus {
    Scheduled,
    Active,
    Landed,
    Cancelled,
    Incident,
    Diverted,
    #[default]
    Unknown,
    Other(String),
}

impl FlightStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("scheduled") => FlightStatus::Scheduled,
            Some("active") => FlightStatus::Active,
            Some("landed") => FlightStatus::Landed,
            Some("cancelled") => FlightStatus::Cancelled,
            Some("incident") => FlightStatus::Incident,
            Some("diverted") => FlightStatus::Diverted,
            None | Some("") => FlightStatus::Unknown,
            Some(other) => FlightStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlightStatus::Scheduled => "Scheduled",
            FlightStatus::Active => "Active",
            FlightStatus::Landed => "Landed",
            FlightStatus::Cancelled => "Cancelled",
            FlightStatus::Incident => "Incident",
            FlightStatus::Diverted => "Diverted",
            FlightStatus::Unknown => "Unknown",
            FlightStatus::Other(s) => s.as_str(),
        };
        f.write_str(label)
    }
}

/// Latest telemetry snapshot. Replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSample {
    /// `None` when the feed has no live position for the flight
    pub position: Option<GeoPoint>,
    /// Meters
    pub altitude: Option<f64>,
    /// km/h
    pub speed: Option<f64>,
    pub status: FlightStatus,
    pub received_at: DateTime<Utc>,
}

/// Flight identity plus its telemetry, as shown in the information panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightRecord {
    pub flight_number: Option<String>,
    pub flight_iata: Option<String>,
    pub flight_icao: Option<String>,
    pub dep_iata: Option<String>,
    pub dep_icao: Option<String>,
    pub arr_iata: Option<String>,
    pub arr_icao: Option<String>,
    pub airline_iata: Option<String>,
    pub airline_icao: Option<String>,
    pub telemetry: Option<FlightSample>,
}

impl FlightRecord {
    pub fn display_flight(&self) -> &str {
        first_present(&[&self.flight_iata, &self.flight_icao, &self.flight_number])
    }

    pub fn display_airline(&self) -> &str {
        first_present(&[&self.airline_iata, &self.airline_icao])
    }

    pub fn display_departure(&self) -> &str {
        first_present(&[&self.dep_iata, &self.dep_icao])
    }

    pub fn display_arrival(&self) -> &str {
        first_present(&[&self.arr_iata, &self.arr_icao])
    }

    /// Airport pair to resolve a route for, when both ends are known.
    pub fn route_codes(&self) -> Option<(String, String)> {
        let dep = self.dep_iata.as_ref().or(self.dep_icao.as_ref())?;
        let arr = self.arr_iata.as_ref().or(self.arr_icao.as_ref())?;
        Some((dep.clone(), arr.clone()))
    }
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> &'a str {
    candidates
        .iter()
        .find_map(|c| (*c).as_deref().filter(|s| !s.is_empty()))
        .unwrap_or("")
}

/// One end of a resolved route.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Airport {
    pub code: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Airport {
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Response of the route-data endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RouteData {
    pub departure: Airport,
    pub arrival: Airport,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub bearing: Option<f64>,
}

impl RouteData {
    /// Great-circle distance in km; computed when the service omitted it.
    pub fn distance_km(&self) -> Option<f64> {
        if self.distance.is_some() {
            return self.distance;
        }
        let (dep, arr) = (self.departure.point().ok()?, self.arrival.point().ok()?);
        Some(geo::haversine_distance_km(dep, arr))
    }

    /// Initial bearing; computed when the service omitted it.
    pub fn initial_bearing(&self) -> Option<f64> {
        if self.bearing.is_some() {
            return self.bearing;
        }
        let (dep, arr) = (self.departure.point().ok()?, self.arrival.point().ok()?);
        Some(geo::bearing(dep, arr))
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum FetchError {
    MissingApiKey,
    InvalidFlightNumber(String),
    NotFound,
    Status { code: u16, message: String },
    Http(reqwest::Error),
    Decode(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::MissingApiKey => write!(f, "API key is not configured"),
            FetchError::InvalidFlightNumber(input) => {
                write!(f, "Invalid flight number format: {:?}", input)
            }
            FetchError::NotFound => write!(f, "No flight found with that number"),
            FetchError::Status { code, message } => write!(f, "{} (HTTP {})", message, code),
            FetchError::Http(e) => write!(f, "Request failed: {}", e),
            FetchError::Decode(e) => write!(f, "Unexpected response: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e)
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
struct FlightsResponse {
    #[serde(default)]
    data: Vec<FlightJson>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    info: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlightJson {
    flight_status: Option<String>,
    departure: CodesJson,
    arrival: CodesJson,
    airline: CodesJson,
    flight: FlightIdJson,
    live: Option<LiveJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CodesJson {
    iata: Option<String>,
    icao: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlightIdJson {
    number: Option<String>,
    iata: Option<String>,
    icao: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LiveJson {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    speed_horizontal: Option<f64>,
}

impl FlightJson {
    fn into_record(self, received_at: DateTime<Utc>) -> FlightRecord {
        let status = FlightStatus::parse(self.flight_status.as_deref());
        let live = self.live.unwrap_or_default();

        FlightRecord {
            flight_number: self.flight.number,
            flight_iata: self.flight.iata,
            flight_icao: self.flight.icao,
            dep_iata: self.departure.iata,
            dep_icao: self.departure.icao,
            arr_iata: self.arrival.iata,
            arr_icao: self.arrival.icao,
            airline_iata: self.airline.iata,
            airline_icao: self.airline.icao,
            telemetry: Some(FlightSample {
                position: GeoPoint::from_optional(live.latitude, live.longitude),
                altitude: live.altitude,
                speed: live.speed_horizontal,
                status,
                received_at,
            }),
        }
    }
}

/// Split `"BA123"` into airline code and flight number. Surrounding
/// whitespace is ignored and the airline code is upper-cased.
pub fn parse_flight_number(input: &str) -> Result<(String, String), FetchError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (airline, number) = trimmed.split_at(split);

    let valid = !airline.is_empty()
        && !number.is_empty()
        && airline.chars().all(|c| c.is_ascii_alphabetic())
        && number.chars().all(|c| c.is_ascii_digit());

    if valid {
        Ok((airline.to_ascii_uppercase(), number.to_string()))
    } else {
        Err(FetchError::InvalidFlightNumber(trimmed.to_string()))
    }
}

/// Decode a flight-lookup response body. Non-2xx statuses carry the API's
/// `error.info` message when there is one.
pub fn decode_flight_response(
    status: u16,
    body: &str,
    received_at: DateTime<Utc>,
) -> Result<FlightRecord, FetchError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ApiErrorResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .and_then(|e| e.info)
            .unwrap_or_else(|| "Failed to fetch flight data".to_string());
        return Err(FetchError::Status { code: status, message });
    }

    let response: FlightsResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    response
        .data
        .into_iter()
        .next()
        .map(|flight| flight.into_record(received_at))
        .ok_or(FetchError::NotFound)
}

/// Decode a route-data response body.
pub fn decode_route_response(status: u16, body: &str) -> Result<RouteData, FetchError> {
    if !(200..300).contains(&status) {
        return Err(FetchError::Status {
            code: status,
            message: "Failed to fetch airport coordinates".to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

// =============================================================================
// Requests
// =============================================================================

/// Look up a flight by number.
pub async fn fetch_flight(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    flight_number: &str,
) -> Result<FlightRecord, FetchError> {
    let api_key = api_key.ok_or(FetchError::MissingApiKey)?;
    let (airline, number) = parse_flight_number(flight_number)?;

    let response = client
        .get(endpoint)
        .query(&[
            ("access_key", api_key),
            ("flight_number", number.as_str()),
            ("airline_iata", airline.as_str()),
        ])
        .send()
        .await?;

    let status = response.status().as_u16();
    let body = response.text().await?;
    decode_flight_response(status, &body, Utc::now())
}

/// Resolve coordinates for an airport pair.
pub async fn fetch_route(
    client: &reqwest::Client,
    endpoint: &str,
    departure: &str,
    arrival: &str,
) -> Result<RouteData, FetchError> {
    let response = client
        .get(endpoint)
        .query(&[("departure", departure), ("arrival", arrival)])
        .send()
        .await?;

    let status = response.status().as_u16();
    let body = response.text().await?;
    decode_route_response(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE_FLIGHT: &str = r#"{
        "pagination": {"limit": 100, "offset": 0, "count": 1, "total": 1},
        "data": [{
            "flight_date": "2026-10-17",
            "flight_status": "active",
            "departure": {"airport": "Heathrow", "iata": "LHR", "icao": "EGLL"},
            "arrival": {"airport": "John F Kennedy International", "iata": "JFK", "icao": "KJFK"},
            "airline": {"name": "British Airways", "iata": "BA", "icao": "BAW"},
            "flight": {"number": "117", "iata": "BA117", "icao": "BAW117"},
            "live": {
                "updated": "2026-10-17T12:00:00+00:00",
                "latitude": 53.2,
                "longitude": -20.5,
                "altitude": 10972.8,
                "speed_horizontal": 905.2,
                "is_ground": false
            }
        }]
    }"#;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn parses_flight_numbers() {
        assert_eq!(parse_flight_number("BA123").unwrap(), ("BA".into(), "123".into()));
        assert_eq!(parse_flight_number("  lh456 ").unwrap(), ("LH".into(), "456".into()));
        assert!(parse_flight_number("").is_err());
        assert!(parse_flight_number("123").is_err());
        assert!(parse_flight_number("BA").is_err());
        assert!(parse_flight_number("BA 123").is_err());
        assert!(parse_flight_number("BA12X").is_err());
    }

    #[test]
    fn decodes_active_flight() {
        let record = decode_flight_response(200, ACTIVE_FLIGHT, now()).unwrap();
        assert_eq!(record.display_flight(), "BA117");
        assert_eq!(record.display_airline(), "BA");
        assert_eq!(record.route_codes(), Some(("LHR".into(), "JFK".into())));

        let sample = record.telemetry.unwrap();
        assert_eq!(sample.position, Some(GeoPoint { latitude: 53.2, longitude: -20.5 }));
        assert_eq!(sample.altitude, Some(10972.8));
        assert_eq!(sample.speed, Some(905.2));
        assert_eq!(sample.status, FlightStatus::Active);
    }

    #[test]
    fn missing_live_block_means_no_position() {
        let body = r#"{"data": [{
            "flight_status": "scheduled",
            "departure": {"iata": "LHR"},
            "arrival": {"iata": null, "icao": "KJFK"},
            "airline": {"iata": "BA"},
            "flight": {"number": "117", "iata": "BA117"},
            "live": null
        }]}"#;
        let record = decode_flight_response(200, body, now()).unwrap();
        let sample = record.telemetry.as_ref().unwrap();
        assert_eq!(sample.position, None);
        assert_eq!(sample.status, FlightStatus::Scheduled);
        assert_eq!(record.display_arrival(), "KJFK");
        assert_eq!(record.route_codes(), Some(("LHR".into(), "KJFK".into())));
    }

    #[test]
    fn out_of_range_position_is_dropped() {
        let body = r#"{"data": [{"live": {"latitude": 123.0, "longitude": 5.0}}]}"#;
        let record = decode_flight_response(200, body, now()).unwrap();
        assert_eq!(record.telemetry.as_ref().unwrap().position, None);
        assert_eq!(record.route_codes(), None);
    }

    #[test]
    fn empty_data_is_not_found() {
        let err = decode_flight_response(200, r#"{"data": []}"#, now()).unwrap_err();
        assert!(matches!(err, FetchError::NotFound));
    }

    #[test]
    fn error_status_carries_api_message() {
        let body = r#"{"error": {"code": "invalid_access_key", "info": "You have not supplied a valid API Access Key."}}"#;
        match decode_flight_response(401, body, now()).unwrap_err() {
            FetchError::Status { code, message } => {
                assert_eq!(code, 401);
                assert!(message.starts_with("You have not supplied"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match decode_flight_response(500, "oops", now()).unwrap_err() {
            FetchError::Status { message, .. } => assert_eq!(message, "Failed to fetch flight data"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_body_is_decode_error() {
        assert!(matches!(
            decode_flight_response(200, "not json", now()).unwrap_err(),
            FetchError::Decode(_)
        ));
    }

    #[test]
    fn status_parsing() {
        assert_eq!(FlightStatus::parse(Some("Landed")), FlightStatus::Landed);
        assert_eq!(FlightStatus::parse(None), FlightStatus::Unknown);
        assert_eq!(FlightStatus::parse(Some("en-route")), FlightStatus::Other("en-route".into()));
        assert_eq!(FlightStatus::Active.to_string(), "Active");
    }

    #[test]
    fn decodes_route_and_fills_missing_fields() {
        let body = r#"{
            "departure": {"code": "LHR", "name": "London Heathrow", "latitude": 51.47, "longitude": -0.4543},
            "arrival": {"code": "JFK", "name": "John F. Kennedy", "latitude": 40.6413, "longitude": -73.7781}
        }"#;
        let route = decode_route_response(200, body).unwrap();
        assert_eq!(route.departure.code, "LHR");
        assert_eq!(route.distance, None);
        let distance = route.distance_km().unwrap();
        assert!(distance > 5500.0 && distance < 5600.0);
        let bearing = route.initial_bearing().unwrap();
        assert!(bearing > 280.0 && bearing < 295.0);
    }

    #[test]
    fn route_keeps_provided_distance_and_bearing() {
        let body = r#"{
            "departure": {"code": "A", "name": "A", "latitude": 0.0, "longitude": 0.0},
            "arrival": {"code": "B", "name": "B", "latitude": 0.0, "longitude": 1.0},
            "distance": 111.0,
            "bearing": 90.0
        }"#;
        let route = decode_route_response(200, body).unwrap();
        assert_eq!(route.distance_km(), Some(111.0));
        assert_eq!(route.initial_bearing(), Some(90.0));
    }

    #[test]
    fn route_error_status() {
        assert!(matches!(
            decode_route_response(500, "{}").unwrap_err(),
            FetchError::Status { code: 500, .. }
        ));
    }
}
