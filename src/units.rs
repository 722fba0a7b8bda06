//! Newtype wrappers for the quantities shown in the flight panels.
//!
//! The flight-lookup API reports altitude in meters and horizontal speed
//! in km/h; route distances are great-circle kilometers.

/// Altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Meters(pub f64);

impl std::fmt::Display for Meters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} m", self.0.round() as i64)
    }
}

/// Speed in kilometers per hour.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct KmPerHour(pub f64);

impl std::fmt::Display for KmPerHour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} km/h", self.0.round() as i64)
    }
}

/// Distance in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Kilometers(pub f64);

impl std::fmt::Display for Kilometers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} km", self.0.round() as i64)
    }
}

/// Bearing or heading in degrees (0-360, clockwise from north).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Degrees(pub f64);

impl Degrees {
    /// Nearest 16-point compass label.
    pub fn to_cardinal(self) -> &'static str {
        const POINTS: [&str; 16] = [
            "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE",
            "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
        ];
        let normalized = self.0.rem_euclid(360.0);
        let index = ((normalized + 11.25) / 22.5) as usize % 16;
        POINTS[index]
    }
}

impl std::fmt::Display for Degrees {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}\u{00B0}", self.0)
    }
}
