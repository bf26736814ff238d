//! Location acquisition.
//!
//! The core never talks to positioning hardware directly. It consumes a
//! [`LocationProvider`], which hands out a lazy, infinite stream of
//! [`LocationEvent`]s. Each call to [`LocationProvider::subscribe`] starts a
//! fresh stream, so tracking can be stopped and restarted at will.
//!
//! # Providers
//!
//! - [`ChannelLocationProvider`] - fixes pushed in by the host application
//! - [`FixedLocationProvider`] - a simulated, stationary device
//! - [`UdpLocationProvider`] - GPS sentences (ForeFlight XGPS / NMEA GGA) over UDP
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let provider = FixedLocationProvider::new(40.0, -3.0);
//! let mut events = provider.subscribe();
//! while let Some(event) = events.next().await {
//!     if let LocationEvent::Fix(fix) = event {
//!         println!("{:?}", fix.coordinates());
//!     }
//! }
//! ```

mod channel;
mod fixed;
mod udp;

use futures::stream::BoxStream;
use thiserror::Error;

pub use channel::{ChannelLocationProvider, LocationFeed};
pub use fixed::FixedLocationProvider;
pub use udp::{UdpLocationProvider, UdpLocationProviderConfig, DEFAULT_UDP_PORT};

/// Valid latitude range in degrees.
const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in degrees.
const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// A single device position report.
///
/// Every field is optional because providers may deliver partial data.
/// Latitude and longitude only count when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocationFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: Option<i64>,
}

impl LocationFix {
    /// A fix with no data, used before the first provider update.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a fix with coordinates only.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude: None,
            timestamp_ms: None,
        }
    }

    /// Set the altitude in metres.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set the capture timestamp (milliseconds since the Unix epoch).
    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Latitude and longitude, if both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Altitude in metres, 0 when unknown.
    pub fn altitude_or_default(&self) -> f64 {
        self.altitude.unwrap_or(0.0)
    }

    /// Whether this fix carries coordinates that can be put on the wire.
    pub fn is_reportable(&self) -> bool {
        self.coordinates()
            .is_some_and(|(lat, lon)| coordinates_in_range(lat, lon))
    }
}

/// Check that a coordinate pair is finite and within WGS84 bounds.
pub fn coordinates_in_range(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && LATITUDE_RANGE.contains(&latitude)
        && LONGITUDE_RANGE.contains(&longitude)
}

/// Failure to obtain a position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    /// The host refused access to location services.
    #[error("Location permission denied")]
    PermissionDenied,

    /// The location source could not be reached or opened.
    #[error("Location source unavailable: {0}")]
    Unavailable(String),

    /// No usable fix arrived within a reporting cycle.
    #[error("No location fix available")]
    NoFix,
}

/// One item of a provider stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(LocationFix),
    Error(AcquisitionError),
}

/// Acquisition options requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderOptions {
    /// Ask for the most precise source available (GPS over network).
    pub high_accuracy: bool,

    /// Minimum movement in metres before a new fix is delivered.
    /// Zero delivers every update.
    pub distance_filter_m: f64,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            distance_filter_m: 0.0,
        }
    }
}

/// Mean Earth radius used for distance checks.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres between two `(latitude, longitude)` pairs.
pub fn distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let a = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Drops fixes closer than a minimum distance to the last fix let through.
///
/// Fixes without coordinates always pass. A minimum of zero passes everything.
#[derive(Debug, Clone, Default)]
pub struct DistanceFilter {
    min_distance_m: f64,
    last: Option<(f64, f64)>,
}

impl DistanceFilter {
    pub fn new(min_distance_m: f64) -> Self {
        Self {
            min_distance_m,
            last: None,
        }
    }

    /// Whether `fix` should be delivered. Accepted fixes become the new reference.
    pub fn accept(&mut self, fix: &LocationFix) -> bool {
        let Some(here) = fix.coordinates() else {
            return true;
        };
        match self.last {
            Some(previous)
                if self.min_distance_m > 0.0
                    && distance_m(previous, here) < self.min_distance_m =>
            {
                false
            }
            _ => {
                self.last = Some(here);
                true
            }
        }
    }
}

/// Source of location updates.
///
/// Implementations must return a new, independent stream on every call.
/// Errors are delivered in-band as [`LocationEvent::Error`]; the stream
/// only ends when the source is permanently gone.
pub trait LocationProvider: Send + Sync {
    /// Start a fresh stream of location events.
    ///
    /// Sources that cannot change their precision ignore
    /// `options.high_accuracy`. The distance filter is applied by the
    /// consumer, so providers may deliver every update.
    fn subscribe(&self, options: ProviderOptions) -> BoxStream<'static, LocationEvent>;

    /// Human-readable provider name for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fix_has_no_coordinates() {
        let fix = LocationFix::empty();
        assert_eq!(fix.coordinates(), None);
        assert!(!fix.is_reportable());
        assert_eq!(fix.altitude_or_default(), 0.0);
    }

    #[test]
    fn test_half_fix_is_not_reportable() {
        let fix = LocationFix {
            latitude: Some(40.0),
            ..Default::default()
        };
        assert_eq!(fix.coordinates(), None);
        assert!(!fix.is_reportable());
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let fix = LocationFix::new(40.0, -3.0)
            .with_altitude(650.5)
            .with_timestamp_ms(1_700_000_000_000);
        assert_eq!(fix.coordinates(), Some((40.0, -3.0)));
        assert_eq!(fix.altitude_or_default(), 650.5);
        assert_eq!(fix.timestamp_ms, Some(1_700_000_000_000));
        assert!(fix.is_reportable());
    }

    #[test]
    fn test_out_of_range_coordinates() {
        assert!(coordinates_in_range(90.0, -180.0));
        assert!(!coordinates_in_range(90.5, 0.0));
        assert!(!coordinates_in_range(0.0, 181.0));
        assert!(!coordinates_in_range(f64::NAN, 0.0));
        assert!(!LocationFix::new(f64::INFINITY, 0.0).is_reportable());
    }

    #[test]
    fn test_default_provider_options() {
        let options = ProviderOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.distance_filter_m, 0.0);
    }

    #[test]
    fn test_distance_between_known_points() {
        assert_eq!(distance_m((40.0, -3.0), (40.0, -3.0)), 0.0);
        // One degree of latitude is about 111.2 km.
        let degree = distance_m((40.0, -3.0), (41.0, -3.0));
        assert!((degree - 111_195.0).abs() < 100.0, "got {}", degree);
    }

    #[test]
    fn test_distance_filter_drops_small_moves() {
        let mut filter = DistanceFilter::new(50.0);
        assert!(filter.accept(&LocationFix::new(40.0, -3.0)));
        // About 11 m north.
        assert!(!filter.accept(&LocationFix::new(40.0001, -3.0)));
        // About 111 m north of the first fix.
        assert!(filter.accept(&LocationFix::new(40.001, -3.0)));
        // Measured from the last accepted fix, not the dropped one.
        assert!(!filter.accept(&LocationFix::new(40.0012, -3.0)));
        assert!(filter.accept(&LocationFix::empty()));
    }

    #[test]
    fn test_zero_distance_filter_passes_everything() {
        let mut filter = DistanceFilter::new(0.0);
        assert!(filter.accept(&LocationFix::new(40.0, -3.0)));
        assert!(filter.accept(&LocationFix::new(40.0, -3.0)));
    }
}
