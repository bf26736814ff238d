//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::encoder::MessageFormat;
use crate::transport::{Endpoint, TransportMode};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub client: ClientSettings,
    pub transport: TransportSettings,
    pub reporting: ReportingSettings,
    pub location: LocationSettings,
    pub sms: SmsSettings,
    pub logging: LoggingSettings,
}

/// Client identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientSettings {
    /// Identifier sent with every report
    pub identifier: Option<String>,
}

/// Where and how reports are sent.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    pub mode: TransportMode,
    /// Endpoints in slot order (at most `MAX_ENDPOINTS`)
    pub endpoints: Vec<Endpoint>,
    pub message_format: MessageFormat,
}

/// Reporting cadence, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingSettings {
    pub stream_interval_ms: u64,
    pub datagram_send_delay_ms: u64,
    pub datagram_round_pause_ms: u64,
}

/// Location source.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSettings {
    pub source: LocationSource,
    /// Port for the UDP GPS receiver
    pub udp_port: u16,
    /// Fixed position (required when source = fixed)
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    /// Repeat interval for the fixed source
    pub update_interval_ms: u64,
    /// Minimum movement in metres between delivered fixes (0 = every fix)
    pub distance_filter_m: f64,
}

/// Kind of location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationSource {
    /// A configured, unchanging position
    Fixed,
    /// GPS sentences received over UDP
    #[default]
    Udp,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationSource::Fixed => write!(f, "fixed"),
            LocationSource::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for LocationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(LocationSource::Fixed),
            "udp" => Ok(LocationSource::Udp),
            other => Err(format!("unknown location source '{}'", other)),
        }
    }
}

/// SMS fallback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmsSettings {
    /// Destination phone number
    pub destination: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
