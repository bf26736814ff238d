//! Default values for all configuration settings.
//!
//! Contains the `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use crate::encoder::MessageFormat;
use crate::location::DEFAULT_UDP_PORT;
use crate::logging::default_log_path;
use crate::reporter::{
    DEFAULT_DATAGRAM_ROUND_PAUSE, DEFAULT_DATAGRAM_SEND_DELAY, DEFAULT_STREAM_INTERVAL,
};
use crate::transport::TransportMode;

use super::settings::*;

/// Default stream-mode interval (2 seconds).
pub const DEFAULT_STREAM_INTERVAL_MS: u64 = DEFAULT_STREAM_INTERVAL.as_millis() as u64;

/// Default pause between datagram sends (1 second).
pub const DEFAULT_DATAGRAM_SEND_DELAY_MS: u64 = DEFAULT_DATAGRAM_SEND_DELAY.as_millis() as u64;

/// Default pause between datagram rounds (5 seconds).
pub const DEFAULT_DATAGRAM_ROUND_PAUSE_MS: u64 = DEFAULT_DATAGRAM_ROUND_PAUSE.as_millis() as u64;

/// Default repeat interval of the fixed location source (1 second).
pub const DEFAULT_LOCATION_UPDATE_INTERVAL_MS: u64 = 1000;

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            transport: TransportSettings {
                mode: TransportMode::Stream,
                endpoints: Vec::new(),
                message_format: MessageFormat::Compact,
            },
            reporting: ReportingSettings {
                stream_interval_ms: DEFAULT_STREAM_INTERVAL_MS,
                datagram_send_delay_ms: DEFAULT_DATAGRAM_SEND_DELAY_MS,
                datagram_round_pause_ms: DEFAULT_DATAGRAM_ROUND_PAUSE_MS,
            },
            location: LocationSettings {
                source: LocationSource::Udp,
                udp_port: DEFAULT_UDP_PORT,
                latitude: None,
                longitude: None,
                altitude: None,
                update_interval_ms: DEFAULT_LOCATION_UPDATE_INTERVAL_MS,
                distance_filter_m: 0.0,
            },
            sms: SmsSettings::default(),
            logging: LoggingSettings {
                file: default_log_path(),
            },
        }
    }
}
