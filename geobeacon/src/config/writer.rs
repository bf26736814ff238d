//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let identifier = config.client.identifier.as_deref().unwrap_or("");
    let endpoints = config
        .transport
        .endpoints
        .iter()
        .map(|ep| ep.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let latitude = optional_number(config.location.latitude);
    let longitude = optional_number(config.location.longitude);
    let altitude = optional_number(config.location.altitude);
    let destination = config.sms.destination.as_deref().unwrap_or("");

    format!(
        r#"[client]
; Identifier included in every report, so receivers can tell senders apart.
; Required before reporting can start.
identifier = {}

[transport]
; How reports are sent:
;   stream   - one persistent TCP connection to the first endpoint
;   datagram - one UDP datagram to every endpoint, one after another
mode = {}
; Comma-separated list of host:port (port defaults to 5000), at most 3.
; Example: endpoints = 10.0.0.5:5000, tracker.example.org:6000
endpoints = {}
; Report layout:
;   compact - "<lat> <lon> <HH:MM:SS> <id>"
;   dated   - "<lat> <lon> <DD/MM/YYYY> <HH:MM:SS> <id>"
message_format = {}

[reporting]
; Pause between stream-mode reports (default: 2000)
stream_interval_ms = {}
; Pause between consecutive datagram sends in one round (default: 1000)
datagram_send_delay_ms = {}
; Pause between datagram rounds (default: 5000)
datagram_round_pause_ms = {}

[location]
; Where fixes come from:
;   udp   - GPS sentences (ForeFlight XGPS or NMEA GGA) received on udp_port
;   fixed - the latitude/longitude/altitude below, repeated every update_interval_ms
source = {}
udp_port = {}
latitude = {}
longitude = {}
altitude = {}
update_interval_ms = {}
; Ignore fixes that moved less than this many metres (0 delivers every fix)
distance_filter_m = {}

[sms]
; Phone number for the one-shot SMS fallback
destination = {}

[logging]
; Log file, cleared at the start of each session
file = {}
"#,
        identifier,
        config.transport.mode,
        endpoints,
        config.transport.message_format,
        config.reporting.stream_interval_ms,
        config.reporting.datagram_send_delay_ms,
        config.reporting.datagram_round_pause_ms,
        config.location.source,
        config.location.udp_port,
        latitude,
        longitude,
        altitude,
        config.location.update_interval_ms,
        config.location.distance_filter_m,
        destination,
        path_to_string(&config.logging.file),
    )
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Shorten paths under the home directory to `~/...`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::LocationSource;
    use crate::transport::{Endpoint, TransportMode};
    use tempfile::TempDir;

    #[test]
    fn test_default_config_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");

        let config = ConfigFile::default();
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_customised_config_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.ini");

        let mut config = ConfigFile::default();
        config.client.identifier = Some("U1".to_string());
        config.transport.mode = TransportMode::Datagram;
        config.transport.endpoints = vec![
            Endpoint::new("10.0.0.5", 5000),
            Endpoint::new("::1", 7000),
        ];
        config.location.source = LocationSource::Fixed;
        config.location.latitude = Some(40.5);
        config.location.longitude = Some(-3.25);
        config.sms.destination = Some("+34600000000".to_string());
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_written_file_is_commented() {
        let content = to_config_string(&ConfigFile::default());
        assert!(content.contains("[transport]"));
        assert!(content.contains("; How reports are sent:"));
        assert!(content.contains("mode = stream"));
    }
}
