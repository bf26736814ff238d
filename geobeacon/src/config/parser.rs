//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::location::coordinates_in_range;
use crate::session::MAX_ENDPOINTS;
use crate::transport::Endpoint;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [client] section
    if let Some(section) = ini.section(Some("client")) {
        if let Some(v) = section.get("identifier") {
            config.client.identifier = non_empty(v);
        }
    }

    // [transport] section
    if let Some(section) = ini.section(Some("transport")) {
        if let Some(v) = section.get("mode") {
            config.transport.mode =
                parse_value("transport", "mode", v, "must be 'stream' or 'datagram'")?;
        }
        if let Some(v) = section.get("endpoints") {
            config.transport.endpoints = parse_endpoints(v)?;
        }
        if let Some(v) = section.get("message_format") {
            config.transport.message_format = parse_value(
                "transport",
                "message_format",
                v,
                "must be 'compact' or 'dated'",
            )?;
        }
    }

    // [reporting] section
    if let Some(section) = ini.section(Some("reporting")) {
        if let Some(v) = section.get("stream_interval_ms") {
            config.reporting.stream_interval_ms =
                parse_positive_ms("reporting", "stream_interval_ms", v)?;
        }
        if let Some(v) = section.get("datagram_send_delay_ms") {
            config.reporting.datagram_send_delay_ms = parse_value(
                "reporting",
                "datagram_send_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("datagram_round_pause_ms") {
            config.reporting.datagram_round_pause_ms =
                parse_positive_ms("reporting", "datagram_round_pause_ms", v)?;
        }
    }

    // [location] section
    if let Some(section) = ini.section(Some("location")) {
        if let Some(v) = section.get("source") {
            config.location.source =
                parse_value("location", "source", v, "must be 'fixed' or 'udp'")?;
        }
        if let Some(v) = section.get("udp_port") {
            let port: u16 =
                parse_value("location", "udp_port", v, "must be a port number (1-65535)")?;
            if port == 0 {
                return Err(invalid("location", "udp_port", v, "must be a port number (1-65535)"));
            }
            config.location.udp_port = port;
        }
        if let Some(v) = section.get("latitude") {
            config.location.latitude = parse_optional("location", "latitude", v)?;
        }
        if let Some(v) = section.get("longitude") {
            config.location.longitude = parse_optional("location", "longitude", v)?;
        }
        if let Some(v) = section.get("altitude") {
            config.location.altitude = parse_optional("location", "altitude", v)?;
        }
        if let Some(v) = section.get("update_interval_ms") {
            config.location.update_interval_ms =
                parse_positive_ms("location", "update_interval_ms", v)?;
        }
        if let Some(v) = section.get("distance_filter_m") {
            const REASON: &str = "must be a non-negative number of metres";
            let metres: f64 = parse_value("location", "distance_filter_m", v, REASON)?;
            if !metres.is_finite() || metres < 0.0 {
                return Err(invalid("location", "distance_filter_m", v, REASON));
            }
            config.location.distance_filter_m = metres;
        }

        if let (Some(lat), Some(lon)) = (config.location.latitude, config.location.longitude) {
            if !coordinates_in_range(lat, lon) {
                return Err(invalid(
                    "location",
                    "latitude",
                    &format!("{}, {}", lat, lon),
                    "coordinates out of range (latitude -90..90, longitude -180..180)",
                ));
            }
        }
    }

    // [sms] section
    if let Some(section) = ini.section(Some("sms")) {
        if let Some(v) = section.get("destination") {
            config.sms.destination = non_empty(v);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parse a comma-separated endpoint list, keeping order.
fn parse_endpoints(value: &str) -> Result<Vec<Endpoint>, ConfigFileError> {
    let endpoints = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Endpoint>()
                .map_err(|reason| invalid("transport", "endpoints", value, &reason))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if endpoints.len() > MAX_ENDPOINTS {
        return Err(invalid(
            "transport",
            "endpoints",
            value,
            &format!("at most {} endpoints are supported", MAX_ENDPOINTS),
        ));
    }
    Ok(endpoints)
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive_ms(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    const REASON: &str = "must be a positive integer (milliseconds)";
    let ms: u64 = parse_value(section, key, value, REASON)?;
    if ms == 0 {
        return Err(invalid(section, key, value, REASON));
    }
    Ok(ms)
}

/// Empty values mean "not set".
fn parse_optional(section: &str, key: &str, value: &str) -> Result<Option<f64>, ConfigFileError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    let parsed: f64 = parse_value(section, key, value, "must be a number")?;
    if !parsed.is_finite() {
        return Err(invalid(section, key, value, "must be a finite number"));
    }
    Ok(Some(parsed))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
