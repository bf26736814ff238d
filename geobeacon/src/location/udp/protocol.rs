//! GPS sentence parsing.
//!
//! Supports two text protocols:
//! - **XGPS/XGPS2** (ForeFlight) - `XGPS<sim>,lon,lat,alt_m,track,gs_m/s`
//! - **GGA** (NMEA 0183) - `$GPGGA` / `$GNGGA` fix data sentences

use tracing::trace;

use super::super::LocationFix;

/// Parse a GPS packet (auto-detects protocol).
///
/// Returns `None` for unknown sentence types, malformed packets and
/// NMEA sentences reporting no fix.
pub fn parse_sentence(data: &[u8]) -> Option<LocationFix> {
    let text = std::str::from_utf8(data).ok()?.trim();

    if text.starts_with("XGPS") {
        return parse_foreflight_xgps(text);
    }
    if text.starts_with('$') && text.get(3..6) == Some("GGA") {
        return parse_nmea_gga(text);
    }

    None
}

/// Parse ForeFlight XGPS message.
///
/// Altitude is already in metres; track and speed are ignored.
fn parse_foreflight_xgps(text: &str) -> Option<LocationFix> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() < 6 {
        trace!("XGPS packet too short: {} parts", parts.len());
        return None;
    }

    let longitude: f64 = parts[1].trim().parse().ok()?;
    let latitude: f64 = parts[2].trim().parse().ok()?;
    let altitude: f64 = parts[3].trim().parse().ok()?;

    Some(LocationFix::new(latitude, longitude).with_altitude(altitude))
}

/// Parse NMEA GGA sentence.
///
/// Format: `$GPGGA,hhmmss.ss,ddmm.mmmm,N,dddmm.mmmm,E,q,sats,hdop,alt,M,...*cs`
fn parse_nmea_gga(text: &str) -> Option<LocationFix> {
    // Checksum is not verified; strip it before splitting.
    let body = text.split('*').next()?;
    let parts: Vec<&str> = body.split(',').collect();
    if parts.len() < 10 {
        trace!("GGA sentence too short: {} parts", parts.len());
        return None;
    }

    let quality: u8 = parts[6].parse().ok()?;
    if quality == 0 {
        trace!("GGA sentence reports no fix");
        return None;
    }

    let latitude = parse_nmea_angle(parts[2], parts[3], 2)?;
    let longitude = parse_nmea_angle(parts[4], parts[5], 3)?;

    let mut fix = LocationFix::new(latitude, longitude);
    if let Ok(altitude) = parts[9].parse::<f64>() {
        fix = fix.with_altitude(altitude);
    }
    Some(fix)
}

/// Convert `ddmm.mmmm` (or `dddmm.mmmm`) plus hemisphere to signed degrees.
fn parse_nmea_angle(value: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    if value.len() <= degree_digits {
        return None;
    }
    let degrees: f64 = value.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = value.get(degree_digits..)?.parse().ok()?;
    let angle = degrees + minutes / 60.0;

    match hemisphere {
        "N" | "E" => Some(angle),
        "S" | "W" => Some(-angle),
        _ => None,
    }
}
