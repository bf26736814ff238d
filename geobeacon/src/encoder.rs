//! Wire message encoding.
//!
//! A report is one flat UTF-8 text line:
//!
//! ```text
//! <latitude> <longitude> <HH:MM:SS> <identifier>
//! ```
//!
//! The [`MessageFormat::Dated`] variant inserts a `DD/MM/YYYY` date before
//! the time. No escaping or quoting is applied and no newline is appended;
//! receivers delimit messages themselves.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::location::{coordinates_in_range, LocationFix};
use crate::session::ClientIdentifier;

/// Time-of-day component (24h).
const TIME_FORMAT: &str = "%H:%M:%S";

/// Date component for the dated format.
const DATE_FORMAT: &str = "%d/%m/%Y";

/// Layout of an encoded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// `lat lon HH:MM:SS id`
    #[default]
    Compact,
    /// `lat lon DD/MM/YYYY HH:MM:SS id`
    Dated,
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageFormat::Compact => write!(f, "compact"),
            MessageFormat::Dated => write!(f, "dated"),
        }
    }
}

impl FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(MessageFormat::Compact),
            "dated" => Ok(MessageFormat::Dated),
            other => Err(format!("unknown message format '{}'", other)),
        }
    }
}

/// Reasons a fix cannot be encoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// Latitude or longitude is absent.
    #[error("Fix has no usable coordinates")]
    MissingCoordinates,

    /// Coordinates are not finite or out of range.
    #[error("Coordinates out of range: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// The identifier is blank.
    #[error("Client identifier is empty")]
    EmptyIdentifier,
}

/// Encode a fix into a report line.
///
/// `captured_at` supplies the time component; pass a frozen time for
/// reproducible output.
pub fn encode(
    fix: &LocationFix,
    identifier: &ClientIdentifier,
    captured_at: DateTime<Local>,
    format: MessageFormat,
) -> Result<String, EncodeError> {
    let (latitude, longitude) = fix.coordinates().ok_or(EncodeError::MissingCoordinates)?;
    if !coordinates_in_range(latitude, longitude) {
        return Err(EncodeError::InvalidCoordinates {
            latitude,
            longitude,
        });
    }
    if identifier.is_empty() {
        return Err(EncodeError::EmptyIdentifier);
    }

    let time = captured_at.format(TIME_FORMAT);
    let line = match format {
        MessageFormat::Compact => format!("{} {} {} {}", latitude, longitude, time, identifier),
        MessageFormat::Dated => format!(
            "{} {} {} {} {}",
            latitude,
            longitude,
            captured_at.format(DATE_FORMAT),
            time,
            identifier
        ),
    };
    Ok(line)
}
