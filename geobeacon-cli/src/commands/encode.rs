//! Encode command - print the report line for a position.

use chrono::{DateTime, Local};
use geobeacon::encoder::{encode, MessageFormat};
use geobeacon::location::LocationFix;
use geobeacon::session::ClientIdentifier;
use geobeacon::time::local_time_from_ms;

use crate::error::CliError;

/// Arguments for the encode command.
pub struct EncodeArgs {
    pub lat: f64,
    pub lon: f64,
    pub id: String,
    pub format: MessageFormat,
    /// Unix time in milliseconds; the current time when absent
    pub timestamp_ms: Option<i64>,
}

/// Run the encode command.
pub fn run(args: EncodeArgs) -> Result<(), CliError> {
    let captured_at = captured_at(args.timestamp_ms)?;
    let fix = LocationFix::new(args.lat, args.lon);
    let line = encode(
        &fix,
        &ClientIdentifier::new(args.id),
        captured_at,
        args.format,
    )?;

    println!("{}", line);
    Ok(())
}

fn captured_at(timestamp_ms: Option<i64>) -> Result<DateTime<Local>, CliError> {
    match timestamp_ms {
        None => Ok(Local::now()),
        Some(ms) => local_time_from_ms(ms)
            .ok_or_else(|| CliError::Config(format!("timestamp {} is out of range", ms))),
    }
}
