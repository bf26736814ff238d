//! SMS command - show the fallback text message for a position.
//!
//! No message is actually sent. The body is handed to a facility that
//! prints it, exactly as a platform messaging facility would receive it.

use geobeacon::config::ConfigFile;
use geobeacon::location::LocationFix;
use geobeacon::sms::{MessagingFacility, SmsError, SmsFallback};

use crate::error::CliError;

/// Arguments for the sms command.
pub struct SmsArgs {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
    pub timestamp_ms: Option<i64>,
    /// Overrides `[sms] destination`
    pub to: Option<String>,
}

/// Facility that writes messages to stdout.
struct PrintFacility;

impl MessagingFacility for PrintFacility {
    async fn send_text(&self, destination: &str, body: &str) -> Result<(), SmsError> {
        println!("To: {}", destination);
        println!();
        println!("{}", body);
        Ok(())
    }
}

/// Run the sms command.
pub fn run(args: SmsArgs) -> Result<(), CliError> {
    let destination = match args.to {
        Some(to) => to,
        None => ConfigFile::load()?.sms.destination.unwrap_or_default(),
    };

    let mut fix = LocationFix::new(args.lat, args.lon);
    if let Some(alt) = args.alt {
        fix = fix.with_altitude(alt);
    }
    if let Some(ms) = args.timestamp_ms {
        fix = fix.with_timestamp_ms(ms);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let fallback = SmsFallback::new(PrintFacility, destination);
    runtime.block_on(fallback.send(&fix))?;

    Ok(())
}
