//! geobeacon CLI - Command-line interface
//!
//! Reports the current location to network endpoints on a timer and offers
//! helpers to preview report lines and SMS messages.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use geobeacon::encoder::MessageFormat;
use geobeacon::transport::{Endpoint, TransportMode};

use commands::config::ConfigCommands;
use commands::encode::EncodeArgs;
use commands::run::RunArgs;
use commands::sms::SmsArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "geobeacon")]
#[command(version = geobeacon::VERSION)]
#[command(about = "Periodically report your location to network endpoints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the location and send reports until Ctrl-C
    Run {
        /// Identifier included in every report
        #[arg(long)]
        id: Option<String>,

        /// Endpoint as host:port (repeat for up to 3; replaces the config list)
        #[arg(long = "endpoint", value_name = "HOST:PORT")]
        endpoints: Vec<Endpoint>,

        /// Transport: stream (TCP) or datagram (UDP)
        #[arg(long)]
        mode: Option<TransportMode>,

        /// Report layout: compact or dated
        #[arg(long)]
        format: Option<MessageFormat>,

        /// Report a fixed latitude instead of a live source
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Report a fixed longitude instead of a live source
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Listen for GPS sentences on this UDP port
        #[arg(long, conflicts_with = "lat")]
        udp_port: Option<u16>,

        /// Enable debug logging (also mirrored to stdout)
        #[arg(long)]
        debug: bool,
    },

    /// Print the report line for a position
    Encode {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Identifier included in the report
        #[arg(long)]
        id: String,

        /// Report layout: compact or dated
        #[arg(long, default_value = "compact")]
        format: MessageFormat,

        /// Capture time as Unix milliseconds (default: now)
        #[arg(long)]
        timestamp_ms: Option<i64>,
    },

    /// Print the SMS fallback message for a position
    Sms {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Altitude in metres
        #[arg(long, allow_negative_numbers = true)]
        alt: Option<f64>,

        /// Fix time as Unix milliseconds (shown as N/A when absent)
        #[arg(long)]
        timestamp_ms: Option<i64>,

        /// Destination number (default: [sms] destination)
        #[arg(long)]
        to: Option<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Run {
            id,
            endpoints,
            mode,
            format,
            lat,
            lon,
            udp_port,
            debug,
        } => commands::run::run(RunArgs {
            id,
            endpoints,
            mode,
            format,
            lat,
            lon,
            udp_port,
            debug,
        }),
        Commands::Encode {
            lat,
            lon,
            id,
            format,
            timestamp_ms,
        } => commands::encode::run(EncodeArgs {
            lat,
            lon,
            id,
            format,
            timestamp_ms,
        }),
        Commands::Sms {
            lat,
            lon,
            alt,
            timestamp_ms,
            to,
        } => commands::sms::run(SmsArgs {
            lat,
            lon,
            alt,
            timestamp_ms,
            to,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
