//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use geobeacon::agent::AgentError;
use geobeacon::config::ConfigFileError;
use geobeacon::encoder::EncodeError;
use geobeacon::session::ValidationError;
use geobeacon::sms::SmsError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the async runtime or install the signal handler
    Runtime(String),
    /// The tracking agent rejected a command
    Agent(AgentError),
    /// Reporting stopped on its own (e.g. the connection was refused)
    Reporting(String),
    /// Failed to encode a report
    Encode(EncodeError),
    /// Failed to compose or hand off the SMS
    Sms(SmsError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Agent(AgentError::Validation(ValidationError::EmptyIdentifier)) => {
                eprintln!();
                eprintln!("Set an identifier with --id or in the config file:");
                eprintln!("  [client]");
                eprintln!("  identifier = <your id>");
            }
            CliError::Agent(AgentError::Validation(ValidationError::NoEndpoint)) => {
                eprintln!();
                eprintln!("Add at least one endpoint with --endpoint host:port or in the config file:");
                eprintln!("  [transport]");
                eprintln!("  endpoints = 10.0.0.5:5000");
            }
            CliError::Reporting(_) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Nothing is listening on the endpoint (stream mode needs a TCP server)");
                eprintln!("  2. A firewall is blocking the port");
                eprintln!("  3. Try --mode datagram if the receiver expects UDP");
            }
            CliError::Sms(SmsError::NoDestination) => {
                eprintln!();
                eprintln!("Pass --to <number> or set [sms] destination in the config file.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::Agent(e) => write!(f, "{}", e),
            CliError::Reporting(msg) => write!(f, "Reporting stopped: {}", msg),
            CliError::Encode(e) => write!(f, "Failed to encode report: {}", e),
            CliError::Sms(e) => write!(f, "SMS failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Agent(e) => Some(e),
            CliError::Encode(e) => Some(e),
            CliError::Sms(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<AgentError> for CliError {
    fn from(e: AgentError) -> Self {
        CliError::Agent(e)
    }
}

impl From<EncodeError> for CliError {
    fn from(e: EncodeError) -> Self {
        CliError::Encode(e)
    }
}

impl From<SmsError> for CliError {
    fn from(e: SmsError) -> Self {
        CliError::Sms(e)
    }
}
