//! CLI runner for common setup.
//!
//! Encapsulates config loading and logging initialization so command
//! handlers start from the same state.

use tracing::info;

use geobeacon::config::ConfigFile;
use geobeacon::logging::{init_logging, LoggingGuard, LoggingOptions};

use crate::error::CliError;

/// Shared state for commands that report: config plus active logging.
pub struct CliRunner {
    /// Flushes the log file when the runner is dropped
    _logging: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// Log lines go to the configured file. They are mirrored to stdout only
    /// in debug mode so status output stays readable.
    ///
    /// `debug` forces the debug level even when `RUST_LOG` is set.
    pub fn with_debug(debug: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let options = LoggingOptions {
            file: config.logging.file.clone(),
            debug,
            stdout: debug,
        };
        let guard = init_logging(&options).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging: guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!("geobeacon v{}", geobeacon::VERSION);
        info!(command, "geobeacon CLI starting");
    }
}
