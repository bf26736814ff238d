//! User configuration.
//!
//! Settings are read from an INI file (`~/.geobeacon/config.ini` by
//! default). Missing files and missing keys fall back to defaults; values
//! that are present but invalid are reported as
//! [`ConfigFileError::InvalidValue`] naming the section and key.
//!
//! # Example
//!
//! ```no_run
//! use geobeacon::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let reporting = config.reporting_config();
//! # Ok::<(), geobeacon::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    DEFAULT_DATAGRAM_ROUND_PAUSE_MS, DEFAULT_DATAGRAM_SEND_DELAY_MS,
    DEFAULT_LOCATION_UPDATE_INTERVAL_MS, DEFAULT_STREAM_INTERVAL_MS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ClientSettings, ConfigFile, LocationSettings, LocationSource, LoggingSettings,
    ReportingSettings, SmsSettings, TransportSettings,
};
