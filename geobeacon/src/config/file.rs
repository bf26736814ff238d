//! Reading and writing `~/.geobeacon/config.ini`.
//!
//! A missing file is not an error: every setting has a default. The INI
//! text itself is handled by [`super::parser`] and [`super::writer`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::location::ProviderOptions;
use crate::reporter::ReportingConfig;

/// Config file name inside [`config_directory`].
const CONFIG_FILE_NAME: &str = "config.ini";

/// Problems loading or saving the config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file exists but is not valid INI or cannot be read
    #[error("Cannot read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("Cannot write config file: {0}")]
    Write(std::io::Error),

    /// A key is present with a value that cannot be used
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Cannot create {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigFile {
    /// Read [`config_file_path`], or defaults when it is absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Read `path`, or defaults when it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        match path.try_exists() {
            Ok(true) => super::parser::parse_ini(&Ini::load_from_file(path)?),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Write to `path`, creating its directory first.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|source| ConfigFileError::CreateDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?
            }
            _ => {}
        }

        fs::write(path, self.to_config_string()).map_err(ConfigFileError::Write)
    }

    /// Render as the commented INI text written by [`save_to`](Self::save_to).
    pub fn to_config_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Write a default file unless one is already there. Returns its path.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let target = config_file_path();
        if !target.exists() {
            Self::default().save_to(&target)?;
        }
        Ok(target)
    }

    /// Reporting settings for the reporting loop.
    pub fn reporting_config(&self) -> ReportingConfig {
        ReportingConfig {
            mode: self.transport.mode,
            message_format: self.transport.message_format,
            stream_interval: Duration::from_millis(self.reporting.stream_interval_ms),
            datagram_send_delay: Duration::from_millis(self.reporting.datagram_send_delay_ms),
            datagram_round_pause: Duration::from_millis(self.reporting.datagram_round_pause_ms),
        }
    }

    /// Options for the location provider.
    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            distance_filter_m: self.location.distance_filter_m,
            ..Default::default()
        }
    }
}

/// `~/.geobeacon`, or `./.geobeacon` when there is no home directory.
pub fn config_directory() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".geobeacon")
}

pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationSource;
    use crate::encoder::MessageFormat;
    use crate::transport::TransportMode;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert!(config.client.identifier.is_none());
        assert_eq!(config.transport.mode, TransportMode::Stream);
        assert!(config.transport.endpoints.is_empty());
        assert_eq!(config.transport.message_format, MessageFormat::Compact);
        assert_eq!(config.location.source, LocationSource::Udp);
        assert_eq!(config.location.udp_port, 49002);
        assert!(config.sms.destination.is_none());
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_reporting_config_from_defaults() {
        assert_eq!(
            ConfigFile::default().reporting_config(),
            ReportingConfig::default()
        );
    }

    #[test]
    fn test_reporting_config_uses_file_values() {
        let mut config = ConfigFile::default();
        config.transport.mode = TransportMode::Datagram;
        config.reporting.datagram_send_delay_ms = 250;

        let reporting = config.reporting_config();
        assert_eq!(reporting.mode, TransportMode::Datagram);
        assert_eq!(reporting.datagram_send_delay, Duration::from_millis(250));
        assert_eq!(reporting.cycle_pause(), Duration::from_secs(5));
    }

    #[test]
    fn test_provider_options_carry_distance_filter() {
        let mut config = ConfigFile::default();
        assert_eq!(config.provider_options(), ProviderOptions::default());

        config.location.distance_filter_m = 30.0;
        let options = config.provider_options();
        assert_eq!(options.distance_filter_m, 30.0);
        assert!(options.high_accuracy);
    }

    #[test]
    fn test_save_creates_directory_and_reloads() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.client.identifier = Some("U1".to_string());
        config.save_to(&config_path).unwrap();

        assert_eq!(ConfigFile::load_from(&config_path).unwrap(), config);
    }

    #[test]
    fn test_unreadable_ini_is_read_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, "[client\nidentifier = U1\n").unwrap();

        assert!(matches!(
            ConfigFile::load_from(&config_path),
            Err(ConfigFileError::Read(_))
        ));
    }

    #[test]
    fn test_config_path_under_home() {
        let path = config_file_path();
        assert!(path.ends_with(".geobeacon/config.ini"));
    }
}
