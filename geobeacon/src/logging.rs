//! Logging setup for geobeacon.
//!
//! Structured `tracing` output goes to two places:
//! - a log file (`logs/geobeacon.log` by default), cleared on session start
//! - stdout, for following a session live
//!
//! The filter comes from `RUST_LOG` when set, otherwise `info`. Debug mode
//! overrides both with `debug`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "geobeacon.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Logging options.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Log file to (re)create.
    pub file: PathBuf,
    /// Force the `debug` level, ignoring `RUST_LOG`.
    pub debug: bool,
    /// Also write to stdout.
    pub stdout: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            file: default_log_path(),
            debug: false,
            stdout: true,
        }
    }
}

/// Initialize the global subscriber.
///
/// Creates the log directory if needed and truncates the log file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be cleared.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard, io::Error> {
    let (log_dir, log_file) = prepare_log_file(&options.file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    let stdout_layer = options.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact()
    });

    let env_filter = if options.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Create the parent directory and clear the file.
///
/// Returns the directory and file name for the appender.
fn prepare_log_file(path: &Path) -> Result<(PathBuf, PathBuf), io::Error> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log path has no file name: {}", path.display()),
        )
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&dir)?;
    fs::write(path, "")?;
    Ok((dir, PathBuf::from(file_name)))
}

/// Default log file path.
pub fn default_log_path() -> PathBuf {
    Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_path() {
        assert_eq!(default_log_path(), PathBuf::from("logs/geobeacon.log"));
        let options = LoggingOptions::default();
        assert!(!options.debug);
        assert!(options.stdout);
    }

    #[test]
    fn test_prepare_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deep/nested/session.log");

        let (dir, file) = prepare_log_file(&path).unwrap();

        assert_eq!(dir, temp.path().join("deep/nested"));
        assert_eq!(file, PathBuf::from("session.log"));
        assert!(path.exists());
    }

    #[test]
    fn test_prepare_clears_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.log");
        fs::write(&path, "old log data").unwrap();

        prepare_log_file(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_rejects_path_without_file_name() {
        let err = prepare_log_file(Path::new("/")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let _logging_guard = LoggingGuard { _file_guard: guard };
    }

    // Output itself is not tested here: the global subscriber can only be
    // installed once per process.
}
