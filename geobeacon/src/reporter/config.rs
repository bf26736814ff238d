//! Reporting cadence and message layout.
//!
//! The cadence differs per transport mode: stream mode reports on a short
//! fixed interval, datagram mode spaces out the per-endpoint sends and then
//! pauses between rounds.

use std::time::Duration;

use crate::encoder::MessageFormat;
use crate::transport::TransportMode;

// ==================== Cadence Defaults ====================

/// Default pause between stream-mode reports.
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_secs(2);

/// Default pause between consecutive datagram sends within a round.
pub const DEFAULT_DATAGRAM_SEND_DELAY: Duration = Duration::from_secs(1);

/// Default pause between datagram rounds.
pub const DEFAULT_DATAGRAM_ROUND_PAUSE: Duration = Duration::from_secs(5);

/// Settings for one reporting session.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingConfig {
    pub mode: TransportMode,
    pub message_format: MessageFormat,
    pub stream_interval: Duration,
    pub datagram_send_delay: Duration,
    pub datagram_round_pause: Duration,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Stream,
            message_format: MessageFormat::Compact,
            stream_interval: DEFAULT_STREAM_INTERVAL,
            datagram_send_delay: DEFAULT_DATAGRAM_SEND_DELAY,
            datagram_round_pause: DEFAULT_DATAGRAM_ROUND_PAUSE,
        }
    }
}

impl ReportingConfig {
    /// Defaults for the given mode.
    pub fn for_mode(mode: TransportMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_message_format(mut self, format: MessageFormat) -> Self {
        self.message_format = format;
        self
    }

    /// Pause after a delivery before the next cycle starts.
    ///
    /// Also bounds how long a cycle waits for a usable fix.
    pub fn cycle_pause(&self) -> Duration {
        match self.mode {
            TransportMode::Stream => self.stream_interval,
            TransportMode::Datagram => self.datagram_round_pause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportingConfig::default();
        assert_eq!(config.mode, TransportMode::Stream);
        assert_eq!(config.message_format, MessageFormat::Compact);
        assert_eq!(config.stream_interval, Duration::from_secs(2));
        assert_eq!(config.datagram_send_delay, Duration::from_secs(1));
        assert_eq!(config.datagram_round_pause, Duration::from_secs(5));
    }

    #[test]
    fn test_cycle_pause_follows_mode() {
        assert_eq!(
            ReportingConfig::for_mode(TransportMode::Stream).cycle_pause(),
            Duration::from_secs(2)
        );
        assert_eq!(
            ReportingConfig::for_mode(TransportMode::Datagram).cycle_pause(),
            Duration::from_secs(5)
        );
    }
}
