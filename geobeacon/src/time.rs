//! Time-related utilities.
//!
//! Message encoding stamps every line with the local wall-clock time. The
//! [`Clock`] trait lets callers freeze that time so encoded output is
//! reproducible.

use chrono::{DateTime, Local, TimeZone};

/// Source of the wall-clock time used when encoding messages.
pub trait Clock: Send + Sync {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Local>);

impl FixedClock {
    /// Freeze the clock at the given local time.
    pub fn new(at: DateTime<Local>) -> Self {
        Self(at)
    }

    /// Freeze the clock at a Unix timestamp in milliseconds.
    ///
    /// Returns `None` if the timestamp is out of chrono's range.
    pub fn from_timestamp_ms(timestamp_ms: i64) -> Option<Self> {
        Local.timestamp_millis_opt(timestamp_ms).single().map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Convert a Unix timestamp in milliseconds to local time.
pub fn local_time_from_ms(timestamp_ms: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(timestamp_ms).single()
}
