//! The reporting loop.
//!
//! A [`ReportingLoop`] opens a transport, then repeatedly waits for a usable
//! fix, encodes it and delivers it, pausing between cycles according to its
//! [`ReportingConfig`]. Every wait is raced against a cancellation token, so
//! a stop request is honoured at the next suspension point. A send that has
//! already been issued is allowed to complete.
//!
//! The loop owns no session state. It reports progress as [`LoopEvent`]s to
//! whoever spawned it, which keeps the phase bookkeeping in one place.
//!
//! # Example
//!
//! ```ignore
//! use geobeacon::reporter::{ReportingLoop, ReportingConfig};
//!
//! let reporting = ReportingLoop::new(factory, identifier, endpoints, config, fixes, events);
//! tokio::spawn(reporting.run(cancel.clone()));
//! ```

mod config;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::encoder::encode;
use crate::location::{AcquisitionError, LocationFix};
use crate::session::ClientIdentifier;
use crate::time::{Clock, SystemClock};
use crate::transport::{DeliveryReport, Endpoint, OpenRequest, Transport, TransportFactory};

pub use config::{
    ReportingConfig, DEFAULT_DATAGRAM_ROUND_PAUSE, DEFAULT_DATAGRAM_SEND_DELAY,
    DEFAULT_STREAM_INTERVAL,
};

/// Lifecycle phase of the reporting loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReporterPhase {
    #[default]
    Idle,
    /// Transport is being opened.
    Starting,
    /// Reports are going out.
    Sending,
    /// Stop requested, transport being released.
    Stopping,
}

impl fmt::Display for ReporterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReporterPhase::Idle => write!(f, "idle"),
            ReporterPhase::Starting => write!(f, "starting"),
            ReporterPhase::Sending => write!(f, "sending"),
            ReporterPhase::Stopping => write!(f, "stopping"),
        }
    }
}

/// Progress reported by a running loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// Transport open; reports will follow.
    Sending,
    /// Transport could not be opened. The loop ends right after.
    ConnectFailed(String),
    /// One message went through a delivery round.
    Delivered(DeliveryReport),
    /// The loop has released its transport and exited.
    Stopped,
}

/// Result of waiting for the next usable fix.
enum FixWait {
    Ready(LocationFix),
    TimedOut,
    Closed,
}

/// One reporting session.
pub struct ReportingLoop<F: TransportFactory> {
    factory: Arc<F>,
    clock: Arc<dyn Clock>,
    identifier: ClientIdentifier,
    endpoints: Vec<Endpoint>,
    config: ReportingConfig,
    fixes: watch::Receiver<LocationFix>,
    events: mpsc::UnboundedSender<LoopEvent>,
}

impl<F: TransportFactory> ReportingLoop<F> {
    /// Create a loop that reads fixes from `fixes` and reports to `events`.
    ///
    /// Uses the system clock for message timestamps.
    pub fn new(
        factory: Arc<F>,
        identifier: ClientIdentifier,
        endpoints: Vec<Endpoint>,
        config: ReportingConfig,
        fixes: watch::Receiver<LocationFix>,
        events: mpsc::UnboundedSender<LoopEvent>,
    ) -> Self {
        Self {
            factory,
            clock: Arc::new(SystemClock),
            identifier,
            endpoints,
            config,
            fixes,
            events,
        }
    }

    /// Replace the clock used for message timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run until cancelled, or until the transport cannot be opened.
    ///
    /// Always emits [`LoopEvent::Stopped`] last.
    pub async fn run(mut self, cancel: CancellationToken) {
        let request = OpenRequest {
            mode: self.config.mode,
            endpoints: self.endpoints.clone(),
            datagram_send_delay: self.config.datagram_send_delay,
        };

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.factory.open(request) => Some(result),
        };

        let mut transport = match opened {
            Some(Ok(transport)) => transport,
            Some(Err(e)) => {
                warn!(mode = %self.config.mode, error = %e, "Failed to open report transport");
                self.emit(LoopEvent::ConnectFailed(e.to_string()));
                self.emit(LoopEvent::Stopped);
                return;
            }
            None => {
                debug!("Reporting cancelled before transport opened");
                self.emit(LoopEvent::Stopped);
                return;
            }
        };

        info!(
            mode = %self.config.mode,
            endpoints = self.endpoints.len(),
            identifier = %self.identifier,
            "Reporting started"
        );
        self.emit(LoopEvent::Sending);

        let sent = self.send_cycles(&mut transport, &cancel).await;

        transport.close().await;
        info!(messages = sent, "Reporting stopped");
        self.emit(LoopEvent::Stopped);
    }

    /// Cycle until cancelled. Returns the number of messages delivered.
    async fn send_cycles(&mut self, transport: &mut F::Transport, cancel: &CancellationToken) -> u64 {
        let pause = self.config.cycle_pause();
        let mut sent = 0u64;

        loop {
            let waited = tokio::select! {
                biased;
                _ = cancel.cancelled() => return sent,
                waited = next_fix(&mut self.fixes, pause) => waited,
            };

            let fix = match waited {
                FixWait::Ready(fix) => fix,
                FixWait::TimedOut => {
                    warn!(error = %AcquisitionError::NoFix, "Skipping report cycle");
                    continue;
                }
                FixWait::Closed => {
                    warn!("Location updates closed, ending reporting");
                    return sent;
                }
            };

            if let Some(report) = self.report(transport, &fix, cancel).await {
                sent += report.delivered as u64;
                self.emit(LoopEvent::Delivered(report));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return sent,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Encode and deliver one fix.
    async fn report(
        &self,
        transport: &mut F::Transport,
        fix: &LocationFix,
        cancel: &CancellationToken,
    ) -> Option<DeliveryReport> {
        let captured_at = self.clock.now();
        let message = match encode(fix, &self.identifier, captured_at, self.config.message_format) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, ?fix, "Fix not reportable");
                return None;
            }
        };

        let report = transport.deliver(&message, cancel).await;
        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            interrupted = report.interrupted,
            "Delivery round complete"
        );
        Some(report)
    }

    fn emit(&self, event: LoopEvent) {
        if self.events.send(event).is_err() {
            debug!("Loop event dropped, nobody listening");
        }
    }
}

/// Wait at most `limit` for a fix with usable coordinates.
async fn next_fix(fixes: &mut watch::Receiver<LocationFix>, limit: Duration) -> FixWait {
    let wait = async { fixes.wait_for(LocationFix::is_reportable).await.map(|fix| *fix) };
    match tokio::time::timeout(limit, wait).await {
        Ok(Ok(fix)) => FixWait::Ready(fix),
        Ok(Err(_)) => FixWait::Closed,
        Err(_) => FixWait::TimedOut,
    }
}
