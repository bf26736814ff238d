//! Messages handled by the agent task.

use tokio::sync::oneshot;

use crate::location::{AcquisitionError, LocationFix};
use crate::session::ValidationError;

use super::AgentError;

/// Result of a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    /// Reporting was idle and has been started.
    Started,
    /// Reporting was active and a stop has been requested.
    Stopping,
}

/// Requests from [`AgentHandle`](super::AgentHandle)s.
#[derive(Debug)]
pub(crate) enum AgentCommand {
    SetIdentifier {
        identifier: String,
        reply: oneshot::Sender<Result<(), ValidationError>>,
    },
    SetEndpoint {
        index: usize,
        host: String,
        port: u16,
        reply: oneshot::Sender<Result<(), ValidationError>>,
    },
    ClearEndpoint {
        index: usize,
        reply: oneshot::Sender<Result<(), ValidationError>>,
    },
    StartTracking {
        reply: oneshot::Sender<Result<(), AgentError>>,
    },
    StartSending {
        reply: oneshot::Sender<Result<(), AgentError>>,
    },
    /// Answered once the loop is back to idle.
    StopSending { reply: oneshot::Sender<()> },
    ToggleSending {
        reply: oneshot::Sender<Result<Toggled, AgentError>>,
    },
    /// Answered once the loop is back to idle.
    GoHome { reply: oneshot::Sender<()> },
    /// Answered right before the agent task exits.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Output of a location watcher task, tagged with the watcher generation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WatcherEvent {
    Fix(u64, LocationFix),
    Error(u64, AcquisitionError),
    Ended(u64),
}
