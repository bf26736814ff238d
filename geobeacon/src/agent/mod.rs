//! The tracking agent.
//!
//! [`TrackingAgent`] is an actor: a single task that owns the
//! [`SessionState`] and applies every change to it. UI commands arrive
//! through an [`AgentHandle`], the location watcher and the reporting loop
//! report back through internal channels, and after every change a fresh
//! [`SessionSnapshot`] is published on a `watch` channel.
//!
//! Background work (the location watcher and the reporting loop) is handed
//! to a [`TaskHost`] under fixed names so it can be stopped as a unit.
//!
//! # Example
//!
//! ```ignore
//! let (agent, handle) = TrackingAgent::new(provider, factory, ReportingConfig::default());
//! agent.spawn();
//!
//! handle.set_identifier("U1").await?;
//! handle.set_endpoint(0, "10.0.0.5", 5000).await?;
//! handle.start_sending().await?;
//! ```

mod command;

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::host::{
    HostError, TaskHost, TokioTaskHost, LOCATION_WATCHER_TASK, REPORTING_LOOP_TASK,
};
use crate::location::{
    DistanceFilter, LocationEvent, LocationFix, LocationProvider, ProviderOptions,
};
use crate::reporter::{LoopEvent, ReporterPhase, ReportingConfig, ReportingLoop};
use crate::session::{Screen, SessionSnapshot, SessionState, ValidationError};
use crate::time::{Clock, SystemClock};
use crate::transport::TransportFactory;

pub use command::Toggled;
use command::{AgentCommand, WatcherEvent};

/// Commands buffered before senders wait.
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Errors returned to callers of [`AgentHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Background task could not be started: {0}")]
    Host(#[from] HostError),

    /// The agent task has exited.
    #[error("Tracking agent is not running")]
    Closed,
}

/// Actor owning one reporting session.
pub struct TrackingAgent<F: TransportFactory> {
    provider: Arc<dyn LocationProvider>,
    provider_options: ProviderOptions,
    factory: Arc<F>,
    host: Arc<dyn TaskHost>,
    clock: Arc<dyn Clock>,
    config: ReportingConfig,
    state: SessionState,

    commands: mpsc::Receiver<AgentCommand>,
    loop_events_tx: mpsc::UnboundedSender<LoopEvent>,
    loop_events: mpsc::UnboundedReceiver<LoopEvent>,
    watcher_events_tx: mpsc::UnboundedSender<WatcherEvent>,
    watcher_events: mpsc::UnboundedReceiver<WatcherEvent>,
    fix_tx: watch::Sender<LocationFix>,
    snapshot_tx: watch::Sender<SessionSnapshot>,

    /// Cancels the current location watcher.
    tracking: Option<CancellationToken>,
    /// Incremented per watcher so late events from an old one are ignored.
    watcher_generation: u64,
    /// Cancels the current reporting loop.
    reporting: Option<CancellationToken>,
    /// Callers waiting for the loop to become idle.
    pending_stops: Vec<oneshot::Sender<()>>,
    exiting: bool,
}

impl<F: TransportFactory> TrackingAgent<F> {
    /// Create an agent and the handle used to drive it.
    ///
    /// The agent does nothing until [`spawn`](Self::spawn) or
    /// [`run`](Self::run) is called.
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        factory: Arc<F>,
        config: ReportingConfig,
    ) -> (Self, AgentHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (loop_events_tx, loop_events) = mpsc::unbounded_channel();
        let (watcher_events_tx, watcher_events) = mpsc::unbounded_channel();
        let (fix_tx, _) = watch::channel(LocationFix::empty());

        let state = SessionState::new();
        let (snapshot_tx, snapshots) = watch::channel(state.snapshot());

        let agent = Self {
            provider,
            provider_options: ProviderOptions::default(),
            factory,
            host: Arc::new(TokioTaskHost::new()),
            clock: Arc::new(SystemClock),
            config,
            state,
            commands,
            loop_events_tx,
            loop_events,
            watcher_events_tx,
            watcher_events,
            fix_tx,
            snapshot_tx,
            tracking: None,
            watcher_generation: 0,
            reporting: None,
            pending_stops: Vec::new(),
            exiting: false,
        };
        let handle = AgentHandle {
            commands: commands_tx,
            snapshots,
        };
        (agent, handle)
    }

    /// Use a different task host.
    pub fn with_host(mut self, host: Arc<dyn TaskHost>) -> Self {
        self.host = host;
        self
    }

    /// Use a different clock for message timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Options passed to the provider on every subscription.
    ///
    /// A non-zero `distance_filter_m` keeps fixes that moved less than that
    /// from reaching the session.
    pub fn with_provider_options(mut self, options: ProviderOptions) -> Self {
        self.provider_options = options;
        self
    }

    /// Run the agent on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands and events until shut down.
    ///
    /// Dropping every [`AgentHandle`] behaves like a shutdown.
    pub async fn run(mut self) {
        debug!(provider = self.provider.name(), mode = %self.config.mode, "Tracking agent started");

        loop {
            tokio::select! {
                biased;
                Some(event) = self.loop_events.recv() => self.on_loop_event(event),
                Some(event) = self.watcher_events.recv() => self.on_watcher_event(event),
                command = self.commands.recv(), if !self.exiting => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        debug!("All agent handles dropped");
                        self.begin_exit();
                    }
                },
            }

            if self.exiting && self.state.phase() == ReporterPhase::Idle {
                break;
            }
        }

        self.stop_tracking();
        self.host.unregister(REPORTING_LOOP_TASK);
        for reply in self.pending_stops.drain(..) {
            let _ = reply.send(());
        }
        debug!("Tracking agent stopped");
    }

    fn on_command(&mut self, command: AgentCommand) {
        match command {
            AgentCommand::SetIdentifier { identifier, reply } => {
                let result = self.state.set_identifier(&identifier);
                self.publish();
                let _ = reply.send(result);
            }
            AgentCommand::SetEndpoint {
                index,
                host,
                port,
                reply,
            } => {
                let result = self.state.set_endpoint(index, &host, port);
                self.publish();
                let _ = reply.send(result);
            }
            AgentCommand::ClearEndpoint { index, reply } => {
                let result = self.state.clear_endpoint(index);
                self.publish();
                let _ = reply.send(result);
            }
            AgentCommand::StartTracking { reply } => {
                let result = self.start_tracking();
                self.publish();
                let _ = reply.send(result);
            }
            AgentCommand::StartSending { reply } => {
                let result = self.start_sending();
                self.publish();
                let _ = reply.send(result);
            }
            AgentCommand::StopSending { reply } => {
                self.request_stop();
                self.publish();
                self.reply_when_idle(reply);
            }
            AgentCommand::ToggleSending { reply } => {
                let result = if self.state.phase() == ReporterPhase::Idle {
                    self.start_sending().map(|()| Toggled::Started)
                } else {
                    self.request_stop();
                    Ok(Toggled::Stopping)
                };
                self.publish();
                let _ = reply.send(result);
            }
            AgentCommand::GoHome { reply } => {
                self.go_home();
                self.reply_when_idle(reply);
            }
            AgentCommand::Shutdown { reply } => {
                self.begin_exit();
                self.reply_when_idle(reply);
            }
        }
    }

    fn on_loop_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Sending => {
                if self.state.phase() == ReporterPhase::Starting {
                    self.state.set_phase(ReporterPhase::Sending);
                }
            }
            LoopEvent::ConnectFailed(error) => {
                self.state.set_last_error(Some(error));
            }
            LoopEvent::Delivered(report) => {
                self.state.record_sent(report.delivered);
            }
            LoopEvent::Stopped => {
                self.reporting = None;
                self.host.unregister(REPORTING_LOOP_TASK);
                self.state.set_phase(ReporterPhase::Idle);
                for reply in self.pending_stops.drain(..) {
                    let _ = reply.send(());
                }
            }
        }
        self.publish();
    }

    fn on_watcher_event(&mut self, event: WatcherEvent) {
        match event {
            WatcherEvent::Fix(generation, fix) if generation == self.watcher_generation => {
                self.state.set_current_fix(fix);
                self.fix_tx.send_replace(fix);
                self.publish();
            }
            WatcherEvent::Error(generation, error) if generation == self.watcher_generation => {
                warn!(error = %error, "Location acquisition failed");
            }
            WatcherEvent::Ended(generation) if generation == self.watcher_generation => {
                warn!(provider = self.provider.name(), "Location updates ended");
                self.stop_tracking();
                self.publish();
            }
            stale => debug!(?stale, "Ignoring event from previous location watcher"),
        }
    }

    fn start_tracking(&mut self) -> Result<(), AgentError> {
        self.state.set_screen(Screen::LocationInfo);
        if self.tracking.is_some() {
            return Ok(());
        }

        self.watcher_generation += 1;
        let cancel = CancellationToken::new();
        let watcher = watch_location(
            self.provider.subscribe(self.provider_options),
            DistanceFilter::new(self.provider_options.distance_filter_m),
            self.watcher_generation,
            self.watcher_events_tx.clone(),
            cancel.clone(),
        );
        self.host.register(LOCATION_WATCHER_TASK, Box::pin(watcher))?;

        info!(
            provider = self.provider.name(),
            high_accuracy = self.provider_options.high_accuracy,
            distance_filter_m = self.provider_options.distance_filter_m,
            "Location tracking started"
        );
        self.tracking = Some(cancel);
        self.state.set_tracking(true);
        Ok(())
    }

    fn stop_tracking(&mut self) {
        if let Some(cancel) = self.tracking.take() {
            cancel.cancel();
            info!("Location tracking stopped");
        }
        self.host.unregister(LOCATION_WATCHER_TASK);
        self.state.set_tracking(false);
    }

    fn start_sending(&mut self) -> Result<(), AgentError> {
        let (identifier, endpoints) = match self.state.validate_for_start(self.config.mode) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(error = %e, "Cannot start reporting");
                self.state.set_last_error(Some(e.to_string()));
                return Err(e.into());
            }
        };

        if let Err(e) = self.start_tracking() {
            self.state.set_last_error(Some(e.to_string()));
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let reporting = ReportingLoop::new(
            Arc::clone(&self.factory),
            identifier,
            endpoints,
            self.config.clone(),
            self.fix_tx.subscribe(),
            self.loop_events_tx.clone(),
        )
        .with_clock(Arc::clone(&self.clock));

        if let Err(e) = self
            .host
            .register(REPORTING_LOOP_TASK, Box::pin(reporting.run(cancel.clone())))
        {
            warn!(error = %e, "Cannot start reporting");
            self.state.set_last_error(Some(e.to_string()));
            return Err(e.into());
        }

        self.reporting = Some(cancel);
        self.state.set_last_error(None);
        self.state.set_phase(ReporterPhase::Starting);
        Ok(())
    }

    /// Ask a running loop to stop. The phase becomes idle on `LoopEvent::Stopped`.
    fn request_stop(&mut self) {
        match self.state.phase() {
            ReporterPhase::Starting | ReporterPhase::Sending => {
                if let Some(cancel) = &self.reporting {
                    cancel.cancel();
                }
                self.state.set_phase(ReporterPhase::Stopping);
                info!("Stopping reporting");
            }
            ReporterPhase::Idle | ReporterPhase::Stopping => {}
        }
    }

    fn go_home(&mut self) {
        self.request_stop();
        self.stop_tracking();
        self.state.set_screen(Screen::Home);
        self.publish();
    }

    fn begin_exit(&mut self) {
        self.exiting = true;
        self.go_home();
    }

    fn reply_when_idle(&mut self, reply: oneshot::Sender<()>) {
        if self.state.phase() == ReporterPhase::Idle {
            let _ = reply.send(());
        } else {
            self.pending_stops.push(reply);
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}

/// Forward provider events to the agent until cancelled.
async fn watch_location(
    mut updates: BoxStream<'static, LocationEvent>,
    mut filter: DistanceFilter,
    generation: u64,
    events: mpsc::UnboundedSender<WatcherEvent>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = updates.next() => next,
        };

        let event = match next {
            Some(LocationEvent::Fix(fix)) if !filter.accept(&fix) => {
                trace!(?fix, "Fix within distance filter, not delivered");
                continue;
            }
            Some(LocationEvent::Fix(fix)) => WatcherEvent::Fix(generation, fix),
            Some(LocationEvent::Error(error)) => WatcherEvent::Error(generation, error),
            None => {
                let _ = events.send(WatcherEvent::Ended(generation));
                break;
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

/// Cloneable front end to a [`TrackingAgent`].
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::Sender<AgentCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl AgentHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> AgentCommand,
    ) -> Result<T, AgentError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| AgentError::Closed)?;
        response.await.map_err(|_| AgentError::Closed)
    }

    /// Set the identifier included in every report. Blank values are rejected.
    pub async fn set_identifier(&self, identifier: impl Into<String>) -> Result<(), AgentError> {
        let identifier = identifier.into();
        self.request(|reply| AgentCommand::SetIdentifier { identifier, reply })
            .await??;
        Ok(())
    }

    /// Fill endpoint slot `index` (0-based).
    pub async fn set_endpoint(
        &self,
        index: usize,
        host: impl Into<String>,
        port: u16,
    ) -> Result<(), AgentError> {
        let host = host.into();
        self.request(|reply| AgentCommand::SetEndpoint {
            index,
            host,
            port,
            reply,
        })
        .await??;
        Ok(())
    }

    pub async fn clear_endpoint(&self, index: usize) -> Result<(), AgentError> {
        self.request(|reply| AgentCommand::ClearEndpoint { index, reply })
            .await??;
        Ok(())
    }

    /// Start following location updates and show the location screen.
    ///
    /// Calling it again while tracking only switches the screen.
    pub async fn start_tracking(&self) -> Result<(), AgentError> {
        self.request(|reply| AgentCommand::StartTracking { reply })
            .await?
    }

    /// Start reporting. Starts tracking first if needed.
    ///
    /// Returns once the loop has been launched; the snapshot shows
    /// `is_sending` once the transport is open.
    pub async fn start_sending(&self) -> Result<(), AgentError> {
        self.request(|reply| AgentCommand::StartSending { reply })
            .await?
    }

    /// Stop reporting. Resolves once the loop is idle.
    pub async fn stop_sending(&self) -> Result<(), AgentError> {
        self.request(|reply| AgentCommand::StopSending { reply })
            .await
    }

    /// Start when idle, stop otherwise.
    ///
    /// A stop resolves once the loop is idle.
    pub async fn toggle_sending(&self) -> Result<Toggled, AgentError> {
        let toggled = self
            .request(|reply| AgentCommand::ToggleSending { reply })
            .await??;
        if toggled == Toggled::Stopping {
            self.stop_sending().await?;
        }
        Ok(toggled)
    }

    /// Stop everything and return to the home screen.
    ///
    /// Resolves once the loop is idle.
    pub async fn go_home(&self) -> Result<(), AgentError> {
        self.request(|reply| AgentCommand::GoHome { reply }).await
    }

    /// Go home, then stop the agent task.
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        self.request(|reply| AgentCommand::Shutdown { reply }).await
    }

    /// Latest published session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}
