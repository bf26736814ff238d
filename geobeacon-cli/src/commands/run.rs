//! Run command - track the location and report it until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use geobeacon::agent::{AgentHandle, TrackingAgent};
use geobeacon::config::{ConfigFile, LocationSettings, LocationSource};
use geobeacon::encoder::MessageFormat;
use geobeacon::location::{
    FixedLocationProvider, LocationProvider, UdpLocationProvider, UdpLocationProviderConfig,
};
use geobeacon::reporter::ReporterPhase;
use geobeacon::session::{SessionSnapshot, MAX_ENDPOINTS};
use geobeacon::transport::{Endpoint, NetworkTransportFactory, TransportMode};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Default)]
pub struct RunArgs {
    pub id: Option<String>,
    pub endpoints: Vec<Endpoint>,
    pub mode: Option<TransportMode>,
    pub format: Option<MessageFormat>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub udp_port: Option<u16>,
    pub debug: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("run");

    let mut config = runner.config().clone();
    apply_overrides(&mut config, &args)?;
    let provider = build_provider(&config.location)?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    runtime.block_on(report_until_interrupted(config, provider))
}

/// Command-line values win over the config file.
fn apply_overrides(config: &mut ConfigFile, args: &RunArgs) -> Result<(), CliError> {
    if let Some(id) = &args.id {
        config.client.identifier = Some(id.clone());
    }
    if !args.endpoints.is_empty() {
        if args.endpoints.len() > MAX_ENDPOINTS {
            return Err(CliError::Config(format!(
                "at most {} endpoints can be given, got {}",
                MAX_ENDPOINTS,
                args.endpoints.len()
            )));
        }
        config.transport.endpoints = args.endpoints.clone();
    }
    if let Some(mode) = args.mode {
        config.transport.mode = mode;
    }
    if let Some(format) = args.format {
        config.transport.message_format = format;
    }
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        config.location.source = LocationSource::Fixed;
        config.location.latitude = Some(lat);
        config.location.longitude = Some(lon);
    }
    if let Some(port) = args.udp_port {
        config.location.source = LocationSource::Udp;
        config.location.udp_port = port;
    }
    Ok(())
}

fn build_provider(location: &LocationSettings) -> Result<Arc<dyn LocationProvider>, CliError> {
    match location.source {
        LocationSource::Fixed => {
            let (Some(lat), Some(lon)) = (location.latitude, location.longitude) else {
                return Err(CliError::Config(
                    "location.source = fixed needs latitude and longitude (or --lat/--lon)"
                        .to_string(),
                ));
            };
            let mut provider = FixedLocationProvider::new(lat, lon)
                .with_interval(Duration::from_millis(location.update_interval_ms));
            if let Some(alt) = location.altitude {
                provider = provider.with_altitude(alt);
            }
            Ok(Arc::new(provider))
        }
        LocationSource::Udp => Ok(Arc::new(UdpLocationProvider::new(
            UdpLocationProviderConfig {
                port: location.udp_port,
                ..Default::default()
            },
        ))),
    }
}

async fn report_until_interrupted(
    config: ConfigFile,
    provider: Arc<dyn LocationProvider>,
) -> Result<(), CliError> {
    let factory = Arc::new(NetworkTransportFactory::default());
    let (agent, handle) = TrackingAgent::new(provider, factory, config.reporting_config());
    let agent_task = agent
        .with_provider_options(config.provider_options())
        .spawn();

    let interrupted = CancellationToken::new();
    let signal = interrupted.clone();
    ctrlc::set_handler(move || signal.cancel())
        .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    let outcome = configure_and_report(&config, &handle, &interrupted).await;

    info!("Shutting down");
    if let Err(e) = handle.go_home().await {
        warn!(error = %e, "Stop failed");
    }
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "Shutdown failed");
    }
    if let Err(e) = agent_task.await {
        warn!(error = %e, "Agent task ended abnormally");
    }

    outcome
}

async fn configure_and_report(
    config: &ConfigFile,
    handle: &AgentHandle,
    interrupted: &CancellationToken,
) -> Result<(), CliError> {
    if let Some(id) = &config.client.identifier {
        handle.set_identifier(id.as_str()).await?;
    }
    for (index, endpoint) in config.transport.endpoints.iter().enumerate() {
        handle
            .set_endpoint(index, endpoint.host.as_str(), endpoint.port)
            .await?;
    }

    let mut snapshots = handle.subscribe();
    handle.start_sending().await?;

    println!(
        "Reporting as {} over {} to {}",
        config.client.identifier.as_deref().unwrap_or(""),
        config.transport.mode,
        describe_endpoints(&config.transport.endpoints, config.transport.mode)
    );
    println!("Press Ctrl-C to stop.");
    println!();

    let mut printer = SnapshotPrinter::default();
    loop {
        tokio::select! {
            _ = interrupted.cancelled() => {
                println!();
                println!("Stopping...");
                return Ok(());
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err(CliError::Reporting("tracking agent exited".to_string()));
                }
                let snapshot = snapshots.borrow_and_update().clone();
                printer.print(&snapshot);
                if printer.stopped_on_its_own(&snapshot) {
                    let reason = snapshot
                        .last_error
                        .unwrap_or_else(|| "reporting loop ended".to_string());
                    return Err(CliError::Reporting(reason));
                }
            }
        }
    }
}

fn describe_endpoints(endpoints: &[Endpoint], mode: TransportMode) -> String {
    match mode {
        TransportMode::Stream => endpoints
            .first()
            .map(|ep| ep.to_string())
            .unwrap_or_else(|| "(none)".to_string()),
        TransportMode::Datagram => endpoints
            .iter()
            .map(|ep| ep.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Prints phase changes and each delivered report.
#[derive(Default)]
struct SnapshotPrinter {
    phase: ReporterPhase,
    messages_sent: u64,
    left_idle: bool,
}

impl SnapshotPrinter {
    fn print(&mut self, snapshot: &SessionSnapshot) {
        if snapshot.phase != self.phase {
            println!("[{}] {}", Local::now().format("%H:%M:%S"), snapshot.phase);
            self.phase = snapshot.phase;
        }
        if snapshot.phase != ReporterPhase::Idle {
            self.left_idle = true;
        }
        if snapshot.messages_sent > self.messages_sent {
            self.messages_sent = snapshot.messages_sent;
            match snapshot.current_fix.coordinates() {
                Some((lat, lon)) => println!(
                    "[{}] sent #{}  {:.6} {:.6}",
                    Local::now().format("%H:%M:%S"),
                    snapshot.messages_sent,
                    lat,
                    lon
                ),
                None => println!(
                    "[{}] sent #{}",
                    Local::now().format("%H:%M:%S"),
                    snapshot.messages_sent
                ),
            }
        }
    }

    /// The loop went back to idle without being asked to stop.
    ///
    /// A fast connect failure can publish `Idle` before `Starting` is
    /// observed, so a recorded error also counts.
    fn stopped_on_its_own(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.phase == ReporterPhase::Idle
            && (self.left_idle || snapshot.last_error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = ConfigFile::default();
        config.transport.endpoints = vec![Endpoint::new("old", 1)];
        let args = RunArgs {
            id: Some("U1".to_string()),
            endpoints: vec![Endpoint::new("10.0.0.5", 5000), Endpoint::new("10.0.0.6", 5000)],
            mode: Some(TransportMode::Datagram),
            lat: Some(40.0),
            lon: Some(-3.0),
            ..Default::default()
        };

        apply_overrides(&mut config, &args).unwrap();

        assert_eq!(config.client.identifier.as_deref(), Some("U1"));
        assert_eq!(config.transport.endpoints.len(), 2);
        assert_eq!(config.transport.mode, TransportMode::Datagram);
        assert_eq!(config.location.source, LocationSource::Fixed);
        assert_eq!(config.location.latitude, Some(40.0));
    }

    #[test]
    fn test_too_many_endpoints_rejected() {
        let mut config = ConfigFile::default();
        let args = RunArgs {
            endpoints: (1..=4).map(|i| Endpoint::new("h", i)).collect(),
            ..Default::default()
        };

        assert!(matches!(
            apply_overrides(&mut config, &args),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_fixed_source_needs_coordinates() {
        let mut location = ConfigFile::default().location;
        location.source = LocationSource::Fixed;
        assert!(build_provider(&location).is_err());

        location.latitude = Some(40.0);
        location.longitude = Some(-3.0);
        assert_eq!(build_provider(&location).unwrap().name(), "fixed");
    }

    #[test]
    fn test_stream_describes_first_endpoint_only() {
        let endpoints = vec![Endpoint::new("a", 1), Endpoint::new("b", 2)];
        assert_eq!(describe_endpoints(&endpoints, TransportMode::Stream), "a:1");
        assert_eq!(
            describe_endpoints(&endpoints, TransportMode::Datagram),
            "a:1, b:2"
        );
    }

    #[test]
    fn test_idle_with_error_counts_as_stopped() {
        let printer = SnapshotPrinter::default();
        let mut snapshot = SessionSnapshot::default();
        assert!(!printer.stopped_on_its_own(&snapshot));

        snapshot.last_error = Some("Connection refused".to_string());
        assert!(printer.stopped_on_its_own(&snapshot));
    }
}
