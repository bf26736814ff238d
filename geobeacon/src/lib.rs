//! geobeacon - periodic location reporting client
//!
//! This library acquires location fixes, encodes them as single-line text
//! reports and sends them to one or more network endpoints on a timer,
//! either over a persistent TCP connection or as UDP datagrams.
//!
//! # High-Level API
//!
//! The [`agent`] module ties everything together behind a command handle:
//!
//! ```ignore
//! use std::sync::Arc;
//! use geobeacon::agent::TrackingAgent;
//! use geobeacon::location::FixedLocationProvider;
//! use geobeacon::reporter::ReportingConfig;
//! use geobeacon::transport::NetworkTransportFactory;
//!
//! let provider = Arc::new(FixedLocationProvider::new(40.0, -3.0));
//! let factory = Arc::new(NetworkTransportFactory::default());
//! let (agent, handle) = TrackingAgent::new(provider, factory, ReportingConfig::default());
//! agent.spawn();
//!
//! handle.set_identifier("U1").await?;
//! handle.set_endpoint(0, "10.0.0.5", 5000).await?;
//! handle.start_sending().await?;
//! ```

pub mod agent;
pub mod config;
pub mod encoder;
pub mod error;
pub mod host;
pub mod location;
pub mod logging;
pub mod reporter;
pub mod session;
pub mod sms;
pub mod time;
pub mod transport;

pub use error::{Error, Result};

/// Version of the geobeacon library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
