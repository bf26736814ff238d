//! Outbound delivery of encoded reports.
//!
//! Two modes are supported:
//!
//! - **Stream** ([`StreamTransport`]): one persistent TCP connection to the
//!   first configured endpoint.
//! - **Datagram** ([`DatagramTransport`]): one UDP datagram per endpoint per
//!   round, sent sequentially with a fixed delay between endpoints.
//!
//! The reporting loop only sees the [`Transport`] trait and obtains
//! transports from a [`TransportFactory`], so tests can substitute in-memory
//! pipes and recording senders for real sockets.

mod datagram;
mod endpoint;
mod error;
mod stream;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

pub use datagram::{DatagramSender, DatagramTransport, UdpDatagramSender};
pub use endpoint::{Endpoint, DEFAULT_PORT};
pub use error::{ConnectError, SendError};
pub use stream::{take_replies, ServerReply, StreamConnector, StreamTransport, TcpConnector};

/// How reports reach their endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Persistent TCP connection to a single endpoint.
    #[default]
    Stream,
    /// Connectionless UDP fan-out to every endpoint.
    Datagram,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Stream => write!(f, "stream"),
            TransportMode::Datagram => write!(f, "datagram"),
        }
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" | "tcp" => Ok(TransportMode::Stream),
            "datagram" | "udp" => Ok(TransportMode::Datagram),
            other => Err(format!(
                "unknown transport mode '{}' (expected stream or datagram)",
                other
            )),
        }
    }
}

/// Outcome of delivering one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    /// Sends issued.
    pub attempted: usize,
    /// Sends that succeeded.
    pub delivered: usize,
    /// Sends that failed (already logged).
    pub failed: usize,
    /// The round was cut short by cancellation.
    pub interrupted: bool,
}

/// An open transport.
pub trait Transport: Send {
    fn mode(&self) -> TransportMode;

    /// Deliver one message to every destination of this transport.
    ///
    /// Failures are logged and counted, never returned. Cancellation is
    /// observed between sends only; a send already issued completes.
    fn deliver(
        &mut self,
        message: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = DeliveryReport> + Send;

    /// Release the transport. Consumes it so it can only be closed once.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Everything needed to open a transport.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub mode: TransportMode,
    /// Endpoints in slot order. Stream mode uses the first one.
    pub endpoints: Vec<Endpoint>,
    /// Pause between consecutive datagram sends.
    pub datagram_send_delay: Duration,
}

/// Opens transports for the reporting loop.
pub trait TransportFactory: Send + Sync + 'static {
    type Transport: Transport + 'static;

    /// Open a transport. Stream mode connects here; datagram mode opens
    /// nothing until the first delivery.
    fn open(
        &self,
        request: OpenRequest,
    ) -> impl Future<Output = Result<Self::Transport, ConnectError>> + Send;
}

/// Transport produced by [`NetworkTransportFactory`].
pub enum ReportTransport<S, D> {
    Stream(StreamTransport<S>),
    Datagram(DatagramTransport<D>),
}

impl<S, D> Transport for ReportTransport<S, D>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    D: DatagramSender,
{
    fn mode(&self) -> TransportMode {
        match self {
            ReportTransport::Stream(t) => t.mode(),
            ReportTransport::Datagram(t) => t.mode(),
        }
    }

    async fn deliver(&mut self, message: &str, cancel: &CancellationToken) -> DeliveryReport {
        match self {
            ReportTransport::Stream(t) => t.deliver(message, cancel).await,
            ReportTransport::Datagram(t) => t.deliver(message, cancel).await,
        }
    }

    async fn close(self) {
        match self {
            ReportTransport::Stream(t) => t.close().await,
            ReportTransport::Datagram(t) => t.close().await,
        }
    }
}

/// Factory backed by a stream connector and a datagram sender.
///
/// `NetworkTransportFactory::default()` uses real TCP and UDP sockets.
pub struct NetworkTransportFactory<C = TcpConnector, D = UdpDatagramSender> {
    connector: C,
    sender: Arc<D>,
}

impl Default for NetworkTransportFactory {
    fn default() -> Self {
        Self::new(TcpConnector, UdpDatagramSender)
    }
}

impl<C, D> NetworkTransportFactory<C, D> {
    pub fn new(connector: C, sender: D) -> Self {
        Self {
            connector,
            sender: Arc::new(sender),
        }
    }
}

impl<C, D> TransportFactory for NetworkTransportFactory<C, D>
where
    C: StreamConnector + 'static,
    D: DatagramSender + 'static,
{
    type Transport = ReportTransport<C::Stream, D>;

    async fn open(&self, request: OpenRequest) -> Result<Self::Transport, ConnectError> {
        match request.mode {
            TransportMode::Stream => {
                let endpoint = request
                    .endpoints
                    .into_iter()
                    .next()
                    .ok_or(ConnectError::NoEndpoint)?;
                let transport = StreamTransport::connect(&self.connector, endpoint).await?;
                Ok(ReportTransport::Stream(transport))
            }
            TransportMode::Datagram => {
                if request.endpoints.is_empty() {
                    return Err(ConnectError::NoEndpoint);
                }
                Ok(ReportTransport::Datagram(DatagramTransport::new(
                    Arc::clone(&self.sender),
                    request.endpoints,
                    request.datagram_send_delay,
                )))
            }
        }
    }
}
