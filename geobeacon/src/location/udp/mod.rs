//! UDP GPS receiver.
//!
//! Listens for GPS sentences sent by an external receiver or simulator and
//! turns them into [`LocationFix`](super::LocationFix) updates.
//!
//! # Supported Protocols
//!
//! - **ForeFlight** (XGPS/XGPS2) - X-Plane "Send position to ForeFlight"
//! - **NMEA 0183 GGA** - most GPS-to-network bridges (gpsd relays, phone apps)

mod protocol;

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use super::{AcquisitionError, LocationEvent, LocationProvider, ProviderOptions};

pub use protocol::parse_sentence;

/// Default UDP port (ForeFlight convention).
pub const DEFAULT_UDP_PORT: u16 = 49002;

/// Maximum packet size we expect.
const MAX_PACKET_SIZE: usize = 1024;

/// Pause after a socket receive error before trying again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// UDP provider configuration.
#[derive(Debug, Clone)]
pub struct UdpLocationProviderConfig {
    /// Address to bind (default: all interfaces).
    pub bind_address: String,

    /// UDP port to listen on.
    pub port: u16,
}

impl Default for UdpLocationProviderConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_UDP_PORT,
        }
    }
}

/// Location provider reading GPS sentences from a UDP socket.
///
/// The socket is bound when the stream is first polled and released when
/// the stream is dropped.
#[derive(Debug, Clone)]
pub struct UdpLocationProvider {
    config: UdpLocationProviderConfig,
}

impl UdpLocationProvider {
    /// Create a new UDP provider.
    pub fn new(config: UdpLocationProviderConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(UdpLocationProviderConfig::default())
    }

    /// Get the configured port.
    pub fn port(&self) -> u16 {
        self.config.port
    }
}

/// Stream progress.
enum ReceiverState {
    Unbound(UdpLocationProviderConfig),
    Listening {
        socket: UdpSocket,
        packets_received: u64,
    },
    Finished,
}

impl LocationProvider for UdpLocationProvider {
    fn subscribe(&self, _options: ProviderOptions) -> BoxStream<'static, LocationEvent> {
        let initial = ReceiverState::Unbound(self.config.clone());
        stream::unfold(initial, next_event).boxed()
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

/// Advance the receiver until it has an event to yield.
async fn next_event(state: ReceiverState) -> Option<(LocationEvent, ReceiverState)> {
    let (socket, mut packets_received) = match state {
        ReceiverState::Finished => return None,
        ReceiverState::Listening {
            socket,
            packets_received,
        } => (socket, packets_received),
        ReceiverState::Unbound(config) => {
            let addr = format!("{}:{}", config.bind_address, config.port);
            match UdpSocket::bind(&addr).await {
                Ok(socket) => {
                    info!(
                        port = config.port,
                        local_addr = ?socket.local_addr().ok(),
                        "UDP location receiver started"
                    );
                    (socket, 0)
                }
                Err(e) => {
                    warn!(addr = %addr, error = %e, "Failed to bind UDP location socket");
                    let error = AcquisitionError::Unavailable(format!(
                        "failed to bind UDP socket on {}: {}",
                        addr, e
                    ));
                    return Some((LocationEvent::Error(error), ReceiverState::Finished));
                }
            }
        }
    };

    let mut buffer = [0u8; MAX_PACKET_SIZE];
    loop {
        let received = socket.recv(&mut buffer).await;
        match received {
            Ok(len) => {
                packets_received += 1;
                match parse_sentence(&buffer[..len]) {
                    Some(fix) => {
                        if packets_received == 1 {
                            info!(len, "Received first GPS packet");
                        }
                        let fix = fix.with_timestamp_ms(chrono::Utc::now().timestamp_millis());
                        trace!(?fix, "GPS fix received");
                        let next = ReceiverState::Listening {
                            socket,
                            packets_received,
                        };
                        return Some((LocationEvent::Fix(fix), next));
                    }
                    None if packets_received <= 5 => {
                        let preview = String::from_utf8_lossy(&buffer[..len.min(50)]);
                        debug!(packet_num = packets_received, preview = %preview, "Failed to parse GPS packet");
                    }
                    None => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "UDP receive error");
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UdpLocationProviderConfig::default();
        assert_eq!(config.port, 49002);
        assert_eq!(config.bind_address, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_receives_sentence_over_loopback() {
        // Reserve a free port, then hand it to the provider.
        let reserved = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = reserved.local_addr().unwrap().port();
        drop(reserved);

        let provider = UdpLocationProvider::new(UdpLocationProviderConfig {
            bind_address: "127.0.0.1".to_string(),
            port,
        });
        let mut events = provider.subscribe(ProviderOptions::default());

        let sender = tokio::spawn(async move {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            for _ in 0..50 {
                socket
                    .send_to(b"XGPSSim,-3.0,40.0,100.0,0.0,0.0", ("127.0.0.1", port))
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("timed out waiting for fix");
        sender.abort();

        match event {
            Some(LocationEvent::Fix(fix)) => {
                assert_eq!(fix.coordinates(), Some((40.0, -3.0)));
                assert!(fix.timestamp_ms.is_some());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bind_failure_reports_unavailable() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let provider = UdpLocationProvider::new(UdpLocationProviderConfig {
            bind_address: "127.0.0.1".to_string(),
            port,
        });
        let events: Vec<LocationEvent> = provider
            .subscribe(ProviderOptions::default())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            LocationEvent::Error(AcquisitionError::Unavailable(_))
        ));
    }
}
