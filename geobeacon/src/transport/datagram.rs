//! Datagram mode: one short-lived UDP socket per send.
//!
//! A delivery round walks the configured endpoints in order, sending the
//! same message to each with a fixed pause in between. Sends are never
//! concurrent and a failing endpoint does not stop the round.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::endpoint::Endpoint;
use super::error::SendError;
use super::{DeliveryReport, Transport, TransportMode};

/// Sends a single datagram to an endpoint.
///
/// Production code uses [`UdpDatagramSender`]; tests record calls instead.
pub trait DatagramSender: Send + Sync {
    /// Send `payload` to `endpoint` and release any socket used.
    fn send_to(
        &self,
        endpoint: &Endpoint,
        payload: &[u8],
    ) -> impl Future<Output = io::Result<usize>> + Send;
}

/// Binds a fresh ephemeral UDP socket for every datagram.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpDatagramSender;

impl DatagramSender for UdpDatagramSender {
    async fn send_to(&self, endpoint: &Endpoint, payload: &[u8]) -> io::Result<usize> {
        let target = resolve(endpoint).await?;
        let bind_addr = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };

        // Dropped at the end of this call, whether the send worked or not.
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.send_to(payload, target).await
    }
}

/// Resolve an endpoint to its first socket address.
async fn resolve(endpoint: &Endpoint) -> io::Result<SocketAddr> {
    tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}", endpoint),
            )
        })
}

/// Fan-out transport over a fixed list of endpoints.
pub struct DatagramTransport<D> {
    sender: Arc<D>,
    endpoints: Vec<Endpoint>,
    send_delay: Duration,
}

impl<D: DatagramSender> DatagramTransport<D> {
    /// Create a transport. No sockets are opened until the first delivery.
    pub fn new(sender: Arc<D>, endpoints: Vec<Endpoint>, send_delay: Duration) -> Self {
        Self {
            sender,
            endpoints,
            send_delay,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Send one datagram to one endpoint.
    pub async fn send_one(&self, endpoint: &Endpoint, message: &str) -> Result<usize, SendError> {
        self.sender
            .send_to(endpoint, message.as_bytes())
            .await
            .map_err(|source| SendError::Datagram {
                endpoint: endpoint.clone(),
                source,
            })
    }
}

impl<D: DatagramSender> Transport for DatagramTransport<D> {
    fn mode(&self) -> TransportMode {
        TransportMode::Datagram
    }

    async fn deliver(&mut self, message: &str, cancel: &CancellationToken) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.send_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                debug!(remaining = self.endpoints.len() - index, "Datagram round interrupted");
                report.interrupted = true;
                break;
            }

            report.attempted += 1;
            match self.send_one(endpoint, message).await {
                Ok(bytes) => {
                    report.delivered += 1;
                    debug!(endpoint = %endpoint, bytes, "Datagram sent");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(error = %e, "Datagram send failed");
                }
            }
        }

        report
    }

    async fn close(self) {
        debug!(endpoints = self.endpoints.len(), "Datagram transport released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records every send with the (virtual) time it happened.
    #[derive(Default)]
    struct RecordingSender {
        sends: Mutex<Vec<(Endpoint, String, Instant)>>,
        failing_host: Option<String>,
    }

    impl DatagramSender for RecordingSender {
        async fn send_to(&self, endpoint: &Endpoint, payload: &[u8]) -> io::Result<usize> {
            self.sends.lock().unwrap().push((
                endpoint.clone(),
                String::from_utf8_lossy(payload).to_string(),
                Instant::now(),
            ));
            if self.failing_host.as_deref() == Some(endpoint.host.as_str()) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            Ok(payload.len())
        }
    }

    fn three_endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new("e1", 5001),
            Endpoint::new("e2", 5002),
            Endpoint::new("e3", 5003),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_sends_in_order_with_delay() {
        let sender = Arc::new(RecordingSender::default());
        let mut transport =
            DatagramTransport::new(sender.clone(), three_endpoints(), Duration::from_secs(1));

        let report = transport.deliver("msg", &CancellationToken::new()).await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);

        let sends = sender.sends.lock().unwrap();
        let hosts: Vec<&str> = sends.iter().map(|(e, _, _)| e.host.as_str()).collect();
        assert_eq!(hosts, vec!["e1", "e2", "e3"]);
        assert!(sends.iter().all(|(_, m, _)| m == "msg"));
        assert_eq!(sends[1].2 - sends[0].2, Duration::from_secs(1));
        assert_eq!(sends[2].2 - sends[1].2, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_block_next_endpoint() {
        let sender = Arc::new(RecordingSender {
            failing_host: Some("e2".to_string()),
            ..Default::default()
        });
        let mut transport =
            DatagramTransport::new(sender.clone(), three_endpoints(), Duration::from_secs(1));

        let report = transport.deliver("msg", &CancellationToken::new()).await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(sender.sends.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_sends_stops_round() {
        let sender = Arc::new(RecordingSender::default());
        let mut transport =
            DatagramTransport::new(sender.clone(), three_endpoints(), Duration::from_secs(1));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                cancel.cancel();
            })
        };

        let report = transport.deliver("msg", &cancel).await;
        canceller.await.unwrap();

        assert_eq!(report.attempted, 1);
        assert!(report.interrupted);
        assert_eq!(sender.sends.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_udp_sender_uses_real_socket() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sent = UdpDatagramSender
            .send_to(&Endpoint::new("127.0.0.1", port), b"40 -3 10:00:00 U1")
            .await
            .unwrap();
        assert_eq!(sent, 17);

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"40 -3 10:00:00 U1");
    }
}
