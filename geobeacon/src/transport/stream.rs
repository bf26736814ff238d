//! Stream mode: one persistent TCP connection.
//!
//! Each report is written to the open connection as-is. A background reader
//! drains whatever the server sends back and logs coordinates found in JSON
//! replies; replies have no effect on reporting.

use std::future::Future;
use std::io;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::endpoint::Endpoint;
use super::error::{ConnectError, SendError};
use super::{DeliveryReport, Transport, TransportMode};

/// Read buffer for server replies.
const REPLY_BUFFER_SIZE: usize = 4096;

/// Upper bound on shutting down the write half at close.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Unparsed reply bytes kept before giving up on the current value.
const MAX_PENDING_REPLY_BYTES: usize = 64 * 1024;

/// Opens byte streams to an endpoint.
///
/// Production code uses [`TcpConnector`]; tests substitute in-memory pipes.
pub trait StreamConnector: Send + Sync {
    /// Connected stream type.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a connection to `endpoint`.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl StreamConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to disable Nagle on report stream");
        }
        Ok(stream)
    }
}

/// Optional coordinates a server may echo back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerReply {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Open report connection.
pub struct StreamTransport<S> {
    endpoint: Endpoint,
    writer: WriteHalf<S>,
    reader_cancel: CancellationToken,
    reader: JoinHandle<()>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Connect to `endpoint` and start the reply reader.
    pub async fn connect<C>(connector: &C, endpoint: Endpoint) -> Result<Self, ConnectError>
    where
        C: StreamConnector<Stream = S>,
    {
        debug!(endpoint = %endpoint, "Connecting report stream");
        let stream = connector
            .connect(&endpoint)
            .await
            .map_err(|source| ConnectError::Io {
                endpoint: endpoint.clone(),
                source,
            })?;
        info!(endpoint = %endpoint, "Report stream connected");
        Ok(Self::from_stream(stream, endpoint))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: S, endpoint: Endpoint) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let reader_cancel = CancellationToken::new();
        let reader = tokio::spawn(read_replies(
            reader,
            endpoint.clone(),
            reader_cancel.clone(),
        ));

        Self {
            endpoint,
            writer,
            reader_cancel,
            reader,
        }
    }

    /// Write one message and flush it.
    pub async fn send(&mut self, message: &str) -> Result<(), SendError> {
        let endpoint = &self.endpoint;
        self.writer
            .write_all(message.as_bytes())
            .await
            .map_err(|source| SendError::Write {
                endpoint: endpoint.clone(),
                source,
            })?;
        self.writer.flush().await.map_err(|source| SendError::Write {
            endpoint: endpoint.clone(),
            source,
        })
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    fn mode(&self) -> TransportMode {
        TransportMode::Stream
    }

    async fn deliver(&mut self, message: &str, cancel: &CancellationToken) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if cancel.is_cancelled() {
            report.interrupted = true;
            return report;
        }

        report.attempted = 1;
        // A peer that stops reading can stall the write forever.
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            written = self.send(message) => Some(written),
        };
        match written {
            Some(Ok(())) => {
                report.delivered = 1;
                debug!(endpoint = %self.endpoint, report = message, "Report written");
            }
            Some(Err(e)) => {
                report.failed = 1;
                warn!(error = %e, "Report write failed");
            }
            None => {
                report.interrupted = true;
                warn!(endpoint = %self.endpoint, "Report write abandoned on stop");
            }
        }
        report
    }

    async fn close(mut self) {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(endpoint = %self.endpoint, error = %e, "Error shutting down report stream")
            }
            Err(_) => debug!(endpoint = %self.endpoint, "Report stream shutdown timed out"),
        }
        self.reader_cancel.cancel();
        if let Err(e) = self.reader.await {
            debug!(error = %e, "Reply reader ended abnormally");
        }
        info!(endpoint = %self.endpoint, "Report stream closed");
    }
}

/// Drain the read half until cancelled or the peer closes.
async fn read_replies<S>(mut reader: ReadHalf<S>, endpoint: Endpoint, cancel: CancellationToken)
where
    S: AsyncRead + Send + Unpin,
{
    let mut buffer = vec![0u8; REPLY_BUFFER_SIZE];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = reader.read(&mut buffer) => read,
        };

        match read {
            Ok(0) => {
                debug!(endpoint = %endpoint, "Server closed its side of the report stream");
                break;
            }
            Ok(n) => {
                pending.extend_from_slice(&buffer[..n]);
                for reply in take_replies(&mut pending) {
                    info!(
                        endpoint = %endpoint,
                        latitude = ?reply.latitude,
                        longitude = ?reply.longitude,
                        "Server reply"
                    );
                }
                if pending.len() > MAX_PENDING_REPLY_BYTES {
                    debug!(bytes = pending.len(), "Discarding oversized partial reply");
                    pending.clear();
                }
            }
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Reply read failed");
                break;
            }
        }
    }
}

/// Extract every complete JSON reply from `pending`.
///
/// An incomplete trailing value stays in the buffer for the next read.
/// Anything that is not JSON is dropped.
pub fn take_replies(pending: &mut Vec<u8>) -> Vec<ServerReply> {
    let mut replies = Vec::new();
    let mut values =
        serde_json::Deserializer::from_slice(pending.as_slice()).into_iter::<ServerReply>();

    let consumed = loop {
        match values.next() {
            Some(Ok(reply)) => replies.push(reply),
            Some(Err(e)) if e.is_eof() => break values.byte_offset(),
            Some(Err(e)) => {
                debug!(error = %e, "Ignoring non-JSON server reply");
                break pending.len();
            }
            None => break pending.len(),
        }
    };

    pending.drain(..consumed);
    replies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_single_reply() {
        let mut pending = br#"{"latitude": 40.0, "longitude": -3.0}"#.to_vec();
        let replies = take_replies(&mut pending);
        assert_eq!(
            replies,
            vec![ServerReply {
                latitude: Some(40.0),
                longitude: Some(-3.0)
            }]
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_concatenated_replies_and_keep_partial() {
        let mut pending = br#"{"latitude":1.0}{"longitude":2.0,"extra":true} {"latit"#.to_vec();
        let replies = take_replies(&mut pending);

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].latitude, Some(1.0));
        assert_eq!(replies[0].longitude, None);
        assert_eq!(replies[1].longitude, Some(2.0));
        assert_eq!(pending, br#" {"latit"#.to_vec());

        pending.extend_from_slice(br#"ude":5.5}"#);
        let replies = take_replies(&mut pending);
        assert_eq!(replies[0].latitude, Some(5.5));
    }

    #[test]
    fn test_non_json_reply_is_dropped() {
        let mut pending = b"OK\n".to_vec();
        assert!(take_replies(&mut pending).is_empty());
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_send_writes_raw_message() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = StreamTransport::from_stream(client, Endpoint::new("peer", 5000));

        transport.send("40 -3 10:00:00 U1").await.unwrap();
        transport.close().await;

        let mut received = String::new();
        server.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "40 -3 10:00:00 U1");
    }

    #[tokio::test]
    async fn test_deliver_reports_failure_when_peer_gone() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut transport = StreamTransport::from_stream(client, Endpoint::new("peer", 5000));

        let report = transport
            .deliver("1 2 00:00:00 x", &CancellationToken::new())
            .await;
        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 0);
        transport.close().await;
    }

    #[tokio::test]
    async fn test_deliver_skips_when_cancelled() {
        let (client, _server) = tokio::io::duplex(64);
        let mut transport = StreamTransport::from_stream(client, Endpoint::new("peer", 5000));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = transport.deliver("msg", &cancel).await;
        assert_eq!(report.attempted, 0);
        assert!(report.interrupted);
        transport.close().await;
    }

    #[tokio::test]
    async fn test_stop_interrupts_write_to_stalled_peer() {
        // The server half stays open but is never read, so the pipe fills.
        let (client, _server) = tokio::io::duplex(8);
        let mut transport = StreamTransport::from_stream(client, Endpoint::new("peer", 5000));
        let cancel = CancellationToken::new();

        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stop.cancel();
        });

        let message = "40.416775 -3.703790 10:00:00 a-long-identifier";
        let delivery = transport.deliver(message, &cancel);
        let report = tokio::time::timeout(Duration::from_secs(3), delivery)
            .await
            .expect("write to a stalled peer must stop on cancel");
        assert_eq!(report.attempted, 1);
        assert_eq!(report.delivered, 0);
        assert!(report.interrupted);

        tokio::time::timeout(Duration::from_secs(3), transport.close())
            .await
            .expect("close must not wait for the peer to read");
    }

    #[tokio::test]
    async fn test_connect_failure_is_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result =
            StreamTransport::connect(&TcpConnector, Endpoint::new("127.0.0.1", port)).await;
        assert!(matches!(result, Err(ConnectError::Io { .. })));
    }
}
