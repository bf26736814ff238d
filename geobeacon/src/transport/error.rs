//! Error types for the transport layer.

use thiserror::Error;

use super::endpoint::Endpoint;

/// Stream-mode connection could not be established.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The transport was asked to open with no destination.
    #[error("No endpoint configured")]
    NoEndpoint,

    /// The TCP connect failed (refused, unreachable, DNS failure...).
    #[error("Failed to connect to {endpoint}: {source}")]
    Io {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },
}

/// A message could not be written after the transport was opened.
///
/// Never fatal: the reporting loop logs it and moves on.
#[derive(Debug, Error)]
pub enum SendError {
    /// Write to the open TCP stream failed.
    #[error("Failed to write to {endpoint}: {source}")]
    Write {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// Datagram could not be sent.
    #[error("Failed to send datagram to {endpoint}: {source}")]
    Datagram {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },
}
