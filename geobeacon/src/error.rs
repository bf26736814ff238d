//! Crate-level error type.
//!
//! Each module defines its own error enum. [`Error`] wraps all of them for
//! callers that drive several modules and want a single `?`-able type.

use thiserror::Error;

use crate::agent::AgentError;
use crate::config::ConfigFileError;
use crate::encoder::EncodeError;
use crate::host::HostError;
use crate::location::AcquisitionError;
use crate::session::ValidationError;
use crate::sms::SmsError;
use crate::transport::{ConnectError, SendError};

/// Any error produced by the geobeacon library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Sms(#[from] SmsError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Config(#[from] ConfigFileError),
}

/// Result alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;
