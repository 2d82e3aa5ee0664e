//! Server error types.

use std::fmt;

use crate::driver_error::DriverError;

/// Errors that can occur in the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing TLS certs, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (connection failure, I/O error, etc.).
    ///
    /// For a single session this only ends that session. At the endpoint
    /// level (bind address in use) it is fatal.
    Transport(String),

    /// Protocol error (invalid frame format, unsupported version, etc.).
    ///
    /// A client sent malformed data. Ends that stream; the server keeps
    /// serving other clients.
    Protocol(String),

    /// Internal error (event loop gone, unexpected state).
    ///
    /// Should never happen in a correct implementation.
    Internal(String),

    /// Driver error (from `RelayDriver` processing).
    Driver(DriverError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Driver(err) => write!(f, "driver error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for ServerError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<relay_proto::ProtocolError> for ServerError {
    fn from(err: relay_proto::ProtocolError) -> Self {
        match err {
            relay_proto::ProtocolError::Io(msg) => Self::Transport(msg),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
