//! Driver error types.
//!
//! Errors the Sans-IO driver reports back to its runtime. None of them is
//! ever sent to a client; the runtime logs them and keeps serving.

use std::fmt;

/// Errors that can occur while the driver processes an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not found in registry.
    ///
    /// A frame arrived for a session that is not (or no longer) registered.
    /// Happens when a reader task delivers a frame after the disconnect for
    /// the same session was processed. The frame is dropped.
    SessionNotFound(u64),

    /// Session already registered.
    ///
    /// The runtime announced the same session id twice. Session ids must be
    /// unique for the lifetime of the process, so this is a runtime bug.
    SessionAlreadyExists(u64),

    /// Building an outbound frame failed.
    Protocol(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionAlreadyExists(id) => write!(f, "session already exists: {id}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<relay_proto::ProtocolError> for DriverError {
    fn from(err: relay_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
