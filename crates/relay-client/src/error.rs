//! Client error types.

use relay_proto::ProtocolError;
use thiserror::Error;

#[cfg(feature = "transport")]
use crate::transport::TransportError;

/// Errors surfaced by the relay client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Frame or payload could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Server sent a frame with an event name the client does not expect.
    #[error("unexpected event '{0}'")]
    UnexpectedEvent(String),

    /// Transport failure.
    #[cfg(feature = "transport")]
    #[error(transparent)]
    Transport(#[from] TransportError),
}
