//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while building, encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than a frame header
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes available
        actual: usize,
    },

    /// Header does not start with the protocol magic
    #[error("invalid magic number")]
    InvalidMagic,

    /// Header carries a protocol version we do not speak
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Buffer ends before the body announced by the header
    #[error("frame truncated: expected {expected} body bytes, got {actual}")]
    FrameTruncated {
        /// Body length claimed by the header
        expected: usize,
        /// Body bytes actually present
        actual: usize,
    },

    /// Event name does not fit the 16-bit length field
    #[error("event name too long: {len} bytes (max {max})")]
    NameTooLong {
        /// Length of the rejected name
        len: usize,
        /// Largest encodable name
        max: usize,
    },

    /// Payload does not fit the 32-bit length field
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Size of the rejected payload
        size: usize,
        /// Largest encodable payload
        max: usize,
    },

    /// Event name bytes are not valid UTF-8
    #[error("event name is not valid UTF-8")]
    InvalidEventName,

    /// Serializing a payload value failed
    #[error("payload encode failed: {0}")]
    Encode(String),

    /// Deserializing a payload value failed
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// Underlying stream failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
