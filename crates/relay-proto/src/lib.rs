//! Wire protocol for the fan-out relay.
//!
//! Every event on the wire is a [`Frame`]: a fixed 12-byte [`FrameHeader`]
//! followed by the UTF-8 event name and an opaque payload. The server routes
//! on the name alone and never looks inside the payload; clients use
//! [`Payload`] to carry CBOR-encoded values.
//!
//! # Relay protocol
//!
//! | Direction            | Event name                | Payload                    |
//! |----------------------|---------------------------|----------------------------|
//! | client → server      | [`EVENT_FROM_CLIENT`]     | arbitrary serializable     |
//! | server → all clients | [`EVENT_FROM_SERVER`]     | identical value, unchanged |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod frame;
mod header;
pub mod io;
mod payload;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use payload::Payload;

/// Event name clients emit to have a payload relayed.
pub const EVENT_FROM_CLIENT: &str = "eventFromClient";

/// Event name the server uses when fanning a payload out to every client.
pub const EVENT_FROM_SERVER: &str = "eventFromServer";

/// ALPN protocol identifier negotiated during the QUIC handshake.
pub const ALPN_PROTOCOL: &[u8] = b"relay";
