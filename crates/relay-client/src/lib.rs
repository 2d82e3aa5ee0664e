//! Client
//!
//! Client side of the fan-out relay: every value a client emits is delivered
//! to every connected client, itself included.
//!
//! # Components
//!
//! - [`event`]: Sans-IO conversion between typed values and relay frames
//! - [`ClientError`]: Errors surfaced to applications
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled (default), this crate also provides:
//! - [`transport::ConnectedClient`]: Frame channels over QUIC
//! - [`transport::connect`]: Connect to a server
//! - [`RelayClient`]: Typed emit/receive on top of the transport

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
pub mod event;

#[cfg(feature = "transport")]
mod client;
#[cfg(feature = "transport")]
pub mod transport;

#[cfg(feature = "transport")]
pub use client::RelayClient;
pub use error::ClientError;
pub use event::{client_event, server_event};
