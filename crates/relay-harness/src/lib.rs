//! Deterministic simulation harness for the fan-out relay.
//!
//! Hosts the production [`RelayLoop`](relay_server::RelayLoop) and session
//! tasks on turmoil's simulated TCP, so relay behavior can be exercised under
//! controlled latency and scheduling without real sockets.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_client;
pub mod sim_server;

pub use sim_client::SimClient;
pub use sim_server::SimServer;
