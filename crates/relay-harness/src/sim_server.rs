//! Simulation server for testing with turmoil.
//!
//! `SimServer` runs the same [`RelayLoop`] and session tasks as the QUIC
//! server, with each turmoil TCP connection standing in for one session.

use std::io;

use relay_server::{DriverConfig, LoopStats, RelayLoop, session};
use turmoil::net::TcpListener;

/// Inbox length for the simulated loop.
const INBOX_CAPACITY: usize = 1024;

/// Per-session outbound queue length.
const OUTBOUND_CAPACITY: usize = 1024;

/// Simulation server.
///
/// Session IDs are assigned sequentially from 1 in accept order.
pub struct SimServer {
    listener: TcpListener,
    config: DriverConfig,
    next_session_id: u64,
}

impl SimServer {
    /// Create and bind a new simulation server.
    pub async fn bind(address: &str) -> io::Result<Self> {
        Self::bind_with_config(address, DriverConfig::default()).await
    }

    /// Create and bind a new simulation server with custom config.
    pub async fn bind_with_config(address: &str, config: DriverConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, config, next_session_id: 1 })
    }

    /// Accept exactly `connections` sessions, then run until all of them
    /// have disconnected.
    ///
    /// Returns the loop's delivery counters, which lets tests assert on
    /// sends that never reached a client.
    pub async fn serve(mut self, connections: usize) -> io::Result<LoopStats> {
        let (relay, inbox) = RelayLoop::new(self.config.clone(), INBOX_CAPACITY);
        let relay_task = tokio::spawn(relay.run());

        for _ in 0..connections {
            let (stream, addr) = self.listener.accept().await?;

            let session_id = self.next_session_id;
            self.next_session_id += 1;
            tracing::debug!(session_id, %addr, "accepted simulated connection");

            let (reader, writer) = stream.into_split();
            let inbox = inbox.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    session::serve_stream(session_id, reader, writer, inbox, OUTBOUND_CAPACITY)
                        .await
                {
                    tracing::debug!(session_id, "session ended: {}", e);
                }
            });
        }

        drop(inbox);
        relay_task.await.map_err(io::Error::other)
    }
}
