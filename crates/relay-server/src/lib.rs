//! Fan-out relay server.
//!
//! Every connected client may send an `eventFromClient` frame; the server
//! rebroadcasts its payload, unmodified, as `eventFromServer` to every client
//! connected at that moment, the sender included.
//!
//! # Architecture
//!
//! - [`RelayDriver`]: Sans-IO core. Owns the [`ConnectionRegistry`], turns
//!   [`RelayEvent`]s into [`RelayAction`]s.
//! - [`RelayLoop`]: single consumer of all transport input. Owns the driver
//!   and every session's outbound queue, executes actions.
//! - [`session`]: reader and writer tasks bridging byte streams to the loop.
//! - [`Server`]: QUIC runtime over [`QuinnTransport`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod driver_error;
mod error;
mod event_loop;
mod registry;
pub mod session;
mod transport;

use std::{
    future::Future,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};

pub use driver::{DriverConfig, LogLevel, RelayAction, RelayDriver, RelayEvent};
pub use driver_error::DriverError;
pub use error::ServerError;
pub use event_loop::{Inbound, LoopStats, RelayLoop};
pub use registry::{ConnectionRegistry, SessionInfo};
use tokio::sync::mpsc;
pub use transport::{QuinnConnection, QuinnTransport};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3000")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Length of the event loop inbox
    pub inbox_capacity: usize,
    /// Length of each session's outbound queue
    pub outbound_capacity: usize,
    /// Driver configuration
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            cert_path: None,
            key_path: None,
            inbox_capacity: 4096,
            outbound_capacity: 1024,
            driver: DriverConfig::default(),
        }
    }
}

impl ServerRuntimeConfig {
    fn validate(&self) -> Result<(), ServerError> {
        if self.inbox_capacity == 0 {
            return Err(ServerError::Config("inbox capacity must be at least 1".to_string()));
        }
        if self.outbound_capacity == 0 {
            return Err(ServerError::Config("outbound capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Production relay server.
///
/// Wraps a [`RelayLoop`] with Quinn QUIC transport.
pub struct Server {
    transport: QuinnTransport,
    config: ServerRuntimeConfig,
    next_session_id: AtomicU64,
}

impl Server {
    /// Create and bind a new server.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { transport, config, next_session_id: AtomicU64::new(1) })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the server until the endpoint is closed.
    pub async fn run(self) -> Result<LoopStats, ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// On shutdown the endpoint closes every connection. Each one then
    /// disconnects through the loop as usual, and the loop stops once the
    /// last session task has finished.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<LoopStats, ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let (relay, inbox) =
            RelayLoop::new(self.config.driver.clone(), self.config.inbox_capacity);
        let relay_task = tokio::spawn(relay.run());

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                },
                incoming = self.transport.accept() => {
                    let Some(incoming) = incoming else {
                        tracing::info!("Endpoint closed");
                        break;
                    };

                    let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                    let inbox = inbox.clone();
                    let capacity = self.config.outbound_capacity;

                    tokio::spawn(async move {
                        let conn = match QuinnConnection::establish(incoming).await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::warn!(session_id, "Rejected connection: {}", e);
                                return;
                            },
                        };

                        if let Err(e) = handle_connection(session_id, conn, inbox, capacity).await
                        {
                            tracing::error!(session_id, "Connection error: {}", e);
                        }
                    });
                },
            }
        }

        self.transport.close(b"server shutdown");
        drop(inbox);
        self.transport.wait_idle().await;

        let stats = relay_task
            .await
            .map_err(|e| ServerError::Internal(format!("relay loop panicked: {e}")))?;

        tracing::info!(
            broadcasts = stats.broadcasts,
            sent = stats.frames_sent,
            dropped = stats.frames_dropped,
            "Server stopped"
        );

        Ok(stats)
    }
}

/// Drive one established QUIC connection until it closes.
async fn handle_connection(
    session_id: u64,
    conn: QuinnConnection,
    inbox: mpsc::Sender<Inbound>,
    outbound_capacity: usize,
) -> Result<(), ServerError> {
    tracing::debug!(session_id, remote = %conn.remote_addr(), "New connection");

    let outbound = conn.open_uni().await?;
    session::attach(session_id, outbound, &inbox, outbound_capacity).await?;

    let reason = loop {
        match conn.accept_uni().await {
            Ok(recv) => {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    if let Err(e) = session::pump_frames(session_id, recv, &inbox).await {
                        tracing::debug!(session_id, "Stream error: {}", e);
                    }
                });
            },
            Err(e) => break e.to_string(),
        }
    };

    session::detach(session_id, reason, &inbox).await;

    Ok(())
}
