//! Relay driver.
//!
//! Sans-IO core of the relay: owns the [`ConnectionRegistry`] and applies the
//! broadcast rule. The runtime feeds it [`RelayEvent`]s in delivery order and
//! executes the [`RelayAction`]s it returns. The driver never touches a
//! socket, so the same logic runs under QUIC, simulated TCP and unit tests.

use relay_proto::{EVENT_FROM_CLIENT, EVENT_FROM_SERVER, Frame};

use crate::{
    driver_error::DriverError,
    registry::{ConnectionRegistry, SessionInfo},
};

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Deliver each broadcast back to the session that sent it.
    ///
    /// Enabled by default: clients reconcile their own state from the echo.
    pub echo_to_sender: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { echo_to_sender: true }
    }
}

/// Events that the relay driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A transport session completed its handshake
    ConnectionAccepted {
        /// Unique session ID assigned by the runtime
        session_id: u64,
    },

    /// A frame was received from a session
    FrameReceived {
        /// Session that sent the frame
        session_id: u64,
        /// The received frame
        frame: Frame,
    },

    /// A session was closed (by peer, network failure or shutdown)
    ConnectionClosed {
        /// Session that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },
}

/// Actions that the relay driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send a frame to every listed session
    Broadcast {
        /// Registry snapshot taken when the broadcast was dispatched
        recipients: Vec<u64>,
        /// Frame to send
        frame: Frame,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for driver actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based relay driver.
///
/// Stateless between events apart from the registry.
#[derive(Debug, Default)]
pub struct RelayDriver {
    /// Active set
    registry: ConnectionRegistry,
    /// Driver configuration
    config: DriverConfig,
}

impl RelayDriver {
    /// Create a new relay driver with an empty registry.
    pub fn new(config: DriverConfig) -> Self {
        Self { registry: ConnectionRegistry::new(), config }
    }

    /// Process a relay event and return actions to execute.
    ///
    /// This is the main entry point for the relay driver.
    pub fn process_event(&mut self, event: RelayEvent) -> Result<Vec<RelayAction>, DriverError> {
        match event {
            RelayEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            RelayEvent::FrameReceived { session_id, frame } => {
                self.handle_frame_received(session_id, &frame)
            },
            RelayEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
        }
    }

    /// Register the session and arm its receive hook.
    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
    ) -> Result<Vec<RelayAction>, DriverError> {
        if !self.registry.register_session(session_id, SessionInfo::new()) {
            return Err(DriverError::SessionAlreadyExists(session_id));
        }
        self.registry.subscribe(session_id, EVENT_FROM_CLIENT);

        Ok(vec![RelayAction::Log {
            level: LogLevel::Debug,
            message: format!(
                "session {session_id} connected ({} active)",
                self.registry.session_count()
            ),
        }])
    }

    /// Dispatch an armed inbound event to the whole active set.
    fn handle_frame_received(
        &mut self,
        session_id: u64,
        frame: &Frame,
    ) -> Result<Vec<RelayAction>, DriverError> {
        if !self.registry.has_session(session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        if !self.registry.is_subscribed(session_id, frame.name()) {
            return Ok(vec![RelayAction::Log {
                level: LogLevel::Debug,
                message: format!(
                    "ignoring unsubscribed event '{}' from session {session_id}",
                    frame.name()
                ),
            }]);
        }

        let exclude = if self.config.echo_to_sender { None } else { Some(session_id) };
        let broadcast = self.fan_out(frame, exclude)?;

        Ok(vec![
            RelayAction::Log {
                level: LogLevel::Info,
                message: format!(
                    "received {} from session {session_id} ({} bytes)",
                    frame.name(),
                    frame.payload().len()
                ),
            },
            broadcast,
        ])
    }

    /// Unregister the session. Closing an unknown session is a no-op.
    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<RelayAction> {
        if self.registry.unregister_session(session_id).is_none() {
            return Vec::new();
        }

        vec![RelayAction::Log {
            level: LogLevel::Debug,
            message: format!(
                "session {session_id} disconnected: {reason} ({} active)",
                self.registry.session_count()
            ),
        }]
    }

    /// Build a broadcast of `frame`'s payload, relabeled as
    /// [`EVENT_FROM_SERVER`], to every registered session except `exclude`.
    ///
    /// Recipients are snapshotted here; a session that disconnects afterwards
    /// may or may not receive its copy.
    pub fn fan_out(&self, frame: &Frame, exclude: Option<u64>) -> Result<RelayAction, DriverError> {
        let recipients = self.registry.sessions().filter(|id| Some(*id) != exclude).collect();
        let frame = frame.renamed(EVENT_FROM_SERVER)?;

        Ok(RelayAction::Broadcast { recipients, frame })
    }

    /// Session/event registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.registry.has_session(session_id)
    }

    /// Number of active sessions.
    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }

    /// All active sessions, in ascending id order.
    pub fn sessions(&self) -> impl Iterator<Item = u64> + '_ {
        self.registry.sessions()
    }
}
