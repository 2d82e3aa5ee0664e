//! Single-consumer relay event loop.
//!
//! Transport tasks never touch the registry. They post [`Inbound`] messages
//! to one mpsc inbox and the [`RelayLoop`] handles them strictly in arrival
//! order. Handling a message is synchronous: a whole broadcast (snapshot plus
//! hand-off to every outbound queue) completes before the next message is
//! looked at, so broadcasts from different senders never interleave.
//!
//! Outbound delivery is a `try_send` into each session's bounded queue. A
//! full or closed queue drops that session's copy; there is no retry.

use std::collections::HashMap;

use bytes::Bytes;
use relay_proto::Frame;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    driver::{DriverConfig, LogLevel, RelayAction, RelayDriver, RelayEvent},
    driver_error::DriverError,
};

/// Message from a transport task to the event loop.
#[derive(Debug)]
pub enum Inbound {
    /// Session handshake completed and its outbound queue is ready
    Connected {
        /// Session ID assigned by the runtime
        session_id: u64,
        /// Queue feeding the session's writer task
        outbound: mpsc::Sender<Bytes>,
    },

    /// A frame was read from the session
    Frame {
        /// Session the frame arrived on
        session_id: u64,
        /// Decoded frame
        frame: Frame,
    },

    /// Session transport closed
    Closed {
        /// Session that closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },
}

/// Delivery counters, reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Broadcasts dispatched
    pub broadcasts: u64,
    /// Frames handed to outbound queues
    pub frames_sent: u64,
    /// Frames dropped because a queue was full or closed
    pub frames_dropped: u64,
}

/// The relay event loop.
///
/// Owns the [`RelayDriver`] and every session's outbound queue. Constructed
/// at server start, torn down when all inbox senders are gone.
pub struct RelayLoop {
    driver: RelayDriver,
    outbound: HashMap<u64, mpsc::Sender<Bytes>>,
    inbox: mpsc::Receiver<Inbound>,
    stats: LoopStats,
}

impl RelayLoop {
    /// Create a loop and the sender transport tasks use to reach it.
    pub fn new(config: DriverConfig, inbox_capacity: usize) -> (Self, mpsc::Sender<Inbound>) {
        let (tx, rx) = mpsc::channel(inbox_capacity.max(1));
        let relay = Self {
            driver: RelayDriver::new(config),
            outbound: HashMap::new(),
            inbox: rx,
            stats: LoopStats::default(),
        };
        (relay, tx)
    }

    /// Handle messages until every inbox sender is dropped.
    pub async fn run(mut self) -> LoopStats {
        while let Some(message) = self.inbox.recv().await {
            self.handle(message);
        }

        tracing::debug!(
            broadcasts = self.stats.broadcasts,
            sent = self.stats.frames_sent,
            dropped = self.stats.frames_dropped,
            "relay loop stopped"
        );
        self.stats
    }

    /// Handle one inbound message to completion.
    pub fn handle(&mut self, message: Inbound) {
        match message {
            Inbound::Connected { session_id, outbound } => {
                match self.driver.process_event(RelayEvent::ConnectionAccepted { session_id }) {
                    Ok(actions) => {
                        self.outbound.insert(session_id, outbound);
                        self.execute(actions);
                    },
                    Err(e) => tracing::error!(session_id, error = %e, "rejecting session"),
                }
            },

            Inbound::Frame { session_id, frame } => {
                match self.driver.process_event(RelayEvent::FrameReceived { session_id, frame }) {
                    Ok(actions) => self.execute(actions),
                    Err(DriverError::SessionNotFound(_)) => {
                        tracing::debug!(session_id, "dropping frame from closed session");
                    },
                    Err(e) => tracing::warn!(session_id, error = %e, "frame processing error"),
                }
            },

            Inbound::Closed { session_id, reason } => {
                // Dropping the sender ends the session's writer task.
                self.outbound.remove(&session_id);

                match self.driver.process_event(RelayEvent::ConnectionClosed { session_id, reason })
                {
                    Ok(actions) => self.execute(actions),
                    Err(e) => tracing::warn!(session_id, error = %e, "close processing error"),
                }
            },
        }
    }

    /// Execute driver actions.
    fn execute(&mut self, actions: Vec<RelayAction>) {
        for action in actions {
            match action {
                RelayAction::Broadcast { recipients, frame } => {
                    self.broadcast(&recipients, &frame);
                },
                RelayAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }
    }

    /// Hand one encoded copy of `frame` to each recipient's queue.
    fn broadcast(&mut self, recipients: &[u64], frame: &Frame) {
        self.stats.broadcasts += 1;
        let wire = frame.to_bytes();

        for session_id in recipients {
            let Some(queue) = self.outbound.get(session_id) else {
                tracing::warn!(session_id, "broadcast recipient has no outbound queue");
                self.stats.frames_dropped += 1;
                continue;
            };

            match queue.try_send(wire.clone()) {
                Ok(()) => self.stats.frames_sent += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(session_id, "outbound queue full, dropping frame");
                    self.stats.frames_dropped += 1;
                },
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(session_id, "outbound queue closed, dropping frame");
                    self.stats.frames_dropped += 1;
                },
            }
        }
    }

    /// The driver, for inspection.
    pub fn driver(&self) -> &RelayDriver {
        &self.driver
    }

    /// Delivery counters so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }
}
