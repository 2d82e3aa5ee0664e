//! Connection registry for active sessions and their armed events.
//!
//! The registry is the relay's active set: exactly the sessions whose
//! transport is open. Each session also records which inbound event names
//! have a receive hook armed; the dispatcher only reacts to armed events.
//!
//! Sessions are kept in a `BTreeMap` so enumeration order is ascending
//! session id. Broadcast fan-out order is therefore deterministic, which
//! keeps simulation runs reproducible.

use std::collections::{BTreeMap, HashSet};

/// Information about a registered session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Inbound event names with an armed receive hook
    subscriptions: HashSet<String>,
}

impl SessionInfo {
    /// Create session info with no armed events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a receive hook is armed for `event`.
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.subscriptions.contains(event)
    }
}

/// Registry of open sessions.
///
/// # Invariants
///
/// - A session id appears at most once.
/// - Unregistering drops the session and all its subscriptions; nothing is
///   left behind for a closed session.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session ID → session info
    sessions: BTreeMap<u64, SessionInfo>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// Returns `false` if the session already exists; the existing entry is
    /// left untouched.
    pub fn register_session(&mut self, session_id: u64, info: SessionInfo) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }

        self.sessions.insert(session_id, info);
        true
    }

    /// Unregister a session and drop its subscriptions.
    ///
    /// Returns the session info if it existed. Unregistering an unknown
    /// session is a no-op returning `None`.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<SessionInfo> {
        self.sessions.remove(&session_id)
    }

    /// Session metadata. `None` if session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Arm a receive hook for `event` on a session.
    ///
    /// Returns `false` if the session is not registered.
    pub fn subscribe(&mut self, session_id: u64, event: &str) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(info) => {
                info.subscriptions.insert(event.to_string());
                true
            },
            None => false,
        }
    }

    /// Check if a session has a receive hook armed for `event`.
    pub fn is_subscribed(&self, session_id: u64, event: &str) -> bool {
        self.sessions.get(&session_id).is_some_and(|info| info.is_subscribed(event))
    }

    /// All registered sessions, in ascending id order.
    pub fn sessions(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.keys().copied()
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
