//! Session registry abstraction.
//!
//! The health monitor needs a view of every live session and its two
//! underlying link booleans. The registry is an explicit injected
//! dependency - owned by whoever manages the protocol connections, passed
//! by handle - so multiple independent monitor instances can coexist in
//! tests.

use std::{collections::HashMap, sync::RwLock};

use wahook_core::SessionId;

/// Low-level link state of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    /// Network connection to the protocol servers is up.
    pub connected: bool,
    /// The session is authenticated at the protocol level.
    pub logged_in: bool,
}

/// Read-only view over the live sessions and their link state.
pub trait SessionRegistry: Send + Sync {
    /// Snapshot of every live session.
    fn snapshot(&self) -> Vec<(SessionId, LinkState)>;
}

/// In-process registry implementation.
///
/// The connection layer updates link states as the protocol client reports
/// them; the monitor only ever reads.
#[derive(Debug, Default)]
pub struct SharedSessionRegistry {
    sessions: RwLock<HashMap<SessionId, LinkState>>,
}

impl SharedSessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session or updates its link state.
    pub fn upsert(&self, session_id: SessionId, state: LinkState) {
        let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.insert(session_id, state);
    }

    /// Removes a session.
    pub fn remove(&self, session_id: &SessionId) {
        let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(session_id);
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Whether the registry holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionRegistry for SharedSessionRegistry {
    fn snapshot(&self) -> Vec<(SessionId, LinkState)> {
        let sessions = self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.iter().map(|(id, state)| (id.clone(), *state)).collect()
    }
}
