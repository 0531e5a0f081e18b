//! Edge-triggered connection-health monitor.
//!
//! On a fixed period the monitor derives a tri-state connection status for
//! every live session and compares it against the last observation. Only a
//! transition (including the first observation of a session) emits a
//! `connection` event; steady state is suppressed. The status cache is
//! private to the monitor: many concurrent reads, a write only on
//! transition.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use wahook_core::{Clock, EventKind, QueuedEnvelope, SessionId, WebhookPayload};
use wahook_delivery::{QueueKeys, QueueStore};

use crate::registry::{LinkState, SessionRegistry};

/// Default period between health checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Derived connection status of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Network up and protocol-authenticated.
    Connected,
    /// Network up but not (yet) authenticated.
    Connecting,
    /// Network down.
    Disconnected,
}

impl ConnectionStatus {
    /// Derives the status from the two underlying link booleans.
    pub fn derive(state: LinkState) -> Self {
        match (state.connected, state.logged_in) {
            (true, true) => Self::Connected,
            (true, false) => Self::Connecting,
            (false, _) => Self::Disconnected,
        }
    }

    /// String tag used in the emitted payload.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Connecting => "connecting",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Periodic health checker emitting `connection` events on transition.
pub struct HealthMonitor {
    registry: Arc<dyn SessionRegistry>,
    store: Arc<dyn QueueStore>,
    keys: QueueKeys,
    statuses: RwLock<HashMap<SessionId, ConnectionStatus>>,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl HealthMonitor {
    /// Creates a monitor over the given registry and queue.
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn QueueStore>,
        keys: QueueKeys,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { registry, store, keys, statuses: RwLock::new(HashMap::new()), interval, clock }
    }

    /// Runs the periodic check loop until cancelled.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "health monitor started");
        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => break,
                () = self.clock.sleep(self.interval) => {
                    self.check_once().await;
                }
            }
        }
        info!("health monitor stopped");
    }

    /// Checks every live session once; returns how many events were
    /// emitted.
    pub async fn check_once(&self) -> usize {
        let mut emitted = 0;
        for (session_id, link_state) in self.registry.snapshot() {
            let status = ConnectionStatus::derive(link_state);

            let unchanged = {
                let statuses = self.statuses.read().await;
                statuses.get(&session_id) == Some(&status)
            };
            if unchanged {
                debug!(session_id = %session_id, status = status.as_str(), "status unchanged");
                continue;
            }

            self.emit(&session_id, status).await;
            emitted += 1;

            let mut statuses = self.statuses.write().await;
            statuses.insert(session_id, status);
        }
        emitted
    }

    /// Queues one `connection` payload for a transition.
    async fn emit(&self, session_id: &SessionId, status: ConnectionStatus) {
        info!(session_id = %session_id, status = status.as_str(), "connection status changed");

        let mut data = Map::<String, Value>::new();
        data.insert("status".to_string(), json!(status.as_str()));

        let now = self.clock.unix_time();
        let payload = WebhookPayload::new(EventKind::Connection, session_id.clone(), now, data);
        let envelope = QueuedEnvelope::new(payload, now);

        if let Err(queue_error) = self.store.push(&self.keys.main, &envelope).await {
            error!(
                session_id = %session_id,
                error = %queue_error,
                "failed to queue connection event"
            );
        }
    }
}
