//! Administrative operations over the two queues.
//!
//! Depth queries are the operator's backpressure signal; the dead-letter
//! drain is the manual recovery action once the sink is confirmed healthy
//! again. These are internal operations, not public HTTP endpoints.

use std::sync::Arc;

use tracing::{info, warn};
use wahook_core::QueuedEnvelope;

use crate::{
    error::Result,
    storage::{QueueKeys, QueueStore},
};

/// Handle for queue introspection and manual recovery.
#[derive(Clone)]
pub struct QueueAdmin {
    store: Arc<dyn QueueStore>,
    keys: QueueKeys,
}

impl QueueAdmin {
    /// Creates an admin handle over the given store.
    pub fn new(store: Arc<dyn QueueStore>, keys: QueueKeys) -> Self {
        Self { store, keys }
    }

    /// Number of envelopes waiting in the main queue.
    pub async fn queue_depth(&self) -> Result<u64> {
        self.store.len(&self.keys.main).await
    }

    /// Number of entries in the dead-letter list.
    pub async fn dead_letter_depth(&self) -> Result<u64> {
        self.store.len(&self.keys.dead_letter).await
    }

    /// Drains the dead-letter list back onto the main queue.
    ///
    /// Each decodable entry has its retry count reset to zero and is pushed
    /// onto the main queue tail. Undecodable entries are returned to the
    /// dead-letter tail instead of being re-injected, and are not counted.
    /// The drain is bounded by the pre-drain length, so returned entries
    /// are not reprocessed within the same call.
    ///
    /// Idempotent per call: draining an empty list moves nothing and
    /// returns zero. Not atomic as a whole - a crash mid-drain leaves a
    /// partial split between the two lists, but no envelope is lost.
    ///
    /// # Errors
    ///
    /// Returns a store error if the underlying queue becomes unavailable
    /// mid-drain; the count of envelopes already moved is then unknown to
    /// the caller but every envelope is still in one of the two lists.
    pub async fn requeue_dead_letters(&self) -> Result<u64> {
        let total = self.store.len(&self.keys.dead_letter).await?;
        let mut moved = 0u64;

        for _ in 0..total {
            let Some(raw) = self.store.pop(&self.keys.dead_letter).await? else {
                break;
            };

            match serde_json::from_str::<QueuedEnvelope>(&raw) {
                Ok(mut envelope) => {
                    envelope.retries = 0;
                    self.store.push(&self.keys.main, &envelope).await?;
                    moved += 1;
                },
                Err(error) => {
                    warn!(error = %error, "undecodable dead-letter entry kept in place");
                    self.store.push_raw(&self.keys.dead_letter, raw).await?;
                },
            }
        }

        if moved > 0 {
            info!(moved, "dead-letter envelopes re-queued for delivery");
        }
        Ok(moved)
    }
}
