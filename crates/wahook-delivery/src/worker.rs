//! Background delivery worker.
//!
//! A single loop per process polls the main queue on a fixed interval and
//! attempts at most one delivery per tick, which bounds downstream load to
//! one in-flight request at a time. Failures increment the envelope's
//! retry count and either schedule a delayed re-queue or move the envelope
//! to the dead-letter list once the ceiling is reached.

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wahook_core::{Clock, QueuedEnvelope};

use crate::{
    client::SinkClient,
    error::Result,
    retry::{RetryPolicy, RetryScheduler},
    storage::{QueueKeys, QueueStore},
};

/// Configuration for the delivery worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often the worker polls the main queue.
    pub poll_interval: Duration,
    /// Retry ceiling and delay applied to failed deliveries.
    pub retry_policy: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(crate::DEFAULT_POLL_INTERVAL_MS),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Counters for worker observability.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Envelopes popped and processed.
    pub processed: u64,
    /// Successful deliveries.
    pub delivered: u64,
    /// Retries scheduled after transient failures.
    pub retried: u64,
    /// Envelopes moved to the dead-letter list after exhausting retries.
    pub dead_lettered: u64,
    /// Undecodable entries moved to the dead-letter list.
    pub malformed: u64,
}

/// Background worker that drains the main queue towards the sink.
pub struct DeliveryWorker {
    store: Arc<dyn QueueStore>,
    keys: QueueKeys,
    client: SinkClient,
    config: WorkerConfig,
    scheduler: Mutex<RetryScheduler>,
    stats: Arc<RwLock<WorkerStats>>,
    cancellation_token: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl DeliveryWorker {
    /// Creates a delivery worker over the given store and sink client.
    pub fn new(
        store: Arc<dyn QueueStore>,
        keys: QueueKeys,
        client: SinkClient,
        config: WorkerConfig,
        clock: Arc<dyn Clock>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            keys,
            client,
            config,
            scheduler: Mutex::new(RetryScheduler::new()),
            stats: Arc::new(RwLock::new(WorkerStats::default())),
            cancellation_token,
            clock,
        }
    }

    /// Shared handle to the worker's counters.
    pub fn stats_handle(&self) -> Arc<RwLock<WorkerStats>> {
        self.stats.clone()
    }

    /// Snapshot of the worker's counters.
    pub async fn stats(&self) -> WorkerStats {
        self.stats.read().await.clone()
    }

    /// Number of retries currently waiting for their delay to elapse.
    pub async fn pending_retries(&self) -> usize {
        self.scheduler.lock().await.len()
    }

    /// Main worker loop.
    ///
    /// Ticks on the configured interval until the cancellation token fires,
    /// observing cancellation at every tick boundary. On exit, pending
    /// scheduled retries are flushed back onto the durable main queue so no
    /// delay timer outlives the worker.
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_retries = self.config.retry_policy.max_retries,
            sink_url = %self.client.sink_url(),
            "delivery worker started"
        );

        loop {
            tokio::select! {
                () = self.cancellation_token.cancelled() => break,
                () = self.clock.sleep(self.config.poll_interval) => {
                    if let Err(error) = self.tick().await {
                        // Store unavailable: nothing was popped, skip the tick.
                        warn!(error = %error, "tick skipped");
                    }
                }
            }
        }

        self.flush_pending_retries().await;
        info!("delivery worker stopped");
    }

    /// Processes one tick: re-queues due retries, then pops and delivers at
    /// most one envelope.
    ///
    /// Public so tests and embedders can step the worker deterministically.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store is unavailable at pop time; the
    /// tick can simply be repeated since nothing was popped.
    pub async fn tick(&self) -> Result<()> {
        // Due retries re-enter at the current tail before this tick's pop,
        // so they interleave with fresh envelopes in plain FIFO order.
        let due = self.scheduler.lock().await.pop_due(self.clock.now());
        for envelope in due {
            self.requeue(envelope).await;
        }

        let Some(raw) = self.store.pop(&self.keys.main).await? else {
            return Ok(());
        };

        let envelope = match serde_json::from_str::<QueuedEnvelope>(&raw) {
            Ok(envelope) => envelope,
            Err(decode_error) => {
                self.quarantine_malformed(raw, &decode_error).await;
                return Ok(());
            },
        };

        self.process(envelope).await;
        Ok(())
    }

    /// Attempts delivery of one envelope and routes the outcome.
    async fn process(&self, mut envelope: QueuedEnvelope) {
        {
            let mut stats = self.stats.write().await;
            stats.processed += 1;
        }

        match self.client.deliver(&envelope.payload).await {
            Ok(status) => {
                {
                    let mut stats = self.stats.write().await;
                    stats.delivered += 1;
                }
                info!(
                    event = %envelope.payload.event,
                    session_id = %envelope.payload.session_id,
                    status,
                    "webhook delivered"
                );
            },
            Err(delivery_error) => {
                envelope.retries += 1;
                warn!(
                    event = %envelope.payload.event,
                    session_id = %envelope.payload.session_id,
                    retries = envelope.retries,
                    error = %delivery_error,
                    "webhook delivery failed"
                );

                if envelope.retries < self.config.retry_policy.max_retries {
                    let due_at = self.clock.now() + self.config.retry_policy.delay;
                    {
                        let mut stats = self.stats.write().await;
                        stats.retried += 1;
                    }
                    info!(
                        retries = envelope.retries,
                        max_retries = self.config.retry_policy.max_retries,
                        delay_ms = self.config.retry_policy.delay.as_millis() as u64,
                        "retry scheduled"
                    );
                    self.scheduler.lock().await.schedule(envelope, due_at);
                } else {
                    self.dead_letter(envelope).await;
                }
            },
        }
    }

    /// Pushes an envelope whose retry delay elapsed back onto the main
    /// queue tail.
    async fn requeue(&self, envelope: QueuedEnvelope) {
        if let Err(error) = self.store.push(&self.keys.main, &envelope).await {
            // The envelope is lost; the store was the durability boundary.
            error!(
                event = %envelope.payload.event,
                session_id = %envelope.payload.session_id,
                error = %error,
                "failed to re-queue envelope after retry delay"
            );
        }
    }

    /// Moves an envelope that exhausted its retries to the dead-letter
    /// list.
    async fn dead_letter(&self, envelope: QueuedEnvelope) {
        match self.store.push(&self.keys.dead_letter, &envelope).await {
            Ok(()) => {
                {
                    let mut stats = self.stats.write().await;
                    stats.dead_lettered += 1;
                }
                error!(
                    event = %envelope.payload.event,
                    session_id = %envelope.payload.session_id,
                    retries = envelope.retries,
                    "delivery failed permanently, envelope dead-lettered"
                );
            },
            Err(error) => {
                error!(
                    event = %envelope.payload.event,
                    session_id = %envelope.payload.session_id,
                    error = %error,
                    "failed to dead-letter envelope"
                );
            },
        }
    }

    /// Moves an undecodable queue entry to the dead-letter list verbatim.
    ///
    /// Keeping the raw text preserves the entry for inspection; the admin
    /// drain skips entries it cannot decode, so malformed data never loops
    /// back through the main queue.
    async fn quarantine_malformed(&self, raw: String, decode_error: &serde_json::Error) {
        warn!(error = %decode_error, "undecodable queue entry moved to dead-letter");
        {
            let mut stats = self.stats.write().await;
            stats.malformed += 1;
        }
        if let Err(error) = self.store.push_raw(&self.keys.dead_letter, raw).await {
            error!(error = %error, "failed to quarantine undecodable entry");
        }
    }

    /// Flushes every pending scheduled retry back onto the durable main
    /// queue, cancelling its remaining delay.
    pub async fn flush_pending_retries(&self) {
        let pending = self.scheduler.lock().await.drain_all();
        if pending.is_empty() {
            return;
        }

        debug!(count = pending.len(), "flushing pending retries to queue");
        for envelope in pending {
            self.requeue(envelope).await;
        }
    }
}
