//! Reliable webhook delivery over a durable queue.
//!
//! This crate decouples high-rate inbound gateway events from an external
//! HTTP sink that may be slow, unreachable, or erroring. Producers push
//! envelopes onto a durable list; a single background worker pops one
//! envelope per tick and attempts delivery, routing failures through a
//! fixed-delay retry scheduler until the retry ceiling, after which the
//! envelope lands on a dead-letter list for manual recovery.
//!
//! # Architecture
//!
//! 1. **Queue store** ([`QueueStore`]) - two named durable lists (main and
//!    dead-letter) with atomic push/pop, backed by Redis in production and
//!    an in-memory implementation for tests and embedding.
//! 2. **Worker** ([`DeliveryWorker`]) - fixed-interval poll loop, one pop
//!    per tick, cancellation observed at every tick boundary.
//! 3. **Retry scheduler** ([`retry::RetryScheduler`]) - pending retries in a
//!    min-heap drained at tick boundaries; flushed back to the durable
//!    queue on shutdown so no timer can fire into a stopped process.
//! 4. **Admin** ([`QueueAdmin`]) - depth queries and dead-letter drain.
//!
//! Ordering is FIFO among envelopes that never failed; a retried envelope
//! re-enters at the current tail and loses its original position.

pub mod admin;
pub mod client;
pub mod error;
pub mod retry;
pub mod storage;
pub mod worker;

pub use admin::QueueAdmin;
pub use client::{SinkClient, SinkConfig};
pub use error::{DeliveryError, Result};
pub use retry::RetryPolicy;
pub use storage::{memory::InMemoryQueueStore, QueueKeys, QueueStore, RedisQueueStore};
pub use worker::{DeliveryWorker, WorkerConfig, WorkerStats};

/// Default retry ceiling before an envelope is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before a failed envelope is re-queued, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Default HTTP delivery timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Default worker poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
