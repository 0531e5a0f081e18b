//! Durable queue store abstraction.
//!
//! The pipeline needs exactly two ordered lists - the main queue and the
//! dead-letter list - identified by opaque string keys that are stable
//! across process restarts. [`QueueStore`] abstracts them behind atomic
//! push/pop/len primitives so the worker logic can be exercised against an
//! in-memory implementation while production runs on Redis.
//!
//! Entries travel as the envelope's JSON text. `pop` hands back the raw
//! text rather than a decoded envelope: a malformed entry must stay
//! observable to the worker so it can be routed to the dead-letter list
//! instead of vanishing inside the store layer.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use wahook_core::QueuedEnvelope;

use crate::error::Result;

/// Names of the two durable lists used by the pipeline.
#[derive(Debug, Clone)]
pub struct QueueKeys {
    /// Main delivery queue.
    pub main: String,
    /// Dead-letter list for envelopes that exhausted their retries.
    pub dead_letter: String,
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self {
            main: "wa:webhook:queue".to_string(),
            dead_letter: "wa:webhook:failed".to_string(),
        }
    }
}

/// Ordered, durable list store with atomic push/pop per list key.
///
/// Push appends at the tail, pop removes from the head: FIFO among entries
/// that are never re-queued. Implementations must not corrupt list state
/// under concurrent pushes and pops, so a second worker instance can be
/// added later without changing this contract.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends a raw entry at the tail of the list.
    async fn push_raw(&self, key: &str, value: String) -> Result<()>;

    /// Removes and returns the entry at the head of the list, or `None`
    /// when the list is empty. Never blocks waiting for entries; callers
    /// poll.
    async fn pop(&self, key: &str) -> Result<Option<String>>;

    /// Number of entries currently in the list.
    async fn len(&self, key: &str) -> Result<u64>;

    /// Encodes an envelope and appends it at the tail of the list.
    async fn push(&self, key: &str, envelope: &QueuedEnvelope) -> Result<()> {
        let data = serde_json::to_string(envelope)?;
        self.push_raw(key, data).await
    }
}

/// Production queue store backed by Redis lists.
///
/// LPUSH at the tail end, RPOP at the head end; both are atomic single-key
/// commands, which is all the concurrency contract requires. The
/// connection manager reconnects transparently, so a Redis hiccup surfaces
/// as a store error on the affected call rather than a wedged store.
#[derive(Clone)]
pub struct RedisQueueStore {
    connection: ConnectionManager,
}

impl RedisQueueStore {
    /// Creates a store over an established connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Connects to Redis at the given URL and verifies the connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut connection = client.get_connection_manager().await?;
        redis::cmd("PING").query_async::<()>(&mut connection).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn push_raw(&self, key: &str, value: String) -> Result<()> {
        let mut connection = self.connection.clone();
        connection.lpush::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.rpop(key, None).await?;
        Ok(value)
    }

    async fn len(&self, key: &str) -> Result<u64> {
        let mut connection = self.connection.clone();
        let length: u64 = connection.llen(key).await?;
        Ok(length)
    }
}

pub mod memory {
    //! In-memory queue store for tests and single-process embedding.

    use std::collections::{HashMap, VecDeque};

    use tokio::sync::Mutex;

    use super::*;

    /// Queue store holding lists in process memory.
    ///
    /// Same FIFO and atomicity contract as the Redis store (a single mutex
    /// serialises all list operations), but nothing survives a restart.
    #[derive(Default)]
    pub struct InMemoryQueueStore {
        lists: Mutex<HashMap<String, VecDeque<String>>>,
    }

    impl InMemoryQueueStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn push_raw(&self, key: &str, value: String) -> Result<()> {
            let mut lists = self.lists.lock().await;
            lists.entry(key.to_string()).or_default().push_back(value);
            Ok(())
        }

        async fn pop(&self, key: &str) -> Result<Option<String>> {
            let mut lists = self.lists.lock().await;
            Ok(lists.get_mut(key).and_then(VecDeque::pop_front))
        }

        async fn len(&self, key: &str) -> Result<u64> {
            let lists = self.lists.lock().await;
            Ok(lists.get(key).map(|list| list.len() as u64).unwrap_or(0))
        }
    }
}
