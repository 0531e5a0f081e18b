//! Integration tests for the delivery worker.
//!
//! Uses the in-memory queue store, a wiremock sink, and the test clock to
//! step the worker deterministically through delivery, retry, and
//! dead-letter paths.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wahook_core::{Clock, EventKind, QueuedEnvelope, SessionId, TestClock, WebhookPayload};
use wahook_delivery::{
    error::Result, DeliveryError, DeliveryWorker, InMemoryQueueStore, QueueKeys, QueueStore,
    RetryPolicy, SinkClient, SinkConfig, WorkerConfig,
};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn payload(body: &str) -> WebhookPayload {
    let mut data = serde_json::Map::new();
    data.insert("body".to_string(), serde_json::json!(body));
    WebhookPayload::new(EventKind::Message, SessionId::new("6281234"), 1_700_000_000, data)
}

fn envelope(body: &str) -> QueuedEnvelope {
    QueuedEnvelope::new(payload(body), 1_700_000_000)
}

fn sink_client(url: String) -> SinkClient {
    SinkClient::new(SinkConfig { url, timeout: Duration::from_secs(5), ..Default::default() })
        .expect("sink client")
}

fn test_worker(
    store: Arc<dyn QueueStore>,
    sink_url: String,
    clock: Arc<TestClock>,
) -> DeliveryWorker {
    DeliveryWorker::new(
        store,
        QueueKeys::default(),
        sink_client(sink_url),
        WorkerConfig::default(),
        clock as Arc<dyn Clock>,
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn delivers_envelopes_in_push_order() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(5)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryQueueStore::new());
    let keys = QueueKeys::default();
    for i in 0..5 {
        store.push(&keys.main, &envelope(&format!("msg-{i}"))).await.unwrap();
    }

    let clock = Arc::new(TestClock::new());
    let worker = test_worker(store.clone(), server.uri(), clock);
    for _ in 0..6 {
        worker.tick().await.unwrap();
    }

    let requests = server.received_requests().await.expect("request recording enabled");
    let bodies: Vec<String> = requests
        .iter()
        .map(|request| {
            let value: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            value["data"]["body"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(bodies, ["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);

    assert_eq!(store.len(&keys.main).await.unwrap(), 0);
    assert_eq!(store.len(&keys.dead_letter).await.unwrap(), 0);

    let stats = worker.stats().await;
    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.processed, 5);
}

#[tokio::test]
async fn failing_envelope_retries_then_dead_letters() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryQueueStore::new());
    let keys = QueueKeys::default();
    store.push(&keys.main, &envelope("hi")).await.unwrap();

    let clock = Arc::new(TestClock::new());
    let worker = test_worker(store.clone(), server.uri(), clock.clone());

    // First attempt fails and schedules a delayed retry.
    worker.tick().await.unwrap();
    assert_eq!(store.len(&keys.main).await.unwrap(), 0);
    assert_eq!(worker.pending_retries().await, 1);

    // The retry is not due until its delay elapses.
    clock.advance(Duration::from_secs(4));
    worker.tick().await.unwrap();
    assert_eq!(worker.pending_retries().await, 1);

    // Second attempt.
    clock.advance(Duration::from_secs(1));
    worker.tick().await.unwrap();
    assert_eq!(worker.pending_retries().await, 1);

    // Third attempt exhausts the ceiling.
    clock.advance(Duration::from_secs(5));
    worker.tick().await.unwrap();
    assert_eq!(worker.pending_retries().await, 0);

    assert_eq!(store.len(&keys.main).await.unwrap(), 0);
    assert_eq!(store.len(&keys.dead_letter).await.unwrap(), 1);

    let raw = store.pop(&keys.dead_letter).await.unwrap().expect("dead-letter entry");
    let dead: QueuedEnvelope = serde_json::from_str(&raw).unwrap();
    assert_eq!(dead.retries, 3);
    assert_eq!(dead.payload.data["body"], "hi");

    let stats = worker.stats().await;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.dead_lettered, 1);
    assert_eq!(stats.delivered, 0);
}

#[tokio::test]
async fn transient_failure_eventually_delivers() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryQueueStore::new());
    let keys = QueueKeys::default();
    store.push(&keys.main, &envelope("flaky")).await.unwrap();

    let clock = Arc::new(TestClock::new());
    let worker = test_worker(store.clone(), server.uri(), clock.clone());

    worker.tick().await.unwrap();
    assert_eq!(worker.pending_retries().await, 1);

    clock.advance(Duration::from_secs(5));
    worker.tick().await.unwrap();

    assert_eq!(store.len(&keys.main).await.unwrap(), 0);
    assert_eq!(store.len(&keys.dead_letter).await.unwrap(), 0);
    assert_eq!(worker.pending_retries().await, 0);

    let stats = worker.stats().await;
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.retried, 1);
}

#[tokio::test]
async fn malformed_entry_is_quarantined_not_dropped() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryQueueStore::new());
    let keys = QueueKeys::default();
    store.push_raw(&keys.main, "not json at all".to_string()).await.unwrap();
    store.push(&keys.main, &envelope("valid")).await.unwrap();

    let clock = Arc::new(TestClock::new());
    let worker = test_worker(store.clone(), server.uri(), clock);
    worker.tick().await.unwrap();
    worker.tick().await.unwrap();

    assert_eq!(store.len(&keys.main).await.unwrap(), 0);
    assert_eq!(store.len(&keys.dead_letter).await.unwrap(), 1);
    let quarantined = store.pop(&keys.dead_letter).await.unwrap().unwrap();
    assert_eq!(quarantined, "not json at all");

    let stats = worker.stats().await;
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn empty_queue_tick_is_a_noop() {
    let server = MockServer::start().await;
    let store = Arc::new(InMemoryQueueStore::new());
    let clock = Arc::new(TestClock::new());
    let worker = test_worker(store, server.uri(), clock);

    worker.tick().await.unwrap();

    let stats = worker.stats().await;
    assert_eq!(stats.processed, 0);
}

/// Store wrapper that fails the next pop, for the skip-tick path.
struct FlakyStore {
    inner: InMemoryQueueStore,
    fail_next_pop: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self { inner: InMemoryQueueStore::new(), fail_next_pop: AtomicBool::new(false) }
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn push_raw(&self, key: &str, value: String) -> Result<()> {
        self.inner.push_raw(key, value).await
    }

    async fn pop(&self, key: &str) -> Result<Option<String>> {
        if self.fail_next_pop.swap(false, Ordering::SeqCst) {
            return Err(DeliveryError::store("store unavailable"));
        }
        self.inner.pop(key).await
    }

    async fn len(&self, key: &str) -> Result<u64> {
        self.inner.len(key).await
    }
}

#[tokio::test]
async fn store_error_at_pop_skips_tick_without_loss() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(FlakyStore::new());
    let keys = QueueKeys::default();
    store.push(&keys.main, &envelope("survives")).await.unwrap();
    store.fail_next_pop.store(true, Ordering::SeqCst);

    let clock = Arc::new(TestClock::new());
    let worker = test_worker(store.clone(), server.uri(), clock);

    // The failing tick surfaces the store error; the envelope stays queued.
    assert!(worker.tick().await.is_err());
    assert_eq!(store.len(&keys.main).await.unwrap(), 1);

    worker.tick().await.unwrap();
    assert_eq!(store.len(&keys.main).await.unwrap(), 0);
    assert_eq!(worker.stats().await.delivered, 1);
}

#[tokio::test]
async fn run_loop_delivers_and_stops_on_cancel() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryQueueStore::new());
    let keys = QueueKeys::default();
    store.push(&keys.main, &envelope("live")).await.unwrap();

    let token = CancellationToken::new();
    let worker = DeliveryWorker::new(
        store.clone(),
        keys.clone(),
        sink_client(server.uri()),
        WorkerConfig { poll_interval: Duration::from_millis(10), ..Default::default() },
        Arc::new(wahook_core::RealClock::new()),
        token.clone(),
    );
    let stats = worker.stats_handle();
    let handle = tokio::spawn(async move { worker.run().await });

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if stats.read().await.delivered >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("envelope should be delivered");

    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker should stop within one interval")
        .unwrap();

    assert_eq!(store.len(&keys.main).await.unwrap(), 0);
}

#[tokio::test]
async fn shutdown_flushes_pending_retries_to_queue() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryQueueStore::new());
    let keys = QueueKeys::default();
    store.push(&keys.main, &envelope("pending")).await.unwrap();

    let token = CancellationToken::new();
    let worker = DeliveryWorker::new(
        store.clone(),
        keys.clone(),
        sink_client(server.uri()),
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            // Long delay keeps the retry pending until shutdown.
            retry_policy: RetryPolicy { max_retries: 3, delay: Duration::from_secs(60) },
        },
        Arc::new(wahook_core::RealClock::new()),
        token.clone(),
    );
    let stats = worker.stats_handle();
    let handle = tokio::spawn(async move { worker.run().await });

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if stats.read().await.retried >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first attempt should fail and schedule a retry");

    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle).await.expect("worker stops").unwrap();

    // The pending retry was flushed back to the durable queue, not lost.
    assert_eq!(store.len(&keys.main).await.unwrap(), 1);
    let raw = store.pop(&keys.main).await.unwrap().unwrap();
    let flushed: QueuedEnvelope = serde_json::from_str(&raw).unwrap();
    assert_eq!(flushed.retries, 1);
}
