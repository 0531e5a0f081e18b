//! Clock abstraction for testable timing.
//!
//! The worker's poll interval, retry delays, and payload timestamps all go
//! through [`Clock`] so tests can advance time deterministically instead of
//! sleeping. Production code uses [`RealClock`]; tests inject [`TestClock`].

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Time source for the delivery pipeline.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant for scheduling and duration measurements.
    fn now(&self) -> Instant;

    /// Current wall-clock time as unix seconds, used for payload and
    /// envelope timestamps.
    fn unix_time(&self) -> i64;

    /// Sleeps for the given duration.
    ///
    /// Maps to `tokio::time::sleep` in production; the test clock advances
    /// virtual time immediately instead.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production clock backed by system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_time(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Deterministic clock for tests.
///
/// Monotonic and wall-clock time advance together via [`TestClock::advance`];
/// `sleep` advances virtual time and yields so other tasks still run.
#[derive(Debug, Clone)]
pub struct TestClock {
    elapsed_ms: Arc<AtomicU64>,
    base_instant: Instant,
    base_unix: i64,
}

impl TestClock {
    /// Creates a test clock anchored at the current time.
    pub fn new() -> Self {
        Self {
            elapsed_ms: Arc::new(AtomicU64::new(0)),
            base_instant: Instant::now(),
            base_unix: RealClock.unix_time(),
        }
    }

    /// Advances virtual time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis().min(u128::from(u64::MAX))).unwrap_or(0);
        self.elapsed_ms.fetch_add(millis, Ordering::AcqRel);
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::Acquire))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn unix_time(&self) -> i64 {
        let elapsed_secs = i64::try_from(self.elapsed().as_secs()).unwrap_or(i64::MAX);
        self.base_unix.saturating_add(elapsed_secs)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}
