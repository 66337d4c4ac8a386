//! Time source used by every wait in the gateway.
//!
//! All deadline loops (AT transactions, settle delays, radio receive windows)
//! read the time and sleep through a [`Clock`]. Production code uses
//! [`TokioClock`]; tests and simulations use [`ManualClock`], whose `sleep`
//! advances virtual time instantly so multi-minute reset sequences run in
//! microseconds and deadlines can be asserted exactly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of "now" plus a way to suspend the control loop.
#[allow(async_fn_in_trait)] // single-threaded control loop; futures are never sent across threads
pub trait Clock: Clone {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
///
/// `now()` goes through `tokio::time::Instant`, so a runtime started with paused
/// time stays consistent with `sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock. Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Instant the clock was created at (virtual time zero).
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Virtual time elapsed since [`origin`](Self::origin).
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
