//! Process-wide worker pool with an explicit lifecycle.
//!
//! One [`WorkerPool`] is built at start-up and shared (behind an `Arc`) by
//! every request; it is never created per request. It wraps a dedicated
//! Rayon pool and tracks the tasks it has accepted so that
//! [`WorkerPool::shutdown`] can:
//!
//! 1. stop accepting new tasks,
//! 2. wait (bounded) for accepted tasks to drain,
//! 3. cancel tasks that have not started yet and wait once more (bounded).
//!
//! A pool that still has running tasks after both phases is reported as
//! [`ShutdownOutcome::Stuck`] and logged; shutdown never fails.

use crate::error::{EnrichError, EnrichResult};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How [`WorkerPool::shutdown`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every accepted task finished within the drain window.
    Drained,
    /// Queued tasks were cancelled; the rest finished within the second window.
    Cancelled,
    /// Tasks were still running after both windows.
    Stuck { in_flight: usize },
}

#[derive(Default)]
struct PoolState {
    accepting: AtomicBool,
    cancelled: AtomicBool,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl PoolState {
    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut n = self.in_flight.lock();
        while *n > 0 {
            if self.idle.wait_until(&mut n, deadline).timed_out() {
                return *n == 0;
            }
        }
        true
    }
}

/// Decrements the in-flight count when a task ends, even by panic.
struct InFlight(Arc<PoolState>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut n = self.0.in_flight.lock();
        *n -= 1;
        if *n == 0 {
            self.0.idle.notify_all();
        }
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    state: Arc<PoolState>,
    threads: usize,
}

impl WorkerPool {
    /// Build a pool with `threads` workers.
    ///
    /// # Errors
    /// [`EnrichError::InvalidConfig`] if `threads == 0` or the OS refuses to
    /// start the worker threads.
    pub fn new(threads: usize) -> EnrichResult<Self> {
        if threads == 0 {
            return Err(EnrichError::InvalidConfig("worker pool needs at least one thread".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("enrich-worker-{i}"))
            .panic_handler(|_| error!("enrichment worker task panicked"))
            .build()
            .map_err(|e| EnrichError::InvalidConfig(format!("cannot start worker pool: {e}")))?;
        let state = Arc::new(PoolState::default());
        state.accepting.store(true, Ordering::SeqCst);
        info!(threads, "worker pool started");
        Ok(Self {
            pool,
            state,
            threads,
        })
    }

    /// Pool sized to the number of logical cores.
    ///
    /// # Errors
    /// See [`WorkerPool::new`].
    pub fn with_default_parallelism() -> EnrichResult<Self> {
        Self::new(num_cpus::get().max(1))
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.state.accepting.load(Ordering::SeqCst)
    }

    /// Tasks accepted but not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        *self.state.in_flight.lock()
    }

    /// Queue `task` on a worker thread.
    ///
    /// A task still queued when shutdown cancels the pool is dropped without
    /// running; callers observe this as a missing result.
    ///
    /// # Errors
    /// [`EnrichError::TradeLineProcessing`] once shutdown has begun.
    pub fn spawn<F>(&self, task: F) -> EnrichResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_accepting() {
            return Err(EnrichError::TradeLineProcessing(
                "worker pool is shut down".into(),
            ));
        }
        *self.state.in_flight.lock() += 1;
        let guard = InFlight(Arc::clone(&self.state));
        self.pool.spawn(move || {
            let guard = guard;
            if guard.0.cancelled.load(Ordering::SeqCst) {
                return;
            }
            task();
        });
        Ok(())
    }

    /// Drain, then cancel, each phase bounded by `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        self.state.accepting.store(false, Ordering::SeqCst);
        debug!(in_flight = self.in_flight(), "worker pool draining");
        if self.state.wait_idle(timeout) {
            info!("worker pool drained");
            return ShutdownOutcome::Drained;
        }

        warn!(
            in_flight = self.in_flight(),
            ?timeout,
            "worker pool did not drain in time; cancelling queued tasks"
        );
        self.state.cancelled.store(true, Ordering::SeqCst);
        if self.state.wait_idle(timeout) {
            info!("worker pool terminated after cancellation");
            return ShutdownOutcome::Cancelled;
        }

        let in_flight = self.in_flight();
        error!(in_flight, "worker pool did not terminate");
        ShutdownOutcome::Stuck { in_flight }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("accepting", &self.is_accepting())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
