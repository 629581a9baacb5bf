//! Bounded execution for CPU-heavy runs.
//!
//! Backtests are CPU-bound; an unbounded fan-out exhausts the host. The
//! pool caps concurrent runs, and every long computation polls a
//! [`CancellationToken`] at period boundaries, surfacing
//! [`BallastError::Cancelled`](crate::error::BallastError::Cancelled)
//! instead of a partial result.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::error::{BallastError, Result};

/// Default cap on concurrently executing backtests.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Cooperative cancellation flag shared between a caller and a running
/// computation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Error when cancellation was requested; checked at loop boundaries.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(BallastError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A bounded worker pool for backtest execution.
pub struct BacktestPool {
    pool: rayon::ThreadPool,
    max_concurrent: usize,
}

impl BacktestPool {
    /// Build a pool with the given concurrency cap.
    pub fn new(max_concurrent: usize) -> Result<Self> {
        let max_concurrent = max_concurrent.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent)
            .thread_name(|i| format!("backtest-{}", i))
            .build()
            .map_err(|e| BallastError::ConfigError(format!("worker pool: {}", e)))?;
        info!(max_concurrent, "backtest pool ready");
        Ok(Self {
            pool,
            max_concurrent,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run one job on the pool, blocking until it completes.
    pub fn run<F, T>(&self, job: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.pool.install(job)
    }

    /// Run a batch of independent jobs; at most `max_concurrent` execute at
    /// any moment. Results come back in submission order.
    pub fn run_all<F, T>(&self, jobs: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.pool
            .install(|| jobs.into_par_iter().map(|job| job()).collect())
    }
}
