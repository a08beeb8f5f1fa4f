//! Scheduler (spec §4.10): periodic drivers for the forget-sweep, metrics
//! collection, and embedding-cache sweep jobs. Each job is single-flight —
//! a tick that fires while the previous run of the same job is still in
//! flight is skipped rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::SchedulerIntervals;
use crate::embeddings::EmbeddingCache;
use crate::error::{Error, Result};
use crate::forgetting::ForgettingController;
use crate::storage::SqliteStorage;

/// Snapshot of the most recent run of each job, for the metrics job itself
/// to report and for tests to assert against.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    pub forget_sweeps_run: std::sync::atomic::AtomicU64,
    pub cache_sweeps_run: std::sync::atomic::AtomicU64,
    pub metrics_ticks_run: std::sync::atomic::AtomicU64,
}

pub struct Scheduler {
    forgetting: Arc<ForgettingController>,
    storage: Arc<SqliteStorage>,
    cache: Arc<EmbeddingCache>,
    intervals: SchedulerIntervals,
    running: Arc<AtomicBool>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    pub metrics: Arc<SchedulerMetrics>,
}

impl Scheduler {
    pub fn new(
        forgetting: Arc<ForgettingController>,
        storage: Arc<SqliteStorage>,
        cache: Arc<EmbeddingCache>,
        intervals: SchedulerIntervals,
    ) -> Self {
        Scheduler {
            forgetting,
            storage,
            cache,
            intervals,
            running: Arc::new(AtomicBool::new(false)),
            handles: std::sync::Mutex::new(Vec::new()),
            metrics: Arc::new(SchedulerMetrics::default()),
        }
    }

    /// Spawns the three periodic jobs. Returns `AlreadyRunning` if called
    /// while already started (spec §4.10).
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let mut handles = self
            .handles
            .lock()
            .map_err(|_| Error::internal("scheduler handles lock poisoned"))?;
        handles.push(spawn_job(
            "forget-sweep",
            self.intervals.forget_secs,
            self.running.clone(),
            {
                let forgetting = self.forgetting.clone();
                let metrics = self.metrics.clone();
                move || {
                    let forgetting = forgetting.clone();
                    let metrics = metrics.clone();
                    async move {
                        match tokio::task::spawn_blocking(move || forgetting.run_sweep()).await {
                            Ok(Ok(report)) => {
                                metrics.forget_sweeps_run.fetch_add(1, Ordering::Relaxed);
                                tracing::debug!(?report.scanned, "forget-sweep tick complete");
                            }
                            Ok(Err(e)) => tracing::warn!(error = %e, "forget-sweep failed"),
                            Err(e) => tracing::warn!(error = %e, "forget-sweep task panicked"),
                        }
                    }
                }
            },
        ));

        handles.push(spawn_job(
            "cache-sweep",
            self.intervals.cache_secs,
            self.running.clone(),
            {
                let cache = self.cache.clone();
                let metrics = self.metrics.clone();
                move || {
                    let cache = cache.clone();
                    let metrics = metrics.clone();
                    async move {
                        let removed = cache.sweep_expired();
                        metrics.cache_sweeps_run.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(removed, "cache-sweep tick complete");
                    }
                }
            },
        ));

        handles.push(spawn_job(
            "metrics",
            self.intervals.metrics_secs,
            self.running.clone(),
            {
                let storage = self.storage.clone();
                let metrics = self.metrics.clone();
                move || {
                    let storage = storage.clone();
                    let metrics = metrics.clone();
                    async move {
                        match tokio::task::spawn_blocking(move || storage.count()).await {
                            Ok(Ok(count)) => {
                                metrics.metrics_ticks_run.fetch_add(1, Ordering::Relaxed);
                                tracing::debug!(memory_count = count, "metrics tick complete");
                            }
                            Ok(Err(e)) => tracing::warn!(error = %e, "metrics collection failed"),
                            Err(e) => tracing::warn!(error = %e, "metrics task panicked"),
                        }
                    }
                }
            },
        ));

        Ok(())
    }

    /// Aborts all jobs. Idempotent: calling `stop` when not running is a
    /// no-op (spec §4.10).
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut handles = self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for handle in handles.drain(..) {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_job<F, Fut>(name: &'static str, interval_secs: u64, running: Arc<AtomicBool>, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        let in_flight = Arc::new(AtomicBool::new(false));
        loop {
            ticker.tick().await;
            if !running.load(Ordering::SeqCst) {
                break;
            }
            if in_flight.swap(true, Ordering::SeqCst) {
                tracing::debug!(job = name, "tick skipped, previous run still in flight");
                continue;
            }
            job().await;
            in_flight.store(false, Ordering::SeqCst);
        }
    })
}
