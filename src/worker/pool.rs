//! Worker pool
//!
//! Runs `concurrency` tokio tasks, each long-polling the queue and handing
//! deliveries to a shared `Worker`. Stopping is cooperative: the running
//! flag is checked between deliveries, so a job that has started always
//! finishes.

use super::{ProcessOutcome, Worker};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

/// Pool settings
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent worker tasks
    pub concurrency: usize,
    /// Long-poll wait per receive; bounds how quickly `stop` is noticed
    pub receive_wait: Duration,
    /// Pause after a queue error before polling again
    pub error_backoff: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            receive_wait: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// Pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Deliveries received
    pub received: usize,
    /// Deliveries currently being processed
    pub processing: usize,
    /// Jobs persisted and acknowledged
    pub committed: usize,
    /// Jobs left for redelivery
    pub abandoned: usize,
}

impl WorkerStats {
    pub fn settled(&self) -> usize {
        self.committed + self.abandoned
    }
}

pub struct WorkerPool {
    worker: Arc<Worker>,
    config: WorkerPoolConfig,
    running: Arc<RwLock<bool>>,
    stats: Arc<RwLock<WorkerStats>>,
    workers: RwLock<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(worker: Arc<Worker>, config: WorkerPoolConfig) -> Self {
        Self {
            worker,
            config,
            running: Arc::new(RwLock::new(false)),
            stats: Arc::new(RwLock::new(WorkerStats::default())),
            workers: RwLock::new(Vec::new()),
        }
    }

    /// Start background workers
    pub fn start(&self) {
        let mut running = self.running.write();
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let mut workers = self.workers.write();
        for worker_id in 0..self.config.concurrency.max(1) {
            let worker = Arc::clone(&self.worker);
            let config = self.config.clone();
            let running = Arc::clone(&self.running);
            let stats = Arc::clone(&self.stats);

            workers.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, worker, config, running, stats).await;
            }));
        }

        info!(
            worker_count = workers.len(),
            queue = self.worker.queue().queue_name(),
            backend = self.worker.backend_name(),
            "Started generation workers"
        );
    }

    /// Stop background workers, letting in-flight jobs finish
    pub async fn stop(&self) {
        let mut running = self.running.write();
        if !*running {
            return;
        }
        *running = false;
        drop(running);

        let workers = std::mem::take(&mut *self.workers.write());
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }

        info!("Stopped generation workers");
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.read().clone()
    }

    /// Wait until at least `count` deliveries have been committed or
    /// abandoned. Returns false on timeout.
    pub async fn wait_for_settled(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.stats.read().settled() >= count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn worker_loop(
        worker_id: usize,
        worker: Arc<Worker>,
        config: WorkerPoolConfig,
        running: Arc<RwLock<bool>>,
        stats: Arc<RwLock<WorkerStats>>,
    ) {
        debug!(worker_id, "Worker started");

        while *running.read() {
            let delivery = match worker.queue().receive(config.receive_wait).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => continue,
                Err(e) => {
                    error!(worker_id, error = %e, "Failed to receive from queue");
                    sleep(config.error_backoff).await;
                    continue;
                }
            };

            {
                let mut stats = stats.write();
                stats.received += 1;
                stats.processing += 1;
            }

            let outcome = worker.process(&delivery).await;

            let mut stats = stats.write();
            stats.processing = stats.processing.saturating_sub(1);
            match outcome {
                ProcessOutcome::Committed { .. } => stats.committed += 1,
                ProcessOutcome::Abandoned { .. } => stats.abandoned += 1,
            }
        }

        debug!(worker_id, "Worker stopped");
    }
}
