//! Bounded transfer worker pool
//!
//! A fixed number of OS threads pull tasks from a channel and push outcomes
//! back; the coordinator polls for completion with a fixed sleep rather than
//! an elaborate notification scheme. Every submitted task produces exactly
//! one outcome, including when a worker panics.

use crate::error::{MirrorError, Result};
use crate::plan::TransferTask;
use crate::report::{Reporter, Severity};
use crate::transfer::{TransferExecutor, TransferOutcome};
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

const QUEUE_SIZE: usize = 1024;

/// Pool progress counters
#[derive(Debug, Default)]
pub struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
}

impl PoolStats {
    /// Tasks handed to the pool so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Tasks with a recorded outcome
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Tasks still in flight or queued
    pub fn pending(&self) -> u64 {
        self.submitted() - self.completed()
    }
}

/// Runs transfer tasks with bounded concurrency
pub struct TransferPool {
    task_tx: Option<Sender<TransferTask>>,
    outcome_rx: Receiver<TransferOutcome>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
    poll_interval: Duration,
}

impl TransferPool {
    /// Spawn `workers` threads executing tasks through `executor`
    pub fn new(
        executor: Arc<dyn TransferExecutor>,
        workers: usize,
        poll_interval: Duration,
    ) -> Result<Self> {
        let (task_tx, task_rx) = bounded::<TransferTask>(QUEUE_SIZE);
        // Outcomes are unbounded: every task is submitted before the drain
        // starts, so a bounded outcome queue could wedge workers against a
        // coordinator that is still submitting.
        let (outcome_tx, outcome_rx) = unbounded::<TransferOutcome>();

        let mut handles = Vec::with_capacity(workers.max(1));
        for n in 0..workers.max(1) {
            let task_rx = task_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let executor = Arc::clone(&executor);

            let handle = std::thread::Builder::new()
                .name(format!("transfer-{n}"))
                .spawn(move || {
                    for task in task_rx.iter() {
                        // A panicking executor still owes the run an outcome.
                        let outcome =
                            match catch_unwind(AssertUnwindSafe(|| executor.execute(&task))) {
                                Ok(outcome) => outcome,
                                Err(_) => TransferOutcome::failed(&task, "worker panicked"),
                            };
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| MirrorError::Pool(format!("cannot spawn worker: {e}")))?;
            handles.push(handle);
        }

        Ok(Self {
            task_tx: Some(task_tx),
            outcome_rx,
            workers: handles,
            stats: Arc::new(PoolStats::default()),
            poll_interval,
        })
    }

    /// Progress counters
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Enqueue one task
    pub fn submit(&self, task: TransferTask) -> Result<()> {
        let tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| MirrorError::Pool("pool already drained".into()))?;
        tx.send(task)
            .map_err(|_| MirrorError::Pool("workers are gone".into()))?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Collect one outcome per submitted task, recording each into the
    /// reporter as it arrives. Completion order is unrelated to submission
    /// order; the poll never blocks longer than the configured interval.
    pub fn drain(&mut self, reporter: &mut Reporter) -> Result<()> {
        while self.stats.pending() > 0 {
            match self.outcome_rx.recv_timeout(self.poll_interval) {
                Ok(outcome) => {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                    reporter.record_outcome(&outcome);
                }
                Err(RecvTimeoutError::Timeout) => {
                    reporter.log(
                        Severity::Debug,
                        format!("Waiting on {} remaining copy tasks", self.stats.pending()),
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(MirrorError::Pool(
                        "workers exited with tasks still pending".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Stop accepting work and join every worker
    pub fn shutdown(mut self) {
        self.task_tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                debug!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for TransferPool {
    fn drop(&mut self) {
        self.task_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
