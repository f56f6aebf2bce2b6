//! Bounded-concurrency transfer pipeline.
//!
//! All tasks are queued on a FIFO channel sized to hold every one of them.
//! A fixed number of workers drain the queue; each worker takes one task,
//! runs the transfer function, records the outcome and advances the shared
//! progress counter, whether the transfer succeeded or not. A failed task is
//! never retried and never stops its siblings.
//!
//! Outcomes travel to the aggregator over a second channel and are tallied
//! once every worker has been joined, so the final report is deterministic
//! regardless of completion order.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{RunError, TransferError};

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A unit of pipeline work.
pub trait TransferTask: Send + 'static {
    /// Human-readable identifier used in logs and failure reports.
    fn label(&self) -> String;
}

/// Fetch `url` into `local_path`, relative to the export root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub local_path: String,
}

impl TransferTask for DownloadTask {
    fn label(&self) -> String {
        self.local_path.clone()
    }
}

/// Upload the local file at `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub path: PathBuf,
}

impl TransferTask for UploadTask {
    fn label(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Receives progress events from the workers. Implementations must be cheap
/// and non-blocking; they are called from inside the worker loop.
pub trait ProgressObserver: Send + Sync {
    fn start(&self, _total: usize) {}
    fn advance(&self) {}
    fn failure(&self, _label: &str, _error: &TransferError) {}
    fn finish(&self) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One failed task.
#[derive(Debug)]
pub struct TaskFailure {
    /// Position of the task in the submitted list.
    pub index: usize,
    pub label: String,
    pub error: TransferError,
}

/// Final accounting of a pipeline run.
#[derive(Debug, Default)]
pub struct TransferReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dry_run: bool,
    /// Failures ordered by task index.
    pub failures: Vec<TaskFailure>,
}

impl TransferReport {
    /// An empty run.
    pub fn empty(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Turn a report with failures into the run-level aggregate error.
    pub fn into_result(self, verb: &'static str) -> Result<Self, RunError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RunError::PartialFailure {
                failed: self.failed,
                total: self.total,
                verb,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct Outcome {
    index: usize,
    label: String,
    result: Result<(), TransferError>,
}

/// Worker pool configuration for one run.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    workers: usize,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(workers: usize, dry_run: bool) -> Self {
        Self {
            workers: workers.max(1),
            dry_run,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `execute` over every task and return the tally.
    ///
    /// Under dry run `execute` is never called; every task counts as a
    /// success and progress still advances once per task.
    pub async fn run<T, F, Fut>(
        &self,
        tasks: Vec<T>,
        progress: Arc<dyn ProgressObserver>,
        execute: F,
    ) -> TransferReport
    where
        T: TransferTask,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TransferError>> + Send + 'static,
    {
        let total = tasks.len();
        if total == 0 {
            return TransferReport::empty(self.dry_run);
        }

        let worker_count = self.workers.min(total);
        info!(
            tasks = total,
            workers = worker_count,
            dry_run = self.dry_run,
            "starting transfer pipeline"
        );
        progress.start(total);

        let (task_tx, task_rx) = mpsc::channel::<(usize, T)>(total);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();
        let queue = Arc::new(Mutex::new(task_rx));
        let execute = Arc::new(execute);
        let processed = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let execute = Arc::clone(&execute);
            let outcome_tx = outcome_tx.clone();
            let progress = Arc::clone(&progress);
            let processed = Arc::clone(&processed);
            let dry_run = self.dry_run;

            workers.spawn(async move {
                loop {
                    // The lock is held only while waiting for the next task.
                    let next = queue.lock().await.recv().await;
                    let Some((index, task)) = next else {
                        break;
                    };

                    let label = task.label();
                    let result = if dry_run {
                        debug!(task = %label, "dry run, skipping transfer");
                        Ok(())
                    } else {
                        execute(task).await
                    };

                    if let Err(e) = &result {
                        warn!(worker = worker_id, task = %label, error = %e, "transfer failed");
                        progress.failure(&label, e);
                    }
                    let _ = outcome_tx.send(Outcome {
                        index,
                        label,
                        result,
                    });
                    processed.fetch_add(1, Ordering::SeqCst);
                    progress.advance();
                }
                debug!(worker = worker_id, "worker finished");
            });
        }
        drop(outcome_tx);

        // Producer: every task goes onto the queue, then the queue is closed.
        for (index, task) in tasks.into_iter().enumerate() {
            if task_tx.send((index, task)).await.is_err() {
                warn!("all workers exited before the queue was filled");
                break;
            }
        }
        drop(task_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "transfer worker terminated abnormally");
            }
        }
        progress.finish();

        let mut slots: Vec<Option<Outcome>> = (0..total).map(|_| None).collect();
        while let Some(outcome) = outcome_rx.recv().await {
            let index = outcome.index;
            slots[index] = Some(outcome);
        }

        let mut report = TransferReport {
            total,
            dry_run: self.dry_run,
            ..TransferReport::default()
        };
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Outcome { result: Ok(()), .. }) => report.succeeded += 1,
                Some(Outcome {
                    label,
                    result: Err(error),
                    ..
                }) => report.failures.push(TaskFailure {
                    index,
                    label,
                    error,
                }),
                None => report.failures.push(TaskFailure {
                    index,
                    label: format!("task #{}", index),
                    error: TransferError::Abandoned(
                        "worker terminated before recording an outcome".into(),
                    ),
                }),
            }
        }
        report.failed = report.failures.len();

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            processed = processed.load(Ordering::SeqCst),
            "transfer pipeline finished"
        );
        report
    }
}
