//! Concurrent scheduler: a pool of workers pulling tasks off a shared queue.
//!
//! Workers pop a task, check its direct predecessors against the
//! [`MaterializedSet`], and either execute it, skip it (an upstream model
//! failed), or put it back at the tail of the queue. A worker that has gone
//! a full lap of the queue without progress waits for the set to change
//! instead of spinning.

use crate::dispatch::Materializer;
use crate::error::RunError;
use kiln_core::{ModelName, Task};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Notify};

/// Receives one human-readable line per settled model
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Final state of one model in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Error => write!(f, "error"),
            RunStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Per-model run result
#[derive(Debug, Clone, Serialize)]
pub struct ModelRunResult {
    pub model: String,
    pub status: RunStatus,
    pub materialization: String,
    pub duration_secs: f64,
    /// Outcome line, e.g. `created view analytics.x`
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelRunResult {
    pub(crate) fn skipped(model: &str, materialization: &str, reason: &str) -> Self {
        Self {
            model: model.to_string(),
            status: RunStatus::Skipped,
            materialization: materialization.to_string(),
            duration_secs: 0.0,
            message: format!("skipped {} ({})", model, reason),
            error: None,
        }
    }

    pub(crate) fn failed(model: &str, materialization: &str, error: &RunError, secs: f64) -> Self {
        Self {
            model: model.to_string(),
            status: RunStatus::Error,
            materialization: materialization.to_string(),
            duration_secs: secs,
            message: format!("failed {}: {}", model, error),
            error: Some(error.to_string()),
        }
    }
}

/// FIFO of tasks shared by every worker
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    notify: Notify,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append at the tail and wake one waiting worker
    pub fn push(&self, task: Task) {
        self.lock().push_back(task);
        self.notify.notify_one();
    }

    /// Take the task at the head.
    ///
    /// Waits for a push while the queue is empty and returns `None` once it
    /// has stayed empty for `idle_timeout`, or immediately after
    /// [`close`](Self::close).
    pub async fn pop(&self, idle_timeout: Duration) -> Option<Task> {
        let deadline = tokio::time::Instant::now() + idle_timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.lock().pop_front() {
                return Some(task);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.lock().pop_front();
            }
        }
    }

    /// Let idle workers exit without waiting out the idle timeout
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Result of checking a task's predecessors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Every predecessor is materialized
    Ready,
    /// This predecessor failed or was skipped
    UpstreamFailed(ModelName),
    /// Some predecessor has not settled yet
    Waiting,
}

#[derive(Debug, Default)]
struct Settled {
    materialized: HashSet<ModelName>,
    failed: HashSet<ModelName>,
}

/// Models that have settled during a run.
///
/// Every change bumps a generation counter that waiting workers subscribe to.
#[derive(Debug)]
pub struct MaterializedSet {
    settled: Mutex<Settled>,
    generation: watch::Sender<u64>,
}

impl Default for MaterializedSet {
    fn default() -> Self {
        Self {
            settled: Mutex::new(Settled::default()),
            generation: watch::Sender::new(0),
        }
    }
}

impl MaterializedSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Settled> {
        self.settled.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn mark_materialized(&self, model: &ModelName) {
        self.lock().materialized.insert(model.clone());
        self.generation.send_modify(|g| *g += 1);
    }

    /// Record a failed or skipped model; its dependents will be skipped
    pub fn mark_failed(&self, model: &ModelName) {
        self.lock().failed.insert(model.clone());
        self.generation.send_modify(|g| *g += 1);
    }

    pub fn is_materialized(&self, model: &str) -> bool {
        self.lock().materialized.contains(model)
    }

    pub fn is_failed(&self, model: &str) -> bool {
        self.lock().failed.contains(model)
    }

    pub fn is_settled(&self, model: &str) -> bool {
        let settled = self.lock();
        settled.materialized.contains(model) || settled.failed.contains(model)
    }

    /// Check a task's direct predecessors. A failed predecessor wins over
    /// one that is still pending.
    pub fn readiness(&self, dependencies: &[ModelName]) -> Readiness {
        let settled = self.lock();
        if let Some(failed) = dependencies.iter().find(|d| settled.failed.contains(*d)) {
            return Readiness::UpstreamFailed(failed.clone());
        }
        if dependencies
            .iter()
            .all(|d| settled.materialized.contains(d))
        {
            Readiness::Ready
        } else {
            Readiness::Waiting
        }
    }

    /// Snapshot of the materialized models
    pub fn materialized(&self) -> BTreeSet<ModelName> {
        self.lock().materialized.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

/// State shared by every worker of one run
pub(crate) struct WorkerContext {
    pub(crate) queue: TaskQueue,
    pub(crate) settled: MaterializedSet,
    /// Direct predecessors per queued task; tasks not listed fall back to
    /// the dependencies their model declares
    pub(crate) predecessors: HashMap<ModelName, Vec<ModelName>>,
    pub(crate) materializer: Arc<Materializer>,
    pub(crate) idle_timeout: Duration,
    pub(crate) on_progress: Option<ProgressCallback>,
    pub(crate) results: mpsc::UnboundedSender<ModelRunResult>,
    /// Queued tasks not yet settled
    pub(crate) remaining: AtomicUsize,
}

impl WorkerContext {
    fn predecessors<'a>(&'a self, task: &'a Task) -> &'a [ModelName] {
        self.predecessors
            .get(task.name())
            .map(Vec::as_slice)
            .unwrap_or_else(|| task.model.dependencies())
    }

    fn report(&self, result: ModelRunResult) {
        if let Some(cb) = &self.on_progress {
            cb(&result.message);
        }
        // The driver outlives every worker, so the receiver is still open
        let _ = self.results.send(result);
    }

    fn task_settled(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            log::debug!("All queued tasks settled, closing queue");
            self.queue.close();
        }
    }
}

/// Worker loop: runs until the queue is closed or idles out
pub(crate) async fn run_worker(id: usize, ctx: Arc<WorkerContext>) {
    let mut generation = ctx.settled.subscribe();
    let mut stalled = 0usize;

    while let Some(task) = ctx.queue.pop(ctx.idle_timeout).await {
        generation.borrow_and_update();
        let name = task.name().clone();

        match ctx.settled.readiness(ctx.predecessors(&task)) {
            Readiness::Ready => {
                stalled = 0;
                log::debug!("Worker {} executing {}", id, name);
                execute(&ctx, task).await;
                ctx.task_settled();
            }
            Readiness::UpstreamFailed(upstream) => {
                stalled = 0;
                log::warn!("Skipping {}: upstream model {} failed", name, upstream);
                ctx.settled.mark_failed(&name);
                ctx.report(ModelRunResult::skipped(
                    &name,
                    task.model.materialization_kind(),
                    &format!("upstream {} failed", upstream),
                ));
                ctx.task_settled();
            }
            Readiness::Waiting => {
                log::debug!("Worker {} requeueing {}: predecessors pending", id, name);
                ctx.queue.push(task);
                stalled += 1;
                if stalled >= ctx.queue.len() {
                    stalled = 0;
                    // A full lap without progress; wait for the set to move.
                    // The timeout only bounds the wait: the task stays queued
                    // and is checked again either way.
                    if tokio::time::timeout(ctx.idle_timeout, generation.changed())
                        .await
                        .is_err()
                    {
                        log::debug!("Worker {} saw no progress within the idle timeout", id);
                    }
                }
            }
        }
    }

    log::debug!("Worker {} exiting", id);
}

/// Dispatch one task and record its outcome.
///
/// The materialization runs in its own tokio task so a panic inside it is
/// reported as a failure of this model rather than taking the worker down.
async fn execute(ctx: &WorkerContext, task: Task) {
    let name = task.name().clone();
    let kind = task.model.materialization_kind().to_string();
    let start = Instant::now();

    let materializer = ctx.materializer.clone();
    let handle = tokio::spawn(async move { materializer.materialize(&task).await });
    let outcome = match handle.await {
        Ok(result) => result,
        Err(join_err) => Err(RunError::WorkerPanicked {
            message: format!("materializing {}: {}", name, join_err),
        }),
    };
    let secs = start.elapsed().as_secs_f64();

    match outcome {
        Ok(outcome) => {
            ctx.settled.mark_materialized(&name);
            ctx.report(ModelRunResult {
                model: name.to_string(),
                status: RunStatus::Success,
                materialization: kind,
                duration_secs: secs,
                message: outcome.to_string(),
                error: None,
            });
        }
        Err(e) => {
            log::error!("Model {} failed: {}", name, e);
            ctx.settled.mark_failed(&name);
            ctx.report(ModelRunResult::failed(&name, &kind, &e, secs));
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
