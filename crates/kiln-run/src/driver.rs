//! Run driver: graph construction and the `materialize_all` entry point

use crate::dispatch::Materializer;
use crate::error::{RunError, RunResult};
use crate::scheduler::{
    run_worker, MaterializedSet, ModelRunResult, ProgressCallback, RunStatus, TaskQueue,
    WorkerContext,
};
use kiln_core::{CoreResult, ModelDag, ModelName, Task};
use kiln_db::Warehouse;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Default time a worker waits on an empty queue before exiting
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Knobs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of workers (at least one is always started)
    pub threads: usize,
    /// How long an idle worker waits for work before exiting
    pub idle_timeout: Duration,
    /// Target dataset; created before any model runs
    pub dataset: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            dataset: None,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One entry per model, in the order they settled
    pub results: Vec<ModelRunResult>,
    pub elapsed_secs: f64,
    materialized: Vec<ModelName>,
}

impl RunReport {
    pub fn success_count(&self) -> usize {
        self.count(RunStatus::Success)
    }

    pub fn failure_count(&self) -> usize {
        self.count(RunStatus::Error)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(RunStatus::Skipped)
    }

    fn count(&self, status: RunStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Models marked materialized at the end of the run, sorted by name.
    /// Includes graph nodes that had no task.
    pub fn materialized(&self) -> &[ModelName] {
        &self.materialized
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn result(&self, model: &str) -> Option<&ModelRunResult> {
        self.results.iter().find(|r| r.model == model)
    }
}

/// Build the dependency graph for a set of tasks
pub fn build_graph(tasks: &[Task]) -> CoreResult<ModelDag> {
    ModelDag::from_tasks(tasks)
}

/// `graph` plus the edges each task's model declares towards models the
/// graph already holds. Declared dependencies outside the graph add no node.
fn scheduling_graph(graph: &ModelDag, tasks: &HashMap<ModelName, Task>) -> CoreResult<ModelDag> {
    let mut combined = graph.clone();
    for name in graph.models() {
        let Some(task) = tasks.get(&name) else {
            continue;
        };
        for dep in task.model.dependencies() {
            if graph.contains(dep) {
                combined.add_dependency(&name, dep)?;
            }
        }
    }
    Ok(combined)
}

/// Materialize every task in `graph` with a pool of workers.
///
/// A task waits for its predecessors in `graph` and for the dependencies
/// its model declares. Cycles across either kind of edge are rejected
/// before anything runs. Graph nodes without a task are treated as already
/// materialized so their dependents still run; tasks with no graph node are
/// reported skipped. A failed model does not stop independent branches; its
/// dependents are skipped.
pub async fn materialize_all(
    graph: &ModelDag,
    tasks: &HashMap<ModelName, Task>,
    warehouse: Arc<dyn Warehouse>,
    options: &RunOptions,
    on_progress: Option<ProgressCallback>,
) -> RunResult<RunReport> {
    let start = Instant::now();
    let schedule = scheduling_graph(graph, tasks)?;
    let order = schedule.topological_order()?;

    let settled = MaterializedSet::new();
    let mut results = Vec::new();
    let skip_missing = |model: &ModelName, results: &mut Vec<ModelRunResult>| {
        if settled.is_settled(model) {
            return;
        }
        log::warn!("No compiled artifact for {}, treating it as materialized", model);
        settled.mark_materialized(model);
        let result = ModelRunResult::skipped(model, "unknown", "no compiled artifact");
        if let Some(cb) = &on_progress {
            cb(&result.message);
        }
        results.push(result);
    };

    let mut queued = Vec::new();
    for name in &order {
        match tasks.get(name) {
            Some(task) => queued.push(task.clone()),
            None => skip_missing(name, &mut results),
        }
    }
    let mut predecessors = HashMap::with_capacity(queued.len());
    for task in &queued {
        let mut deps = schedule.dependencies(task.name());
        for dep in task.model.dependencies() {
            if !graph.contains(dep) {
                skip_missing(dep, &mut results);
                deps.push(dep.clone());
            }
        }
        predecessors.insert(task.name().clone(), deps);
    }

    let in_graph: HashSet<&str> = order.iter().map(|n| n.as_str()).collect();
    let mut outside: Vec<&Task> = tasks
        .values()
        .filter(|t| !in_graph.contains(t.name().as_str()))
        .collect();
    outside.sort_by(|a, b| a.name().cmp(b.name()));
    for task in outside {
        log::warn!("Task {} is not part of the graph and will not run", task.name());
        let result = ModelRunResult::skipped(
            task.name(),
            task.model.materialization_kind(),
            "not in dependency graph",
        );
        if let Some(cb) = &on_progress {
            cb(&result.message);
        }
        results.push(result);
    }

    if let Some(dataset) = &options.dataset {
        warehouse
            .create_dataset_if_not_exists(dataset)
            .await
            .map_err(|e| RunError::warehouse(dataset, e))?;
    }

    let workers = options.threads.max(1);
    log::info!(
        "Materializing {} models with {} workers on {}",
        queued.len(),
        workers,
        warehouse.warehouse_type()
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = TaskQueue::new();
    let seeded: Vec<(ModelName, String)> = queued
        .iter()
        .map(|t| (t.name().clone(), t.model.materialization_kind().to_string()))
        .collect();
    for task in queued {
        queue.push(task);
    }
    if seeded.is_empty() {
        queue.close();
    }

    let ctx = Arc::new(WorkerContext {
        queue,
        settled,
        predecessors,
        materializer: Arc::new(Materializer::new(warehouse, options.dataset.clone())),
        idle_timeout: options.idle_timeout,
        on_progress,
        results: tx,
        remaining: AtomicUsize::new(seeded.len()),
    });

    let handles: Vec<_> = (0..workers)
        .map(|id| tokio::spawn(run_worker(id, ctx.clone())))
        .collect();
    for (id, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            log::error!("Worker {} terminated abnormally: {}", id, e);
        }
    }

    while let Ok(result) = rx.try_recv() {
        results.push(result);
    }

    let reported: HashSet<String> = results.iter().map(|r| r.model.clone()).collect();
    for (name, kind) in &seeded {
        if !reported.contains(name.as_str()) {
            let err = RunError::WorkerPanicked {
                message: format!("{} was never settled", name),
            };
            log::error!("{}", err);
            results.push(ModelRunResult::failed(name, kind, &err, 0.0));
        }
    }

    let report = RunReport {
        results,
        elapsed_secs: start.elapsed().as_secs_f64(),
        materialized: ctx.settled.materialized().into_iter().collect(),
    };
    log::info!(
        "Run finished: {} succeeded, {} failed, {} skipped in {:.2}s",
        report.success_count(),
        report.failure_count(),
        report.skipped_count(),
        report.elapsed_secs
    );
    Ok(report)
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
