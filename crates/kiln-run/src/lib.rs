//! kiln-run - Materialization engine for Kiln
//!
//! Compiles model templates, dispatches each model to its materialization
//! strategy, and runs a pool of workers that materialize models in
//! dependency order with per-model failure isolation.

pub mod compile;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod scheduler;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use compile::Compiler;
pub use dispatch::{MaterializeOutcome, Materializer};
pub use driver::{build_graph, materialize_all, RunOptions, RunReport, DEFAULT_IDLE_TIMEOUT};
pub use error::{RunError, RunResult};
pub use scheduler::{
    MaterializedSet, ModelRunResult, ProgressCallback, Readiness, RunStatus, TaskQueue,
};
