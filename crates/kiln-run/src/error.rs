//! Error types for kiln-run

use kiln_core::CoreError;
use kiln_db::DbError;
use thiserror::Error;

/// Errors raised while compiling or materializing models
#[derive(Error, Debug)]
pub enum RunError {
    /// Configuration or graph error from kiln-core
    #[error(transparent)]
    Core(#[from] CoreError),

    /// R001: Warehouse call failed for a model
    #[error("[R001] Warehouse error in {model}: {source}")]
    Warehouse {
        model: String,
        #[source]
        source: DbError,
    },

    /// R002: Template rendering failed
    #[error("[R002] Failed to compile {model}: {message}")]
    Compile { model: String, message: String },

    /// R003: A worker task panicked
    #[error("[R003] Worker panicked: {message}")]
    WorkerPanicked { message: String },
}

impl RunError {
    pub(crate) fn warehouse(model: &str, source: DbError) -> Self {
        RunError::Warehouse {
            model: model.to_string(),
            source,
        }
    }
}

/// Result type alias for RunError
pub type RunResult<T> = Result<T, RunError>;
