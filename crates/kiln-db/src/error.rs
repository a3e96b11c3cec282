//! Error types for kiln-db

use thiserror::Error;

/// Warehouse operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Warehouse connection failed: {0}")]
    ConnectionError(String),

    /// Query or DDL execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table or view not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    NotFound(String),

    /// Mutex poisoned (D006)
    #[error("[D006] Warehouse mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D007)
    #[error("[D007] Internal warehouse error: {0}")]
    Internal(String),
}

impl DbError {
    /// True for the "does not exist" family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error carries no structured "missing relation" variant, so
        // classify by message with narrow patterns.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || (msg.contains("Catalog Error") && msg.contains("does not exist"))
        {
            DbError::NotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}
