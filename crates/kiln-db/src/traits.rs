//! Warehouse trait definition

use crate::error::DbResult;
use crate::types::{QueryJob, QueryResult, TableId, TableInfo, TableMetadata, WriteDisposition};
use async_trait::async_trait;

/// Warehouse client surface used by the materialization engine.
///
/// Implementations must be Send + Sync; one client is shared by every worker.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Describe a table or view. `DbError::NotFound` when absent.
    async fn get_table(&self, id: &TableId) -> DbResult<TableInfo>;

    /// Delete a table or view. `DbError::NotFound` when absent.
    async fn delete_table(&self, id: &TableId) -> DbResult<()>;

    /// Create a view over `query` with the given metadata
    async fn create_view(
        &self,
        id: &TableId,
        query: &str,
        metadata: &TableMetadata,
    ) -> DbResult<TableInfo>;

    /// Run a query, optionally writing its result into `destination`, and
    /// wait for the job to finish
    async fn run_query(
        &self,
        sql: &str,
        destination: Option<&TableId>,
        write: WriteDisposition,
    ) -> DbResult<QueryJob>;

    /// Replace the metadata of an existing table or view
    async fn update_table(&self, id: &TableId, metadata: &TableMetadata) -> DbResult<TableInfo>;

    /// Run an ad-hoc query and return its rows
    async fn execute_query(&self, sql: &str) -> DbResult<QueryResult>;

    /// Create a dataset (schema) if it does not exist
    async fn create_dataset_if_not_exists(&self, dataset: &str) -> DbResult<()>;

    /// Warehouse type identifier for logging
    fn warehouse_type(&self) -> &'static str;
}
