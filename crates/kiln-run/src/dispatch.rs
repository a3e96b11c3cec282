//! Materialization strategy dispatch: one warehouse recipe per kind

use crate::error::{RunError, RunResult};
use kiln_core::{Materialization, ModelDescriptor, ModelName, Task};
use kiln_db::{format_bytes, TableId, TableMetadata, Warehouse, WriteDisposition};
use std::fmt;
use std::sync::Arc;

/// What a successful materialization produced
#[derive(Debug, Clone, PartialEq)]
pub enum MaterializeOutcome {
    /// Nothing was created in the warehouse
    Ephemeral { model: ModelName },
    /// A view was (re)created
    View { id: TableId },
    /// A table was (re)built
    Table {
        id: TableId,
        num_rows: u64,
        /// Stored size of the table, when the warehouse reports one
        num_bytes: Option<u64>,
    },
}

impl fmt::Display for MaterializeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterializeOutcome::Ephemeral { model } => write!(f, "ephemeral {}", model),
            MaterializeOutcome::View { id } => write!(f, "created view {}", id),
            MaterializeOutcome::Table {
                id,
                num_rows,
                num_bytes: Some(bytes),
            } => write!(
                f,
                "created table {} ({} rows, {})",
                id,
                num_rows,
                format_bytes(*bytes)
            ),
            MaterializeOutcome::Table {
                id,
                num_rows,
                num_bytes: None,
            } => write!(f, "created table {} ({} rows)", id, num_rows),
        }
    }
}

/// Turns a task into warehouse calls according to its materialization kind.
///
/// Views and tables are replaced by delete-then-create, so running the same
/// task twice leaves the same end state. The two steps are not atomic: a
/// failure between them leaves the target absent.
pub struct Materializer {
    warehouse: Arc<dyn Warehouse>,
    dataset: Option<String>,
}

impl Materializer {
    pub fn new(warehouse: Arc<dyn Warehouse>, dataset: Option<String>) -> Self {
        Self { warehouse, dataset }
    }

    /// Warehouse identifier a model materializes into
    pub fn target_id(&self, model: &ModelName) -> TableId {
        TableId::new(self.dataset.as_deref(), model.as_str())
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    pub async fn materialize(&self, task: &Task) -> RunResult<MaterializeOutcome> {
        let model = task.model.as_ref();
        let name = model.unique_name();

        match model.materialization()? {
            Materialization::Ephemeral => {
                log::debug!("{} is ephemeral, nothing to create", name);
                Ok(MaterializeOutcome::Ephemeral {
                    model: name.clone(),
                })
            }
            Materialization::View => {
                let id = self.target_id(name);
                self.drop_existing(name, &id).await?;
                self.warehouse
                    .create_view(&id, &task.sql, &metadata_for(model, false))
                    .await
                    .map_err(|e| RunError::warehouse(name, e))?;
                Ok(MaterializeOutcome::View { id })
            }
            Materialization::Table => {
                let id = self.target_id(name);
                self.drop_existing(name, &id).await?;
                let job = self
                    .warehouse
                    .run_query(&task.sql, Some(&id), WriteDisposition::Truncate)
                    .await
                    .map_err(|e| RunError::warehouse(name, e))?;
                log::debug!(
                    "Job {} finished for {} ({} processed)",
                    job.job_id,
                    id,
                    job.bytes_processed
                        .map(format_bytes)
                        .unwrap_or_else(|| "unknown bytes".to_string())
                );

                let info = self
                    .warehouse
                    .update_table(&id, &metadata_for(model, true))
                    .await
                    .map_err(|e| RunError::warehouse(name, e))?;
                Ok(MaterializeOutcome::Table {
                    id,
                    num_rows: info.num_rows.unwrap_or(job.num_rows),
                    num_bytes: info.num_bytes,
                })
            }
        }
    }

    async fn drop_existing(&self, name: &ModelName, id: &TableId) -> RunResult<()> {
        match self.warehouse.delete_table(id).await {
            Ok(()) => {
                log::debug!("Dropped existing {}", id);
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(RunError::warehouse(name, e)),
        }
    }
}

/// Clustering only applies to tables
fn metadata_for(model: &dyn ModelDescriptor, with_clustering: bool) -> TableMetadata {
    TableMetadata {
        description: model.description().map(String::from),
        labels: model.labels().clone(),
        clustering: if with_clustering {
            model.cluster_by().to_vec()
        } else {
            Vec::new()
        },
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
