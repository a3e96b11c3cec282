//! Shared test utilities for kiln-run

use async_trait::async_trait;
use kiln_core::{Model, ModelConfig, ModelDescriptor, ModelName, Task};
use kiln_db::{
    DbError, DbResult, QueryJob, QueryResult, TableId, TableInfo, TableKind, TableMetadata,
    Warehouse, WriteDisposition,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Build an in-memory model descriptor
pub fn make_model(name: &str, deps: &[&str], kind: &str, sql: &str) -> Arc<dyn ModelDescriptor> {
    let config = ModelConfig {
        materialized: Some(kind.to_string()),
        depends_on: deps
            .iter()
            .map(|d| ModelName::parse(*d, "test").unwrap())
            .collect(),
        ..Default::default()
    };
    Arc::new(Model::new(
        ModelName::parse(name, "test").unwrap(),
        sql,
        config,
    ))
}

/// Build a task whose compiled SQL is a trivial select
pub fn make_task(name: &str, deps: &[&str], kind: &str) -> Task {
    Task::new(
        format!("SELECT '{name}' AS model"),
        make_model(name, deps, kind, "SELECT 1"),
        format!("target/compiled/{name}.sql"),
    )
}

#[derive(Debug, Default)]
struct RecordingState {
    relations: BTreeMap<String, TableInfo>,
    calls: Vec<String>,
    events: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory warehouse that records every call.
///
/// `create_view` and `run_query` log `start <table>` / `end <table>` events
/// around an optional delay so tests can observe ordering and overlap.
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    state: Mutex<RecordingState>,
    delay: Duration,
    failing: HashSet<String>,
    unsized_tables: bool,
}

/// Bytes every destination job reports as scanned, distinct from table sizes
pub const PROCESSED_BYTES: u64 = 4096;

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every create call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make create calls for `table` fail with an execution error
    pub fn failing_on(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    /// Report tables without a byte size, the way DuckDB does
    pub fn without_table_sizes(mut self) -> Self {
        self.unsized_tables = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Every call in arrival order, e.g. `delete_table analytics.x`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// `start <table>` / `end <table>` events in arrival order
    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    /// Position of an event, panicking when it never happened
    pub fn event_position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event '{event}' not recorded"))
    }

    /// Largest number of create calls that overlapped
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Current relations keyed by display identifier
    pub fn relations(&self) -> BTreeMap<String, TableInfo> {
        self.lock().relations.clone()
    }

    fn record(&self, call: &str, id: &TableId) {
        self.lock().calls.push(format!("{call} {id}"));
    }

    async fn create<F>(&self, id: &TableId, build: F) -> DbResult<TableInfo>
    where
        F: FnOnce() -> TableInfo,
    {
        {
            let mut state = self.lock();
            state.events.push(format!("start {}", id.table));
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut state = self.lock();
        state.in_flight -= 1;
        state.events.push(format!("end {}", id.table));

        if self.failing.contains(&id.table) {
            return Err(DbError::ExecutionError(format!(
                "injected failure for {}",
                id
            )));
        }

        let info = build();
        state.relations.insert(id.to_string(), info.clone());
        Ok(info)
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn get_table(&self, id: &TableId) -> DbResult<TableInfo> {
        self.record("get_table", id);
        self.lock()
            .relations
            .get(&id.to_string())
            .cloned()
            .ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    async fn delete_table(&self, id: &TableId) -> DbResult<()> {
        self.record("delete_table", id);
        self.lock()
            .relations
            .remove(&id.to_string())
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    async fn create_view(
        &self,
        id: &TableId,
        _query: &str,
        metadata: &TableMetadata,
    ) -> DbResult<TableInfo> {
        self.record("create_view", id);
        if self.lock().relations.contains_key(&id.to_string()) {
            return Err(DbError::ExecutionError(format!("{} already exists", id)));
        }
        self.create(id, || TableInfo {
            id: id.clone(),
            kind: TableKind::View,
            num_rows: None,
            num_bytes: None,
            metadata: metadata.clone(),
        })
        .await
    }

    async fn run_query(
        &self,
        _sql: &str,
        destination: Option<&TableId>,
        _write: WriteDisposition,
    ) -> DbResult<QueryJob> {
        let Some(id) = destination else {
            return Ok(QueryJob {
                job_id: "job_adhoc".to_string(),
                num_rows: 0,
                bytes_processed: None,
            });
        };
        self.record("run_query", id);
        let info = self
            .create(id, || TableInfo {
                id: id.clone(),
                kind: TableKind::Table,
                num_rows: Some(12),
                num_bytes: (!self.unsized_tables).then_some(1536),
                metadata: TableMetadata::default(),
            })
            .await?;
        Ok(QueryJob {
            job_id: format!("job_{}", id.table),
            num_rows: info.num_rows.unwrap_or_default(),
            bytes_processed: Some(PROCESSED_BYTES),
        })
    }

    async fn update_table(&self, id: &TableId, metadata: &TableMetadata) -> DbResult<TableInfo> {
        self.record("update_table", id);
        let mut state = self.lock();
        let info = state
            .relations
            .get_mut(&id.to_string())
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;
        info.metadata = metadata.clone();
        Ok(info.clone())
    }

    async fn execute_query(&self, _sql: &str) -> DbResult<QueryResult> {
        Ok(QueryResult {
            job_id: "job_adhoc".to_string(),
            rows: Vec::new(),
            bytes_billed: None,
            schema: Vec::new(),
        })
    }

    async fn create_dataset_if_not_exists(&self, dataset: &str) -> DbResult<()> {
        self.lock().calls.push(format!("create_dataset {dataset}"));
        Ok(())
    }

    fn warehouse_type(&self) -> &'static str {
        "recording"
    }
}
