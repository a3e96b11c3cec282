//! DuckDB warehouse implementation

use crate::error::{DbError, DbResult};
use crate::traits::Warehouse;
use crate::types::{
    Field, QueryJob, QueryResult, TableId, TableInfo, TableKind, TableMetadata, WriteDisposition,
};
use async_trait::async_trait;
use duckdb::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Bookkeeping table holding descriptions, labels, and clustering, which
/// DuckDB has no native place for.
const METADATA_TABLE: &str = "_kiln_table_metadata";

const DEFAULT_SCHEMA: &str = "main";

/// DuckDB-backed warehouse
pub struct DuckDbWarehouse {
    conn: Mutex<Connection>,
}

impl DuckDbWarehouse {
    /// Create a new in-memory DuckDB warehouse
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Open (or create) a DuckDB database file
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {DEFAULT_SCHEMA}.{METADATA_TABLE} (
                table_schema VARCHAR NOT NULL,
                table_name VARCHAR NOT NULL,
                description VARCHAR,
                labels VARCHAR,
                clustering VARCHAR,
                PRIMARY KEY (table_schema, table_name)
            )"
        ))
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn schema_of(id: &TableId) -> &str {
        id.dataset.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }
}

/// Relation kind from information_schema, `None` when absent
fn relation_kind(conn: &Connection, id: &TableId) -> DbResult<Option<TableKind>> {
    let mut stmt = conn.prepare(
        "SELECT table_type FROM information_schema.tables \
         WHERE table_schema = ? AND table_name = ?",
    )?;
    let mut rows = stmt.query(params![DuckDbWarehouse::schema_of(id), id.table.as_str()])?;
    match rows.next()? {
        Some(row) => {
            let table_type: String = row.get(0)?;
            Ok(Some(if table_type == "VIEW" {
                TableKind::View
            } else {
                TableKind::Table
            }))
        }
        None => Ok(None),
    }
}

fn count_rows(conn: &Connection, id: &TableId) -> DbResult<u64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", id.quoted()), [], |row| {
        row.get(0)
    })?;
    Ok(count.max(0) as u64)
}

fn read_metadata(conn: &Connection, id: &TableId) -> DbResult<TableMetadata> {
    let mut stmt = conn.prepare(&format!(
        "SELECT description, labels, clustering FROM {DEFAULT_SCHEMA}.{METADATA_TABLE} \
         WHERE table_schema = ? AND table_name = ?"
    ))?;
    let mut rows = stmt.query(params![DuckDbWarehouse::schema_of(id), id.table.as_str()])?;
    let Some(row) = rows.next()? else {
        return Ok(TableMetadata::default());
    };

    let description: Option<String> = row.get(0)?;
    let labels: Option<String> = row.get(1)?;
    let clustering: Option<String> = row.get(2)?;

    let labels: BTreeMap<String, String> = match labels {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| DbError::Internal(format!("corrupt labels for {}: {}", id, e)))?,
        None => BTreeMap::new(),
    };
    let clustering: Vec<String> = match clustering {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| DbError::Internal(format!("corrupt clustering for {}: {}", id, e)))?,
        None => Vec::new(),
    };

    Ok(TableMetadata {
        description,
        labels,
        clustering,
    })
}

fn write_metadata(conn: &Connection, id: &TableId, metadata: &TableMetadata) -> DbResult<()> {
    let labels = serde_json::to_string(&metadata.labels)
        .map_err(|e| DbError::Internal(e.to_string()))?;
    let clustering = serde_json::to_string(&metadata.clustering)
        .map_err(|e| DbError::Internal(e.to_string()))?;
    conn.execute(
        &format!("INSERT OR REPLACE INTO {DEFAULT_SCHEMA}.{METADATA_TABLE} VALUES (?, ?, ?, ?, ?)"),
        params![
            DuckDbWarehouse::schema_of(id),
            id.table.as_str(),
            metadata.description.as_deref(),
            labels,
            clustering
        ],
    )?;
    Ok(())
}

fn clear_metadata(conn: &Connection, id: &TableId) -> DbResult<()> {
    conn.execute(
        &format!(
            "DELETE FROM {DEFAULT_SCHEMA}.{METADATA_TABLE} WHERE table_schema = ? AND table_name = ?"
        ),
        params![DuckDbWarehouse::schema_of(id), id.table.as_str()],
    )?;
    Ok(())
}

fn describe(conn: &Connection, id: &TableId) -> DbResult<TableInfo> {
    let kind = relation_kind(conn, id)?.ok_or_else(|| DbError::NotFound(id.to_string()))?;
    let num_rows = match kind {
        TableKind::Table => Some(count_rows(conn, id)?),
        TableKind::View => None,
    };
    Ok(TableInfo {
        id: id.clone(),
        kind,
        num_rows,
        // DuckDB exposes no per-table storage size
        num_bytes: None,
        metadata: read_metadata(conn, id)?,
    })
}

fn drain_rows(conn: &Connection, sql: &str) -> DbResult<u64> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut count = 0u64;
    while rows.next()?.is_some() {
        count += 1;
    }
    Ok(count)
}

fn new_job_id() -> String {
    format!("job_{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    async fn get_table(&self, id: &TableId) -> DbResult<TableInfo> {
        let conn = self.lock()?;
        describe(&conn, id)
    }

    async fn delete_table(&self, id: &TableId) -> DbResult<()> {
        let conn = self.lock()?;
        let kind = relation_kind(&conn, id)?.ok_or_else(|| DbError::NotFound(id.to_string()))?;
        conn.execute_batch(&format!(
            "DROP {} {}",
            match kind {
                TableKind::Table => "TABLE",
                TableKind::View => "VIEW",
            },
            id.quoted()
        ))?;
        clear_metadata(&conn, id)?;
        log::debug!("Deleted {} {}", kind, id);
        Ok(())
    }

    async fn create_view(
        &self,
        id: &TableId,
        query: &str,
        metadata: &TableMetadata,
    ) -> DbResult<TableInfo> {
        let conn = self.lock()?;
        conn.execute_batch(&format!("CREATE VIEW {} AS {}", id.quoted(), query))?;
        write_metadata(&conn, id, metadata)?;
        describe(&conn, id)
    }

    async fn run_query(
        &self,
        sql: &str,
        destination: Option<&TableId>,
        write: WriteDisposition,
    ) -> DbResult<QueryJob> {
        let conn = self.lock()?;
        let job_id = new_job_id();

        let Some(dest) = destination else {
            let num_rows = drain_rows(&conn, sql)?;
            return Ok(QueryJob {
                job_id,
                num_rows,
                bytes_processed: None,
            });
        };

        let exists = relation_kind(&conn, dest)?.is_some();
        let statement = match (write, exists) {
            (WriteDisposition::Truncate, _) => {
                format!("CREATE OR REPLACE TABLE {} AS {}", dest.quoted(), sql)
            }
            (WriteDisposition::Append, true) => format!("INSERT INTO {} {}", dest.quoted(), sql),
            (WriteDisposition::Empty, true) => {
                return Err(DbError::ExecutionError(format!(
                    "destination {} already exists",
                    dest
                )));
            }
            (WriteDisposition::Append | WriteDisposition::Empty, false) => {
                format!("CREATE TABLE {} AS {}", dest.quoted(), sql)
            }
        };
        conn.execute_batch(&statement)?;

        Ok(QueryJob {
            job_id,
            num_rows: count_rows(&conn, dest)?,
            bytes_processed: None,
        })
    }

    async fn update_table(&self, id: &TableId, metadata: &TableMetadata) -> DbResult<TableInfo> {
        let conn = self.lock()?;
        if relation_kind(&conn, id)?.is_none() {
            return Err(DbError::NotFound(id.to_string()));
        }
        write_metadata(&conn, id, metadata)?;
        describe(&conn, id)
    }

    async fn execute_query(&self, sql: &str) -> DbResult<QueryResult> {
        let conn = self.lock()?;

        let mut schema = Vec::new();
        {
            let mut stmt = conn.prepare(&format!("DESCRIBE {}", sql))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                schema.push(Field {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                });
            }
        }

        let mut result_rows = Vec::new();
        {
            let mut stmt = conn.prepare(&format!("SELECT to_json(q)::VARCHAR FROM ({}) q", sql))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let json: String = row.get(0)?;
                let value: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(&json).map_err(|e| DbError::Internal(e.to_string()))?;
                result_rows.push(value);
            }
        }

        Ok(QueryResult {
            job_id: new_job_id(),
            rows: result_rows,
            bytes_billed: None,
            schema,
        })
    }

    async fn create_dataset_if_not_exists(&self, dataset: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "CREATE SCHEMA IF NOT EXISTS \"{}\"",
            dataset.replace('"', "\"\"")
        ))?;
        Ok(())
    }

    fn warehouse_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
