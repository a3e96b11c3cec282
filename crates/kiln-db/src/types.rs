//! Identifiers, metadata, and job results exchanged with a warehouse

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Fully-qualified identifier of a table or view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableId {
    /// Dataset (schema); `None` means the warehouse default
    pub dataset: Option<String>,
    /// Table or view name
    pub table: String,
}

impl TableId {
    pub fn new(dataset: Option<&str>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.map(String::from),
            table: table.into(),
        }
    }

    /// Identifier with each part double-quoted, safe to splice into SQL
    pub fn quoted(&self) -> String {
        let quote = |part: &str| format!("\"{}\"", part.replace('"', "\"\""));
        match &self.dataset {
            Some(dataset) => format!("{}.{}", quote(dataset), quote(&self.table)),
            None => quote(&self.table),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dataset {
            Some(dataset) => write!(f, "{}.{}", dataset, self.table),
            None => f.write_str(&self.table),
        }
    }
}

/// Kind of warehouse relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Table,
    View,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Table => write!(f, "table"),
            TableKind::View => write!(f, "view"),
        }
    }
}

/// Descriptive metadata attached to a table or view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub description: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub clustering: Vec<String>,
}

/// Current state of a table or view in the warehouse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub id: TableId,
    pub kind: TableKind,
    /// Row count; `None` for views
    pub num_rows: Option<u64>,
    /// Storage size, when the warehouse reports one
    pub num_bytes: Option<u64>,
    pub metadata: TableMetadata,
}

/// What a query job does when its destination table already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDisposition {
    /// Replace the destination's contents
    #[default]
    Truncate,
    /// Append to the destination
    Append,
    /// Fail unless the destination is absent
    Empty,
}

/// A completed query job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryJob {
    pub job_id: String,
    /// Rows in the destination table, or rows returned without one
    pub num_rows: u64,
    pub bytes_processed: Option<u64>,
}

/// Column of a query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub data_type: String,
}

/// Rows returned by an ad-hoc query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub job_id: String,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub bytes_billed: Option<u64>,
    pub schema: Vec<Field>,
}

/// Human-readable byte size (`1.5 KB`)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_display_and_quote() {
        let id = TableId::new(Some("analytics"), "heart_rate");
        assert_eq!(id.to_string(), "analytics.heart_rate");
        assert_eq!(id.quoted(), "\"analytics\".\"heart_rate\"");

        let bare = TableId::new(None, "we\"ird");
        assert_eq!(bare.to_string(), "we\"ird");
        assert_eq!(bare.quoted(), "\"we\"\"ird\"");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
