//! kiln-db - Warehouse abstraction layer for Kiln
//!
//! This crate provides the `Warehouse` trait consumed by the materialization
//! engine and a DuckDB implementation of it.

pub mod duckdb;
pub mod error;
pub mod traits;
pub mod types;

pub use duckdb::DuckDbWarehouse;
pub use error::{DbError, DbResult};
pub use traits::Warehouse;
pub use types::{
    format_bytes, Field, QueryJob, QueryResult, TableId, TableInfo, TableKind, TableMetadata,
    WriteDisposition,
};
