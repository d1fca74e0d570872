//! Tabular execution engine.
//!
//! The compiler builds SQL; an engine runs it. [`TabularEngine`] is the seam:
//! it reports the dialect to render, the columns of a table (used to resolve
//! joins, filters and raw-column dimensions) and executes a statement.
//!
//! [`SqliteEngine`] drives the embedded connection kind. Warehouse kinds are
//! driven by external engines implementing the same trait.

mod sqlite;

pub use sqlite::SqliteEngine;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{ConnectionDescriptor, ConnectionError, ConnectionKind};
use crate::sql::Dialect;

/// Errors raised by an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to open database at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Execution failed: {0}")]
    Execution(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Rows returned by an engine. Cells are JSON values so results can be
/// cached and serialized without a second conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// A result with columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in column `name`.
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Rows as `{column: value}` objects, in column order.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// An engine that can run compiled SQL.
pub trait TabularEngine: Send + Sync {
    /// Dialect compiled SQL must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Column names of `table`, in table order.
    fn table_columns(&self, table: &str) -> EngineResult<Vec<String>>;

    /// Execute a query.
    fn execute(&self, sql: &str) -> EngineResult<ResultSet>;
}

/// Open the engine for a connection descriptor.
///
/// `db_path_override` takes precedence over the descriptor's `path`.
/// Warehouse kinds have no built-in driver.
pub fn connect(
    descriptor: &ConnectionDescriptor,
    db_path_override: Option<&str>,
) -> Result<Arc<dyn TabularEngine>, ConnectionError> {
    match descriptor.kind {
        ConnectionKind::Sqlite => {
            let path = descriptor.resolved_path(db_path_override)?;
            tracing::info!(path = %path, "opening embedded database");
            let engine = SqliteEngine::open(&path).map_err(|e| ConnectionError::OpenFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            Ok(Arc::new(engine))
        }
        kind => {
            descriptor.validate()?;
            Err(ConnectionError::DriverUnavailable(kind))
        }
    }
}
