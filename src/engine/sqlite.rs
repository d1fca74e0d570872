//! Embedded SQLite engine.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde_json::{Number, Value};

use super::{EngineError, EngineResult, ResultSet, TabularEngine};
use crate::sql::Dialect;

/// Engine over one SQLite connection.
///
/// Access to the connection is serialized.
pub struct SqliteEngine {
    conn: Mutex<Connection>,
    path: String,
}

impl SqliteEngine {
    /// Open a database file. `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> EngineResult<Self> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(EngineError::Open {
                    path: path.to_string(),
                    reason: format!("directory {} does not exist", parent.display()),
                });
            }
        }
        let conn = Connection::open(path).map_err(|e| EngineError::Open {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_string(),
        })
    }

    /// Open an in-memory database (for tests and fixtures).
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| EngineError::Open {
            path: ":memory:".into(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: ":memory:".into(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run one or more statements without returning rows.
    pub fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        // NaN has no JSON form and reads as missing.
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl TabularEngine for SqliteEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn table_columns(&self, table: &str) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        if columns.is_empty() {
            return Err(EngineError::TableNotFound(table.to_string()));
        }
        Ok(columns)
    }

    fn execute(&self, sql: &str) -> EngineResult<ResultSet> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(to_json(row.get_ref(i)?));
            }
            rows.push(values);
        }

        tracing::debug!(rows = rows.len(), "executed query");
        Ok(ResultSet::new(columns, rows))
    }
}
