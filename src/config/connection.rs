//! Data store connection descriptors.
//!
//! A model document names one connection. The kind decides the SQL dialect
//! and whether the crate can open it itself:
//! - `sqlite` (alias `local`): embedded database file, opened in-process
//! - `postgres`, `snowflake`, `bigquery`: warehouse kinds, driven externally

use serde::{Deserialize, Serialize};

use crate::sql::Dialect;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Unsupported connection kind: {0}. Supported: sqlite, postgres, snowflake, bigquery")]
    UnsupportedKind(String),

    #[error("No built-in driver for {0} connections")]
    DriverUnavailable(ConnectionKind),

    #[error("Missing connection field '{field}' for {kind} connection")]
    MissingField { kind: ConnectionKind, field: String },

    #[error("Failed to open database at {path}: {reason}")]
    OpenFailed { path: String, reason: String },
}

/// Supported connection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Embedded SQLite file.
    #[serde(alias = "local")]
    Sqlite,
    Postgres,
    Snowflake,
    BigQuery,
}

impl ConnectionKind {
    /// Parse a kind from its name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "sqlite" | "local" => Ok(ConnectionKind::Sqlite),
            "postgres" | "postgresql" => Ok(ConnectionKind::Postgres),
            "snowflake" => Ok(ConnectionKind::Snowflake),
            "bigquery" => Ok(ConnectionKind::BigQuery),
            other => Err(ConnectionError::UnsupportedKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Sqlite => "sqlite",
            ConnectionKind::Postgres => "postgres",
            ConnectionKind::Snowflake => "snowflake",
            ConnectionKind::BigQuery => "bigquery",
        }
    }

    /// SQL dialect spoken by this kind of store.
    pub fn dialect(&self) -> Dialect {
        match self {
            ConnectionKind::Sqlite => Dialect::Sqlite,
            ConnectionKind::Postgres => Dialect::Postgres,
            ConnectionKind::Snowflake => Dialect::Snowflake,
            ConnectionKind::BigQuery => Dialect::BigQuery,
        }
    }

    /// Whether the store lives in-process.
    pub fn is_embedded(&self) -> bool {
        matches!(self, ConnectionKind::Sqlite)
    }

    /// Get the default port for this kind.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            ConnectionKind::Postgres => Some(5432),
            ConnectionKind::Snowflake => Some(443),
            ConnectionKind::Sqlite | ConnectionKind::BigQuery => None,
        }
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection section of a model document.
///
/// Immutable after load. Only the fields relevant to `kind` are read.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionDescriptor {
    #[serde(rename = "type", alias = "kind")]
    pub kind: ConnectionKind,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

impl ConnectionDescriptor {
    /// Descriptor for an embedded SQLite file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            kind: ConnectionKind::Sqlite,
            path: Some(path.into()),
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            account: None,
            project: None,
            warehouse: None,
            schema: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.kind.dialect()
    }

    /// Resolve the database path, letting `override_path` win.
    pub fn resolved_path(&self, override_path: Option<&str>) -> Result<String, ConnectionError> {
        override_path
            .map(str::to_string)
            .or_else(|| self.path.clone())
            .ok_or_else(|| ConnectionError::MissingField {
                kind: self.kind,
                field: "path".into(),
            })
    }

    /// Check that the fields each kind needs are present.
    pub fn validate(&self) -> Result<(), ConnectionError> {
        let required: Vec<(&str, &Option<String>)> = match self.kind {
            // The path may come from an override, so it is checked at connect time.
            ConnectionKind::Sqlite => vec![],
            ConnectionKind::Postgres => vec![("host", &self.host), ("database", &self.database)],
            ConnectionKind::Snowflake => {
                vec![("account", &self.account), ("database", &self.database)]
            }
            ConnectionKind::BigQuery => vec![("project", &self.project)],
        };
        for (field, value) in required {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(ConnectionError::MissingField {
                    kind: self.kind,
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}
