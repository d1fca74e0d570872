//! Model document loading.
//!
//! Supported formats:
//! - **TOML** (.toml) - primary format
//! - **JSON** (.json)
//!
//! Loading runs in three passes: `${VAR}` / `${VAR:default}` expansion over
//! the raw text (commented-out lines are left alone), a check that the
//! required top-level sections are present, then typed parsing and
//! structural validation. Derived metric formulas are not checked here; they
//! are resolved when queried.
//!
//! # Example
//!
//! ```rust,ignore
//! use semlayer::model::loader::load_model;
//! use std::path::Path;
//!
//! let model = load_model(Path::new("semantic_model.toml"))?;
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::{
    Aggregation, CanonicalDataset, DerivedCalculation, DimensionDefinition, DimensionKind,
    MetricDefinition, MetricKind, Model, SimpleCalculation, TABLE_PLACEHOLDER,
};
use crate::config::{expand_env_document, ConnectionDescriptor, ConnectionError};

/// Top-level sections every model document must carry.
const REQUIRED_SECTIONS: [&str; 3] = ["name", "connection", "metrics"];

/// Errors that can occur when loading a model.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported file extension: {extension}. Supported: .toml, .json")]
    UnsupportedExtension { extension: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {format} document: {message}")]
    Parse { format: DocumentFormat, message: String },

    #[error("Missing required section '{section}'")]
    MissingSection { section: String },

    #[error("Missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    #[error("Invalid value for '{field}' in {context}: {message}")]
    InvalidValue {
        field: String,
        context: String,
        message: String,
    },

    #[error("Duplicate {kind} name '{name}'")]
    Duplicate { kind: String, name: String },

    #[error("Invalid connection: {0}")]
    Connection(#[from] ConnectionError),
}

/// Result type for model loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Serialization format of a model document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension.to_lowercase().as_str() {
            "toml" => Ok(DocumentFormat::Toml),
            "json" => Ok(DocumentFormat::Json),
            _ => Err(LoadError::UnsupportedExtension {
                extension: extension.to_string(),
            }),
        }
    }

    fn parse(&self, content: &str) -> LoadResult<serde_json::Value> {
        match self {
            DocumentFormat::Toml => toml::from_str(content).map_err(|e| LoadError::Parse {
                format: *self,
                message: e.to_string(),
            }),
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| LoadError::Parse {
                format: *self,
                message: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Toml => write!(f, "TOML"),
            DocumentFormat::Json => write!(f, "JSON"),
        }
    }
}

// ============================================================================
// Raw document shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawModel {
    name: String,
    #[serde(default)]
    description: String,
    connection: ConnectionDescriptor,
    metrics: Vec<RawMetric>,
    #[serde(default)]
    dimensions: Vec<RawDimension>,
    #[serde(default)]
    temporal_dimensions: Vec<RawDimension>,
    #[serde(default)]
    canonical_datasets: Vec<CanonicalDataset>,
}

#[derive(Debug, Deserialize)]
struct RawTemporalDocument {
    #[serde(default)]
    temporal_dimensions: Vec<RawDimension>,
}

#[derive(Debug, Deserialize)]
struct RawMetric {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    calculation: Option<RawCalculation>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCalculation {
    table: Option<String>,
    aggregation: Option<String>,
    column: Option<String>,
    #[serde(default)]
    filters: Vec<String>,
    formula: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDimension {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    table: Option<String>,
    column: Option<String>,
    sql: Option<String>,
    join_key: Option<String>,
}

// ============================================================================
// Entry points
// ============================================================================

/// Load a model from a file path. The format follows the extension.
pub fn load_model(path: &Path) -> LoadResult<Model> {
    let content = read_document(path)?;
    load_model_from_str(&content, DocumentFormat::from_path(path)?)
}

/// Load a model from an in-memory document.
pub fn load_model_from_str(content: &str, format: DocumentFormat) -> LoadResult<Model> {
    let expanded = expand_env_document(content);
    let value = format.parse(&expanded)?;

    let Some(sections) = value.as_object() else {
        return Err(LoadError::Parse {
            format,
            message: "top level must be a table".into(),
        });
    };
    for section in REQUIRED_SECTIONS {
        if !sections.contains_key(section) {
            return Err(LoadError::MissingSection {
                section: section.to_string(),
            });
        }
    }

    let raw: RawModel = serde_json::from_value(value).map_err(|e| LoadError::Parse {
        format,
        message: e.to_string(),
    })?;

    raw.connection.validate()?;

    let mut seen = HashSet::new();
    let mut metrics = Vec::with_capacity(raw.metrics.len());
    for metric in raw.metrics {
        if !seen.insert(metric.name.clone()) {
            return Err(LoadError::Duplicate {
                kind: "metric".into(),
                name: metric.name,
            });
        }
        metrics.push(build_metric(metric)?);
    }

    let mut seen = HashSet::new();
    let mut dimensions = Vec::with_capacity(raw.dimensions.len());
    for dimension in raw.dimensions {
        if !seen.insert(dimension.name.clone()) {
            return Err(LoadError::Duplicate {
                kind: "dimension".into(),
                name: dimension.name,
            });
        }
        dimensions.push(build_dimension(dimension)?);
    }

    let mut model = Model {
        name: raw.name,
        description: raw.description,
        connection: raw.connection,
        metrics,
        dimensions,
        canonical_datasets: raw.canonical_datasets,
    };

    let inline_temporal = raw
        .temporal_dimensions
        .into_iter()
        .map(build_temporal)
        .collect::<LoadResult<Vec<_>>>()?;
    merge_dimensions(&mut model, inline_temporal);

    tracing::debug!(
        model = %model.name,
        metrics = model.metrics.len(),
        dimensions = model.dimensions.len(),
        "loaded model document"
    );
    Ok(model)
}

/// Load a standalone `temporal_dimensions` document from a file.
pub fn load_temporal_dimensions(path: &Path) -> LoadResult<Vec<DimensionDefinition>> {
    let content = read_document(path)?;
    load_temporal_dimensions_from_str(&content, DocumentFormat::from_path(path)?)
}

/// Load a standalone `temporal_dimensions` document.
pub fn load_temporal_dimensions_from_str(
    content: &str,
    format: DocumentFormat,
) -> LoadResult<Vec<DimensionDefinition>> {
    let expanded = expand_env_document(content);
    let value = format.parse(&expanded)?;
    let raw: RawTemporalDocument = serde_json::from_value(value).map_err(|e| LoadError::Parse {
        format,
        message: e.to_string(),
    })?;
    raw.temporal_dimensions
        .into_iter()
        .map(build_temporal)
        .collect()
}

/// Append dimensions whose names are not already defined.
///
/// The first definition of a name wins. Returns how many were added.
pub fn merge_dimensions(model: &mut Model, extra: Vec<DimensionDefinition>) -> usize {
    let mut added = 0;
    for dimension in extra {
        if model.dimensions.iter().any(|d| d.name == dimension.name) {
            tracing::debug!(dimension = %dimension.name, "skipping already defined dimension");
            continue;
        }
        model.dimensions.push(dimension);
        added += 1;
    }
    added
}

fn read_document(path: &Path) -> LoadResult<String> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

// ============================================================================
// Validation
// ============================================================================

fn required(value: Option<String>, field: &str, context: &str) -> LoadResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LoadError::MissingField {
            field: field.to_string(),
            context: context.to_string(),
        }),
    }
}

fn build_metric(raw: RawMetric) -> LoadResult<MetricDefinition> {
    let context = format!("metric '{}'", raw.name);
    let calc = raw.calculation.unwrap_or_default();

    let kind = match raw.kind.as_deref() {
        Some(kind) => kind.to_lowercase(),
        None if calc.formula.is_some() => "derived".to_string(),
        None => "simple".to_string(),
    };

    let kind = match kind.as_str() {
        "simple" => {
            let table = required(calc.table, "calculation.table", &context)?;
            let aggregation_name = required(calc.aggregation, "calculation.aggregation", &context)?;
            let aggregation =
                Aggregation::from_str(&aggregation_name).ok_or_else(|| LoadError::InvalidValue {
                    field: "calculation.aggregation".into(),
                    context: context.clone(),
                    message: format!(
                        "unknown aggregation '{aggregation_name}', expected one of sum, count, count_distinct, avg, min, max"
                    ),
                })?;
            let column = match (aggregation, calc.column) {
                (_, Some(c)) if c.trim() == "*" => None,
                (_, Some(c)) if !c.trim().is_empty() => Some(c),
                (Aggregation::Count, _) => None,
                _ => {
                    return Err(LoadError::MissingField {
                        field: "calculation.column".into(),
                        context,
                    })
                }
            };
            MetricKind::Simple(SimpleCalculation {
                table,
                aggregation,
                column,
                filters: calc.filters,
            })
        }
        "derived" => MetricKind::Derived(DerivedCalculation {
            formula: required(calc.formula, "calculation.formula", &context)?,
        }),
        other => {
            return Err(LoadError::InvalidValue {
                field: "type".into(),
                context,
                message: format!("unknown metric type '{other}', expected simple or derived"),
            })
        }
    };

    Ok(MetricDefinition {
        display_name: raw.display_name.unwrap_or_else(|| raw.name.clone()),
        name: raw.name,
        description: raw.description,
        kind,
    })
}

fn build_dimension(raw: RawDimension) -> LoadResult<DimensionDefinition> {
    let context = format!("dimension '{}'", raw.name);
    let kind = match raw.kind.as_deref() {
        Some(kind) => kind.to_lowercase(),
        None if raw.sql.is_some() => "temporal".to_string(),
        None => "categorical".to_string(),
    };

    let table = required(raw.table, "table", &context)?;
    let kind = match kind.as_str() {
        "categorical" => DimensionKind::Categorical {
            column: required(raw.column, "column", &context)?,
        },
        "temporal" => {
            let sql = required(raw.sql, "sql", &context)?;
            if !sql.contains(TABLE_PLACEHOLDER) {
                return Err(LoadError::InvalidValue {
                    field: "sql".into(),
                    context,
                    message: format!("template must reference {TABLE_PLACEHOLDER}.<column>"),
                });
            }
            DimensionKind::Temporal { sql }
        }
        other => {
            return Err(LoadError::InvalidValue {
                field: "type".into(),
                context,
                message: format!("unknown dimension type '{other}', expected categorical or temporal"),
            })
        }
    };

    Ok(DimensionDefinition {
        display_name: raw.display_name.unwrap_or_else(|| raw.name.clone()),
        name: raw.name,
        description: raw.description,
        table,
        kind,
        join_key: raw.join_key,
    })
}

/// Entries of a `temporal_dimensions` list are temporal unless they say
/// otherwise.
fn build_temporal(mut raw: RawDimension) -> LoadResult<DimensionDefinition> {
    if raw.kind.is_none() {
        raw.kind = Some("temporal".into());
    }
    build_dimension(raw)
}
