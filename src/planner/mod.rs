//! Query planning - turns a metric request into SQL and runs it.
//!
//! Two paths:
//! 1. Simple metrics: [`QueryCompiler`] builds a [`CompiledQueryPlan`]
//!    (base table, joins, group keys, one aggregate), renders it for the
//!    engine's dialect and executes it.
//! 2. Derived metrics: [`DerivedResolver`] compiles each component metric,
//!    merges the results on the requested dimensions and evaluates the
//!    formula per row.

pub mod compiler;
pub mod derived;
pub mod plan;

pub use compiler::QueryCompiler;
pub use derived::DerivedResolver;
pub use plan::{CompiledQueryPlan, GroupKey, GroupSource, JoinSpec, OrderSpec};

use serde::{Deserialize, Serialize};

use crate::engine::ResultSet;
use crate::error::{SemanticLayerError, SemanticResult};

/// A metric request from the orchestration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub metric: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Output column to sort by; a leading `-` sorts descending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl QueryRequest {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            ..Self::default()
        }
    }

    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimensions.push(dimension.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Reject requests that cannot be compiled whatever the model says.
    pub fn validate(&self) -> SemanticResult<()> {
        if self.metric.trim().is_empty() {
            return Err(SemanticLayerError::Validation("metric name is empty".into()));
        }
        for (i, dimension) in self.dimensions.iter().enumerate() {
            if dimension == &self.metric {
                return Err(SemanticLayerError::Validation(format!(
                    "dimension '{dimension}' has the same name as the metric"
                )));
            }
            if self.dimensions[..i].contains(dimension) {
                return Err(SemanticLayerError::Validation(format!(
                    "dimension '{dimension}' is listed more than once"
                )));
            }
        }
        if self.limit == Some(0) {
            return Err(SemanticLayerError::Validation("limit must be positive".into()));
        }
        if let Some(order) = &self.order_by {
            if order.trim_start_matches('-').trim().is_empty() {
                return Err(SemanticLayerError::Validation("order_by names no column".into()));
            }
        }
        Ok(())
    }
}

/// Result of compiling and executing one request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub result: ResultSet,
    /// Query text as sent to the engine.
    pub sql: String,
    /// Filters or components that were skipped.
    pub warnings: Vec<String>,
    /// Tables the result was read from.
    pub tables: Vec<String>,
}
