//! Name lookup over a loaded model.
//!
//! Metric lookups fail with the list of available names so callers can
//! suggest alternatives. Dimension lookups return `None` instead: the
//! compiler falls back to treating an unknown dimension as a raw column.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use super::loader::{self, DocumentFormat};
use super::{CanonicalDataset, DimensionDefinition, MetricDefinition, MetricKind, Model};
use crate::config::ConnectionDescriptor;
use crate::error::{SemanticLayerError, SemanticResult};

/// Indexed, read-only view of a [`Model`].
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    model: Model,
    metric_index: HashMap<String, usize>,
    dimension_index: HashMap<String, usize>,
}

/// Orchestration-facing description of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Dimensions defined on the metric's base table.
    pub dimensions: Vec<String>,
}

impl MetricRegistry {
    pub fn new(model: Model) -> Self {
        let metric_index = model
            .metrics
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        let dimension_index = model
            .dimensions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Self {
            model,
            metric_index,
            dimension_index,
        }
    }

    /// Load a model document from disk.
    pub fn load(path: &Path) -> SemanticResult<Self> {
        Ok(Self::new(loader::load_model(path)?))
    }

    /// Load a model document from memory.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str, format: DocumentFormat) -> SemanticResult<Self> {
        Ok(Self::new(loader::load_model_from_str(content, format)?))
    }

    /// Merge a temporal dimensions document. Names already defined keep
    /// their first definition.
    pub fn with_temporal_file(self, path: &Path) -> SemanticResult<Self> {
        let extra = loader::load_temporal_dimensions(path)?;
        Ok(self.with_dimensions(extra))
    }

    /// Merge extra dimensions, first definition wins.
    pub fn with_dimensions(self, extra: Vec<DimensionDefinition>) -> Self {
        let mut model = self.model;
        let added = loader::merge_dimensions(&mut model, extra);
        tracing::debug!(added, "merged temporal dimensions");
        Self::new(model)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }

    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.model.connection
    }

    pub fn get_metric(&self, name: &str) -> SemanticResult<&MetricDefinition> {
        self.metric_index
            .get(name)
            .map(|&i| &self.model.metrics[i])
            .ok_or_else(|| SemanticLayerError::MetricNotFound {
                name: name.to_string(),
                available: self.metric_names(),
            })
    }

    pub fn has_metric(&self, name: &str) -> bool {
        self.metric_index.contains_key(name)
    }

    pub fn get_dimension(&self, name: &str) -> Option<&DimensionDefinition> {
        self.dimension_index
            .get(name)
            .map(|&i| &self.model.dimensions[i])
    }

    /// Metric names in document order.
    pub fn metric_names(&self) -> Vec<String> {
        self.model.metrics.iter().map(|m| m.name.clone()).collect()
    }

    /// Dimension names in document order.
    pub fn dimension_names(&self) -> Vec<String> {
        self.model.dimensions.iter().map(|d| d.name.clone()).collect()
    }

    pub fn metrics(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.model.metrics.iter()
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &DimensionDefinition> {
        self.model.dimensions.iter()
    }

    pub fn canonical_datasets(&self) -> &[CanonicalDataset] {
        &self.model.canonical_datasets
    }

    pub fn describe_metric(&self, name: &str) -> SemanticResult<MetricSummary> {
        let metric = self.get_metric(name)?;
        let (table, aggregation, formula) = match &metric.kind {
            MetricKind::Simple(calc) => (
                Some(calc.table.clone()),
                Some(calc.aggregation.to_string()),
                None,
            ),
            MetricKind::Derived(calc) => (None, None, Some(calc.formula.clone())),
        };
        let dimensions = match &table {
            Some(t) => self
                .model
                .dimensions
                .iter()
                .filter(|d| &d.table == t)
                .map(|d| d.name.clone())
                .collect(),
            None => Vec::new(),
        };
        Ok(MetricSummary {
            name: metric.name.clone(),
            display_name: metric.display_name.clone(),
            description: metric.description.clone(),
            kind: metric.type_name().to_string(),
            table,
            aggregation,
            formula,
            dimensions,
        })
    }
}
