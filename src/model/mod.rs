//! Declarative semantic model: metrics, dimensions and the connection
//! they run against.

pub mod dimension;
pub mod loader;
pub mod metric;
pub mod registry;

pub use dimension::{DimensionDefinition, DimensionKind, TABLE_PLACEHOLDER};
pub use loader::{DocumentFormat, LoadError, LoadResult};
pub use metric::{Aggregation, DerivedCalculation, MetricDefinition, MetricKind, SimpleCalculation};
pub use registry::{MetricRegistry, MetricSummary};

use serde::{Deserialize, Serialize};

use crate::config::ConnectionDescriptor;

/// A named, curated table exposed to the orchestration layer for browsing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CanonicalDataset {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub description: String,
}

/// A loaded model document.
///
/// Metric and dimension order follows the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub description: String,
    pub connection: ConnectionDescriptor,
    pub metrics: Vec<MetricDefinition>,
    pub dimensions: Vec<DimensionDefinition>,
    pub canonical_datasets: Vec<CanonicalDataset>,
}

impl Model {
    pub fn new(name: impl Into<String>, connection: ConnectionDescriptor) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            connection,
            metrics: Vec::new(),
            dimensions: Vec::new(),
            canonical_datasets: Vec::new(),
        }
    }

    pub fn with_metric(mut self, metric: MetricDefinition) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_dimension(mut self, dimension: DimensionDefinition) -> Self {
        self.dimensions.push(dimension);
        self
    }
}
