//! Simple-metric compilation.
//!
//! A request is resolved against the registry and the engine's table
//! metadata into a [`CompiledQueryPlan`]:
//!
//! - metric filters, then caller filters, become WHERE predicates on the
//!   base table (unparseable ones are skipped with a warning, or rejected
//!   when `strict_filters` is set)
//! - a registered dimension on another table adds an INNER JOIN on its
//!   `join_key`, or on the first base-table column the two tables share
//! - an unregistered dimension name falls back to a base-table column
//!
//! Derived metrics are handed to [`DerivedResolver`].

use std::collections::HashMap;

use serde_json::Value;

use super::derived::DerivedResolver;
use super::plan::{CompiledQueryPlan, GroupKey, GroupSource, JoinSpec, OrderSpec};
use super::{CompiledQuery, QueryRequest};
use crate::config::QuerySettings;
use crate::engine::{ResultSet, TabularEngine};
use crate::error::{SemanticLayerError, SemanticResult};
use crate::filter;
use crate::model::{
    DimensionDefinition, DimensionKind, MetricDefinition, MetricKind, MetricRegistry,
    SimpleCalculation,
};
use crate::sql::expr;
use crate::temporal;

/// Compiles and runs metric requests against one engine.
pub struct QueryCompiler<'a> {
    registry: &'a MetricRegistry,
    engine: &'a dyn TabularEngine,
    strict_filters: bool,
    max_derived_depth: usize,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a MetricRegistry, engine: &'a dyn TabularEngine) -> Self {
        let defaults = QuerySettings::default();
        Self {
            registry,
            engine,
            strict_filters: defaults.strict_filters,
            max_derived_depth: defaults.max_derived_depth,
        }
    }

    pub fn with_settings(mut self, settings: &QuerySettings) -> Self {
        self.strict_filters = settings.strict_filters;
        self.max_derived_depth = settings.max_derived_depth;
        self
    }

    pub fn registry(&self) -> &'a MetricRegistry {
        self.registry
    }

    pub fn engine(&self) -> &'a dyn TabularEngine {
        self.engine
    }

    /// Build the plan for a simple metric without executing it.
    pub fn plan(&self, request: &QueryRequest) -> SemanticResult<CompiledQueryPlan> {
        request.validate()?;
        let metric = self.registry.get_metric(&request.metric)?;
        match &metric.kind {
            MetricKind::Simple(calc) => self.build_plan(request, metric, calc),
            MetricKind::Derived(_) => Err(SemanticLayerError::Query(format!(
                "metric '{}' is derived and has no single plan",
                metric.name
            ))),
        }
    }

    /// Query text that [`compile`](Self::compile) would send to the engine.
    pub fn explain(&self, request: &QueryRequest) -> SemanticResult<String> {
        self.explain_at(request, 0)
    }

    /// Compile, execute and return the result with its query text.
    pub fn compile(&self, request: &QueryRequest) -> SemanticResult<CompiledQuery> {
        self.compile_at(request, 0)
    }

    pub(crate) fn compile_at(
        &self,
        request: &QueryRequest,
        depth: usize,
    ) -> SemanticResult<CompiledQuery> {
        request.validate()?;
        let metric = self.registry.get_metric(&request.metric)?;
        match &metric.kind {
            MetricKind::Simple(calc) => {
                let plan = self.build_plan(request, metric, calc)?;
                self.execute(plan)
            }
            MetricKind::Derived(calc) => {
                self.check_depth(metric, depth)?;
                DerivedResolver::new(self).resolve(request, metric, &calc.formula, depth)
            }
        }
    }

    pub(crate) fn explain_at(&self, request: &QueryRequest, depth: usize) -> SemanticResult<String> {
        request.validate()?;
        let metric = self.registry.get_metric(&request.metric)?;
        match &metric.kind {
            MetricKind::Simple(calc) => Ok(self
                .build_plan(request, metric, calc)?
                .to_sql(self.engine.dialect())),
            MetricKind::Derived(calc) => {
                self.check_depth(metric, depth)?;
                DerivedResolver::new(self).explain(request, &calc.formula, depth)
            }
        }
    }

    fn check_depth(&self, metric: &MetricDefinition, depth: usize) -> SemanticResult<()> {
        if depth >= self.max_derived_depth {
            return Err(SemanticLayerError::Query(format!(
                "derived metric '{}' nests deeper than {} levels (is it self-referencing?)",
                metric.name, self.max_derived_depth
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Planning
    // =========================================================================

    fn build_plan(
        &self,
        request: &QueryRequest,
        metric: &MetricDefinition,
        calc: &SimpleCalculation,
    ) -> SemanticResult<CompiledQueryPlan> {
        let base = calc.table.as_str();
        let mut columns = TableColumns::new(self.engine);
        let base_columns = columns.get(base)?.to_vec();

        let mut warnings = Vec::new();
        let mut filters = Vec::new();
        for text in calc.filters.iter().chain(&request.filters) {
            match filter::apply(base, &base_columns, text) {
                Ok(condition) => filters.push(condition),
                Err(skipped) if self.strict_filters => {
                    return Err(SemanticLayerError::Validation(skipped.to_string()))
                }
                Err(skipped) => warnings.push(skipped.to_string()),
            }
        }

        let measure = match &calc.column {
            Some(column) => {
                if !base_columns.contains(column) {
                    return Err(SemanticLayerError::Query(format!(
                        "metric '{}' aggregates column '{column}' which is not on table '{base}'",
                        metric.name
                    )));
                }
                Some(expr::table_col(base, column))
            }
            None => None,
        };

        let mut joins: Vec<JoinSpec> = Vec::new();
        let mut group_by = Vec::with_capacity(request.dimensions.len());
        for name in &request.dimensions {
            let key = match self.registry.get_dimension(name) {
                Some(dimension) if dimension.table == base => {
                    resolve_dimension(dimension, &base_columns)?
                }
                Some(dimension) => {
                    let dim_columns = columns.get(&dimension.table)?.to_vec();
                    let key = join_key(dimension, base, &base_columns, &dim_columns)?;
                    if !joins.iter().any(|j| j.table == dimension.table) {
                        joins.push(JoinSpec {
                            table: dimension.table.clone(),
                            key,
                        });
                    }
                    resolve_dimension(dimension, &dim_columns)?
                }
                None if base_columns.contains(name) => GroupKey {
                    alias: name.clone(),
                    expr: expr::table_col(base, name),
                    source: GroupSource::RawColumn,
                },
                None => {
                    return Err(SemanticLayerError::DimensionNotFound {
                        name: name.clone(),
                        available: self.registry.dimension_names(),
                    })
                }
            };
            group_by.push(key);
        }

        let mut plan = CompiledQueryPlan {
            metric: metric.name.clone(),
            base_table: base.to_string(),
            joins,
            group_by,
            aggregate: calc.aggregation.apply(measure),
            filters,
            order: None,
            limit: request.limit,
            warnings,
        };

        if let Some(order_by) = &request.order_by {
            let order = OrderSpec::parse(order_by);
            let outputs = plan.output_columns();
            if !outputs.contains(&order.column) {
                return Err(SemanticLayerError::Query(format!(
                    "cannot order by '{}': not an output column (available: {})",
                    order.column,
                    outputs.join(", ")
                )));
            }
            plan.order = Some(order);
        }

        Ok(plan)
    }

    fn execute(&self, plan: CompiledQueryPlan) -> SemanticResult<CompiledQuery> {
        let sql = plan.to_sql(self.engine.dialect());
        tracing::debug!(metric = %plan.metric, sql = %sql, "executing plan");

        let mut result = self.engine.execute(&sql)?;
        if plan.group_by.is_empty() && is_null_aggregate(&result, &plan.metric) {
            result = ResultSet::empty(result.columns);
        }

        tracing::info!(
            metric = %plan.metric,
            rows = result.len(),
            skipped_filters = plan.warnings.len(),
            "compiled query"
        );
        Ok(CompiledQuery {
            tables: plan.tables(),
            result,
            sql,
            warnings: plan.warnings,
        })
    }
}

/// Memoized `table_columns` lookups for one compilation.
struct TableColumns<'e> {
    engine: &'e dyn TabularEngine,
    seen: HashMap<String, Vec<String>>,
}

impl<'e> TableColumns<'e> {
    fn new(engine: &'e dyn TabularEngine) -> Self {
        Self {
            engine,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, table: &str) -> SemanticResult<&[String]> {
        if !self.seen.contains_key(table) {
            let columns = self.engine.table_columns(table)?;
            self.seen.insert(table.to_string(), columns);
        }
        Ok(self.seen.get(table).map(Vec::as_slice).unwrap_or_default())
    }
}

fn resolve_dimension(dimension: &DimensionDefinition, columns: &[String]) -> SemanticResult<GroupKey> {
    match &dimension.kind {
        DimensionKind::Categorical { column } => {
            if !columns.contains(column) {
                return Err(SemanticLayerError::Query(format!(
                    "dimension '{}' maps to column '{column}' which is not on table '{}'",
                    dimension.name, dimension.table
                )));
            }
            Ok(GroupKey {
                alias: dimension.name.clone(),
                expr: expr::table_col(&dimension.table, column),
                source: GroupSource::Categorical,
            })
        }
        DimensionKind::Temporal { .. } => {
            let item = temporal::resolve(dimension, columns)?;
            Ok(GroupKey {
                alias: dimension.name.clone(),
                expr: item.expr,
                source: GroupSource::Temporal,
            })
        }
    }
}

/// Column joining `dimension.table` onto `base`.
fn join_key(
    dimension: &DimensionDefinition,
    base: &str,
    base_columns: &[String],
    dim_columns: &[String],
) -> SemanticResult<String> {
    if let Some(key) = &dimension.join_key {
        if base_columns.contains(key) && dim_columns.contains(key) {
            return Ok(key.clone());
        }
        return Err(SemanticLayerError::Query(format!(
            "join key '{key}' of dimension '{}' is not on both '{base}' and '{}'",
            dimension.name, dimension.table
        )));
    }
    base_columns
        .iter()
        .find(|c| dim_columns.contains(c))
        .cloned()
        .ok_or_else(|| {
            SemanticLayerError::Query(format!(
                "no shared column to join '{}' onto '{base}' for dimension '{}'",
                dimension.table, dimension.name
            ))
        })
}

/// An ungrouped aggregate over no rows comes back as one NULL row.
fn is_null_aggregate(result: &ResultSet, metric: &str) -> bool {
    result.len() == 1 && matches!(result.value(0, metric), Some(Value::Null) | None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionDescriptor;
    use crate::engine::SqliteEngine;
    use crate::model::{Aggregation, Model};
    use serde_json::json;

    fn fixture() -> (MetricRegistry, SqliteEngine) {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE subscriptions (id INTEGER, customer_id INTEGER, plan TEXT,
                                             status TEXT, amount REAL, started_at TEXT);
                 CREATE TABLE customers (customer_id INTEGER, region TEXT);
                 INSERT INTO customers VALUES (1, 'emea'), (2, 'amer');
                 INSERT INTO subscriptions VALUES
                   (1, 1, 'pro', 'active', 30, '2024-01-15'),
                   (2, 2, 'pro', 'active', 20, '2024-02-03'),
                   (3, 2, 'free', 'churned', 5, '2024-02-20');",
            )
            .unwrap();

        let model = Model::new("saas", ConnectionDescriptor::sqlite(":memory:"))
            .with_metric(
                MetricDefinition::simple("total_mrr", "subscriptions", Aggregation::Sum, "amount")
                    .with_filter("status = 'active'"),
            )
            .with_metric(MetricDefinition::simple(
                "subscription_count",
                "subscriptions",
                Aggregation::Count,
                "id",
            ))
            .with_metric(MetricDefinition::derived("loop", "loop + 1"))
            .with_dimension(DimensionDefinition::categorical("plan", "subscriptions", "plan"))
            .with_dimension(DimensionDefinition::categorical("region", "customers", "region"))
            .with_dimension(DimensionDefinition::temporal(
                "month",
                "subscriptions",
                "strftime('%Y-%m', {TABLE}.started_at)",
            ));
        (MetricRegistry::new(model), engine)
    }

    #[test]
    fn test_groups_by_categorical_dimension() {
        let (registry, engine) = fixture();
        let compiler = QueryCompiler::new(&registry, &engine);
        let out = compiler
            .compile(&QueryRequest::new("total_mrr").with_dimension("plan"))
            .unwrap();
        assert_eq!(out.result.columns, vec!["plan", "total_mrr"]);
        assert_eq!(out.result.len(), 1);
        assert_eq!(out.result.value(0, "total_mrr"), Some(&json!(50.0)));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_joins_on_first_shared_column() {
        let (registry, engine) = fixture();
        let compiler = QueryCompiler::new(&registry, &engine);
        let plan = compiler
            .plan(&QueryRequest::new("subscription_count").with_dimension("region"))
            .unwrap();
        assert_eq!(
            plan.joins,
            vec![JoinSpec {
                table: "customers".into(),
                key: "customer_id".into()
            }]
        );
        let out = compiler
            .compile(
                &QueryRequest::new("subscription_count")
                    .with_dimension("region")
                    .with_order_by("region"),
            )
            .unwrap();
        assert_eq!(out.result.value(0, "region"), Some(&json!("amer")));
        assert_eq!(out.result.value(0, "subscription_count"), Some(&json!(2)));
        assert_eq!(out.tables, vec!["subscriptions", "customers"]);
    }

    #[test]
    fn test_temporal_dimension() {
        let (registry, engine) = fixture();
        let compiler = QueryCompiler::new(&registry, &engine);
        let out = compiler
            .compile(
                &QueryRequest::new("subscription_count")
                    .with_dimension("month")
                    .with_order_by("month"),
            )
            .unwrap();
        assert_eq!(out.result.value(0, "month"), Some(&json!("2024-01")));
        assert_eq!(out.result.value(1, "subscription_count"), Some(&json!(2)));
    }

    #[test]
    fn test_raw_column_fallback_and_missing_dimension() {
        let (registry, engine) = fixture();
        let compiler = QueryCompiler::new(&registry, &engine);
        let plan = compiler
            .plan(&QueryRequest::new("total_mrr").with_dimension("status"))
            .unwrap();
        assert_eq!(plan.group_by[0].source, GroupSource::RawColumn);

        let err = compiler
            .plan(&QueryRequest::new("total_mrr").with_dimension("nope"))
            .unwrap_err();
        assert!(matches!(err, SemanticLayerError::DimensionNotFound { .. }));
    }

    #[test]
    fn test_skipped_filter_is_a_warning_unless_strict() {
        let (registry, engine) = fixture();
        let request = QueryRequest::new("total_mrr").with_filter("plan LIKE 'p%'");

        let lenient = QueryCompiler::new(&registry, &engine).compile(&request).unwrap();
        assert_eq!(lenient.warnings.len(), 1);

        let strict = QueryCompiler::new(&registry, &engine).with_settings(&QuerySettings {
            strict_filters: true,
            ..QuerySettings::default()
        });
        assert!(matches!(
            strict.compile(&request),
            Err(SemanticLayerError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_aggregate_is_zero_rows() {
        let (registry, engine) = fixture();
        let out = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("total_mrr").with_filter("plan = 'enterprise'"))
            .unwrap();
        assert!(out.result.is_empty());
        assert_eq!(out.result.columns, vec!["total_mrr"]);
    }

    #[test]
    fn test_order_by_must_name_output_column() {
        let (registry, engine) = fixture();
        let err = QueryCompiler::new(&registry, &engine)
            .plan(&QueryRequest::new("total_mrr").with_order_by("-amount"))
            .unwrap_err();
        assert!(matches!(err, SemanticLayerError::Query(_)));
    }

    #[test]
    fn test_self_referencing_derived_metric_is_stopped() {
        let (registry, engine) = fixture();
        let err = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("loop"))
            .unwrap_err();
        assert!(err.to_string().contains("nests deeper"), "{err}");
    }

    #[test]
    fn test_unknown_metric() {
        let (registry, engine) = fixture();
        let err = QueryCompiler::new(&registry, &engine)
            .explain(&QueryRequest::new("arr"))
            .unwrap_err();
        assert!(matches!(err, SemanticLayerError::MetricNotFound { .. }));
    }
}
