//! Derived metrics: a formula over other metrics.
//!
//! Every formula name that is a registered metric is compiled as a
//! component with the request's dimensions and filters. Component results
//! are full-outer-joined on the dimension columns (or merged into a single
//! row when there are none) and the formula is evaluated per row by the
//! sandboxed expression engine. Names that are not metrics are bound to 0
//! and reported as warnings. A registered component that fails fails the
//! whole query.
//!
//! Ordering and limit apply once, after the merge.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Number, Value};

use super::compiler::QueryCompiler;
use super::plan::OrderSpec;
use super::{CompiledQuery, QueryRequest};
use crate::engine::ResultSet;
use crate::error::{SemanticLayerError, SemanticResult};
use crate::expression::SafeExpression;
use crate::model::MetricDefinition;

pub struct DerivedResolver<'c, 'a> {
    compiler: &'c QueryCompiler<'a>,
}

/// One merged output row.
struct MergedRow {
    dimensions: Vec<Value>,
    values: HashMap<String, f64>,
}

impl<'c, 'a> DerivedResolver<'c, 'a> {
    pub fn new(compiler: &'c QueryCompiler<'a>) -> Self {
        Self { compiler }
    }

    /// Compile every component, merge, and evaluate the formula per row.
    pub fn resolve(
        &self,
        request: &QueryRequest,
        metric: &MetricDefinition,
        formula: &str,
        depth: usize,
    ) -> SemanticResult<CompiledQuery> {
        let expression = SafeExpression::parse(formula)?;
        let (candidates, mut warnings) = self.candidates(&expression, &metric.name)?;

        let mut components: Vec<(String, CompiledQuery)> = Vec::with_capacity(candidates.len());
        for name in &candidates {
            let compiled = self
                .compiler
                .compile_at(&component_request(request, name), depth + 1)
                .inspect_err(|e| {
                    tracing::warn!(metric = %metric.name, component = %name, error = %e, "component failed");
                })?;
            components.push((name.clone(), compiled));
        }

        let rows = merge(&request.dimensions, &components)?;

        let mut columns = request.dimensions.clone();
        columns.extend(candidates.iter().cloned());
        columns.push(metric.name.clone());

        let names = expression.names();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut namespace = row.values;
            for name in &names {
                namespace.entry(name.clone()).or_insert(0.0);
            }
            let value = expression.eval(&namespace)?;

            let mut cells = row.dimensions;
            cells.extend(candidates.iter().map(|c| number(namespace.get(c).copied().unwrap_or(0.0))));
            cells.push(number(value));
            out.push(cells);
        }

        let mut result = ResultSet::new(columns, out);
        if let Some(order_by) = &request.order_by {
            sort(&mut result, &OrderSpec::parse(order_by))?;
        }
        if let Some(limit) = request.limit {
            result.rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        let mut tables: Vec<String> = Vec::new();
        for (_, compiled) in &components {
            for table in &compiled.tables {
                if !tables.contains(table) {
                    tables.push(table.clone());
                }
            }
            warnings.extend(compiled.warnings.iter().cloned());
        }

        tracing::info!(
            metric = %metric.name,
            components = components.len(),
            rows = result.len(),
            "resolved derived metric"
        );
        Ok(CompiledQuery {
            result,
            sql: join_sql(components.iter().map(|(name, c)| (name.as_str(), c.sql.as_str()))),
            warnings,
            tables,
        })
    }

    /// Component query texts without executing anything.
    pub fn explain(&self, request: &QueryRequest, formula: &str, depth: usize) -> SemanticResult<String> {
        let expression = SafeExpression::parse(formula)?;
        let (candidates, _) = self.candidates(&expression, &request.metric)?;
        let mut parts = Vec::with_capacity(candidates.len());
        for name in &candidates {
            let sql = self.compiler.explain_at(&component_request(request, name), depth + 1)?;
            parts.push((name.as_str(), sql));
        }
        Ok(join_sql(parts.iter().map(|(name, sql)| (*name, sql.as_str()))))
    }

    /// Formula names that are metrics, plus a warning per name that is not.
    fn candidates(
        &self,
        expression: &SafeExpression,
        metric: &str,
    ) -> SemanticResult<(Vec<String>, Vec<String>)> {
        let registry = self.compiler.registry();
        let (found, missing): (Vec<String>, Vec<String>) = expression
            .names()
            .into_iter()
            .partition(|name| registry.has_metric(name));

        if found.is_empty() {
            return Err(SemanticLayerError::Query(format!(
                "derived metric '{metric}' references no known metric in '{}'",
                expression.source()
            )));
        }
        let warnings = missing
            .into_iter()
            .map(|name| {
                tracing::warn!(metric, name = %name, "formula name is not a metric, bound to 0");
                format!("formula name '{name}' is not a metric and was bound to 0")
            })
            .collect();
        Ok((found, warnings))
    }
}

/// Same dimensions and filters as the outer request. Order and limit are
/// left off here and applied to the merged rows in [`DerivedResolver::resolve`],
/// since a per-component limit would drop rows before the join.
fn component_request(request: &QueryRequest, component: &str) -> QueryRequest {
    QueryRequest {
        metric: component.to_string(),
        dimensions: request.dimensions.clone(),
        filters: request.filters.clone(),
        limit: None,
        order_by: None,
    }
}

fn join_sql<'s>(parts: impl Iterator<Item = (&'s str, &'s str)>) -> String {
    parts
        .map(|(name, sql)| format!("-- {name}\n{sql}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full outer join of component results on the dimension columns, in
/// first-seen order. Without dimensions every row shares the empty key and
/// the components collapse into one row.
fn merge(dimensions: &[String], components: &[(String, CompiledQuery)]) -> SemanticResult<Vec<MergedRow>> {
    let mut rows: Vec<MergedRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (name, compiled) in components {
        let result = &compiled.result;
        for row in 0..result.len() {
            let key: Vec<Value> = dimensions
                .iter()
                .map(|d| result.value(row, d).cloned().unwrap_or(Value::Null))
                .collect();
            let value = match result.value(row, name) {
                Some(v) => to_f64(name, v)?,
                None => 0.0,
            };

            let fingerprint = Value::Array(key.clone()).to_string();
            let slot = *index.entry(fingerprint).or_insert_with(|| {
                rows.push(MergedRow {
                    dimensions: key,
                    values: HashMap::new(),
                });
                rows.len() - 1
            });
            rows[slot].values.insert(name.clone(), value);
        }
    }

    Ok(rows)
}

fn to_f64(column: &str, value: &Value) -> SemanticResult<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n.as_f64().ok_or_else(|| non_numeric(column, value)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().map_err(|_| non_numeric(column, value)),
        _ => Err(non_numeric(column, value)),
    }
}

fn non_numeric(column: &str, value: &Value) -> SemanticLayerError {
    SemanticLayerError::Query(format!("component '{column}' returned a non-numeric value: {value}"))
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn sort(result: &mut ResultSet, order: &OrderSpec) -> SemanticResult<()> {
    let Some(col) = result.column_index(&order.column) else {
        return Err(SemanticLayerError::Query(format!(
            "cannot order by '{}': not an output column (available: {})",
            order.column,
            result.columns.join(", ")
        )));
    };
    result.rows.sort_by(|a, b| {
        let ord = compare(&a[col], &b[col]);
        if order.descending {
            ord.reverse()
        } else {
            ord
        }
    });
    Ok(())
}

/// Nulls first, then numbers, then strings.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}
