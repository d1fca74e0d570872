//! Metric definitions.

use serde::{Deserialize, Serialize};

use crate::sql::expr::{self, Expr};

/// Aggregation applied by a simple metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Count,
    CountDistinct,
    Avg,
    Min,
    Max,
}

impl Aggregation {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sum" => Some(Aggregation::Sum),
            "count" => Some(Aggregation::Count),
            "count_distinct" | "countdistinct" => Some(Aggregation::CountDistinct),
            "avg" | "average" | "mean" => Some(Aggregation::Avg),
            "min" => Some(Aggregation::Min),
            "max" => Some(Aggregation::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::CountDistinct => "count_distinct",
            Aggregation::Avg => "avg",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }

    /// Build the aggregate over `column`.
    ///
    /// `column = None` only makes sense for `count`, which becomes `COUNT(*)`.
    pub fn apply(&self, column: Option<Expr>) -> Expr {
        match (self, column) {
            (Aggregation::Count, None) => expr::count_star(),
            (Aggregation::Count, Some(c)) => expr::count(c),
            (Aggregation::CountDistinct, Some(c)) => expr::count_distinct(c),
            (Aggregation::CountDistinct, None) => expr::count_star(),
            (Aggregation::Sum, c) => expr::sum(c.unwrap_or_else(|| expr::lit_int(1))),
            (Aggregation::Avg, c) => expr::avg(c.unwrap_or_else(|| expr::lit_int(1))),
            (Aggregation::Min, c) => expr::min(c.unwrap_or_else(|| expr::lit_int(1))),
            (Aggregation::Max, c) => expr::max(c.unwrap_or_else(|| expr::lit_int(1))),
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aggregation over one column of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleCalculation {
    pub table: String,
    pub aggregation: Aggregation,
    /// `None` for `count` over all rows.
    pub column: Option<String>,
    /// Predicate strings applied before aggregation.
    pub filters: Vec<String>,
}

/// A formula over other metric names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedCalculation {
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricKind {
    Simple(SimpleCalculation),
    Derived(DerivedCalculation),
}

/// A named metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(flatten)]
    pub kind: MetricKind,
}

impl MetricDefinition {
    pub fn simple(
        name: impl Into<String>,
        table: impl Into<String>,
        aggregation: Aggregation,
        column: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            kind: MetricKind::Simple(SimpleCalculation {
                table: table.into(),
                aggregation,
                column: Some(column.into()),
                filters: Vec::new(),
            }),
        }
    }

    pub fn derived(name: impl Into<String>, formula: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            kind: MetricKind::Derived(DerivedCalculation {
                formula: formula.into(),
            }),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a predicate filter. No effect on derived metrics.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        if let MetricKind::Simple(calc) = &mut self.kind {
            calc.filters.push(filter.into());
        }
        self
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.kind, MetricKind::Derived(_))
    }

    /// Base table of a simple metric.
    pub fn table(&self) -> Option<&str> {
        match &self.kind {
            MetricKind::Simple(calc) => Some(&calc.table),
            MetricKind::Derived(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            MetricKind::Simple(_) => "simple",
            MetricKind::Derived(_) => "derived",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Dialect;

    fn render(e: &Expr) -> String {
        e.to_sql(Dialect::Sqlite)
    }

    #[test]
    fn test_aggregation_from_str() {
        assert_eq!(Aggregation::from_str("SUM"), Some(Aggregation::Sum));
        assert_eq!(Aggregation::from_str("count_distinct"), Some(Aggregation::CountDistinct));
        assert_eq!(Aggregation::from_str("median"), None);
    }

    #[test]
    fn test_aggregation_apply() {
        assert_eq!(render(&Aggregation::Count.apply(None)), "COUNT(*)");
        assert_eq!(
            render(&Aggregation::CountDistinct.apply(Some(expr::col("user_id")))),
            "COUNT(DISTINCT \"user_id\")"
        );
        assert_eq!(
            render(&Aggregation::Avg.apply(Some(expr::col("amount")))),
            "AVG(\"amount\")"
        );
    }

    #[test]
    fn test_builder() {
        let metric = MetricDefinition::simple("total_mrr", "subscriptions", Aggregation::Sum, "amount")
            .with_display_name("Total MRR")
            .with_filter("status = 'active'");
        assert_eq!(metric.table(), Some("subscriptions"));
        assert_eq!(metric.type_name(), "simple");
        match metric.kind {
            MetricKind::Simple(calc) => assert_eq!(calc.filters, vec!["status = 'active'"]),
            MetricKind::Derived(_) => panic!("expected simple metric"),
        }
    }
}
