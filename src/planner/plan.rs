//! The compiled form of a simple-metric request.

use crate::sql::expr::{self, Expr, ExprExt};
use crate::sql::query::{OrderByExpr, Query, SelectExpr, TableRef};
use crate::sql::Dialect;

/// A table joined onto the base table by one shared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub table: String,
    pub key: String,
}

/// Where a group key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSource {
    /// Categorical dimension from the registry.
    Categorical,
    /// Temporal dimension from the registry.
    Temporal,
    /// Unregistered name used as a base-table column.
    RawColumn,
}

/// One GROUP BY expression and the output column it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey {
    pub alias: String,
    pub expr: Expr,
    pub source: GroupSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub descending: bool,
}

impl OrderSpec {
    /// Parse `name` or `-name`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_prefix('-') {
            Some(column) => Self {
                column: column.trim().to_string(),
                descending: true,
            },
            None => Self {
                column: text.to_string(),
                descending: false,
            },
        }
    }
}

/// Logical aggregation plan for one simple metric.
///
/// Transient: built per request and rendered to SQL for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQueryPlan {
    pub metric: String,
    pub base_table: String,
    pub joins: Vec<JoinSpec>,
    pub group_by: Vec<GroupKey>,
    pub aggregate: Expr,
    pub filters: Vec<Expr>,
    pub order: Option<OrderSpec>,
    pub limit: Option<u64>,
    /// Predicates that were not applied.
    pub warnings: Vec<String>,
}

impl CompiledQueryPlan {
    /// Output columns in order: group keys, then the metric.
    pub fn output_columns(&self) -> Vec<String> {
        self.group_by
            .iter()
            .map(|g| g.alias.clone())
            .chain(std::iter::once(self.metric.clone()))
            .collect()
    }

    /// Every table the plan reads.
    pub fn tables(&self) -> Vec<String> {
        std::iter::once(self.base_table.clone())
            .chain(self.joins.iter().map(|j| j.table.clone()))
            .collect()
    }

    pub fn to_query(&self) -> Query {
        let mut select: Vec<SelectExpr> = self
            .group_by
            .iter()
            .map(|g| SelectExpr::new(g.expr.clone()).with_alias(&g.alias))
            .collect();
        select.push(SelectExpr::new(self.aggregate.clone()).with_alias(&self.metric));

        let mut query = Query::new().select(select).from(TableRef::new(&self.base_table));

        for join in &self.joins {
            let on = expr::table_col(&self.base_table, &join.key)
                .eq(expr::table_col(&join.table, &join.key));
            query = query.inner_join(TableRef::new(&join.table), on);
        }

        for condition in &self.filters {
            query = query.filter(condition.clone());
        }

        if !self.group_by.is_empty() {
            query = query.group_by(self.group_by.iter().map(|g| g.expr.clone()).collect());
        }

        if let Some(order) = &self.order {
            let key = expr::col(&order.column);
            query = query.order_by(vec![if order.descending {
                OrderByExpr::desc(key)
            } else {
                OrderByExpr::asc(key)
            }]);
        }

        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }

        query
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_query().to_sql(dialect)
    }
}
