//! `SELECT` builder.
//!
//! Covers what an aggregation query needs and nothing more: a select list,
//! one base table, inner joins, a conjunctive `WHERE`, `GROUP BY`,
//! `ORDER BY` and `LIMIT`/`OFFSET`.

use std::fmt;

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::TokenStream;

/// Select-list item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    fn write(&self, ts: &mut TokenStream, dialect: Dialect) {
        ts.append(self.expr.to_tokens(dialect));
        if let Some(alias) = &self.alias {
            ts.infix("AS").ident(alias);
        }
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        Self::new(expr)
    }
}

/// Table in `FROM` or `JOIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    fn write(&self, ts: &mut TokenStream) {
        ts.ident(&self.name);
        if let Some(alias) = &self.alias {
            ts.infix("AS").ident(alias);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub on: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "a query does nothing until rendered with to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, items: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn inner_join(mut self, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join { table, on });
        self
    }

    /// AND a condition onto the `WHERE` clause.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn group_by(mut self, keys: Vec<Expr>) -> Self {
        self.group_by = keys;
        self
    }

    pub fn order_by(mut self, keys: Vec<OrderByExpr>) -> Self {
        self.order_by = keys;
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// One clause per line, select items indented beneath `SELECT`.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword("SELECT");
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.symbol(',');
            }
            ts.line(1);
            item.write(&mut ts, dialect);
        }

        if let Some(from) = &self.from {
            ts.line(0).keyword("FROM").space();
            from.write(&mut ts);
        }

        for join in &self.joins {
            ts.line(0).keyword("INNER JOIN").space();
            join.table.write(&mut ts);
            ts.infix("ON").append(join.on.to_tokens(dialect));
        }

        if let Some(condition) = &self.where_clause {
            ts.line(0).keyword("WHERE").space().append(condition.to_tokens(dialect));
        }

        if !self.group_by.is_empty() {
            ts.line(0).keyword("GROUP BY").space();
            for (i, key) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.separator();
                }
                ts.append(key.to_tokens(dialect));
            }
        }

        if !self.order_by.is_empty() {
            ts.line(0).keyword("ORDER BY").space();
            for (i, key) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.separator();
                }
                ts.append(key.expr.to_tokens(dialect));
                if key.dir == SortDir::Desc {
                    ts.space().keyword("DESC");
                }
            }
        }

        if self.limit.is_some() || self.offset.is_some() {
            ts.line(0);
            dialect.limit_offset(&mut ts, self.limit, self.offset);
        }

        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).render(dialect)
    }
}

impl fmt::Display for Query {
    /// Renders for SQLite; use [`Query::to_sql`] for another dialect.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(Dialect::Sqlite))
    }
}
