//! Textual filter predicates.
//!
//! Metric definitions and callers pass filters as short strings. Only a
//! closed set of shapes is understood:
//!
//! ```text
//! col = 'text'     col != 'text'
//! col = 42         col > 42    col < 42    col >= 4.5    col <= -1
//! ```
//!
//! Anything else is skipped rather than rejected, and so is a predicate on a
//! column the table does not have. The caller decides whether a skipped
//! predicate is a warning or an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::sql::expr::{self, Expr, ExprExt};

static TEXT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)\s*(=|!=)\s*'([^']*)'\s*$").unwrap());

static NUMBER_EQ_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)\s*=\s*(-?\d+(?:\.\d+)?)\s*$").unwrap());

static NUMBER_CMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)\s*(>=|<=|>|<)\s*(-?\d+(?:\.\d+)?)\s*$").unwrap());

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl FilterOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(FilterOp::Eq),
            "!=" => Some(FilterOp::Ne),
            ">" => Some(FilterOp::Gt),
            "<" => Some(FilterOp::Lt),
            ">=" => Some(FilterOp::Gte),
            "<=" => Some(FilterOp::Lte),
            _ => None,
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl FilterValue {
    fn number(text: &str) -> Option<Self> {
        if let Ok(n) = text.parse::<i64>() {
            return Some(FilterValue::Int(n));
        }
        text.parse::<f64>().ok().map(FilterValue::Float)
    }

    fn to_expr(&self) -> Expr {
        match self {
            FilterValue::Text(s) => expr::lit_str(s),
            FilterValue::Int(n) => expr::lit_int(*n),
            FilterValue::Float(f) => expr::lit_float(*f),
        }
    }
}

/// A recognized predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Predicate {
    /// Build the SQL condition, qualifying the column with `table` if given.
    pub fn to_expr(&self, table: Option<&str>) -> Expr {
        let column = match table {
            Some(t) => expr::table_col(t, &self.column),
            None => expr::col(&self.column),
        };
        let value = self.value.to_expr();
        match self.op {
            FilterOp::Eq => column.eq(value),
            FilterOp::Ne => column.ne(value),
            FilterOp::Gt => column.gt(value),
            FilterOp::Lt => column.lt(value),
            FilterOp::Gte => column.gte(value),
            FilterOp::Lte => column.lte(value),
        }
    }
}

/// Why a predicate was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unrecognized,
    UnknownColumn(String),
}

/// A predicate that was left out of the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFilter {
    pub text: String,
    pub reason: SkipReason,
}

impl std::fmt::Display for SkippedFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            SkipReason::Unrecognized => {
                write!(f, "filter '{}' was not recognized and was not applied", self.text)
            }
            SkipReason::UnknownColumn(column) => write!(
                f,
                "filter '{}' references unknown column '{}' and was not applied",
                self.text, column
            ),
        }
    }
}

/// Parse a predicate string. Returns `None` for unrecognized text.
pub fn parse(text: &str) -> Option<Predicate> {
    if let Some(caps) = TEXT_PATTERN.captures(text) {
        return Some(Predicate {
            column: caps[1].to_string(),
            op: FilterOp::parse(&caps[2])?,
            value: FilterValue::Text(caps[3].to_string()),
        });
    }
    if let Some(caps) = NUMBER_EQ_PATTERN.captures(text) {
        return Some(Predicate {
            column: caps[1].to_string(),
            op: FilterOp::Eq,
            value: FilterValue::number(&caps[2])?,
        });
    }
    if let Some(caps) = NUMBER_CMP_PATTERN.captures(text) {
        return Some(Predicate {
            column: caps[1].to_string(),
            op: FilterOp::parse(&caps[2])?,
            value: FilterValue::number(&caps[3])?,
        });
    }
    None
}

/// Turn a predicate string into a condition on `table`.
///
/// `columns` are the table's column names. Unrecognized text and unknown
/// columns come back as [`SkippedFilter`] and are logged.
pub fn apply(table: &str, columns: &[String], text: &str) -> Result<Expr, SkippedFilter> {
    let Some(predicate) = parse(text) else {
        tracing::warn!(filter = text, table, "unrecognized filter, not applied");
        return Err(SkippedFilter {
            text: text.to_string(),
            reason: SkipReason::Unrecognized,
        });
    };
    if !columns.iter().any(|c| c == &predicate.column) {
        tracing::warn!(
            filter = text,
            table,
            column = %predicate.column,
            "filter column not on table, not applied"
        );
        return Err(SkippedFilter {
            text: text.to_string(),
            reason: SkipReason::UnknownColumn(predicate.column),
        });
    }
    Ok(predicate.to_expr(Some(table)))
}
