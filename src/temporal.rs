//! Temporal dimension templates.
//!
//! A temporal dimension carries a SQL fragment such as
//! `strftime('%Y-%m', {TABLE}.created_at)`. The fragment is never executed
//! as written. It is matched against a closed set of idioms and rebuilt as
//! a typed expression, so it renders correctly for every dialect:
//!
//! - **date format**: `strftime`, `date_format` or `format_date` over one
//!   column with a literal format, in either argument order
//! - **year and quarter**: any fragment extracting the year of the column
//!   together with a `'-Q'` literal or a quarter computation, rebuilt as
//!   `<year> || '-Q' || ((<month> + 2) / 3)`, e.g. `2024-Q1`
//!
//! Anything else is refused.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{SemanticLayerError, SemanticResult};
use crate::model::{DimensionDefinition, DimensionKind};
use crate::sql::expr::{self, DatePart, Expr, ExprExt};
use crate::sql::query::SelectExpr;
use crate::sql::DataType;

static COLUMN_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{TABLE\}\.(\w+)").unwrap());

static FORMAT_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:strftime|date_format|format_date)\s*\(\s*'([^']*)'\s*,\s*\{TABLE\}\.(\w+)\s*\)\s*$")
        .unwrap()
});

static COLUMN_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:strftime|date_format|format_date)\s*\(\s*\{TABLE\}\.(\w+)\s*,\s*'([^']*)'\s*\)\s*$")
        .unwrap()
});

static YEAR_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)%Y|\bYEAR\b").unwrap());

static QUARTER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)'-Q'|\bQUARTER\b|\+\s*2\s*\)\s*/\s*3").unwrap());

/// A recognized template shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalPattern {
    DateFormat { column: String, format: String },
    YearQuarter { column: String },
}

impl TemporalPattern {
    pub fn column(&self) -> &str {
        match self {
            TemporalPattern::DateFormat { column, .. } | TemporalPattern::YearQuarter { column } => {
                column
            }
        }
    }

    /// Build the expression over `table.column`.
    pub fn to_expr(&self, table: &str) -> Expr {
        match self {
            TemporalPattern::DateFormat { column, format } => {
                expr::date_format(expr::table_col(table, column), format)
            }
            TemporalPattern::YearQuarter { column } => quarter_label(expr::table_col(table, column)),
        }
    }
}

/// `YYYY-Qn` from a date expression.
pub fn quarter_label(date: Expr) -> Expr {
    let month = expr::date_part(DatePart::Month, date.clone());
    let quarter = expr::int_div(expr::paren(month.add(2)), expr::lit_int(3));
    expr::cast(expr::date_part(DatePart::Year, date), DataType::Text)
        .concat("-Q")
        .concat(expr::cast(quarter, DataType::Text))
}

/// Recognize a template. Fails for anything outside the supported idioms.
pub fn parse_template(sql: &str) -> SemanticResult<TemporalPattern> {
    let mut columns = COLUMN_REF.captures_iter(sql).map(|c| c[1].to_string());
    let Some(column) = columns.next() else {
        return Err(SemanticLayerError::Query(format!(
            "temporal template must reference {{TABLE}}.<column>: {sql}"
        )));
    };
    if let Some(other) = columns.find(|c| c != &column) {
        return Err(SemanticLayerError::Query(format!(
            "temporal template must reference a single column, found '{column}' and '{other}': {sql}"
        )));
    }

    if YEAR_MARKER.is_match(sql) && QUARTER_MARKER.is_match(sql) {
        return Ok(TemporalPattern::YearQuarter { column });
    }
    if let Some(caps) = FORMAT_FIRST.captures(sql) {
        return Ok(TemporalPattern::DateFormat {
            column: caps[2].to_string(),
            format: caps[1].to_string(),
        });
    }
    if let Some(caps) = COLUMN_FIRST.captures(sql) {
        return Ok(TemporalPattern::DateFormat {
            column: caps[1].to_string(),
            format: caps[2].to_string(),
        });
    }

    Err(SemanticLayerError::Query(format!(
        "unsupported temporal template (expected a date format or year-quarter pattern): {sql}"
    )))
}

/// Resolve a temporal dimension into a select item named after the
/// dimension.
///
/// `columns` are the columns of the dimension's table; the referenced column
/// must be one of them.
pub fn resolve(dimension: &DimensionDefinition, columns: &[String]) -> SemanticResult<SelectExpr> {
    let DimensionKind::Temporal { sql } = &dimension.kind else {
        return Err(SemanticLayerError::Query(format!(
            "dimension '{}' is not temporal",
            dimension.name
        )));
    };
    let pattern = parse_template(sql)?;
    if !columns.iter().any(|c| c == pattern.column()) {
        return Err(SemanticLayerError::Query(format!(
            "temporal dimension '{}' references column '{}' which is not on table '{}'",
            dimension.name,
            pattern.column(),
            dimension.table
        )));
    }
    tracing::debug!(dimension = %dimension.name, ?pattern, "resolved temporal dimension");
    Ok(SelectExpr::new(pattern.to_expr(&dimension.table)).with_alias(&dimension.name))
}
