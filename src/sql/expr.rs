//! Typed SQL expressions.
//!
//! Everything the compiler emits is built here. There is no raw-text
//! variant: column names become quoted identifiers and values become
//! quoted literals, so nothing a caller supplies reaches the SQL unescaped.

use super::dialect::{Dialect, SqlDialect};
use super::query::SelectExpr;
use super::token::{Token, TokenStream};
use super::types::DataType;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column {
        table: Option<String>,
        name: String,
    },
    Str(String),
    Int(i64),
    Float(f64),
    Binary {
        lhs: Box<Expr>,
        op: BinOp,
        rhs: Box<Expr>,
    },
    /// `COUNT`, `SUM`, ... over one argument, or `COUNT(*)` when `arg` is
    /// `None`.
    Aggregate {
        func: AggFunc,
        arg: Option<Box<Expr>>,
        distinct: bool,
    },
    Cast {
        expr: Box<Expr>,
        to: DataType,
    },
    /// Date rendered through a strftime pattern such as `%Y-%m`.
    DateFormat {
        expr: Box<Expr>,
        pattern: String,
    },
    DatePart {
        part: DatePart,
        expr: Box<Expr>,
    },
    /// Division that discards the remainder.
    IntDiv {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Add,
    Concat,
}

impl BinOp {
    pub fn keyword(self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Lte => "<=",
            BinOp::Gte => ">=",
            BinOp::And => "AND",
            BinOp::Add => "+",
            BinOp::Concat => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn keyword(self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
    Year,
    Month,
}

impl DatePart {
    /// Field name inside `EXTRACT(<field> FROM ...)`.
    pub fn field(self) -> &'static str {
        match self {
            DatePart::Year => "YEAR",
            DatePart::Month => "MONTH",
        }
    }

    /// strftime directive producing the part as digits.
    pub fn directive(self) -> &'static str {
        match self {
            DatePart::Year => "%Y",
            DatePart::Month => "%m",
        }
    }
}

impl Expr {
    /// Lower to tokens. Dialect hooks decide the shape of the date and
    /// division forms; quoting happens later, at render time.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        self.write(&mut ts, dialect);
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).render(dialect)
    }

    fn write(&self, ts: &mut TokenStream, dialect: Dialect) {
        match self {
            Expr::Column { table, name } => {
                if let Some(table) = table {
                    ts.ident(table).symbol('.');
                }
                ts.ident(name);
            }
            Expr::Str(text) => {
                ts.string(text);
            }
            Expr::Int(n) => {
                ts.push(Token::Int(*n));
            }
            Expr::Float(f) => {
                ts.push(Token::Float(*f));
            }
            Expr::Binary { lhs, op, rhs } => {
                lhs.write(ts, dialect);
                ts.infix(op.keyword());
                rhs.write(ts, dialect);
            }
            Expr::Aggregate { func, arg, distinct } => {
                ts.call(func.keyword());
                if *distinct {
                    ts.keyword("DISTINCT").space();
                }
                match arg {
                    Some(arg) => arg.write(ts, dialect),
                    None => {
                        ts.symbol('*');
                    }
                }
                ts.symbol(')');
            }
            Expr::Cast { expr, to } => {
                ts.call("CAST");
                expr.write(ts, dialect);
                ts.infix("AS").keyword(dialect.cast_type(*to)).symbol(')');
            }
            Expr::DateFormat { expr, pattern } => {
                dialect.date_format(ts, expr.to_tokens(dialect), pattern);
            }
            Expr::DatePart { part, expr } => {
                dialect.date_part(ts, *part, expr.to_tokens(dialect));
            }
            Expr::IntDiv { lhs, rhs } => {
                dialect.int_div(ts, lhs.to_tokens(dialect), rhs.to_tokens(dialect));
            }
            Expr::Paren(inner) => {
                ts.symbol('(');
                inner.write(ts, dialect);
                ts.symbol(')');
            }
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        name: name.to_string(),
    }
}

/// `table.column`
pub fn table_col(table: &str, name: &str) -> Expr {
    Expr::Column {
        table: Some(table.to_string()),
        name: name.to_string(),
    }
}

pub fn lit_str(text: &str) -> Expr {
    Expr::Str(text.to_string())
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Int(n)
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Float(f)
}

fn aggregate(func: AggFunc, arg: Expr, distinct: bool) -> Expr {
    Expr::Aggregate {
        func,
        arg: Some(Box::new(arg)),
        distinct,
    }
}

pub fn count_star() -> Expr {
    Expr::Aggregate {
        func: AggFunc::Count,
        arg: None,
        distinct: false,
    }
}

pub fn count(arg: Expr) -> Expr {
    aggregate(AggFunc::Count, arg, false)
}

pub fn count_distinct(arg: Expr) -> Expr {
    aggregate(AggFunc::Count, arg, true)
}

pub fn sum(arg: Expr) -> Expr {
    aggregate(AggFunc::Sum, arg, false)
}

pub fn avg(arg: Expr) -> Expr {
    aggregate(AggFunc::Avg, arg, false)
}

pub fn min(arg: Expr) -> Expr {
    aggregate(AggFunc::Min, arg, false)
}

pub fn max(arg: Expr) -> Expr {
    aggregate(AggFunc::Max, arg, false)
}

pub fn cast(expr: Expr, to: DataType) -> Expr {
    Expr::Cast {
        expr: Box::new(expr),
        to,
    }
}

pub fn date_format(expr: Expr, pattern: &str) -> Expr {
    Expr::DateFormat {
        expr: Box::new(expr),
        pattern: pattern.to_string(),
    }
}

pub fn date_part(part: DatePart, expr: Expr) -> Expr {
    Expr::DatePart {
        part,
        expr: Box::new(expr),
    }
}

pub fn int_div(lhs: Expr, rhs: Expr) -> Expr {
    Expr::IntDiv {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn paren(expr: Expr) -> Expr {
    Expr::Paren(Box::new(expr))
}

// =============================================================================
// Fluent operators
// =============================================================================

/// Operator methods, so conditions read left to right:
/// `table_col("o", "status").eq("paid").and(...)`.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn op(self, op: BinOp, rhs: impl Into<Expr>) -> Expr {
        Expr::Binary {
            lhs: Box::new(self.into_expr()),
            op,
            rhs: Box::new(rhs.into()),
        }
    }

    fn eq(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Eq, rhs)
    }

    fn ne(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Ne, rhs)
    }

    fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Lt, rhs)
    }

    fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Gt, rhs)
    }

    fn lte(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Lte, rhs)
    }

    fn gte(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Gte, rhs)
    }

    fn and(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::And, rhs)
    }

    fn add(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Add, rhs)
    }

    /// `||`
    fn concat(self, rhs: impl Into<Expr>) -> Expr {
        self.op(BinOp::Concat, rhs)
    }

    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr::new(self.into_expr()).with_alias(name)
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<&str> for Expr {
    fn from(text: &str) -> Self {
        lit_str(text)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(i64::from(n))
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}
