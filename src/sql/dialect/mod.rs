//! Per-vendor rendering rules.
//!
//! The compiler builds one typed query; each [`SqlDialect`] decides how the
//! handful of non-portable pieces are spelled:
//!
//! | dialect   | quote | date format              | int division  | text cast |
//! |-----------|-------|--------------------------|---------------|-----------|
//! | sqlite    | `"`   | `STRFTIME('%Y', v)`      | `a / b`       | `TEXT`    |
//! | duckdb    | `"`   | `STRFTIME(v, '%Y')`      | `a // b`      | `VARCHAR` |
//! | postgres  | `"`   | `TO_CHAR(v, 'YYYY')`     | `DIV(a, b)`   | `TEXT`    |
//! | snowflake | `"`   | `TO_CHAR(v, 'YYYY')`     | `FLOOR(a / b)`| `VARCHAR` |
//! | bigquery  | `` ` ``| `FORMAT_DATE('%Y', v)`  | `DIV(a, b)`   | `STRING`  |
//!
//! ```
//! use semlayer::sql::dialect::{Dialect, SqlDialect};
//!
//! assert_eq!(Dialect::BigQuery.quote_identifier("plan"), "`plan`");
//! ```

mod bigquery;
mod duckdb;
mod postgres;
mod snowflake;
mod sqlite;

use std::fmt;

pub use bigquery::BigQuery;
pub use duckdb::DuckDb;
pub use postgres::Postgres;
pub use snowflake::Snowflake;
pub use sqlite::Sqlite;

use super::expr::DatePart;
use super::token::{Token, TokenStream};
use super::types::DataType;

/// Rendering hooks. Hooks that emit SQL append to `ts` and receive their
/// operands already lowered.
pub trait SqlDialect: fmt::Debug + Sync {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String {
        enclose(ident, '"')
    }

    fn quote_string(&self, text: &str) -> String {
        enclose(text, '\'')
    }

    fn cast_type(&self, to: DataType) -> &'static str;

    /// `pattern` is always strftime notation.
    fn date_format(&self, ts: &mut TokenStream, value: TokenStream, pattern: &str);

    fn date_part(&self, ts: &mut TokenStream, part: DatePart, value: TokenStream) {
        ts.call("EXTRACT")
            .keyword(part.field())
            .infix("FROM")
            .append(value)
            .symbol(')');
    }

    fn int_div(&self, ts: &mut TokenStream, lhs: TokenStream, rhs: TokenStream) {
        ts.append(lhs).infix("/").append(rhs);
    }

    /// `LIMIT n OFFSET m`, either part optional.
    fn limit_offset(&self, ts: &mut TokenStream, limit: Option<u64>, offset: Option<u64>) {
        if let Some(n) = limit {
            ts.keyword("LIMIT").space().push(count(n));
        }
        if let Some(m) = offset {
            if limit.is_some() {
                ts.space();
            }
            ts.keyword("OFFSET").space().push(count(m));
        }
    }
}

fn count(n: u64) -> Token {
    Token::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Wrap in `quote`, doubling any embedded quote.
pub fn enclose(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// `%Y-%m-%d` to `YYYY-MM-DD`, the notation of `TO_CHAR`. Directives
/// without an equivalent are kept as written.
pub fn strftime_to_template(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str("YYYY"),
            Some('y') => out.push_str("YY"),
            Some('m') => out.push_str("MM"),
            Some('d') => out.push_str("DD"),
            Some('H') => out.push_str("HH24"),
            Some('M') => out.push_str("MI"),
            Some('S') => out.push_str("SS"),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// `DIV(a, b)`
fn div_call(ts: &mut TokenStream, lhs: TokenStream, rhs: TokenStream) {
    ts.call("DIV").append(lhs).separator().append(rhs).symbol(')');
}

/// `TO_CHAR(v, 'YYYY-MM')`
fn to_char(ts: &mut TokenStream, value: TokenStream, pattern: &str) {
    ts.call("TO_CHAR")
        .append(value)
        .separator()
        .string(&strftime_to_template(pattern))
        .symbol(')');
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    DuckDb,
    Postgres,
    Snowflake,
    BigQuery,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Sqlite,
        Dialect::DuckDb,
        Dialect::Postgres,
        Dialect::Snowflake,
        Dialect::BigQuery,
    ];

    fn rules(self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
            Dialect::Snowflake => &Snowflake,
            Dialect::BigQuery => &BigQuery,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.rules().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.rules().quote_identifier(ident)
    }

    fn quote_string(&self, text: &str) -> String {
        self.rules().quote_string(text)
    }

    fn cast_type(&self, to: DataType) -> &'static str {
        self.rules().cast_type(to)
    }

    fn date_format(&self, ts: &mut TokenStream, value: TokenStream, pattern: &str) {
        self.rules().date_format(ts, value, pattern)
    }

    fn date_part(&self, ts: &mut TokenStream, part: DatePart, value: TokenStream) {
        self.rules().date_part(ts, part, value)
    }

    fn int_div(&self, ts: &mut TokenStream, lhs: TokenStream, rhs: TokenStream) {
        self.rules().int_div(ts, lhs, rhs)
    }

    fn limit_offset(&self, ts: &mut TokenStream, limit: Option<u64>, offset: Option<u64>) {
        self.rules().limit_offset(ts, limit, offset)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
