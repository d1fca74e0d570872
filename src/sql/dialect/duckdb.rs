//! DuckDB.

use super::SqlDialect;
use crate::sql::token::TokenStream;
use crate::sql::types::DataType;

#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn cast_type(&self, to: DataType) -> &'static str {
        match to {
            DataType::Text => "VARCHAR",
            DataType::Integer => "BIGINT",
        }
    }

    // Value first, the reverse of SQLite.
    fn date_format(&self, ts: &mut TokenStream, value: TokenStream, pattern: &str) {
        ts.call("STRFTIME").append(value).separator().string(pattern).symbol(')');
    }

    fn int_div(&self, ts: &mut TokenStream, lhs: TokenStream, rhs: TokenStream) {
        ts.append(lhs).infix("//").append(rhs);
    }
}
