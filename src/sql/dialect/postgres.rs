//! PostgreSQL.

use super::{div_call, to_char, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::DataType;

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn cast_type(&self, to: DataType) -> &'static str {
        match to {
            DataType::Text => "TEXT",
            DataType::Integer => "BIGINT",
        }
    }

    fn date_format(&self, ts: &mut TokenStream, value: TokenStream, pattern: &str) {
        to_char(ts, value, pattern);
    }

    // EXTRACT returns numeric, and numeric `/` keeps the fraction.
    fn int_div(&self, ts: &mut TokenStream, lhs: TokenStream, rhs: TokenStream) {
        div_call(ts, lhs, rhs);
    }
}
