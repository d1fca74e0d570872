//! Snowflake.

use super::{to_char, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::DataType;

#[derive(Debug, Clone, Copy)]
pub struct Snowflake;

impl SqlDialect for Snowflake {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn cast_type(&self, to: DataType) -> &'static str {
        match to {
            DataType::Text => "VARCHAR",
            DataType::Integer => "BIGINT",
        }
    }

    fn date_format(&self, ts: &mut TokenStream, value: TokenStream, pattern: &str) {
        to_char(ts, value, pattern);
    }

    // `/` always yields a decimal here.
    fn int_div(&self, ts: &mut TokenStream, lhs: TokenStream, rhs: TokenStream) {
        ts.call("FLOOR").append(lhs).infix("/").append(rhs).symbol(')');
    }
}
