//! BigQuery standard SQL.

use super::{div_call, enclose, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::DataType;

#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        enclose(ident, '`')
    }

    fn cast_type(&self, to: DataType) -> &'static str {
        match to {
            DataType::Text => "STRING",
            DataType::Integer => "INT64",
        }
    }

    fn date_format(&self, ts: &mut TokenStream, value: TokenStream, pattern: &str) {
        ts.call("FORMAT_DATE").string(pattern).separator().append(value).symbol(')');
    }

    fn int_div(&self, ts: &mut TokenStream, lhs: TokenStream, rhs: TokenStream) {
        div_call(ts, lhs, rhs);
    }
}
