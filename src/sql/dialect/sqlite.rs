//! SQLite, the embedded engine. No `EXTRACT`: date parts are read back
//! through `strftime` and cast. `/` already truncates integer operands.

use super::SqlDialect;
use crate::sql::expr::DatePart;
use crate::sql::token::TokenStream;
use crate::sql::types::DataType;

#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn cast_type(&self, to: DataType) -> &'static str {
        match to {
            DataType::Text => "TEXT",
            DataType::Integer => "INTEGER",
        }
    }

    // Format comes first in SQLite's strftime.
    fn date_format(&self, ts: &mut TokenStream, value: TokenStream, pattern: &str) {
        ts.call("STRFTIME").string(pattern).separator().append(value).symbol(')');
    }

    fn date_part(&self, ts: &mut TokenStream, part: DatePart, value: TokenStream) {
        ts.call("CAST");
        self.date_format(ts, value, part.directive());
        ts.infix("AS").keyword(self.cast_type(DataType::Integer)).symbol(')');
    }
}
