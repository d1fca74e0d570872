//! Cast targets.

use std::fmt;

/// Type named in `CAST(... AS ...)`. Each dialect spells it differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Text,
    Integer,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
        })
    }
}
