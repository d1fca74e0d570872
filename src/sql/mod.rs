//! Typed SQL builder.
//!
//! [`expr`] and [`query`] describe what to select; [`dialect`] decides how
//! it is spelled for a given vendor; [`token`] carries the result between
//! the two. Compiled plans are rendered here and nowhere else.

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;
pub mod types;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{DatePart, Expr, ExprExt};
pub use query::{OrderByExpr, Query, SelectExpr, TableRef};
pub use token::{Token, TokenStream};
pub use types::DataType;
