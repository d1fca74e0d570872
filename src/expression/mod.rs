//! Sandboxed formula evaluation for derived metrics.
//!
//! Formulas are configuration data, so they are never handed to a general
//! interpreter. A formula is tokenized, parsed into a closed [`Node`] tree
//! under an allow-list, and walked by a small evaluator:
//!
//! - arithmetic: `+ - * / // % **`, unary `+ -`
//! - comparisons, chained: `0 < a <= 10`
//! - calls to [`ALLOWED_FUNCTIONS`] with positional arguments only
//! - conditional expressions: `a / b if b > 0 else 0`
//! - list and tuple literals
//!
//! Everything else fails closed with [`SafeExpressionError`].
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use semlayer::expression::evaluate;
//!
//! let ns = HashMap::from([("revenue".to_string(), 300.0), ("customers".to_string(), 4.0)]);
//! assert_eq!(evaluate("revenue / customers", &ns).unwrap(), 75.0);
//! ```

mod eval;
mod lexer;
mod parser;

use std::collections::HashMap;

pub use eval::Value;
pub use parser::{BinOp, CmpOp, Node, UnaryOp};

/// Deepest nesting the parser accepts.
pub const MAX_AST_DEPTH: usize = 50;

/// Largest tree the parser accepts.
pub const MAX_NODES: usize = 500;

/// Functions a formula may call.
pub const ALLOWED_FUNCTIONS: &[&str] = &["abs", "min", "max", "round", "sum", "len", "int", "float"];

/// Error raised for a rejected or failing formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SafeExpressionError {
    #[error("invalid expression syntax at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("disallowed construct in expression: {0}")]
    Disallowed(String),

    #[error("unknown name '{0}' in expression")]
    UnknownName(String),

    #[error("expression exceeds maximum depth of {0}")]
    DepthExceeded(usize),

    #[error("expression exceeds maximum of {0} nodes")]
    TooManyNodes(usize),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression produced a non-finite result")]
    NonFinite,

    #[error("type error in expression: {0}")]
    Type(String),
}

/// A formula that passed the allow-list.
///
/// Parsing is separated from evaluation so a derived metric can be
/// validated once and evaluated per result row.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeExpression {
    source: String,
    root: Node,
}

impl SafeExpression {
    pub fn parse(source: &str) -> Result<Self, SafeExpressionError> {
        let tokens = lexer::tokenize(source)?;
        let root = parser::parse(&tokens, source.len())?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Names referenced by the formula, in first-seen order.
    pub fn names(&self) -> Vec<String> {
        self.root.names()
    }

    /// Evaluate against a namespace.
    ///
    /// A boolean result is returned as 1 or 0. A list result is a type
    /// error.
    pub fn eval(&self, namespace: &HashMap<String, f64>) -> Result<f64, SafeExpressionError> {
        match eval::eval(&self.root, namespace)? {
            Value::List(_) => Err(SafeExpressionError::Type(
                "expression evaluated to a list, expected a number".into(),
            )),
            scalar => scalar.as_number(),
        }
    }
}

/// Parse and evaluate `expr` in one step.
pub fn evaluate(expr: &str, namespace: &HashMap<String, f64>) -> Result<f64, SafeExpressionError> {
    SafeExpression::parse(expr)?.eval(namespace)
}

/// Names a formula references, without evaluating it.
pub fn referenced_names(expr: &str) -> Result<Vec<String>, SafeExpressionError> {
    Ok(SafeExpression::parse(expr)?.names())
}
