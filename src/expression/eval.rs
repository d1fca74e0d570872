//! Tree-walking evaluator for parsed formulas.
//!
//! Numbers are `f64`. Division follows the host expression semantics:
//! `/` is true division, `//` floors, `%` takes the sign of the divisor,
//! `round` rounds half to even.

use std::collections::HashMap;

use super::parser::{BinOp, CmpOp, Node, UnaryOp};
use super::SafeExpressionError;

/// Runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
        }
    }

    /// Numeric view; booleans count as 0/1.
    pub fn as_number(&self) -> Result<f64, SafeExpressionError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::List(_) => Err(SafeExpressionError::Type(
                "expected a number, found a list".into(),
            )),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }
}

/// Evaluate a parsed tree against a namespace.
pub fn eval(node: &Node, namespace: &HashMap<String, f64>) -> Result<Value, SafeExpressionError> {
    match node {
        Node::Number(n) => Ok(Value::Number(*n)),
        Node::Bool(b) => Ok(Value::Bool(*b)),
        Node::Name(name) => namespace
            .get(name)
            .copied()
            .map(Value::Number)
            .ok_or_else(|| SafeExpressionError::UnknownName(name.clone())),
        Node::Unary { op, operand } => {
            let v = eval(operand, namespace)?.as_number()?;
            Ok(Value::Number(match op {
                UnaryOp::Plus => v,
                UnaryOp::Neg => -v,
            }))
        }
        Node::Binary { op, left, right } => {
            let l = eval(left, namespace)?;
            let r = eval(right, namespace)?;
            binary(*op, &l, &r).map(Value::Number)
        }
        Node::Compare { first, rest } => {
            let mut left = eval(first, namespace)?;
            for (op, node) in rest {
                let right = eval(node, namespace)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Node::Call { func, args } => {
            let values = args
                .iter()
                .map(|arg| eval(arg, namespace))
                .collect::<Result<Vec<_>, _>>()?;
            call(func, values)
        }
        Node::IfElse {
            cond,
            then,
            otherwise,
        } => {
            if eval(cond, namespace)?.truthy() {
                eval(then, namespace)
            } else {
                eval(otherwise, namespace)
            }
        }
        Node::List(items) => items
            .iter()
            .map(|item| eval(item, namespace))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
    }
}

fn finite(v: f64) -> Result<f64, SafeExpressionError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(SafeExpressionError::NonFinite)
    }
}

fn binary(op: BinOp, l: &Value, r: &Value) -> Result<f64, SafeExpressionError> {
    if matches!(l, Value::List(_)) || matches!(r, Value::List(_)) {
        return Err(SafeExpressionError::Type(format!(
            "unsupported operand types {} and {}",
            l.type_name(),
            r.type_name()
        )));
    }
    let a = l.as_number()?;
    let b = r.as_number()?;
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(SafeExpressionError::DivisionByZero);
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(SafeExpressionError::DivisionByZero);
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(SafeExpressionError::DivisionByZero);
            }
            a - b * (a / b).floor()
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(SafeExpressionError::DivisionByZero);
            }
            a.powf(b)
        }
    };
    finite(result)
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool, SafeExpressionError> {
    if let (Value::List(a), Value::List(b)) = (l, r) {
        return match op {
            CmpOp::Eq => Ok(a == b),
            CmpOp::Ne => Ok(a != b),
            _ => Err(SafeExpressionError::Type("lists only support == and !=".into())),
        };
    }
    let a = l.as_number()?;
    let b = r.as_number()?;
    Ok(match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Lte => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Gte => a >= b,
    })
}

/// Arguments of min/max/sum: a single list argument is iterated,
/// otherwise the arguments themselves are.
fn spread(func: &str, args: Vec<Value>) -> Result<Vec<f64>, SafeExpressionError> {
    let items = match <[Value; 1]>::try_from(args) {
        Ok([Value::List(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    };
    if items.is_empty() {
        return Err(SafeExpressionError::Type(format!(
            "{func}() arg is an empty sequence"
        )));
    }
    items.iter().map(Value::as_number).collect()
}

fn arity(func: &str, args: &[Value], min: usize, max: usize) -> Result<(), SafeExpressionError> {
    if args.len() < min || args.len() > max {
        return Err(SafeExpressionError::Type(format!(
            "{func}() takes {min} to {max} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn call(func: &str, args: Vec<Value>) -> Result<Value, SafeExpressionError> {
    let n = match func {
        "abs" => {
            arity(func, &args, 1, 1)?;
            args[0].as_number()?.abs()
        }
        "min" => spread(func, args)?.into_iter().fold(f64::INFINITY, f64::min),
        "max" => spread(func, args)?.into_iter().fold(f64::NEG_INFINITY, f64::max),
        "sum" => {
            arity(func, &args, 1, 2)?;
            let start = match args.get(1) {
                Some(v) => v.as_number()?,
                None => 0.0,
            };
            match &args[0] {
                Value::List(items) => {
                    let mut total = start;
                    for item in items {
                        total += item.as_number()?;
                    }
                    total
                }
                other => {
                    return Err(SafeExpressionError::Type(format!(
                        "sum() expects a list, found {}",
                        other.type_name()
                    )))
                }
            }
        }
        "len" => {
            arity(func, &args, 1, 1)?;
            match &args[0] {
                Value::List(items) => items.len() as f64,
                other => {
                    return Err(SafeExpressionError::Type(format!(
                        "len() expects a list, found {}",
                        other.type_name()
                    )))
                }
            }
        }
        "round" => {
            arity(func, &args, 1, 2)?;
            let x = args[0].as_number()?;
            match args.get(1) {
                None => x.round_ties_even(),
                Some(digits) => {
                    let scale = 10f64.powi(digits.as_number()?.trunc() as i32);
                    (x * scale).round_ties_even() / scale
                }
            }
        }
        "int" => {
            arity(func, &args, 1, 1)?;
            args[0].as_number()?.trunc()
        }
        "float" => {
            arity(func, &args, 1, 1)?;
            args[0].as_number()?
        }
        other => {
            return Err(SafeExpressionError::Disallowed(format!(
                "call to non-whitelisted function '{other}'"
            )))
        }
    };
    finite(n).map(Value::Number)
}
