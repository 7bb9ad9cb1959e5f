//! Binary, comparison, logical and unary operator evaluation

use super::{eval, EvalState, Value};
use crate::ast::{BinaryOp, CompareOp, LogicOp, Node, UnaryOp};
use crate::error::{EvalError, EvalResult};

/// Scalar arithmetic kernel, shared with the parser's constant folder.
pub(crate) fn apply_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        BinaryOp::Pow => a.powf(b),
    }
}

/// Scalar comparison kernel, shared with the parser's constant folder.
pub(crate) fn apply_compare(op: CompareOp, a: f64, b: f64) -> f64 {
    let hit = match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

fn compare_strings(op: CompareOp, a: &str, b: &str) -> f64 {
    let hit = match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

pub(super) fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(apply_binary(op, a, b))),
        // String concatenation; other string arithmetic is rejected at
        // compile time.
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(a + &b)),
        // Elementwise vector arithmetic.
        (Value::Vector(a), Value::Scalar(b)) => {
            Ok(Value::Vector(a.iter().map(|x| apply_binary(op, *x, b)).collect()))
        }
        (Value::Scalar(a), Value::Vector(b)) => {
            Ok(Value::Vector(b.iter().map(|x| apply_binary(op, a, *x)).collect()))
        }
        (Value::Vector(a), Value::Vector(b)) => Ok(Value::Vector(
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| apply_binary(op, *x, *y))
                .collect(),
        )),
        (l, r) => Err(EvalError::TypeMismatch {
            expected: l.kind(),
            got: r.kind(),
        }),
    }
}

pub(super) fn compare(op: CompareOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(apply_compare(op, a, b))),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Scalar(compare_strings(op, &a, &b))),
        (l, r) => Err(EvalError::TypeMismatch {
            expected: l.kind(),
            got: r.kind(),
        }),
    }
}

/// Pure logical kernel over truthiness, shared with the constant
/// folder. `and`/`or` short-circuiting happens in [`logic`].
pub(crate) fn apply_logic(op: LogicOp, a: bool, b: bool) -> f64 {
    let hit = match op {
        LogicOp::And => a && b,
        LogicOp::Or => a || b,
        LogicOp::Xor => a ^ b,
        LogicOp::Nand => !(a && b),
        LogicOp::Nor => !(a || b),
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

pub(super) fn logic(op: LogicOp, lhs: &Node, rhs: &Node, st: &EvalState) -> EvalResult<Value> {
    let a = eval(lhs, st)?.truthy()?;
    match op {
        LogicOp::And if !a => Ok(Value::Scalar(0.0)),
        LogicOp::Or if a => Ok(Value::Scalar(1.0)),
        _ => {
            let b = eval(rhs, st)?.truthy()?;
            Ok(Value::Scalar(apply_logic(op, a, b)))
        }
    }
}

pub(super) fn unary(op: UnaryOp, operand: Value) -> EvalResult<Value> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Scalar(v)) => Ok(Value::Scalar(-v)),
        (UnaryOp::Neg, Value::Vector(v)) => {
            Ok(Value::Vector(v.into_iter().map(|x| -x).collect()))
        }
        (UnaryOp::Not, Value::Scalar(v)) => Ok(Value::Scalar(if v == 0.0 { 1.0 } else { 0.0 })),
        (_, other) => Err(EvalError::TypeMismatch {
            expected: "scalar",
            got: other.kind(),
        }),
    }
}
