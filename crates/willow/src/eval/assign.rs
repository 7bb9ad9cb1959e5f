//! Assignment and swap evaluation

use super::binary::apply_binary;
use super::vector::{checked_index, slice_bounds};
use super::{eval, EvalState, Value};
use crate::ast::{AssignOp, BinaryOp, LValue, Node};
use crate::error::{EvalError, EvalResult, Span};

fn op_of(op: AssignOp) -> Option<BinaryOp> {
    match op {
        AssignOp::Set => None,
        AssignOp::Add => Some(BinaryOp::Add),
        AssignOp::Sub => Some(BinaryOp::Sub),
        AssignOp::Mul => Some(BinaryOp::Mul),
        AssignOp::Div => Some(BinaryOp::Div),
        AssignOp::Mod => Some(BinaryOp::Mod),
    }
}

fn combine(op: AssignOp, old: f64, new: f64) -> f64 {
    match op_of(op) {
        None => new,
        Some(bin) => apply_binary(bin, old, new),
    }
}

pub(super) fn assign(
    target: &LValue,
    op: AssignOp,
    value: &Node,
    _span: &Span,
    st: &EvalState,
) -> EvalResult<Value> {
    let rhs = eval(value, st)?;
    match target {
        LValue::Scalar(cell) => {
            let new = rhs.scalar()?;
            let mut slot = cell.borrow_mut();
            *slot = combine(op, *slot, new);
            Ok(Value::Scalar(*slot))
        }
        LValue::Str(cell) => {
            let new = rhs.string()?;
            let mut slot = cell.borrow_mut();
            match op {
                AssignOp::Set => *slot = new,
                // `+=` appends; other compound forms are rejected at
                // compile time.
                AssignOp::Add => slot.push_str(&new),
                _ => {
                    return Err(EvalError::TypeMismatch {
                        expected: "scalar",
                        got: "string",
                    })
                }
            }
            Ok(Value::Str(slot.clone()))
        }
        LValue::VectorElem { vec, index, span } => {
            let idx = checked_index(vec, index, span, st)?;
            let new = rhs.scalar()?;
            let old = vec.get(idx).unwrap_or(0.0);
            let result = combine(op, old, new);
            vec.set(idx, result);
            Ok(Value::Scalar(result))
        }
        LValue::Vector(vec) => {
            apply_to_range(vec, 0, vec.size().saturating_sub(1), op, &rhs)?;
            Ok(rhs)
        }
        LValue::VectorSlice { vec, lo, hi, span } => {
            let (lo, hi) = slice_bounds(lo.as_deref(), hi.as_deref(), vec.size(), span, st)?;
            apply_to_range(vec, lo, hi, op, &rhs)?;
            Ok(rhs)
        }
    }
}

fn apply_to_range(
    vec: &crate::vector_view::VectorView,
    lo: usize,
    hi: usize,
    op: AssignOp,
    rhs: &Value,
) -> EvalResult<()> {
    if vec.size() == 0 {
        return Ok(());
    }
    match rhs {
        // Broadcast a scalar over the range.
        Value::Scalar(v) => {
            for i in lo..=hi {
                let old = vec.get(i).unwrap_or(0.0);
                vec.set(i, combine(op, old, *v));
            }
            Ok(())
        }
        // Copy a vector elementwise, truncating to the shorter side.
        Value::Vector(values) => {
            for (offset, v) in values.iter().enumerate() {
                let i = lo + offset;
                if i > hi {
                    break;
                }
                let old = vec.get(i).unwrap_or(0.0);
                vec.set(i, combine(op, old, *v));
            }
            Ok(())
        }
        Value::Str(_) => Err(EvalError::TypeMismatch {
            expected: "scalar or vector",
            got: "string",
        }),
    }
}

pub(super) fn swap(a: &LValue, b: &LValue, span: &Span, st: &EvalState) -> EvalResult<Value> {
    match (a, b) {
        (LValue::Scalar(x), LValue::Scalar(y)) => {
            let tmp = *x.borrow();
            let other = *y.borrow();
            *x.borrow_mut() = other;
            *y.borrow_mut() = tmp;
            Ok(Value::Scalar(other))
        }
        (LValue::Str(x), LValue::Str(y)) => {
            if !std::rc::Rc::ptr_eq(x, y) {
                x.swap(y);
            }
            Ok(Value::Scalar(0.0))
        }
        (LValue::Scalar(x), LValue::VectorElem { vec, index, span }) => {
            let idx = checked_index(vec, index, span, st)?;
            let elem = vec.get(idx).unwrap_or(0.0);
            let tmp = *x.borrow();
            *x.borrow_mut() = elem;
            vec.set(idx, tmp);
            Ok(Value::Scalar(elem))
        }
        (LValue::VectorElem { vec, index, span }, LValue::Scalar(y)) => {
            let idx = checked_index(vec, index, span, st)?;
            let elem = vec.get(idx).unwrap_or(0.0);
            let tmp = *y.borrow();
            *y.borrow_mut() = elem;
            vec.set(idx, tmp);
            Ok(Value::Scalar(tmp))
        }
        (
            LValue::VectorElem { vec: va, index: ia, span: sa },
            LValue::VectorElem { vec: vb, index: ib, span: sb },
        ) => {
            let i = checked_index(va, ia, sa, st)?;
            let j = checked_index(vb, ib, sb, st)?;
            let x = va.get(i).unwrap_or(0.0);
            let y = vb.get(j).unwrap_or(0.0);
            va.set(i, y);
            vb.set(j, x);
            Ok(Value::Scalar(y))
        }
        _ => {
            let _ = span;
            // Whole-vector / slice swaps are rejected at compile time.
            Err(EvalError::TypeMismatch {
                expected: "swappable operands",
                got: "unsupported",
            })
        }
    }
}
