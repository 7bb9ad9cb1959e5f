//! Vector and string indexing, slicing, and vector initializers

use super::{eval, EvalState, Value};
use crate::ast::{Node, VecInit};
use crate::error::{EvalError, EvalResult, Span};
use crate::governance::{Violation, ViolationKind};
use crate::vector_view::VectorView;

/// Raise a vector-bounds violation. With a registered vector-access
/// check the handler chooses the error; without one the violation
/// itself is the error. Out-of-range access never continues.
pub(super) fn bounds_error(st: &EvalState, span: &Span, message: String) -> EvalError {
    let violation = Violation {
        kind: ViolationKind::VectorBounds,
        span: span.clone(),
        message,
    };
    match &st.vector_check {
        Some(check) => check.borrow_mut().handle_violation(&violation),
        None => EvalError::Governance(violation),
    }
}

/// Evaluate an index expression and bounds-check it against the view's
/// logical size. Fractional indices truncate.
pub(super) fn checked_index(
    vec: &VectorView,
    index: &Node,
    span: &Span,
    st: &EvalState,
) -> EvalResult<usize> {
    let raw = eval(index, st)?.scalar()?;
    // NaN and infinities must not saturate into a valid index.
    if !raw.is_finite() {
        return Err(bounds_error(
            st,
            span,
            format!("index {raw} is not a finite number"),
        ));
    }
    let idx = raw.trunc();
    if idx < 0.0 || (idx as usize) >= vec.size() {
        return Err(bounds_error(
            st,
            span,
            format!("index {idx} out of range for vector of size {}", vec.size()),
        ));
    }
    Ok(idx as usize)
}

pub(super) fn elem_read(
    vec: &VectorView,
    index: &Node,
    span: &Span,
    st: &EvalState,
) -> EvalResult<Value> {
    let idx = checked_index(vec, index, span, st)?;
    match vec.get(idx) {
        Some(v) => Ok(Value::Scalar(v)),
        None => Err(bounds_error(
            st,
            span,
            format!("index {idx} out of range for vector of size {}", vec.size()),
        )),
    }
}

/// Resolve optional inclusive slice bounds against a length. Omitted
/// bounds default to the ends.
pub(super) fn slice_bounds(
    lo: Option<&Node>,
    hi: Option<&Node>,
    len: usize,
    span: &Span,
    st: &EvalState,
) -> EvalResult<(usize, usize)> {
    let lo = match lo {
        Some(node) => eval(node, st)?.scalar()?.trunc(),
        None => 0.0,
    };
    let hi = match hi {
        Some(node) => eval(node, st)?.scalar()?.trunc(),
        None => len.saturating_sub(1) as f64,
    };
    if !lo.is_finite() || !hi.is_finite() {
        return Err(bounds_error(
            st,
            span,
            format!("range [{lo}:{hi}] has a non-finite bound"),
        ));
    }
    if lo < 0.0 || hi < lo || (hi as usize) >= len {
        return Err(bounds_error(
            st,
            span,
            format!("range [{lo}:{hi}] out of bounds for size {len}"),
        ));
    }
    Ok((lo as usize, hi as usize))
}

pub(super) fn slice_read(
    vec: &VectorView,
    lo: &Option<Box<Node>>,
    hi: &Option<Box<Node>>,
    span: &Span,
    st: &EvalState,
) -> EvalResult<Value> {
    let (lo, hi) = slice_bounds(lo.as_deref(), hi.as_deref(), vec.size(), span, st)?;
    let data = vec.to_vec();
    Ok(Value::Vector(data[lo..=hi].to_vec()))
}

pub(super) fn string_slice(
    value: &Node,
    lo: &Option<Box<Node>>,
    hi: &Option<Box<Node>>,
    span: &Span,
    st: &EvalState,
) -> EvalResult<Value> {
    let s = eval(value, st)?.string()?;
    let chars: Vec<char> = s.chars().collect();
    let (lo, hi) = slice_bounds(lo.as_deref(), hi.as_deref(), chars.len(), span, st)?;
    Ok(Value::Str(chars[lo..=hi].iter().collect()))
}

pub(super) fn vector_init(vec: &VectorView, init: &VecInit, st: &EvalState) -> EvalResult<Value> {
    match init {
        VecInit::Fill(node) => {
            let v = eval(node, st)?.scalar()?;
            vec.fill(v);
        }
        VecInit::List(nodes) => {
            vec.fill(0.0);
            for (i, node) in nodes.iter().enumerate().take(vec.size()) {
                let v = eval(node, st)?.scalar()?;
                vec.set(i, v);
            }
        }
        VecInit::Range { start, step } => {
            let start = eval(start, st)?.scalar()?;
            let step = eval(step, st)?.scalar()?;
            for i in 0..vec.size() {
                vec.set(i, start + step * i as f64);
            }
        }
    }
    Ok(Value::Scalar(0.0))
}
