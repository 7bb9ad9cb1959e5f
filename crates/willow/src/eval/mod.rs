//! Tree-walking evaluation
//!
//! One submodule per node family; `eval` is the dispatcher. Loop
//! `break`/`continue` and function/top-level `return` travel as an
//! `Err(EvalError::Control(..))` until caught by the enclosing loop,
//! call site, or the top level.

pub(crate) mod assign;
pub(crate) mod binary;
pub(crate) mod call;
pub(crate) mod loops;
pub(crate) mod switch;
pub(crate) mod vector;

use std::cell::{Cell, RefCell};

use crate::ast::Node;
use crate::error::{EvalError, EvalResult};
use crate::governance::{AssertCheckRef, LoopRuntimeCheckRef, VectorAccessCheckRef, Violation, ViolationKind};
use crate::results::{ResultsContext, ResultValue};

/// A runtime value. Most expressions are scalar; strings flow through
/// string variables, literals and string-returning generic functions;
/// vectors appear as operands of elementwise arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A number
    Scalar(f64),
    /// A string
    Str(String),
    /// A materialized vector (element snapshot)
    Vector(Vec<f64>),
}

impl Value {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Str(_) => "string",
            Value::Vector(_) => "vector",
        }
    }

    pub(crate) fn scalar(self) -> EvalResult<f64> {
        match self {
            Value::Scalar(v) => Ok(v),
            other => Err(EvalError::TypeMismatch {
                expected: "scalar",
                got: other.kind(),
            }),
        }
    }

    pub(crate) fn string(self) -> EvalResult<String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(EvalError::TypeMismatch {
                expected: "string",
                got: other.kind(),
            }),
        }
    }

    /// Scalar interpretation for the host-facing `value()` result:
    /// strings are `0`, vectors yield their first element.
    pub(crate) fn scalar_lossy(&self) -> f64 {
        match self {
            Value::Scalar(v) => *v,
            Value::Str(_) => 0.0,
            Value::Vector(v) => v.first().copied().unwrap_or(0.0),
        }
    }

    /// Truthiness: non-zero is true.
    pub(crate) fn truthy(&self) -> EvalResult<bool> {
        match self {
            Value::Scalar(v) => Ok(*v != 0.0),
            other => Err(EvalError::TypeMismatch {
                expected: "scalar",
                got: other.kind(),
            }),
        }
    }
}

/// Control flow signal for `break`/`continue`/`return`.
///
/// Wrapped in [`EvalError::Control`] so it propagates like an error
/// until the construct that owns it catches it.
#[derive(Debug, Clone)]
pub enum ControlFlow {
    /// Break out of the innermost loop, with the loop's value.
    Break(Value),
    /// Skip to the next iteration of the innermost loop.
    Continue,
    /// Unwind the current function call, or the whole program at the
    /// top level, with the returned values.
    Return(Vec<ResultValue>),
}

impl ControlFlow {
    pub(crate) fn into_err(self) -> EvalError {
        EvalError::Control(self)
    }
}

/// Per-expression evaluation state: the registered runtime governance
/// hooks, the results context, and the cumulative loop counter.
pub(crate) struct EvalState {
    pub(crate) loop_check: Option<LoopRuntimeCheckRef>,
    pub(crate) vector_check: Option<VectorAccessCheckRef>,
    pub(crate) assert_check: Option<AssertCheckRef>,
    pub(crate) results: RefCell<ResultsContext>,
    pub(crate) iterations: Cell<u64>,
}

impl EvalState {
    pub(crate) fn new(
        loop_check: Option<LoopRuntimeCheckRef>,
        vector_check: Option<VectorAccessCheckRef>,
        assert_check: Option<AssertCheckRef>,
    ) -> Self {
        Self {
            loop_check,
            vector_check,
            assert_check,
            results: RefCell::new(ResultsContext::default()),
            iterations: Cell::new(0),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Dispatcher
// ═══════════════════════════════════════════════════════════════════════

/// Evaluate one node.
pub(crate) fn eval(node: &Node, st: &EvalState) -> EvalResult<Value> {
    match node {
        Node::Number(n) => Ok(Value::Scalar(*n)),
        Node::Str(s) => Ok(Value::Str(s.clone())),
        Node::Variable(cell) => Ok(Value::Scalar(*cell.borrow())),
        Node::StringVar(cell) => Ok(Value::Str(cell.borrow().clone())),
        Node::VectorRead(view) => Ok(Value::Vector(view.to_vec())),
        Node::VectorSize(view) => Ok(Value::Scalar(view.size() as f64)),
        Node::VectorElem { vec, index, span } => vector::elem_read(vec, index, span, st),
        Node::VectorSlice { vec, lo, hi, span } => vector::slice_read(vec, lo, hi, span, st),
        Node::StringSlice { value, lo, hi, span } => vector::string_slice(value, lo, hi, span, st),
        Node::Binary { op, lhs, rhs } => {
            let l = eval(lhs, st)?;
            let r = eval(rhs, st)?;
            binary::binary(*op, l, r)
        }
        Node::Compare { op, lhs, rhs } => {
            let l = eval(lhs, st)?;
            let r = eval(rhs, st)?;
            binary::compare(*op, l, r)
        }
        Node::Logic { op, lhs, rhs } => binary::logic(*op, lhs, rhs, st),
        Node::Unary { op, operand } => {
            let v = eval(operand, st)?;
            binary::unary(*op, v)
        }
        Node::Assign { target, op, value, span } => assign::assign(target, *op, value, span, st),
        Node::Swap { a, b, span } => assign::swap(a, b, span, st),
        Node::Block(stmts) => {
            let mut last = Value::Scalar(0.0);
            for stmt in stmts {
                last = eval(stmt, st)?;
            }
            Ok(last)
        }
        Node::If { cond, then, otherwise } => switch::if_expr(cond, then, otherwise.as_deref(), st),
        Node::Switch { cases, default_case, all_matching } => {
            switch::switch(cases, default_case.as_deref(), *all_matching, st)
        }
        Node::For { init, cond, step, body, span } => {
            loops::for_loop(init.as_deref(), cond.as_deref(), step.as_deref(), body, span, st)
        }
        Node::While { cond, body, span } => loops::while_loop(cond, body, span, st),
        Node::Repeat { body, until, span } => loops::repeat_loop(body, until, span, st),
        Node::Break { value } => {
            let v = match value {
                Some(node) => eval(node, st)?,
                None => Value::Scalar(0.0),
            };
            Err(ControlFlow::Break(v).into_err())
        }
        Node::Continue => Err(ControlFlow::Continue.into_err()),
        Node::Return { args } => call::return_values(args, st),
        Node::ScalarCall { func, args, .. } => call::scalar_call(func.as_ref(), args, st),
        Node::GenericCall { name, func, overload, string_result, args } => {
            call::generic_call(name, func.as_ref(), *overload, *string_result, args, st)
        }
        Node::ComposedCall { name, func, args } => call::composed_call(name, func, args, st),
        Node::VectorInit { vec, init } => vector::vector_init(vec, init, st),
        Node::Assert { cond, message, span } => {
            if eval(cond, st)?.truthy()? {
                return Ok(Value::Scalar(1.0));
            }
            if let Some(check) = &st.assert_check {
                let violation = Violation {
                    kind: ViolationKind::Assertion,
                    span: span.clone(),
                    message: message.clone(),
                };
                check.borrow_mut().handle_violation(&violation)?;
            }
            Ok(Value::Scalar(0.0))
        }
    }
}
