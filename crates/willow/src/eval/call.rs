//! Native, generic and composed function call evaluation

use std::cell::RefCell;
use std::rc::Weak;

use super::{eval, ControlFlow, EvalState, Value};
use crate::ast::{CallArg, Node, VecSource};
use crate::compositor::ComposedFunction;
use crate::error::{EvalError, EvalResult};
use crate::native::{ArgValue, GenericFunction, GenericResult, ScalarFunction};
use crate::results::ResultValue;
use crate::vector_view::VectorView;

pub(super) fn scalar_call(
    func: &dyn ScalarFunction,
    args: &[Node],
    st: &EvalState,
) -> EvalResult<Value> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, st)?.scalar()?);
    }
    Ok(Value::Scalar(func.call(&values)))
}

fn eval_arg(arg: &CallArg, st: &EvalState) -> EvalResult<ArgValue> {
    match arg {
        CallArg::Scalar(node) => Ok(ArgValue::Scalar(eval(node, st)?.scalar()?)),
        CallArg::Str(node) => Ok(ArgValue::Str(eval(node, st)?.string()?)),
        CallArg::Vector(VecSource::View(view)) => Ok(ArgValue::Vector(view.clone())),
        CallArg::Vector(VecSource::Expr(node)) => {
            // A computed vector operand becomes a temporary view;
            // writes through it are discarded after the call.
            match eval(node, st)? {
                Value::Vector(data) => Ok(ArgValue::Vector(VectorView::new(data))),
                other => Err(EvalError::TypeMismatch {
                    expected: "vector",
                    got: other.kind(),
                }),
            }
        }
    }
}

pub(super) fn generic_call(
    _name: &str,
    func: &dyn GenericFunction,
    overload: usize,
    string_result: bool,
    args: &[CallArg],
    st: &EvalState,
) -> EvalResult<Value> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_arg(arg, st)?);
    }
    match func.call(overload, &mut values) {
        GenericResult::Scalar(v) if !string_result => Ok(Value::Scalar(v)),
        GenericResult::Str(s) if string_result => Ok(Value::Str(s)),
        GenericResult::Scalar(_) => Err(EvalError::TypeMismatch {
            expected: "string",
            got: "scalar",
        }),
        GenericResult::Str(_) => Err(EvalError::TypeMismatch {
            expected: "scalar",
            got: "string",
        }),
    }
}

pub(super) fn composed_call(
    name: &str,
    func: &Weak<RefCell<ComposedFunction>>,
    args: &[Node],
    st: &EvalState,
) -> EvalResult<Value> {
    let Some(func) = func.upgrade() else {
        return Err(EvalError::FunctionUnavailable(name.to_owned()));
    };

    // Arguments are evaluated before binding so they may reference the
    // parameters' current (caller-frame) values.
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, st)?.scalar()?);
    }

    // Immutable borrow held across body evaluation; recursive calls
    // re-borrow immutably, which is fine. Mutation of the definition
    // only ever happens in Compositor::add.
    let func = func.borrow();
    let body = match &func.body {
        Some(body) => body,
        None => return Err(EvalError::FunctionUndefined(name.to_owned())),
    };

    // Save the callee's frame (parameters and body locals) so direct
    // and mutual recursion see fresh slots, then restore on the way
    // out, error or not.
    let saved = func.snapshot_frame();
    for (param, value) in func.params.iter().zip(values) {
        *param.borrow_mut() = value;
    }

    let outcome = eval(body, st);
    let result = match outcome {
        Ok(v) => Ok(v),
        // `return [..]` inside a function unwinds only this call; the
        // call's value is the first returned scalar.
        Err(EvalError::Control(ControlFlow::Return(values))) => Ok(Value::Scalar(
            values.first().and_then(ResultValue::as_scalar).unwrap_or(0.0),
        )),
        Err(e) => Err(e),
    };
    func.restore_frame(saved);
    result
}

pub(super) fn return_values(args: &[CallArg], st: &EvalState) -> EvalResult<Value> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        let value = match eval_arg(arg, st)? {
            ArgValue::Scalar(v) => ResultValue::Scalar(v),
            ArgValue::Str(s) => ResultValue::Str(s),
            ArgValue::Vector(view) => ResultValue::Vector(view.to_vec()),
        };
        values.push(value);
    }
    Err(ControlFlow::Return(values).into_err())
}
