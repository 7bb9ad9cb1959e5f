//! Loop evaluation and the loop-iteration governance checkpoint

use super::{eval, ControlFlow, EvalState, Value};
use crate::ast::Node;
use crate::error::{EvalError, EvalResult, Span};
use crate::governance::{LoopKind, Violation, ViolationKind};

/// Per-iteration governance checkpoint. A no-op without a registered
/// loop check or when the check does not cover this loop kind. The
/// handler decides fatality: `Ok(())` lets the loop continue.
fn loop_tick(st: &EvalState, kind: LoopKind, span: &Span) -> EvalResult<()> {
    let Some(check) = &st.loop_check else {
        return Ok(());
    };
    let mut check = check.borrow_mut();
    if !check.loop_set().covers(kind) {
        return Ok(());
    }
    st.iterations.set(st.iterations.get() + 1);
    let budget = check.max_loop_iterations();
    let over_budget = budget > 0 && st.iterations.get() > budget;
    if over_budget || !check.check() {
        let message = if over_budget {
            format!("loop iteration budget of {budget} exceeded")
        } else {
            "loop runtime check failed".to_owned()
        };
        let violation = Violation {
            kind: ViolationKind::LoopBudget,
            span: span.clone(),
            message,
        };
        check.handle_violation(&violation)?;
    }
    Ok(())
}

/// Outcome of one body evaluation inside a loop.
enum Iteration {
    Normal,
    Broke(Value),
}

fn run_body(body: &Node, st: &EvalState) -> EvalResult<Iteration> {
    match eval(body, st) {
        Ok(_) => Ok(Iteration::Normal),
        Err(EvalError::Control(ControlFlow::Break(v))) => Ok(Iteration::Broke(v)),
        Err(EvalError::Control(ControlFlow::Continue)) => Ok(Iteration::Normal),
        // Return and real errors propagate past the loop.
        Err(e) => Err(e),
    }
}

pub(super) fn for_loop(
    init: Option<&Node>,
    cond: Option<&Node>,
    step: Option<&Node>,
    body: &Node,
    span: &Span,
    st: &EvalState,
) -> EvalResult<Value> {
    if let Some(init) = init {
        eval(init, st)?;
    }
    loop {
        if let Some(cond) = cond {
            if !eval(cond, st)?.truthy()? {
                return Ok(Value::Scalar(0.0));
            }
        }
        loop_tick(st, LoopKind::For, span)?;
        match run_body(body, st)? {
            Iteration::Normal => {}
            Iteration::Broke(v) => return Ok(v),
        }
        if let Some(step) = step {
            eval(step, st)?;
        }
    }
}

pub(super) fn while_loop(
    cond: &Node,
    body: &Node,
    span: &Span,
    st: &EvalState,
) -> EvalResult<Value> {
    while eval(cond, st)?.truthy()? {
        loop_tick(st, LoopKind::While, span)?;
        match run_body(body, st)? {
            Iteration::Normal => {}
            Iteration::Broke(v) => return Ok(v),
        }
    }
    Ok(Value::Scalar(0.0))
}

pub(super) fn repeat_loop(
    body: &Node,
    until: &Node,
    span: &Span,
    st: &EvalState,
) -> EvalResult<Value> {
    loop {
        loop_tick(st, LoopKind::Repeat, span)?;
        match run_body(body, st)? {
            Iteration::Normal => {}
            Iteration::Broke(v) => return Ok(v),
        }
        if eval(until, st)?.truthy()? {
            return Ok(Value::Scalar(0.0));
        }
    }
}
