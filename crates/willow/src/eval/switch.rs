//! `if`/`else` and `switch` evaluation

use super::{eval, EvalState, Value};
use crate::ast::{Node, SwitchCase};
use crate::error::EvalResult;

pub(super) fn if_expr(
    cond: &Node,
    then: &Node,
    otherwise: Option<&Node>,
    st: &EvalState,
) -> EvalResult<Value> {
    if eval(cond, st)?.truthy()? {
        eval(then, st)
    } else if let Some(otherwise) = otherwise {
        eval(otherwise, st)
    } else {
        // An if with no taken branch yields 0.
        Ok(Value::Scalar(0.0))
    }
}

pub(super) fn switch(
    cases: &[SwitchCase],
    default_case: Option<&Node>,
    all_matching: bool,
    st: &EvalState,
) -> EvalResult<Value> {
    if all_matching {
        // `[*]` form: evaluate every matching case, yield the last
        // match's value.
        let mut last = None;
        for case in cases {
            if eval(&case.condition, st)?.truthy()? {
                last = Some(eval(&case.value, st)?);
            }
        }
        return match (last, default_case) {
            (Some(v), _) => Ok(v),
            (None, Some(default)) => eval(default, st),
            (None, None) => Ok(Value::Scalar(0.0)),
        };
    }
    for case in cases {
        if eval(&case.condition, st)?.truthy()? {
            return eval(&case.value, st);
        }
    }
    match default_case {
        Some(default) => eval(default, st),
        None => Ok(Value::Scalar(0.0)),
    }
}
