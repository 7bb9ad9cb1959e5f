//! Runtime governance hooks
//!
//! Four independent, optional strategy objects the host can register:
//! a compile-continuation check polled during parsing, a loop-iteration
//! check polled inside `for`/`while`/`repeat` bodies, a vector-access
//! check consulted on indexed reads/writes, and an assertion check
//! invoked by the language-level `assert(..)` construct.
//!
//! Every hook is strictly opt-in: when none is registered the
//! corresponding checkpoint is a no-op. Hooks run synchronously on the
//! thread performing compile/evaluation and are never invoked
//! concurrently for the same expression.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{EvalError, EvalResult, Span};

/// What a failed check was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The compile-continuation check refused to continue.
    CompileTimeout,

    /// A loop exceeded its iteration budget or the check's own policy.
    LoopBudget,

    /// An indexed vector access was out of range.
    VectorBounds,

    /// A language-level `assert(..)` condition was false.
    Assertion,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViolationKind::CompileTimeout => "compile timeout",
            ViolationKind::LoopBudget => "loop budget",
            ViolationKind::VectorBounds => "vector bounds",
            ViolationKind::Assertion => "assertion",
        };
        f.write_str(s)
    }
}

/// A failed governance check, handed to the registered handler at the
/// moment the check fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Which check failed
    pub kind: ViolationKind,

    /// Source location of the construct that triggered the check
    pub span: Span,

    /// Human-readable description
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Which loop kinds a [`LoopRuntimeCheck`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSet {
    /// Cover `for (..;..;..)` loops
    pub for_loops: bool,
    /// Cover `while (..)` loops
    pub while_loops: bool,
    /// Cover `repeat .. until (..)` loops
    pub repeat_loops: bool,
}

impl LoopSet {
    /// Cover every loop kind.
    pub const ALL: LoopSet = LoopSet {
        for_loops: true,
        while_loops: true,
        repeat_loops: true,
    };

    /// Cover no loop kind (the check is registered but inert).
    pub const NONE: LoopSet = LoopSet {
        for_loops: false,
        while_loops: false,
        repeat_loops: false,
    };
}

impl Default for LoopSet {
    fn default() -> Self {
        LoopSet::ALL
    }
}

/// Loop kind, for [`LoopSet`] filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// A `for` loop
    For,
    /// A `while` loop
    While,
    /// A `repeat .. until` loop
    Repeat,
}

impl LoopSet {
    /// Whether this set covers the given loop kind.
    pub fn covers(&self, kind: LoopKind) -> bool {
        match kind {
            LoopKind::For => self.for_loops,
            LoopKind::While => self.while_loops,
            LoopKind::Repeat => self.repeat_loops,
        }
    }
}

/// Compile-continuation check, polled every fixed number of parse steps
/// during `compile`.
///
/// Returning `Err(message)` aborts compilation with a
/// [`CompileErrorKind::Timeout`](crate::CompileErrorKind::Timeout)
/// diagnostic carrying the message, so pathologically large programs
/// fail fast instead of exhausting host resources.
pub trait CompilationCheck {
    /// Decide whether compilation may continue.
    fn continue_compilation(&mut self) -> Result<(), String>;
}

/// Loop-iteration check, polled once per loop iteration with a
/// cumulative counter kept by the evaluator.
///
/// A violation fires when the cumulative count exceeds
/// [`max_loop_iterations`](LoopRuntimeCheck::max_loop_iterations)
/// (when non-zero) or when [`check`](LoopRuntimeCheck::check) returns
/// `false` (the hook's own policy, e.g. a wall-clock deadline). The
/// handler decides whether the violation is fatal: returning `Ok(())`
/// lets the loop continue, returning an error unwinds evaluation to the
/// caller of `value()`.
pub trait LoopRuntimeCheck {
    /// Which loop kinds this check covers.
    fn loop_set(&self) -> LoopSet {
        LoopSet::ALL
    }

    /// Iteration budget across all covered loops in one evaluation.
    /// Zero means unlimited.
    fn max_loop_iterations(&self) -> u64 {
        0
    }

    /// The hook's own policy check, e.g. a deadline. Called once per
    /// covered iteration; batching is the implementation's business.
    fn check(&mut self) -> bool {
        true
    }

    /// Decide the fate of a violation.
    fn handle_violation(&mut self, violation: &Violation) -> EvalResult<()> {
        Err(EvalError::Governance(violation.clone()))
    }
}

/// Vector-access check, invoked on out-of-range indexed reads/writes.
///
/// The handler chooses the error that aborts the current evaluation.
/// An out-of-range access can never be continued past.
pub trait VectorAccessCheck {
    /// Turn the violation into the error delivered to the host.
    fn handle_violation(&mut self, violation: &Violation) -> EvalError {
        EvalError::Governance(violation.clone())
    }
}

/// Assertion check, invoked when a language-level `assert(cond)`
/// evaluates a false condition. With no check registered `assert` is a
/// runtime no-op (it still compiles).
pub trait AssertCheck {
    /// Decide the fate of a failed assertion. `Ok(())` continues
    /// evaluation (log-and-continue); an error aborts it.
    fn handle_violation(&mut self, violation: &Violation) -> EvalResult<()>;
}

/// Shared handle types for host-owned hook objects.
///
/// Hooks keep their own state (counters, deadlines) across calls, so
/// they are registered as `Rc<RefCell<_>>` and borrowed for the
/// duration of each checkpoint.
pub type CompilationCheckRef = Rc<RefCell<dyn CompilationCheck>>;
/// Shared handle to a [`LoopRuntimeCheck`].
pub type LoopRuntimeCheckRef = Rc<RefCell<dyn LoopRuntimeCheck>>;
/// Shared handle to a [`VectorAccessCheck`].
pub type VectorAccessCheckRef = Rc<RefCell<dyn VectorAccessCheck>>;
/// Shared handle to an [`AssertCheck`].
pub type AssertCheckRef = Rc<RefCell<dyn AssertCheck>>;
