use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use willow::*;

fn compile_with(parser: &mut Parser, src: &str) -> Expression {
    let table = SymbolTable::new();
    parser.compile(src, &[&table]).expect("compile failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Loop runtime checks
// ═══════════════════════════════════════════════════════════════════════

struct Budget {
    limit: u64,
}

impl LoopRuntimeCheck for Budget {
    fn max_loop_iterations(&self) -> u64 {
        self.limit
    }
}

const COUNTING_LOOP: &str = "var s := 0; for (var i := 0; i < 10000; i += 1) { s += i; }; s";

#[test]
fn test_iteration_budget_enforced() {
    let mut parser = Parser::new();
    parser.register_loop_runtime_check(Rc::new(RefCell::new(Budget { limit: 1000 })));
    let expr = compile_with(&mut parser, COUNTING_LOOP);
    match expr.value() {
        Err(EvalError::Governance(v)) => {
            assert_eq!(v.kind, ViolationKind::LoopBudget);
            assert!(v.message.contains("1000"));
        }
        other => panic!("expected a loop budget violation, got {other:?}"),
    }
}

#[test]
fn test_budget_large_enough_passes() {
    let mut parser = Parser::new();
    parser.register_loop_runtime_check(Rc::new(RefCell::new(Budget { limit: 20000 })));
    let expr = compile_with(&mut parser, COUNTING_LOOP);
    assert_eq!(expr.value().unwrap(), 49995000.0);
}

#[test]
fn test_iteration_counter_resets_per_evaluation() {
    let mut parser = Parser::new();
    parser.register_loop_runtime_check(Rc::new(RefCell::new(Budget { limit: 100 })));
    let expr = compile_with(
        &mut parser,
        "var s := 0; for (var i := 0; i < 60; i += 1) { s += 1; }; s",
    );
    // 60 iterations fit the budget; a second run starts from zero again.
    assert_eq!(expr.value().unwrap(), 60.0);
    assert_eq!(expr.value().unwrap(), 60.0);
}

#[test]
fn test_budget_spans_all_loops_in_one_evaluation() {
    let mut parser = Parser::new();
    parser.register_loop_runtime_check(Rc::new(RefCell::new(Budget { limit: 100 })));
    let expr = compile_with(
        &mut parser,
        "var s := 0; \
         for (var i := 0; i < 60; i += 1) { s += 1; }; \
         for (var j := 0; j < 60; j += 1) { s += 1; }; \
         s",
    );
    // Each loop alone fits, their sum does not: the counter is cumulative.
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
}

#[test]
fn test_custom_policy_check() {
    // A policy check independent of the iteration budget, e.g. a
    // deadline. This one allows a fixed number of calls.
    struct Fuse {
        remaining: u64,
    }
    impl LoopRuntimeCheck for Fuse {
        fn check(&mut self) -> bool {
            if self.remaining == 0 {
                return false;
            }
            self.remaining -= 1;
            true
        }
    }
    let mut parser = Parser::new();
    parser.register_loop_runtime_check(Rc::new(RefCell::new(Fuse { remaining: 5 })));
    let expr = compile_with(&mut parser, "while (1) { }; 0");
    match expr.value() {
        Err(EvalError::Governance(v)) => assert_eq!(v.kind, ViolationKind::LoopBudget),
        other => panic!("expected a violation, got {other:?}"),
    }
}

#[test]
fn test_loop_set_filters_coverage() {
    struct WhileOnly;
    impl LoopRuntimeCheck for WhileOnly {
        fn loop_set(&self) -> LoopSet {
            LoopSet {
                while_loops: true,
                ..LoopSet::NONE
            }
        }
        fn max_loop_iterations(&self) -> u64 {
            10
        }
    }
    let mut parser = Parser::new();
    parser.register_loop_runtime_check(Rc::new(RefCell::new(WhileOnly)));
    // The for loop is not covered: 100 iterations pass untouched.
    let expr = compile_with(
        &mut parser,
        "var s := 0; for (var i := 0; i < 100; i += 1) { s += 1; }; s",
    );
    assert_eq!(expr.value().unwrap(), 100.0);
    // A while loop over the same budget trips it.
    let expr = compile_with(&mut parser, "var i := 0; while (i < 100) { i += 1; }; i");
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
}

#[test]
fn test_handler_may_let_loops_continue() {
    struct Tally {
        limit: u64,
        violations: u64,
    }
    impl LoopRuntimeCheck for Tally {
        fn max_loop_iterations(&self) -> u64 {
            self.limit
        }
        fn handle_violation(&mut self, _violation: &Violation) -> EvalResult<()> {
            self.violations += 1;
            Ok(())
        }
    }
    let hook = Rc::new(RefCell::new(Tally {
        limit: 10,
        violations: 0,
    }));
    let mut parser = Parser::new();
    parser.register_loop_runtime_check(hook.clone());
    let expr = compile_with(
        &mut parser,
        "var s := 0; for (var i := 0; i < 100; i += 1) { s += 1; }; s",
    );
    assert_eq!(expr.value().unwrap(), 100.0);
    assert_eq!(hook.borrow().violations, 90);
}

// ═══════════════════════════════════════════════════════════════════════
// Compilation checks
// ═══════════════════════════════════════════════════════════════════════

struct Refuse;

impl CompilationCheck for Refuse {
    fn continue_compilation(&mut self) -> Result<(), String> {
        Err("compile budget exhausted".to_owned())
    }
}

#[test]
fn test_compilation_check_aborts_large_compiles() {
    // Long enough to cross the poll interval.
    let source = (0..2000).map(|i| i.to_string()).collect::<Vec<_>>().join(" + ");
    let mut parser = Parser::new();
    parser.register_compilation_check(Rc::new(RefCell::new(Refuse)));
    let errors = parser
        .compile(&source, &[&SymbolTable::new()])
        .err()
        .expect("should abort");
    assert!(errors.timed_out());
    let error = errors.get(0).unwrap();
    assert_eq!(error.kind, CompileErrorKind::Timeout);
    assert!(error.message.contains("compile budget exhausted"));
}

#[test]
fn test_permissive_compilation_check_is_transparent() {
    struct Allow;
    impl CompilationCheck for Allow {
        fn continue_compilation(&mut self) -> Result<(), String> {
            Ok(())
        }
    }
    let mut parser = Parser::new();
    parser.register_compilation_check(Rc::new(RefCell::new(Allow)));
    let expr = compile_with(&mut parser, "1 + 2 * 3");
    assert_eq!(expr.value().unwrap(), 7.0);
}

#[test]
fn test_compilation_check_covers_function_bodies() {
    let body = (0..2000).map(|i| i.to_string()).collect::<Vec<_>>().join(" + ");
    let mut compositor = Compositor::new();
    compositor.register_compilation_check(Rc::new(RefCell::new(Refuse)));
    let errors = compositor.add("big", &["x"], &body).err().expect("should abort");
    assert!(errors.timed_out());
    assert!(errors.get(0).unwrap().message.contains("in function 'big'"));
    assert!(!compositor.symbol_table().contains("big"));
}

#[test]
fn test_cleared_check_no_longer_polls() {
    let mut parser = Parser::new();
    parser.register_compilation_check(Rc::new(RefCell::new(Refuse)));
    parser.clear_compilation_check();
    let source = (0..500).map(|i| i.to_string()).collect::<Vec<_>>().join(" + ");
    assert!(parser.compile(&source, &[&SymbolTable::new()]).is_ok());
}

// ═══════════════════════════════════════════════════════════════════════
// Vector access checks
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_vector_hook_observes_the_violation() {
    struct Recorder {
        seen: Option<Violation>,
    }
    impl VectorAccessCheck for Recorder {
        fn handle_violation(&mut self, violation: &Violation) -> EvalError {
            self.seen = Some(violation.clone());
            EvalError::Governance(violation.clone())
        }
    }
    let hook = Rc::new(RefCell::new(Recorder { seen: None }));
    let table = SymbolTable::new();
    table.add_vector("v", vec![1.0, 2.0, 3.0]);
    let mut parser = Parser::new();
    parser.register_vector_access_check(hook.clone());
    let expr = parser.compile("v[10]", &[&table]).expect("compile failed");

    assert!(expr.value().is_err());
    let seen = hook.borrow();
    let violation = seen.seen.as_ref().expect("hook should have fired");
    assert_eq!(violation.kind, ViolationKind::VectorBounds);
    assert!(violation.message.contains("10"));
}

// ═══════════════════════════════════════════════════════════════════════
// Assertion checks
// ═══════════════════════════════════════════════════════════════════════

struct Strict;

impl AssertCheck for Strict {
    fn handle_violation(&mut self, violation: &Violation) -> EvalResult<()> {
        Err(EvalError::Governance(violation.clone()))
    }
}

#[test]
fn test_failed_assert_with_strict_hook() {
    let table = SymbolTable::new();
    table.add_variable("x", 3.0);
    let mut parser = Parser::new();
    parser.register_assert_check(Rc::new(RefCell::new(Strict)));
    let expr = parser.compile("assert(x > 10); 42", &[&table]).expect("compile failed");
    match expr.value() {
        Err(EvalError::Governance(v)) => {
            assert_eq!(v.kind, ViolationKind::Assertion);
            // The violation carries the source text of the condition.
            assert_eq!(v.message, "x > 10");
        }
        other => panic!("expected an assertion violation, got {other:?}"),
    }
}

#[test]
fn test_passing_assert_yields_one() {
    let mut parser = Parser::new();
    parser.register_assert_check(Rc::new(RefCell::new(Strict)));
    let expr = compile_with(&mut parser, "assert(1 < 2)");
    assert_eq!(expr.value().unwrap(), 1.0);
}

#[test]
fn test_assert_without_hook_is_inert() {
    let mut parser = Parser::new();
    let expr = compile_with(&mut parser, "assert(1 > 2); 42");
    assert_eq!(expr.value().unwrap(), 42.0);
}

#[test]
fn test_logging_assert_hook_continues() {
    struct Lenient {
        failures: u64,
    }
    impl AssertCheck for Lenient {
        fn handle_violation(&mut self, _violation: &Violation) -> EvalResult<()> {
            self.failures += 1;
            Ok(())
        }
    }
    let hook = Rc::new(RefCell::new(Lenient { failures: 0 }));
    let mut parser = Parser::new();
    parser.register_assert_check(hook.clone());
    let expr = compile_with(&mut parser, "assert(1 > 2); assert(2 > 1)");
    // Failed assert yields 0, passing assert yields 1.
    assert_eq!(expr.value().unwrap(), 1.0);
    assert_eq!(hook.borrow().failures, 1);
}
