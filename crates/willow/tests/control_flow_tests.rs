use pretty_assertions::assert_eq;

use willow::*;

fn eval(src: &str) -> f64 {
    let table = SymbolTable::new();
    let mut parser = Parser::new();
    let expr = parser.compile(src, &[&table]).expect("compile failed");
    expr.value().expect("evaluation failed")
}

fn compile_err(src: &str) -> CompileErrors {
    let table = SymbolTable::new();
    let mut parser = Parser::new();
    parser
        .compile(src, &[&table])
        .err()
        .expect("expected a compile error")
}

// ═══════════════════════════════════════════════════════════════════════
// If / else
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_if_else() {
    assert_eq!(eval("var x := 5; if (x > 3) { 10 } else { 20 }"), 10.0);
    assert_eq!(eval("var x := 1; if (x > 3) { 10 } else { 20 }"), 20.0);
}

#[test]
fn test_if_without_else_yields_zero() {
    assert_eq!(eval("if (1 > 2) { 10 }"), 0.0);
}

#[test]
fn test_else_if_chain() {
    let src = "
        var x := 2;
        if (x == 1) { 100 }
        else if (x == 2) { 200 }
        else { 300 }
    ";
    assert_eq!(eval(src), 200.0);
}

#[test]
fn test_if_with_single_statements() {
    assert_eq!(eval("var r; if (1 < 2) r := 7; else r := 9; r"), 7.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Switch
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_switch_first_match_wins() {
    let src = "
        var x := 3;
        switch {
            case x = 1 : 10;
            case x = 3 : 30;
            case x > 0 : 99;
            default    : 0;
        }
    ";
    assert_eq!(eval(src), 30.0);
}

#[test]
fn test_switch_default() {
    let src = "
        var x := 7;
        switch {
            case x = 1 : 10;
            default    : 42;
        }
    ";
    assert_eq!(eval(src), 42.0);
}

#[test]
fn test_switch_no_match_no_default_yields_zero() {
    assert_eq!(eval("var x := 9; switch { case x = 1 : 10; }"), 0.0);
}

#[test]
fn test_all_matching_case_list() {
    let src = "
        var x := 6;
        var acc := 0;
        [*] {
            case x % 2 == 0 : acc += 1;
            case x % 3 == 0 : acc += 10;
            case x % 5 == 0 : acc += 100;
        }
        acc
    ";
    assert_eq!(eval(src), 11.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Loops
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_for_loop() {
    let src = "
        var total := 0;
        for (var i := 1; i <= 10; i += 1) {
            total += i
        };
        total
    ";
    assert_eq!(eval(src), 55.0);
}

#[test]
fn test_while_loop() {
    assert_eq!(eval("var i := 0; while (i < 10) { i += 1 }; i"), 10.0);
}

#[test]
fn test_repeat_until() {
    assert_eq!(eval("var i := 0; repeat i += 1; until (i >= 5); i"), 5.0);
}

#[test]
fn test_repeat_body_runs_at_least_once() {
    assert_eq!(eval("var i := 100; repeat i += 1; until (true); i"), 101.0);
}

#[test]
fn test_break_with_value() {
    let src = "
        var i := 0;
        while (true) {
            i += 1;
            if (i == 7) break[i * 10]
        }
    ";
    assert_eq!(eval(src), 70.0);
}

#[test]
fn test_break_without_value_yields_zero() {
    assert_eq!(eval("while (true) { break }"), 0.0);
}

#[test]
fn test_continue() {
    let src = "
        var total := 0;
        for (var i := 0; i < 10; i += 1) {
            if (i % 2 == 1) continue;
            total += i
        };
        total
    ";
    assert_eq!(eval(src), 20.0);
}

#[test]
fn test_nested_loops_break_is_innermost() {
    let src = "
        var count := 0;
        for (var i := 0; i < 3; i += 1) {
            for (var j := 0; j < 10; j += 1) {
                if (j == 2) break;
                count += 1
            }
        };
        count
    ";
    assert_eq!(eval(src), 6.0);
}

#[test]
fn test_loop_counter_scoping() {
    // i from the for header is not visible after the loop.
    let errors = compile_err("for (var i := 0; i < 3; i += 1) { i }; i");
    assert!(errors.iter().any(|e| e.message.contains("undefined symbol 'i'")));
}

#[test]
fn test_break_outside_loop_is_a_compile_error() {
    let errors = compile_err("break");
    assert_eq!(errors.get(0).unwrap().kind, CompileErrorKind::Semantic);
}

#[test]
fn test_continue_outside_loop_is_a_compile_error() {
    let errors = compile_err("continue");
    assert_eq!(errors.get(0).unwrap().kind, CompileErrorKind::Semantic);
}

// ═══════════════════════════════════════════════════════════════════════
// Blocks and scoping
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_block_value_is_last_statement() {
    assert_eq!(eval("{ 1; 2; 3 }"), 3.0);
}

#[test]
fn test_braced_block_scopes_its_locals() {
    let errors = compile_err("{ var y := 2; y }; y");
    assert!(errors.iter().any(|e| e.message.contains("undefined symbol 'y'")));
}

#[test]
fn test_tilde_block_shares_enclosing_scope() {
    let src = "
        var x := 1;
        ~{ var z := 3; x += z };
        x + z
    ";
    assert_eq!(eval(src), 7.0);
}

#[test]
fn test_shadowing_in_inner_scope() {
    let src = "
        var x := 1;
        { var x := 100; x += 1 };
        x
    ";
    assert_eq!(eval(src), 1.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Top-level return
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_return_short_circuits_the_program() {
    assert_eq!(eval("var x := 1; if (x == 1) return [42]; 99"), 42.0);
}

#[test]
fn test_return_with_no_scalar_yields_zero() {
    assert_eq!(eval("return ['only a string']"), 0.0);
}
