use pretty_assertions::assert_eq;

use willow::*;

// Helper to compile and evaluate a program against an empty table
fn eval(src: &str) -> f64 {
    let table = SymbolTable::new();
    let mut parser = Parser::new();
    let expr = parser.compile(src, &[&table]).expect("compile failed");
    expr.value().expect("evaluation failed")
}

// Helper with a pre-populated table
fn eval_with(src: &str, table: &SymbolTable) -> f64 {
    let mut parser = Parser::new();
    let expr = parser.compile(src, &[table]).expect("compile failed");
    expr.value().expect("evaluation failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Literals and arithmetic
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_literals() {
    assert_eq!(eval("42"), 42.0);
    assert_eq!(eval("3.14"), 3.14);
    assert_eq!(eval("1.5e-3"), 1.5e-3);
    assert_eq!(eval("true"), 1.0);
    assert_eq!(eval("false"), 0.0);
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(eval("2 + 3 * 4"), 14.0);
    assert_eq!(eval("(2 + 3) * 4"), 20.0);
    assert_eq!(eval("10 - 4 - 3"), 3.0);
    assert_eq!(eval("20 / 4 / 5"), 1.0);
    assert_eq!(eval("7 % 3"), 1.0);
}

#[test]
fn test_power_binds_tighter_than_unary_minus() {
    assert_eq!(eval("-2^2"), -4.0);
    assert_eq!(eval("(-2)^2"), 4.0);
    assert_eq!(eval("2^3^2"), 512.0);
    assert_eq!(eval("2^-1"), 0.5);
}

#[test]
fn test_division_by_zero_is_ieee() {
    assert_eq!(eval("1 / 0"), f64::INFINITY);
    assert_eq!(eval("-1 / 0"), f64::NEG_INFINITY);
    assert!(eval("0 / 0").is_nan());
}

#[test]
fn test_implicit_multiplication() {
    let table = SymbolTable::new();
    table.add_variable("x", 5.0);
    assert_eq!(eval_with("2x", &table), 10.0);
    assert_eq!(eval_with("2x + 1", &table), 11.0);
    assert_eq!(eval("2(3 + 4)"), 14.0);
    assert_eq!(eval_with("(1 + 1)x", &table), 10.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Comparison and logic
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_comparisons() {
    assert_eq!(eval("1 < 2"), 1.0);
    assert_eq!(eval("2 <= 2"), 1.0);
    assert_eq!(eval("3 > 4"), 0.0);
    assert_eq!(eval("3 != 4"), 1.0);
    assert_eq!(eval("3 <> 3"), 0.0);
}

#[test]
fn test_single_equals_is_equality() {
    assert_eq!(eval("3 = 3"), 1.0);
    assert_eq!(eval("3 = 4"), 0.0);
    assert_eq!(eval("3 == 3"), 1.0);
}

#[test]
fn test_word_logic() {
    assert_eq!(eval("1 and 1"), 1.0);
    assert_eq!(eval("1 and 0"), 0.0);
    assert_eq!(eval("0 or 1"), 1.0);
    assert_eq!(eval("1 xor 1"), 0.0);
    assert_eq!(eval("1 nand 1"), 0.0);
    assert_eq!(eval("0 nor 0"), 1.0);
    assert_eq!(eval("not 0"), 1.0);
    assert_eq!(eval("not 7"), 0.0);
}

#[test]
fn test_logic_binds_looser_than_comparison() {
    assert_eq!(eval("1 < 2 and 3 < 4"), 1.0);
    assert_eq!(eval("1 < 2 or 4 < 3"), 1.0);
}

#[test]
fn test_short_circuit() {
    // The right side would be a bounds violation if evaluated.
    assert_eq!(
        eval("var v[2] := [1]; 0 and v[9]; 1"),
        1.0
    );
    assert_eq!(
        eval("var v[2] := [1]; 1 or v[9]; 1"),
        1.0
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Variables and assignment
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_local_variables() {
    assert_eq!(eval("var x := 5; x + 1"), 6.0);
    assert_eq!(eval("var x := 2; var y := 3; x * y"), 6.0);
    assert_eq!(eval("var x; x"), 0.0);
}

#[test]
fn test_compound_assignment() {
    assert_eq!(eval("var x := 10; x += 5; x"), 15.0);
    assert_eq!(eval("var x := 10; x -= 5; x"), 5.0);
    assert_eq!(eval("var x := 10; x *= 5; x"), 50.0);
    assert_eq!(eval("var x := 10; x /= 5; x"), 2.0);
    assert_eq!(eval("var x := 10; x %= 3; x"), 1.0);
}

#[test]
fn test_assignment_is_an_expression() {
    assert_eq!(eval("var x; var y; x := y := 7; x + y"), 14.0);
}

#[test]
fn test_const_locals() {
    assert_eq!(eval("const var k := 2.5; k * 2"), 5.0);
}

#[test]
fn test_swap_scalars() {
    assert_eq!(eval("var a := 1; var b := 2; a <=> b; a * 10 + b"), 21.0);
}

#[test]
fn test_bound_variable_reads_current_value() {
    let table = SymbolTable::new();
    table.add_variable("x", 3.0);
    let mut parser = Parser::new();
    let expr = parser.compile("x * x", &[&table]).expect("compile failed");
    assert_eq!(expr.value().unwrap(), 9.0);
    table.set_variable("x", 5.0);
    assert_eq!(expr.value().unwrap(), 25.0);
}

#[test]
fn test_writes_visible_to_host() {
    let table = SymbolTable::new();
    table.add_variable("x", 0.0);
    let mut parser = Parser::new();
    let expr = parser.compile("x := 41; x + 1", &[&table]).expect("compile failed");
    assert_eq!(expr.value().unwrap(), 42.0);
    assert_eq!(table.get_variable("x"), Some(41.0));
}

// ═══════════════════════════════════════════════════════════════════════
// Constants and built-in functions
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_standard_constants() {
    let table = SymbolTable::new();
    table.add_constants();
    assert!((eval_with("2pi", &table) - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    assert_eq!(eval_with("inf", &table), f64::INFINITY);
}

#[test]
fn test_builtin_functions() {
    assert_eq!(eval("abs(-3)"), 3.0);
    assert_eq!(eval("sqrt(16)"), 4.0);
    assert_eq!(eval("floor(2.7) + ceil(2.2)"), 5.0);
    assert_eq!(eval("pow(2, 10)"), 1024.0);
    assert_eq!(eval("clamp(0, 7, 5)"), 5.0);
    assert_eq!(eval("min(3, 1, 2)"), 1.0);
    assert_eq!(eval("max(3, 1, 2)"), 3.0);
    assert_eq!(eval("sum(1, 2, 3, 4)"), 10.0);
    assert_eq!(eval("avg(2, 4, 6)"), 4.0);
}

#[test]
fn test_host_registration_shadows_builtin() {
    let table = SymbolTable::new();
    table.add_function("min", 2, |_| 99.0);
    assert_eq!(eval_with("min(1, 2)", &table), 99.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Strings
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_string_concat_and_compare() {
    assert_eq!(eval("'ab' + 'cd' == 'abcd'"), 1.0);
    assert_eq!(eval("'abc' < 'abd'"), 1.0);
    assert_eq!(eval("var s := 'hi'; s += ' there'; s == 'hi there'"), 1.0);
}

#[test]
fn test_string_range_is_inclusive() {
    assert_eq!(eval("'hello'[1 : 3] == 'ell'"), 1.0);
    assert_eq!(eval("var s := 'hello'; s[ : 1] == 'he'"), 1.0);
    assert_eq!(eval("var s := 'hello'; s[3 : ] == 'lo'"), 1.0);
}

#[test]
fn test_string_swap() {
    assert_eq!(
        eval("var a := 'x'; var b := 'y'; a <=> b; (a == 'y') and (b == 'x')"),
        1.0
    );
}

#[test]
fn test_string_escapes() {
    assert_eq!(eval(r"'a\'b'[1 : 1] == '\''"), 1.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Program shape
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_program_value_is_last_statement() {
    assert_eq!(eval("1; 2; 3"), 3.0);
    assert_eq!(eval("var x := 1; x += 1; x * 10"), 20.0);
}

#[test]
fn test_comments_are_ignored() {
    assert_eq!(eval("1 + // line\n 2 + # shell\n 3 /* block */ + 4"), 10.0);
}

#[test]
fn test_ternary() {
    assert_eq!(eval("1 < 2 ? 10 : 20"), 10.0);
    assert_eq!(eval("2 < 1 ? 10 : 20"), 20.0);
    assert_eq!(eval("var x := 3; x == 3 ? x * 2 : 0"), 6.0);
}
