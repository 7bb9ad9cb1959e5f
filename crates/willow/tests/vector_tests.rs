use pretty_assertions::assert_eq;

use willow::*;

fn eval(src: &str) -> f64 {
    let table = SymbolTable::new();
    let mut parser = Parser::new();
    let expr = parser.compile(src, &[&table]).expect("compile failed");
    expr.value().expect("evaluation failed")
}

fn eval_with(src: &str, table: &SymbolTable) -> f64 {
    let mut parser = Parser::new();
    let expr = parser.compile(src, &[table]).expect("compile failed");
    expr.value().expect("evaluation failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Declarations and initializers
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_vector_declaration_forms() {
    assert_eq!(eval("var v[4]; v[0] + v[3]"), 0.0);
    assert_eq!(eval("var v[4] := [7]; v[0] + v[3]"), 14.0);
    assert_eq!(eval("var v[4] := [1, 2, 3]; v[2] + v[3]"), 3.0);
    assert_eq!(eval("var v[4] := [10 : 5]; v[3]"), 25.0);
}

#[test]
fn test_vector_size_operator() {
    assert_eq!(eval("var v[6]; v[]"), 6.0);
}

#[test]
fn test_vector_size_must_be_constant() {
    let table = SymbolTable::new();
    table.add_variable("n", 5.0);
    let mut parser = Parser::new();
    assert!(parser.compile("var v[n]; v[]", &[&table]).is_err());
    // Constant expressions fold, including powers.
    assert_eq!(eval_with("var v[2^4]; v[]", &table), 16.0);
}

#[test]
fn test_sum_over_vector_with_loop() {
    let src = "
        var v[4] := [1, 2, 3, 4];
        var total := 0;
        for (var i := 0; i < v[]; i += 1) {
            total += v[i]
        };
        total
    ";
    assert_eq!(eval(src), 10.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Elementwise arithmetic
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_vector_scalar_arithmetic() {
    assert_eq!(eval("var v[3] := [1, 2, 3]; sum(2v)"), 12.0);
    assert_eq!(eval("var v[3] := [1, 2, 3]; sum(v + 10)"), 36.0);
    assert_eq!(eval("var v[3] := [1, 2, 3]; sum(-v)"), -6.0);
}

#[test]
fn test_vector_vector_arithmetic() {
    let src = "
        var a[3] := [1, 2, 3];
        var b[3] := [10, 20, 30];
        sum(a * b)
    ";
    assert_eq!(eval(src), 140.0);
}

#[test]
fn test_whole_vector_assignment_broadcasts() {
    assert_eq!(eval("var v[4]; v := 5; sum(v)"), 20.0);
    assert_eq!(eval("var v[4] := [1]; v += 2; sum(v)"), 12.0);
}

#[test]
fn test_range_assignment() {
    assert_eq!(eval("var v[5] := [1]; v[1 : 3] := 9; sum(v)"), 29.0);
    assert_eq!(eval("var v[5] := [1]; v[ : 1] += 5; sum(v)"), 15.0);
}

#[test]
fn test_range_read_is_inclusive() {
    assert_eq!(eval("var v[5] := [0 : 1]; sum(v[1 : 3])"), 6.0);
}

#[test]
fn test_element_swap() {
    assert_eq!(
        eval("var v[2] := [1, 2]; v[0] <=> v[1]; v[0] * 10 + v[1]"),
        21.0
    );
    assert_eq!(eval("var x := 9; var v[2]; x <=> v[0]; v[0] - x"), 9.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Views: host-shared storage
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_view_shares_storage_with_host() {
    let view = make_vector_view(vec![1.0, 2.0, 3.0]);
    let table = SymbolTable::new();
    table.add_vector_view("v", &view);
    let mut parser = Parser::new();
    let expr = parser.compile("v[1] := 20; sum(v)", &[&table]).unwrap();
    assert_eq!(expr.value().unwrap(), 24.0);
    assert_eq!(view.get(1), Some(20.0));
}

#[test]
fn test_rebase_changes_contents_not_bindings() {
    let view = make_vector_view(vec![1.0, 1.0, 1.0]);
    let table = SymbolTable::new();
    table.add_vector_view("v", &view);
    let mut parser = Parser::new();
    let expr = parser.compile("sum(v)", &[&table]).unwrap();
    assert_eq!(expr.value().unwrap(), 3.0);
    view.rebase(vec![5.0, 6.0, 7.0]);
    assert_eq!(expr.value().unwrap(), 18.0);
}

#[test]
fn test_resize_within_base_capacity() {
    let view = make_vector_view(vec![0.0; 15]);
    assert_eq!(view.base_size(), 15);
    assert!(!view.set_size(20));
    assert!(view.set_size(7));
    assert_eq!(view.size(), 7);

    let table = SymbolTable::new();
    table.add_vector_view("v", &view);
    let mut parser = Parser::new();
    let expr = parser.compile("v := 1; v[]", &[&table]).unwrap();
    // Logical size governs both the fill and the size operator.
    assert_eq!(expr.value().unwrap(), 7.0);

    assert!(view.set_size(15));
    assert_eq!(expr.value().unwrap(), 15.0);
}

#[test]
fn test_resize_visible_without_recompilation() {
    let view = make_vector_view(vec![1.0; 10]);
    let table = SymbolTable::new();
    table.add_vector_view("v", &view);
    let mut parser = Parser::new();
    let expr = parser.compile("sum(v)", &[&table]).unwrap();
    assert_eq!(expr.value().unwrap(), 10.0);
    view.set_size(4);
    assert_eq!(expr.value().unwrap(), 4.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Bounds
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_out_of_range_reads_error() {
    let table = SymbolTable::new();
    table.add_vector("v", vec![1.0, 2.0, 3.0]);
    let mut parser = Parser::new();
    let expr = parser.compile("v[10]", &[&table]).unwrap();
    match expr.value() {
        Err(EvalError::Governance(v)) => assert_eq!(v.kind, ViolationKind::VectorBounds),
        other => panic!("expected a bounds violation, got {other:?}"),
    }
}

#[test]
fn test_access_beyond_logical_size_errors() {
    let view = make_vector_view(vec![0.0; 10]);
    view.set_size(4);
    let table = SymbolTable::new();
    table.add_vector_view("v", &view);
    let mut parser = Parser::new();
    let expr = parser.compile("v[5]", &[&table]).unwrap();
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
}

#[test]
fn test_range_bounds_checked() {
    let table = SymbolTable::new();
    table.add_vector("v", vec![1.0, 2.0, 3.0]);
    let mut parser = Parser::new();
    let expr = parser.compile("sum(v[1 : 9])", &[&table]).unwrap();
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
    let expr = parser.compile("sum(v[2 : 1])", &[&table]).unwrap();
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
}

#[test]
fn test_non_finite_index_is_a_bounds_violation() {
    let table = SymbolTable::new();
    table.add_vector("v", vec![7.0, 8.0, 9.0]);
    let mut parser = Parser::new();
    // NaN must not saturate into a read of element 0.
    let expr = parser.compile("v[0 / 0]", &[&table]).unwrap();
    match expr.value() {
        Err(EvalError::Governance(v)) => assert_eq!(v.kind, ViolationKind::VectorBounds),
        other => panic!("expected a bounds violation, got {other:?}"),
    }
    let expr = parser.compile("v[1 / 0]", &[&table]).unwrap();
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
}

#[test]
fn test_non_finite_range_bound_is_a_bounds_violation() {
    let table = SymbolTable::new();
    table.add_vector("v", vec![7.0, 8.0, 9.0]);
    let mut parser = Parser::new();
    let expr = parser.compile("sum(v[0 : 0 / 0])", &[&table]).unwrap();
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
    let expr = parser.compile("v[0 / 0] := 1", &[&table]).unwrap();
    assert!(matches!(expr.value(), Err(EvalError::Governance(_))));
    assert_eq!(table.vector("v").unwrap().get(0), Some(7.0));
}
