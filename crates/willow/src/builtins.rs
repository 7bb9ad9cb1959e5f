//! Built-in mathematical functions
//!
//! Every compilation consults an implicit table of standard functions
//! after all host-supplied tables, so a host registration of `min` or
//! `sqrt` shadows the built-in of the same name. All built-ins are
//! pure, which makes calls with literal arguments foldable at compile
//! time.

use std::rc::Rc;

use crate::native::{ArgValue, GenericFunction, GenericResult};
use crate::symbol_table::SymbolTable;

/// Aggregate over either one vector or any number of scalars.
struct Aggregate {
    fold: fn(&[f64]) -> f64,
}

impl GenericFunction for Aggregate {
    fn signature(&self) -> &str {
        "V|T*"
    }

    fn has_side_effects(&self) -> bool {
        false
    }

    fn call(&self, _overload: usize, args: &mut [ArgValue]) -> GenericResult {
        let value = match args {
            [ArgValue::Vector(view)] => (self.fold)(&view.to_vec()),
            scalars => {
                let data: Vec<f64> = scalars
                    .iter()
                    .filter_map(|a| a.as_scalar())
                    .collect();
                (self.fold)(&data)
            }
        };
        GenericResult::Scalar(value)
    }
}

fn sum(xs: &[f64]) -> f64 {
    xs.iter().sum()
}

fn avg(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        sum(xs) / xs.len() as f64
    }
}

fn min(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// The implicit standard-function table, built once per [`Parser`](crate::Parser).
pub(crate) fn standard_table() -> SymbolTable {
    let t = SymbolTable::new();

    let unary: &[(&str, fn(f64) -> f64)] = &[
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", f64::round),
        ("trunc", f64::trunc),
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log10", f64::log10),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
    ];
    for (name, f) in unary {
        let f = *f;
        t.add_pure_function(name, 1, move |args| f(args[0]));
    }

    t.add_pure_function("pow", 2, |args| args[0].powf(args[1]));
    t.add_pure_function("atan2", 2, |args| args[0].atan2(args[1]));
    t.add_pure_function("hypot", 2, |args| args[0].hypot(args[1]));
    t.add_pure_function("clamp", 3, |args| args[1].clamp(args[0], args[2]));

    let aggregates: &[(&str, fn(&[f64]) -> f64)] =
        &[("sum", sum), ("avg", avg), ("min", min), ("max", max)];
    for (name, fold) in aggregates {
        let _ = t.add_generic_function(name, Rc::new(Aggregate { fold: *fold }));
    }

    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_table::{FunctionEntry, Symbol};

    #[test]
    fn table_has_core_functions() {
        let t = standard_table();
        for name in ["abs", "sqrt", "pow", "clamp", "sum", "min"] {
            assert!(t.contains(name), "missing built-in '{name}'");
        }
    }

    #[test]
    fn aggregates_fold_scalars_and_vectors() {
        let agg = Aggregate { fold: sum };
        let mut args = [ArgValue::Scalar(1.0), ArgValue::Scalar(2.5)];
        match agg.call(1, &mut args) {
            GenericResult::Scalar(v) => assert_eq!(v, 3.5),
            GenericResult::Str(_) => panic!("expected scalar"),
        }
    }

    #[test]
    fn builtins_are_pure() {
        let t = standard_table();
        match t.get("sqrt") {
            Some(Symbol::Function(FunctionEntry::Scalar(f))) => {
                assert!(!f.has_side_effects());
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }
}
