//! # Willow
//!
//! An embeddable expression-language engine: compile once, bind host
//! data, evaluate repeatedly.
//!
//! Programs are compiled against chained [`SymbolTable`]s holding the
//! host's scalars, vectors, strings, constants and functions. Name
//! resolution happens at compile time and produces nodes bound directly
//! to the underlying storage cells, so re-evaluating an [`Expression`]
//! after the host mutates a bound variable picks the new value up with
//! no lookup cost.
//!
//! ## Architecture
//!
//! - **Lexer / Parser**: `logos`-based tokenizer feeding a
//!   precedence-climbing parser with statement-level error recovery
//! - **Symbol tables**: shared, chainable binding environments
//! - **Evaluator**: tree walker with control flow carried as errors
//! - **Compositor**: recursive in-language function definitions
//! - **Governance**: opt-in compile-time and runtime resource checks
//!
//! ## Example
//!
//! ```
//! use willow::{Parser, SymbolTable};
//!
//! let table = SymbolTable::new();
//! table.add_variable("x", 3.0);
//!
//! let mut parser = Parser::new();
//! let expr = parser.compile("2x + 1", &[&table]).unwrap();
//! assert_eq!(expr.value().unwrap(), 7.0);
//!
//! table.set_variable("x", 10.0);
//! assert_eq!(expr.value().unwrap(), 21.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub(crate) mod ast;
pub(crate) mod builtins;
pub mod compositor;
pub mod error;
pub mod eval;
pub mod expression;
pub mod governance;
pub mod lexer;
pub mod native;
pub mod parser;
pub mod results;
pub mod symbol_table;
pub mod vector_view;

// Re-export the main types
pub use compositor::Compositor;
pub use error::{CompileError, CompileErrorKind, CompileErrors, EvalError, EvalResult, Span};
pub use expression::Expression;
pub use governance::{
    AssertCheck, AssertCheckRef, CompilationCheck, CompilationCheckRef, LoopKind, LoopRuntimeCheck,
    LoopRuntimeCheckRef, LoopSet, VectorAccessCheck, VectorAccessCheckRef, Violation,
    ViolationKind,
};
pub use native::{
    ArgValue, GenericFunction, GenericResult, ScalarFn, ScalarFunction, Signature, TypeTag,
};
pub use parser::{Parser, UnknownSymbolResolver, ZeroResolver};
pub use results::{ResultValue, ResultsContext};
pub use symbol_table::{Mutability, ScalarRef, StringRef, Symbol, SymbolTable};
pub use vector_view::{make_vector_view, VectorView};

/// Willow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
