//! A compiled, repeatedly evaluatable program

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::ast::Node;
use crate::compositor::ComposedFunction;
use crate::error::{EvalError, EvalResult};
use crate::eval::{self, ControlFlow, EvalState};
use crate::results::{ResultValue, ResultsContext};
use crate::symbol_table::SymbolTable;

/// A compiled program bound to its symbol tables.
///
/// Compile once, then call [`value`](Self::value) as often as needed;
/// each evaluation reads the current contents of the bound variables.
/// The expression holds handles to every chained table (keeping the
/// bound storage alive) and to every composed function it calls.
pub struct Expression {
    root: Node,
    state: EvalState,
    tables: Vec<SymbolTable>,
    /// Strong handles to called composed functions; call sites hold
    /// weak ones, so these keep direct callees alive.
    #[allow(dead_code)]
    retained: Vec<Rc<RefCell<ComposedFunction>>>,
}

impl Expression {
    pub(crate) fn new(
        root: Node,
        state: EvalState,
        tables: Vec<SymbolTable>,
        retained: Vec<Rc<RefCell<ComposedFunction>>>,
    ) -> Self {
        Self {
            root,
            state,
            tables,
            retained,
        }
    }

    /// Evaluate the program and produce its scalar result.
    ///
    /// The result is the value of the last statement, or for programs
    /// ending through `return [..]` the first returned scalar (zero if
    /// the return list holds none). The full return list is available
    /// through [`results`](Self::results) afterwards.
    pub fn value(&self) -> EvalResult<f64> {
        self.state.results.borrow_mut().clear();
        self.state.iterations.set(0);
        match eval::eval(&self.root, &self.state) {
            Ok(v) => Ok(v.scalar_lossy()),
            Err(EvalError::Control(ControlFlow::Return(values))) => {
                let result = values
                    .iter()
                    .find_map(ResultValue::as_scalar)
                    .unwrap_or(0.0);
                self.state.results.borrow_mut().set(values);
                Ok(result)
            }
            Err(err) => Err(err),
        }
    }

    /// The symbol tables this expression was compiled against, in
    /// chain order (the built-in function table last).
    pub fn symbol_tables(&self) -> &[SymbolTable] {
        &self.tables
    }

    /// The values captured by the most recent evaluation's
    /// `return [..]`, replaced on every call of [`value`](Self::value).
    pub fn results(&self) -> Ref<'_, ResultsContext> {
        self.state.results.borrow()
    }
}
