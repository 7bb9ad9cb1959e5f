//! Function compositor: in-language, possibly recursive, named
//! function definitions
//!
//! Definitions are registered in two phases so recursion works: a stub
//! carrying the name and arity goes into the function table first, then
//! the body is compiled against the parameter locals plus that table.
//! A reference to the function's own name (direct recursion) or to any
//! earlier definition therefore resolves through the table, and
//! [`forward`](Compositor::forward) registers a stub on its own so two
//! definitions can call each other (mutual recursion): declare one
//! forward, then `add` both bodies in either order. If body compilation
//! fails the errors are reported against the function's name and a stub
//! created by `add` itself is rolled back.
//!
//! Recursion depth is bounded only by the host call stack; the
//! loop-iteration governance check does not count function calls.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Node;
use crate::error::{CompileError, CompileErrorKind, CompileErrors};
use crate::governance::CompilationCheckRef;
use crate::parser::{Parser, UnknownSymbolResolver};
use crate::symbol_table::{FunctionEntry, ScalarRef, StringRef, Symbol, SymbolTable};
use crate::vector_view::VectorView;

/// One storage slot of a composed function's frame: a parameter or a
/// `var` declared in the body.
pub(crate) enum LocalSlot {
    Scalar(ScalarRef),
    Vector(VectorView),
    Str(StringRef),
}

/// Saved frame contents, restored when a call unwinds.
pub(crate) enum SavedLocal {
    Scalar(f64),
    Vector(Vec<f64>, usize),
    Str(String),
}

/// A named in-language function definition.
pub struct ComposedFunction {
    pub(crate) name: String,
    pub(crate) params: Vec<ScalarRef>,
    pub(crate) locals: Vec<LocalSlot>,
    /// `None` while the definition is a registration stub.
    pub(crate) body: Option<Node>,
}

impl ComposedFunction {
    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn snapshot_frame(&self) -> Vec<SavedLocal> {
        self.locals
            .iter()
            .map(|slot| match slot {
                LocalSlot::Scalar(cell) => SavedLocal::Scalar(*cell.borrow()),
                LocalSlot::Vector(view) => SavedLocal::Vector(view.to_vec(), view.size()),
                LocalSlot::Str(cell) => SavedLocal::Str(cell.borrow().clone()),
            })
            .collect()
    }

    pub(crate) fn restore_frame(&self, saved: Vec<SavedLocal>) {
        for (slot, old) in self.locals.iter().zip(saved) {
            match (slot, old) {
                (LocalSlot::Scalar(cell), SavedLocal::Scalar(v)) => *cell.borrow_mut() = v,
                (LocalSlot::Vector(view), SavedLocal::Vector(data, size)) => {
                    view.copy_from(&data);
                    view.set_size(size);
                }
                (LocalSlot::Str(cell), SavedLocal::Str(s)) => *cell.borrow_mut() = s,
                _ => {}
            }
        }
    }
}

fn name_error(name: &str, message: String) -> CompileErrors {
    CompileErrors::new(vec![CompileError {
        kind: CompileErrorKind::Semantic,
        span: 0..0,
        line: 1,
        column: 1,
        message: format!("function '{name}': {message}"),
    }])
}

/// Registry for composed functions.
///
/// Owns a dedicated function [`SymbolTable`] that expressions chain
/// into their compilation; the compositor must outlive every
/// expression compiled against it.
pub struct Compositor {
    table: SymbolTable,
    aux: Vec<SymbolTable>,
    compilation_check: Option<CompilationCheckRef>,
    resolver: Option<Rc<RefCell<dyn UnknownSymbolResolver>>>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    /// Create an empty compositor with its own function table.
    pub fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            aux: Vec::new(),
            compilation_check: None,
            resolver: None,
        }
    }

    /// Install a compile-time continuation check, polled while function
    /// bodies compile, exactly as on [`Parser`].
    pub fn register_compilation_check(&mut self, check: CompilationCheckRef) {
        self.compilation_check = Some(check);
    }

    /// Install an unknown-symbol resolver consulted while function
    /// bodies compile; created names land in the function table.
    pub fn set_unknown_symbol_resolver(
        &mut self,
        resolver: Rc<RefCell<dyn UnknownSymbolResolver>>,
    ) {
        self.resolver = Some(resolver);
    }

    /// The function table. Chain this into `compile` calls that should
    /// see the composed functions.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.table
    }

    /// Add a table whose symbols function bodies may reference
    /// (host variables, native functions, other compositors).
    pub fn add_auxiliary_symbol_table(&mut self, table: &SymbolTable) {
        self.aux.push(table.clone());
    }

    /// Declare `name(params...)` without a body yet.
    ///
    /// The stub makes the name resolvable so a later definition can
    /// reference it before its own `add` runs; this is what makes
    /// mutual recursion between two definitions possible. Calling a
    /// stub that never receives a body is a
    /// [`FunctionUndefined`](crate::EvalError::FunctionUndefined)
    /// runtime error.
    pub fn forward(&mut self, name: &str, params: &[&str]) -> Result<(), CompileErrors> {
        if self.table.contains(name) {
            return Err(name_error(name, "already defined".to_owned()));
        }
        check_params(name, params)?;
        let stub = make_stub(name, params.len());
        if !self.table.add_composed_function(name, stub) {
            return Err(name_error(name, "invalid function name".to_owned()));
        }
        log::debug!("composed function '{name}' declared (arity {})", params.len());
        Ok(())
    }

    /// Define `name(params...) := body`.
    ///
    /// The stub is registered before the body compiles, so the body
    /// may call `name` itself, any function defined earlier against
    /// the same compositor, or any [`forward`](Self::forward)-declared
    /// name awaiting its body.
    pub fn add(&mut self, name: &str, params: &[&str], body: &str) -> Result<(), CompileErrors> {
        check_params(name, params)?;

        // Phase one: the stub, so recursive references resolve. A
        // forward declaration already put one in the table; fill it so
        // call sites compiled against it stay bound.
        let (stub, declared) = match self.table.get(name) {
            Some(Symbol::Function(FunctionEntry::Composed(def))) if def.borrow().body.is_none() => {
                let arity = def.borrow().arity();
                if arity != params.len() {
                    return Err(name_error(
                        name,
                        format!(
                            "declared with {arity} parameter(s), defined with {}",
                            params.len()
                        ),
                    ));
                }
                (def, true)
            }
            Some(_) => return Err(name_error(name, "already defined".to_owned())),
            None => {
                let stub = make_stub(name, params.len());
                if !self.table.add_composed_function(name, stub.clone()) {
                    return Err(name_error(name, "invalid function name".to_owned()));
                }
                (stub, false)
            }
        };
        let cells: Vec<(String, ScalarRef)> = {
            let def = stub.borrow();
            params
                .iter()
                .zip(def.params.iter())
                .map(|(p, c)| ((*p).to_owned(), c.clone()))
                .collect()
        };

        // Phase two: compile the body against params + function table
        // + auxiliary tables, under the registered hooks.
        let mut tables: Vec<&SymbolTable> = vec![&self.table];
        tables.extend(self.aux.iter());
        let mut parser = Parser::new();
        if let Some(check) = &self.compilation_check {
            parser.register_compilation_check(check.clone());
        }
        if let Some(resolver) = &self.resolver {
            parser.set_unknown_symbol_resolver(resolver.clone());
        }
        match parser.compile_function_body(body, &tables, &cells) {
            Ok((root, locals)) => {
                let mut def = stub.borrow_mut();
                def.body = Some(root);
                def.locals.extend(locals);
                log::debug!("composed function '{name}' registered (arity {})", params.len());
                Ok(())
            }
            Err(errors) => {
                // Roll back a stub this call created; a forward-declared
                // one stays, other bodies may already reference it.
                if !declared {
                    self.table.remove(name);
                }
                let wrapped = errors
                    .into_iter()
                    .map(|mut e| {
                        e.message = format!("in function '{name}': {}", e.message);
                        e
                    })
                    .collect();
                Err(CompileErrors::new(wrapped))
            }
        }
    }
}

fn check_params(name: &str, params: &[&str]) -> Result<(), CompileErrors> {
    let mut seen = Vec::new();
    for p in params {
        if seen.contains(p) {
            return Err(name_error(name, format!("duplicate parameter '{p}'")));
        }
        seen.push(p);
    }
    Ok(())
}

fn make_stub(name: &str, arity: usize) -> Rc<RefCell<ComposedFunction>> {
    let cells: Vec<ScalarRef> = (0..arity).map(|_| Rc::new(RefCell::new(0.0))).collect();
    Rc::new(RefCell::new(ComposedFunction {
        name: name.to_owned(),
        params: cells.clone(),
        locals: cells.into_iter().map(LocalSlot::Scalar).collect(),
        body: None,
    }))
}
