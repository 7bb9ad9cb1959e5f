//! Binding environment: named registry of scalars, vectors, strings,
//! constants and functions
//!
//! A [`SymbolTable`] is a cheaply clonable shared handle: clones share
//! state, so the same table can be chained into many compilations while
//! the host keeps mutating the values behind it. Expressions resolve
//! names against the table chain once, at compile time, and thereafter
//! reference the bound storage cells directly; registering new names
//! after compilation affects later compiles only.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::compositor::ComposedFunction;
use crate::native::{
    GenericFunction, GenericFunctionRef, ScalarFn, ScalarFunction, ScalarFunctionRef, Signature,
};
use crate::vector_view::VectorView;

/// Shared mutable cell behind a scalar variable binding.
pub type ScalarRef = Rc<RefCell<f64>>;
/// Shared mutable cell behind a string variable binding.
pub type StringRef = Rc<RefCell<String>>;

/// A function binding: native fixed-arity, native generic, or composed
/// (defined in the language itself).
#[derive(Clone)]
pub enum FunctionEntry {
    /// Fixed-arity scalar function
    Scalar(ScalarFunctionRef),
    /// Signature-driven generic function, with its parsed signature
    Generic {
        /// The host callable
        func: GenericFunctionRef,
        /// Parsed at registration so call sites dispatch cheaply
        signature: Signature,
    },
    /// In-language function registered through the
    /// [`Compositor`](crate::Compositor)
    Composed(Rc<RefCell<ComposedFunction>>),
}

impl std::fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionEntry::Scalar(func) => write!(f, "ScalarFunction(arity {})", func.arity()),
            FunctionEntry::Generic { signature, .. } => {
                write!(f, "GenericFunction({})", signature.describe())
            }
            FunctionEntry::Composed(func) => {
                write!(f, "ComposedFunction({})", func.borrow().name)
            }
        }
    }
}

/// One named binding in a symbol table.
#[derive(Debug, Clone)]
pub enum Symbol {
    /// Mutable scalar variable
    Scalar(ScalarRef),
    /// Vector (always held through a view)
    Vector(VectorView),
    /// Mutable string variable
    Str(StringRef),
    /// Named scalar constant; assignment to it never compiles
    Constant(f64),
    /// Callable
    Function(FunctionEntry),
}

/// Mutability mode of a whole table, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Assignment to symbols of this table is compile-legal (default).
    Mutable,
    /// Assignment to any symbol registered here is a compile-time
    /// semantic error; values may still be read.
    Immutable,
}

#[derive(Debug)]
struct TableInner {
    symbols: IndexMap<String, Symbol>,
    mutability: Mutability,
}

/// Named registry of bindings consulted during compilation.
///
/// Within one table each name maps to exactly one entry; registering a
/// duplicate returns `false`. Resolution across several tables chained
/// into one compile is first-registered-wins.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    inner: Rc<RefCell<TableInner>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SymbolTable {
    /// Create an empty mutable table.
    pub fn new() -> Self {
        Self::with_mutability(Mutability::Mutable)
    }

    /// Create an empty immutable table: its symbols can be read but
    /// never assigned to from compiled programs.
    pub fn new_immutable() -> Self {
        Self::with_mutability(Mutability::Immutable)
    }

    fn with_mutability(mutability: Mutability) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TableInner {
                symbols: IndexMap::new(),
                mutability,
            })),
        }
    }

    /// The table's mutability mode.
    pub fn mutability(&self) -> Mutability {
        self.inner.borrow().mutability
    }

    /// True when the table was created with [`new_immutable`](Self::new_immutable).
    pub fn is_immutable(&self) -> bool {
        self.mutability() == Mutability::Immutable
    }

    fn insert(&self, name: &str, symbol: Symbol) -> bool {
        if !valid_name(name) {
            return false;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.symbols.contains_key(name) {
            return false;
        }
        inner.symbols.insert(name.to_owned(), symbol);
        true
    }

    // ═══════════════════════════════════════════════════════════════════
    // Registration
    // ═══════════════════════════════════════════════════════════════════

    /// Register a scalar variable with an initial value.
    pub fn add_variable(&self, name: &str, value: f64) -> bool {
        self.insert(name, Symbol::Scalar(Rc::new(RefCell::new(value))))
    }

    /// Register a vector, taking ownership of its initial contents.
    pub fn add_vector(&self, name: &str, values: Vec<f64>) -> bool {
        self.insert(name, Symbol::Vector(VectorView::new(values)))
    }

    /// Register a name against an existing view. Every expression
    /// compiled against the name observes later `rebase`/`set_size`
    /// calls on the view without recompilation.
    pub fn add_vector_view(&self, name: &str, view: &VectorView) -> bool {
        self.insert(name, Symbol::Vector(view.clone()))
    }

    /// Register a string variable.
    pub fn add_stringvar(&self, name: &str, value: &str) -> bool {
        self.insert(name, Symbol::Str(Rc::new(RefCell::new(value.to_owned()))))
    }

    /// Register a named constant.
    pub fn add_constant(&self, name: &str, value: f64) -> bool {
        self.insert(name, Symbol::Constant(value))
    }

    /// Register the standard constants `pi`, `e`, `epsilon` and `inf`.
    pub fn add_constants(&self) {
        self.add_constant("pi", std::f64::consts::PI);
        self.add_constant("e", std::f64::consts::E);
        self.add_constant("epsilon", f64::EPSILON);
        self.add_constant("inf", f64::INFINITY);
    }

    /// Register a fixed-arity function from a closure.
    pub fn add_function<F>(&self, name: &str, arity: usize, func: F) -> bool
    where
        F: Fn(&[f64]) -> f64 + 'static,
    {
        self.add_scalar_function(name, Rc::new(ScalarFn::new(arity, func)))
    }

    /// Register a fixed-arity function known to be side-effect free;
    /// calls with constant arguments fold at compile time.
    pub fn add_pure_function<F>(&self, name: &str, arity: usize, func: F) -> bool
    where
        F: Fn(&[f64]) -> f64 + 'static,
    {
        self.add_scalar_function(name, Rc::new(ScalarFn::pure(arity, func)))
    }

    /// Register a [`ScalarFunction`] implementation (use this to carry
    /// a side-effect hint or host state).
    pub fn add_scalar_function(&self, name: &str, func: Rc<dyn ScalarFunction>) -> bool {
        self.insert(name, Symbol::Function(FunctionEntry::Scalar(func)))
    }

    /// Register a [`GenericFunction`]. Fails with a message when the
    /// declared signature does not parse.
    pub fn add_generic_function(
        &self,
        name: &str,
        func: Rc<dyn GenericFunction>,
    ) -> Result<bool, String> {
        let signature = Signature::parse(func.signature())?;
        Ok(self.insert(name, Symbol::Function(FunctionEntry::Generic { func, signature })))
    }

    pub(crate) fn add_composed_function(
        &self,
        name: &str,
        func: Rc<RefCell<ComposedFunction>>,
    ) -> bool {
        self.insert(name, Symbol::Function(FunctionEntry::Composed(func)))
    }

    /// Remove a binding. Returns `false` when the name is unknown.
    pub fn remove(&self, name: &str) -> bool {
        self.inner.borrow_mut().symbols.shift_remove(name).is_some()
    }

    /// Remove every scalar, vector and string variable, keeping
    /// constants and functions (REPL-style reset).
    pub fn clear_variables(&self) {
        self.inner.borrow_mut().symbols.retain(|_, symbol| {
            !matches!(
                symbol,
                Symbol::Scalar(_) | Symbol::Vector(_) | Symbol::Str(_)
            )
        });
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lookup
    // ═══════════════════════════════════════════════════════════════════

    /// Look up a binding. The returned symbol shares storage with the
    /// table's entry (handles are cheap clones).
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.inner.borrow().symbols.get(name).cloned()
    }

    /// Whether a binding exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().symbols.contains_key(name)
    }

    /// The shared cell behind a scalar variable, for host-side reads
    /// and writes between evaluations.
    pub fn variable_ref(&self, name: &str) -> Option<ScalarRef> {
        match self.get(name)? {
            Symbol::Scalar(cell) => Some(cell),
            _ => None,
        }
    }

    /// The view behind a vector binding.
    pub fn vector(&self, name: &str) -> Option<VectorView> {
        match self.get(name)? {
            Symbol::Vector(view) => Some(view),
            _ => None,
        }
    }

    /// The shared cell behind a string variable.
    pub fn string_ref(&self, name: &str) -> Option<StringRef> {
        match self.get(name)? {
            Symbol::Str(cell) => Some(cell),
            _ => None,
        }
    }

    /// Current value of a scalar variable or constant.
    pub fn get_variable(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Symbol::Scalar(cell) => Some(*cell.borrow()),
            Symbol::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Overwrite a scalar variable. Returns `false` for unknown names
    /// and non-scalar bindings (constants are not assignable this way).
    pub fn set_variable(&self, name: &str, value: f64) -> bool {
        match self.get(name) {
            Some(Symbol::Scalar(cell)) => {
                *cell.borrow_mut() = value;
                true
            }
            _ => false,
        }
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.borrow().symbols.keys().cloned().collect()
    }

    /// Names of all registered functions, in registration order.
    pub fn get_function_list(&self) -> Vec<String> {
        self.inner
            .borrow()
            .symbols
            .iter()
            .filter(|(_, s)| matches!(s, Symbol::Function(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether two handles refer to the same underlying table.
    pub fn same_table(&self, other: &SymbolTable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
