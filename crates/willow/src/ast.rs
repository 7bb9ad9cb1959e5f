//! The compiled program tree
//!
//! Nodes are produced by the parser with every name already resolved:
//! variable references hold the shared storage cells registered in the
//! symbol tables, vector references hold view handles, and function
//! call sites hold the matched callable. Composed-function call sites
//! hold a weak handle resolved through the function table at call time,
//! so recursion never embeds a true reference cycle.

use std::cell::RefCell;
use std::rc::Weak;

use crate::compositor::ComposedFunction;
use crate::error::Span;
use crate::native::{GenericFunctionRef, ScalarFunctionRef};
use crate::symbol_table::{ScalarRef, StringRef};
use crate::vector_view::VectorView;

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// Comparison operator. Operates on two scalars or two strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Logical operator over truthiness (non-zero is true).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Xor,
    Nand,
    Nor,
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// An assignable place.
pub enum LValue {
    /// A scalar variable cell
    Scalar(ScalarRef),
    /// One element of a vector
    VectorElem {
        vec: VectorView,
        index: Box<Node>,
        span: Span,
    },
    /// A whole vector: scalar right-hand sides broadcast, vector
    /// right-hand sides copy elementwise
    Vector(VectorView),
    /// An inclusive range of a vector; scalar right-hand sides
    /// broadcast over the range
    VectorSlice {
        vec: VectorView,
        lo: Option<Box<Node>>,
        hi: Option<Box<Node>>,
        span: Span,
    },
    /// A string variable cell
    Str(StringRef),
}

/// Source of a vector argument at a call site.
pub enum VecSource {
    /// A named vector: passed as a live, writable view
    View(VectorView),
    /// A computed vector expression: materialized into a temporary
    /// view at call time (writes are discarded)
    Expr(Box<Node>),
}

/// One argument at a generic-function call site or in a `return` list.
/// The kind is fixed at compile time by the operand's static type.
pub enum CallArg {
    Scalar(Node),
    Str(Node),
    Vector(VecSource),
}

/// Initializer of a local vector declaration `var v[n] := ...`.
pub enum VecInit {
    /// `[x]`: fill every element with one value
    Fill(Box<Node>),
    /// `[v0, v1, ...]`: elementwise values, remainder zero-filled
    List(Vec<Node>),
    /// `[start : step]`: range fill, `v[i] = start + i * step`
    Range { start: Box<Node>, step: Box<Node> },
}

/// One `case`/`default` arm of a switch.
pub struct SwitchCase {
    pub condition: Node,
    pub value: Node,
}

/// A compiled program node. Owned exclusively by its expression; forms
/// a tree.
pub enum Node {
    /// Numeric literal (also the result of constant folding)
    Number(f64),
    /// String literal
    Str(String),
    /// Resolved scalar variable reference
    Variable(ScalarRef),
    /// Resolved string variable reference
    StringVar(StringRef),
    /// Whole-vector read (vector-typed operand)
    VectorRead(VectorView),
    /// `v[index]`
    VectorElem {
        vec: VectorView,
        index: Box<Node>,
        span: Span,
    },
    /// `v[]`: the logical size
    VectorSize(VectorView),
    /// `v[lo:hi]`, inclusive; omitted bounds default to the ends
    VectorSlice {
        vec: VectorView,
        lo: Option<Box<Node>>,
        hi: Option<Box<Node>>,
        span: Span,
    },
    /// `s[lo:hi]` over a string-typed operand
    StringSlice {
        value: Box<Node>,
        lo: Option<Box<Node>>,
        hi: Option<Box<Node>>,
        span: Span,
    },
    /// Arithmetic; `Add` also concatenates strings and all operators
    /// map elementwise over vector operands
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// Comparison producing `1.0`/`0.0`
    Compare {
        op: CompareOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// Logical operators; `and`/`or` short-circuit
    Logic {
        op: LogicOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// Unary negation / logical not
    Unary { op: UnaryOp, operand: Box<Node> },
    /// Assignment; evaluates to the assigned value
    Assign {
        target: LValue,
        op: AssignOp,
        value: Box<Node>,
        span: Span,
    },
    /// `a <=> b`
    Swap {
        a: LValue,
        b: LValue,
        span: Span,
    },
    /// Statement sequence; evaluates to its last statement's value
    Block(Vec<Node>),
    /// `if / else if / else`; an untaken `if` yields `0`
    If {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    /// `switch { case c : v; ... default : v; }`
    Switch {
        cases: Vec<SwitchCase>,
        default_case: Option<Box<Node>>,
        /// `[*]` form: evaluate every matching case, yield the last
        all_matching: bool,
    },
    /// `for (init; cond; step) body`
    For {
        init: Option<Box<Node>>,
        cond: Option<Box<Node>>,
        step: Option<Box<Node>>,
        body: Box<Node>,
        span: Span,
    },
    /// `while (cond) body`
    While {
        cond: Box<Node>,
        body: Box<Node>,
        span: Span,
    },
    /// `repeat body until (cond)`
    Repeat {
        body: Box<Node>,
        until: Box<Node>,
        span: Span,
    },
    /// `break` / `break[value]`
    Break { value: Option<Box<Node>> },
    /// `continue`
    Continue,
    /// `return [v0, v1, ...]`
    Return { args: Vec<CallArg> },
    /// Call of a fixed-arity native function
    ScalarCall {
        name: String,
        func: ScalarFunctionRef,
        args: Vec<Node>,
    },
    /// Call of a generic native function; the overload index was
    /// resolved at compile time
    GenericCall {
        name: String,
        func: GenericFunctionRef,
        overload: usize,
        /// The function declared string-return mode
        string_result: bool,
        args: Vec<CallArg>,
    },
    /// Call of a composed (in-language) function, resolved through the
    /// function table by weak handle
    ComposedCall {
        name: String,
        func: Weak<RefCell<ComposedFunction>>,
        args: Vec<Node>,
    },
    /// Runs the initializer of `var v[n] := [...]` each time the
    /// declaration statement executes
    VectorInit { vec: VectorView, init: VecInit },
    /// `assert(cond)`
    Assert {
        cond: Box<Node>,
        message: String,
        span: Span,
    },
}

impl Node {
    /// Literal scalar payload, when this node is a number literal.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Node::Number(n) => Some(*n),
            _ => None,
        }
    }
}
