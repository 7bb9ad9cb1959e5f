//! Compiler from source text to an executable [`Expression`]
//!
//! Compilation is a single pass over a precedence-climbing parser. Name
//! resolution happens here, not at evaluation time: identifiers are
//! looked up through the chained symbol tables (first-registered wins,
//! with the built-in function table consulted last) and the produced
//! nodes hold the resolved storage cells and callables directly.
//!
//! The parser recovers at statement boundaries, so one `compile` call
//! reports as many diagnostics as it can find. Constant subexpressions
//! fold during parsing, including calls of side-effect-free functions
//! with literal arguments.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{
    AssignOp, BinaryOp, CallArg, CompareOp, LValue, LogicOp, Node, SwitchCase, UnaryOp, VecInit,
    VecSource,
};
use crate::builtins;
use crate::compositor::{ComposedFunction, LocalSlot};
use crate::error::{CompileError, CompileErrorKind, CompileErrors, Span};
use crate::eval::binary::{apply_binary, apply_compare, apply_logic};
use crate::eval::EvalState;
use crate::expression::Expression;
use crate::governance::{
    AssertCheckRef, CompilationCheckRef, LoopRuntimeCheckRef, VectorAccessCheckRef,
};
use crate::lexer::{tokenize, LineIndex, Spanned, Token};
use crate::native::{Signature, TypeTag};
use crate::symbol_table::{FunctionEntry, ScalarRef, StringRef, Symbol, SymbolTable};
use crate::vector_view::VectorView;

/// Supplies values for names not found in any chained symbol table.
///
/// When installed on a [`Parser`], each unresolved identifier is
/// offered to the resolver; a `Some` answer registers the name as a
/// fresh scalar variable in the first mutable chained table, so later
/// compiles against the same tables see it too.
pub trait UnknownSymbolResolver {
    /// Initial value for `name`, or `None` to reject it.
    fn resolve(&mut self, name: &str) -> Option<f64>;
}

/// The default resolver: every unknown name becomes a variable
/// initialized to zero.
pub struct ZeroResolver;

impl UnknownSymbolResolver for ZeroResolver {
    fn resolve(&mut self, _name: &str) -> Option<f64> {
        Some(0.0)
    }
}

type ResolverRef = Rc<RefCell<dyn UnknownSymbolResolver>>;

/// How often the compilation-continuation check is polled, in parse
/// steps.
const CHECK_INTERVAL: u32 = 64;

/// Diagnostics past this count are dropped and parsing stops.
const MAX_ERRORS: usize = 32;

/// Compiles source text against symbol tables, producing expressions.
///
/// A parser carries the registered governance hooks and the optional
/// unknown-symbol resolver; the hooks registered at compile time are
/// the ones each produced [`Expression`] consults while evaluating.
pub struct Parser {
    compilation_check: Option<CompilationCheckRef>,
    loop_check: Option<LoopRuntimeCheckRef>,
    vector_check: Option<VectorAccessCheckRef>,
    assert_check: Option<AssertCheckRef>,
    resolver: Option<ResolverRef>,
    builtins: SymbolTable,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser with no hooks and no resolver.
    pub fn new() -> Self {
        Self {
            compilation_check: None,
            loop_check: None,
            vector_check: None,
            assert_check: None,
            resolver: None,
            builtins: builtins::standard_table(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Hook registration
    // ═══════════════════════════════════════════════════════════════════

    /// Install a compile-time continuation check, polled periodically
    /// while parsing; an abort surfaces as a `Timeout` diagnostic.
    pub fn register_compilation_check(&mut self, check: CompilationCheckRef) {
        self.compilation_check = Some(check);
    }

    /// Remove the compilation check.
    pub fn clear_compilation_check(&mut self) {
        self.compilation_check = None;
    }

    /// Install a loop runtime check; expressions compiled afterwards
    /// consult it on every covered loop iteration.
    pub fn register_loop_runtime_check(&mut self, check: LoopRuntimeCheckRef) {
        self.loop_check = Some(check);
    }

    /// Remove the loop runtime check.
    pub fn clear_loop_runtime_check(&mut self) {
        self.loop_check = None;
    }

    /// Install a vector access check, consulted when an index or range
    /// falls outside a vector's logical size.
    pub fn register_vector_access_check(&mut self, check: VectorAccessCheckRef) {
        self.vector_check = Some(check);
    }

    /// Remove the vector access check.
    pub fn clear_vector_access_check(&mut self) {
        self.vector_check = None;
    }

    /// Install an assert check, consulted when an `assert(..)` fails.
    /// Without one, failed assertions evaluate to `0` and continue.
    pub fn register_assert_check(&mut self, check: AssertCheckRef) {
        self.assert_check = Some(check);
    }

    /// Remove the assert check.
    pub fn clear_assert_check(&mut self) {
        self.assert_check = None;
    }

    /// Install the default resolver: unknown names become variables
    /// initialized to zero.
    pub fn enable_unknown_symbol_resolver(&mut self) {
        self.resolver = Some(Rc::new(RefCell::new(ZeroResolver)));
    }

    /// Install a custom resolver.
    pub fn set_unknown_symbol_resolver(&mut self, resolver: ResolverRef) {
        self.resolver = Some(resolver);
    }

    /// Remove the resolver; unknown names are compile errors again.
    pub fn disable_unknown_symbol_resolver(&mut self) {
        self.resolver = None;
    }

    // ═══════════════════════════════════════════════════════════════════
    // Compilation
    // ═══════════════════════════════════════════════════════════════════

    /// Compile a program against a chain of symbol tables.
    ///
    /// Tables are consulted in the given order and the built-in
    /// function table last, so a host registration shadows a built-in
    /// of the same name. The expression keeps handles to every chained
    /// table, which keeps the bound storage alive.
    pub fn compile(
        &mut self,
        source: &str,
        tables: &[&SymbolTable],
    ) -> Result<Expression, CompileErrors> {
        let mut ctx = Ctx::new(
            source,
            tables,
            &self.builtins,
            self.compilation_check.clone(),
            self.resolver.clone(),
        );
        let stmts = ctx.statement_list(Terminator::Eof);
        if stmts.is_empty() && ctx.errors.is_empty() {
            ctx.error(CompileErrorKind::Syntax, 0..0, "empty program".to_owned());
        }
        if !ctx.errors.is_empty() {
            log::debug!("compilation failed with {} error(s)", ctx.errors.len());
            return Err(CompileErrors::new(ctx.errors));
        }
        let state = EvalState::new(
            self.loop_check.clone(),
            self.vector_check.clone(),
            self.assert_check.clone(),
        );
        Ok(Expression::new(
            Node::Block(stmts),
            state,
            ctx.tables,
            ctx.retained,
        ))
    }

    /// Compile a function body for the [`Compositor`](crate::Compositor):
    /// parameters seed the outer scope and the body's local
    /// declarations are collected for frame save/restore.
    pub(crate) fn compile_function_body(
        &mut self,
        source: &str,
        tables: &[&SymbolTable],
        params: &[(String, ScalarRef)],
    ) -> Result<(Node, Vec<LocalSlot>), CompileErrors> {
        let mut ctx = Ctx::new(
            source,
            tables,
            &self.builtins,
            self.compilation_check.clone(),
            self.resolver.clone(),
        );
        for (name, cell) in params {
            ctx.scopes[0].insert(name.clone(), Local::Scalar(cell.clone()));
        }
        let stmts = ctx.statement_list(Terminator::Eof);
        if stmts.is_empty() && ctx.errors.is_empty() {
            ctx.error(
                CompileErrorKind::Syntax,
                0..0,
                "empty function body".to_owned(),
            );
        }
        if !ctx.errors.is_empty() {
            return Err(CompileErrors::new(ctx.errors));
        }
        Ok((Node::Block(stmts), ctx.locals))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parse context
// ═══════════════════════════════════════════════════════════════════════

/// Static type of a parsed subexpression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    Scalar,
    Str,
    Vector,
}

impl Ty {
    fn name(self) -> &'static str {
        match self {
            Ty::Scalar => "scalar",
            Ty::Str => "string",
            Ty::Vector => "vector",
        }
    }

    fn tag(self) -> TypeTag {
        match self {
            Ty::Scalar => TypeTag::Scalar,
            Ty::Str => TypeTag::Str,
            Ty::Vector => TypeTag::Vector,
        }
    }
}

/// A parsed subexpression with its static type and source range.
/// `readonly` marks operands resolved from an immutable table.
struct PExpr {
    node: Node,
    ty: Ty,
    readonly: bool,
    span: Span,
}

impl PExpr {
    fn new(node: Node, ty: Ty, span: Span) -> Self {
        Self {
            node,
            ty,
            readonly: false,
            span,
        }
    }

    fn number(value: f64, span: Span) -> Self {
        Self::new(Node::Number(value), Ty::Scalar, span)
    }
}

/// A name declared with `var` (or a function parameter) in some
/// enclosing lexical scope.
#[derive(Clone)]
enum Local {
    Scalar(ScalarRef),
    Vector(VectorView),
    Str(StringRef),
    Const(f64),
}

/// What ends a statement list.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Eof,
    Brace,
    Until,
}

enum OpKind {
    Bin(BinaryOp),
    Cmp(CompareOp),
    Log(LogicOp),
    Assign(AssignOp),
    Swap,
    Ternary,
}

struct Ctx<'s> {
    source: &'s str,
    tokens: Vec<Spanned>,
    pos: usize,
    lines: LineIndex,
    errors: Vec<CompileError>,
    aborted: bool,
    timed_out: bool,
    tables: Vec<SymbolTable>,
    scopes: Vec<IndexMap<String, Local>>,
    locals: Vec<LocalSlot>,
    loop_depth: usize,
    steps: u32,
    check: Option<CompilationCheckRef>,
    resolver: Option<ResolverRef>,
    retained: Vec<Rc<RefCell<ComposedFunction>>>,
}

impl<'s> Ctx<'s> {
    fn new(
        source: &'s str,
        tables: &[&SymbolTable],
        builtins: &SymbolTable,
        check: Option<CompilationCheckRef>,
        resolver: Option<ResolverRef>,
    ) -> Self {
        let lines = LineIndex::new(source);
        let mut errors = Vec::new();
        let mut tokens = Vec::new();
        // Malformed tokens become diagnostics up front and are dropped
        // from the stream, so parsing continues around them.
        for spanned in tokenize(source) {
            if let Token::Error(lexeme) = &spanned.token {
                let (line, column) = lines.line_col(spanned.span.start);
                errors.push(CompileError {
                    kind: CompileErrorKind::Lex,
                    span: spanned.span.clone(),
                    line,
                    column,
                    message: format!("invalid token '{lexeme}'"),
                });
            } else {
                tokens.push(spanned);
            }
        }
        let mut all_tables: Vec<SymbolTable> = tables.iter().map(|t| (*t).clone()).collect();
        all_tables.push(builtins.clone());
        Self {
            source,
            tokens,
            pos: 0,
            lines,
            errors,
            aborted: false,
            timed_out: false,
            tables: all_tables,
            scopes: vec![IndexMap::new()],
            locals: Vec::new(),
            loop_depth: 0,
            steps: 0,
            check,
            resolver,
            retained: Vec::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Token plumbing and diagnostics
    // ═══════════════════════════════════════════════════════════════════

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(s) => s.span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    fn prev_span_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn advance(&mut self) -> Option<Spanned> {
        let s = self.tokens.get(self.pos).cloned();
        if s.is_some() {
            self.pos += 1;
        }
        s
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume `token` or report a syntax error. Returns the end byte
    /// offset of the consumed token.
    fn expect(&mut self, token: &Token, context: &str) -> Option<usize> {
        if self.peek() == Some(token) {
            let end = self.tokens[self.pos].span.end;
            self.pos += 1;
            Some(end)
        } else {
            let found = match self.peek() {
                Some(t) => t.describe(),
                None => "end of input".to_owned(),
            };
            let span = self.current_span();
            self.error(
                CompileErrorKind::Syntax,
                span,
                format!("expected {} {context}, found {found}", token.describe()),
            );
            None
        }
    }

    fn error(&mut self, kind: CompileErrorKind, span: Span, message: String) {
        if self.errors.len() >= MAX_ERRORS {
            self.aborted = true;
            return;
        }
        let (line, column) = self.lines.line_col(span.start);
        self.errors.push(CompileError {
            kind,
            span,
            line,
            column,
            message,
        });
    }

    /// Poll the compilation check. Returns false when parsing must
    /// stop (timeout or too many errors).
    fn step(&mut self) -> bool {
        if self.aborted || self.timed_out {
            return false;
        }
        self.steps += 1;
        if self.steps % CHECK_INTERVAL == 0 {
            if let Some(check) = self.check.clone() {
                if let Err(reason) = check.borrow_mut().continue_compilation() {
                    let span = self.current_span();
                    self.error(
                        CompileErrorKind::Timeout,
                        span,
                        format!("compilation aborted: {reason}"),
                    );
                    self.timed_out = true;
                    return false;
                }
            }
        }
        true
    }

    /// Skip forward to the next statement boundary after an error.
    fn synchronize(&mut self) {
        loop {
            match self.peek() {
                None | Some(Token::RBrace) | Some(Token::Until) => return,
                Some(Token::Semicolon) => {
                    self.pos += 1;
                    return;
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════

    fn at_terminator(&self, term: Terminator) -> bool {
        match term {
            Terminator::Eof => self.peek().is_none(),
            Terminator::Brace => matches!(self.peek(), Some(Token::RBrace) | None),
            Terminator::Until => matches!(self.peek(), Some(Token::Until) | None),
        }
    }

    fn statement_list(&mut self, term: Terminator) -> Vec<Node> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(&Token::Semicolon) {}
            if self.at_terminator(term) || self.aborted || self.timed_out {
                break;
            }
            match self.statement() {
                Some(node) => stmts.push(node),
                None => {
                    self.synchronize();
                    continue;
                }
            }
            // Separator: ';', or nothing after a '}'-terminated
            // statement or before the terminator.
            if self.eat(&Token::Semicolon) {
                continue;
            }
            if self.pos > 0 && self.tokens[self.pos - 1].token == Token::RBrace {
                continue;
            }
            if self.at_terminator(term) {
                break;
            }
            let found = match self.peek() {
                Some(t) => t.describe(),
                None => "end of input".to_owned(),
            };
            let span = self.current_span();
            self.error(
                CompileErrorKind::Syntax,
                span,
                format!("expected ';' between statements, found {found}"),
            );
            self.synchronize();
        }
        stmts
    }

    fn statement(&mut self) -> Option<Node> {
        if !self.step() {
            return None;
        }
        match self.peek()?.clone() {
            Token::Var | Token::Const => self.var_decl(),
            Token::If => self.if_stmt(),
            Token::Switch => self.switch_stmt(false),
            Token::LBracket if self.peek_at(1) == Some(&Token::Star) => {
                // [*] { case .. } evaluates every matching arm.
                self.pos += 2;
                self.expect(&Token::RBracket, "after '[*'")?;
                self.switch_body(true)
            }
            Token::For => self.for_stmt(),
            Token::While => self.while_stmt(),
            Token::Repeat => self.repeat_stmt(),
            Token::Break => self.break_stmt(),
            Token::Continue => {
                let span = self.current_span();
                self.pos += 1;
                if self.loop_depth == 0 {
                    self.error(
                        CompileErrorKind::Semantic,
                        span,
                        "'continue' outside of a loop".to_owned(),
                    );
                    return None;
                }
                Some(Node::Continue)
            }
            Token::Return => self.return_stmt(),
            Token::Assert => self.assert_stmt(),
            Token::LBrace => self.block(true),
            Token::Tilde => {
                self.pos += 1;
                self.block(false)
            }
            _ => self.expr_bp(0).map(|e| e.node),
        }
    }

    /// `{ ... }`; scoped blocks introduce a fresh lexical scope,
    /// `~{ ... }` shares the enclosing one.
    fn block(&mut self, scoped: bool) -> Option<Node> {
        self.expect(&Token::LBrace, "to open a block")?;
        if scoped {
            self.scopes.push(IndexMap::new());
        }
        let stmts = self.statement_list(Terminator::Brace);
        if scoped {
            self.scopes.pop();
        }
        self.expect(&Token::RBrace, "to close the block")?;
        Some(Node::Block(stmts))
    }

    /// A loop or `if` body: a braced block or a single statement.
    fn branch(&mut self) -> Option<Node> {
        if self.peek() == Some(&Token::LBrace) {
            self.block(true)
        } else {
            self.statement()
        }
    }

    fn declare_local(&mut self, name: &str, span: Span, local: Local) -> bool {
        let taken = self.scopes.last().is_some_and(|s| s.contains_key(name));
        if taken {
            self.error(
                CompileErrorKind::Semantic,
                span,
                format!("'{name}' is already declared in this scope"),
            );
            return false;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), local);
        }
        true
    }

    fn var_decl(&mut self) -> Option<Node> {
        let start = self.current_span().start;
        let constant = self.eat(&Token::Const);
        self.expect(&Token::Var, "in declaration")?;
        let (name, name_span) = match self.advance() {
            Some(Spanned {
                token: Token::Ident(name),
                span,
            }) => (name, span),
            other => {
                let span = other.map_or_else(|| self.current_span(), |s| s.span);
                self.error(
                    CompileErrorKind::Syntax,
                    span,
                    "expected a name after 'var'".to_owned(),
                );
                return None;
            }
        };

        if self.eat(&Token::LBracket) {
            if constant {
                self.error(
                    CompileErrorKind::Semantic,
                    name_span,
                    "a vector declaration cannot be 'const'".to_owned(),
                );
                return None;
            }
            return self.vector_decl(name, name_span);
        }

        if !self.eat(&Token::Assign) {
            // Bare `var x;` defaults to zero.
            if constant {
                self.error(
                    CompileErrorKind::Semantic,
                    name_span,
                    format!("const variable '{name}' needs an initializer"),
                );
                return None;
            }
            let cell: ScalarRef = Rc::new(RefCell::new(0.0));
            if !self.declare_local(&name, name_span.clone(), Local::Scalar(cell.clone())) {
                return None;
            }
            self.locals.push(LocalSlot::Scalar(cell.clone()));
            return Some(Node::Assign {
                target: LValue::Scalar(cell),
                op: AssignOp::Set,
                value: Box::new(Node::Number(0.0)),
                span: start..name_span.end,
            });
        }

        let value = self.expr_bp(0)?;
        let span = start..value.span.end;

        if constant {
            let Some(v) = value.node.as_number() else {
                self.error(
                    CompileErrorKind::Semantic,
                    value.span,
                    format!("initializer of const variable '{name}' must be constant"),
                );
                return None;
            };
            if !self.declare_local(&name, name_span, Local::Const(v)) {
                return None;
            }
            return Some(Node::Number(v));
        }

        match value.ty {
            Ty::Scalar => {
                let cell: ScalarRef = Rc::new(RefCell::new(0.0));
                if !self.declare_local(&name, name_span, Local::Scalar(cell.clone())) {
                    return None;
                }
                self.locals.push(LocalSlot::Scalar(cell.clone()));
                Some(Node::Assign {
                    target: LValue::Scalar(cell),
                    op: AssignOp::Set,
                    value: Box::new(value.node),
                    span,
                })
            }
            Ty::Str => {
                let cell: StringRef = Rc::new(RefCell::new(String::new()));
                if !self.declare_local(&name, name_span, Local::Str(cell.clone())) {
                    return None;
                }
                self.locals.push(LocalSlot::Str(cell.clone()));
                Some(Node::Assign {
                    target: LValue::Str(cell),
                    op: AssignOp::Set,
                    value: Box::new(value.node),
                    span,
                })
            }
            Ty::Vector => {
                self.error(
                    CompileErrorKind::Semantic,
                    value.span,
                    format!("'{name}' needs a size to hold a vector, e.g. var {name}[n]"),
                );
                None
            }
        }
    }

    /// `var v[n]` with the opening bracket already consumed.
    fn vector_decl(&mut self, name: String, name_span: Span) -> Option<Node> {
        let size_expr = self.expr_bp(0)?;
        self.expect(&Token::RBracket, "after vector size")?;
        let size = match size_expr.node.as_number() {
            Some(n) if n >= 1.0 && n.fract() == 0.0 => n as usize,
            _ => {
                self.error(
                    CompileErrorKind::Semantic,
                    size_expr.span,
                    format!("size of vector '{name}' must be a positive constant integer"),
                );
                return None;
            }
        };
        let view = VectorView::zeroed(size);
        if !self.declare_local(&name, name_span.clone(), Local::Vector(view.clone())) {
            return None;
        }
        self.locals.push(LocalSlot::Vector(view.clone()));

        let init = if self.eat(&Token::Assign) {
            self.expect(&Token::LBracket, "to open the vector initializer")?;
            let first = self.expr_bp(0)?;
            self.require_scalar(&first)?;
            if self.eat(&Token::Colon) {
                let step = self.expr_bp(0)?;
                self.require_scalar(&step)?;
                self.expect(&Token::RBracket, "to close the vector initializer")?;
                VecInit::Range {
                    start: Box::new(first.node),
                    step: Box::new(step.node),
                }
            } else if self.peek() == Some(&Token::Comma) {
                let mut items = vec![first.node];
                while self.eat(&Token::Comma) {
                    let item = self.expr_bp(0)?;
                    self.require_scalar(&item)?;
                    items.push(item.node);
                }
                self.expect(&Token::RBracket, "to close the vector initializer")?;
                if items.len() > size {
                    self.error(
                        CompileErrorKind::Semantic,
                        name_span,
                        format!(
                            "initializer has {} elements but '{name}' holds {size}",
                            items.len()
                        ),
                    );
                    return None;
                }
                VecInit::List(items)
            } else {
                self.expect(&Token::RBracket, "to close the vector initializer")?;
                VecInit::Fill(Box::new(first.node))
            }
        } else {
            VecInit::Fill(Box::new(Node::Number(0.0)))
        };
        Some(Node::VectorInit { vec: view, init })
    }

    fn if_stmt(&mut self) -> Option<Node> {
        self.expect(&Token::If, "")?;
        self.expect(&Token::LParen, "after 'if'")?;
        let cond = self.expr_bp(0)?;
        self.require_scalar(&cond)?;
        self.expect(&Token::RParen, "after the condition")?;
        let then = self.branch()?;

        // `;` before `else` is part of the if statement.
        let has_else = if self.peek() == Some(&Token::Else) {
            true
        } else if self.peek() == Some(&Token::Semicolon) && self.peek_at(1) == Some(&Token::Else) {
            self.pos += 1;
            true
        } else {
            false
        };
        let otherwise = if has_else {
            self.expect(&Token::Else, "")?;
            Some(Box::new(if self.peek() == Some(&Token::If) {
                self.if_stmt()?
            } else {
                self.branch()?
            }))
        } else {
            None
        };
        Some(Node::If {
            cond: Box::new(cond.node),
            then: Box::new(then),
            otherwise,
        })
    }

    fn switch_stmt(&mut self, all_matching: bool) -> Option<Node> {
        self.expect(&Token::Switch, "")?;
        self.switch_body(all_matching)
    }

    fn switch_body(&mut self, all_matching: bool) -> Option<Node> {
        self.expect(&Token::LBrace, "to open the case list")?;
        let mut cases = Vec::new();
        let mut default_case = None;
        loop {
            match self.peek() {
                Some(Token::Case) => {
                    self.pos += 1;
                    let cond = self.expr_bp(0)?;
                    self.require_scalar(&cond)?;
                    self.expect(&Token::Colon, "after the case condition")?;
                    let value = self.expr_bp(0)?;
                    self.expect(&Token::Semicolon, "after the case value")?;
                    cases.push(SwitchCase {
                        condition: cond.node,
                        value: value.node,
                    });
                }
                Some(Token::Default) => {
                    self.pos += 1;
                    if all_matching {
                        let span = self.current_span();
                        self.error(
                            CompileErrorKind::Semantic,
                            span,
                            "'[*]' case lists cannot have a default".to_owned(),
                        );
                    }
                    self.expect(&Token::Colon, "after 'default'")?;
                    let value = self.expr_bp(0)?;
                    self.expect(&Token::Semicolon, "after the default value")?;
                    if default_case.is_some() {
                        let span = self.current_span();
                        self.error(
                            CompileErrorKind::Semantic,
                            span,
                            "duplicate 'default' case".to_owned(),
                        );
                    }
                    default_case = Some(Box::new(value.node));
                }
                Some(Token::RBrace) => break,
                _ => {
                    let span = self.current_span();
                    self.error(
                        CompileErrorKind::Syntax,
                        span,
                        "expected 'case', 'default' or '}' in case list".to_owned(),
                    );
                    return None;
                }
            }
        }
        self.expect(&Token::RBrace, "to close the case list")?;
        if cases.is_empty() && default_case.is_none() {
            let span = self.current_span();
            self.error(
                CompileErrorKind::Semantic,
                span,
                "a case list needs at least one case".to_owned(),
            );
            return None;
        }
        Some(Node::Switch {
            cases,
            default_case,
            all_matching,
        })
    }

    fn for_stmt(&mut self) -> Option<Node> {
        let start = self.current_span().start;
        self.expect(&Token::For, "")?;
        self.expect(&Token::LParen, "after 'for'")?;
        self.scopes.push(IndexMap::new());
        let result = self.for_header_and_body(start);
        self.scopes.pop();
        result
    }

    fn for_header_and_body(&mut self, start: usize) -> Option<Node> {
        let init = if self.peek() == Some(&Token::Semicolon) {
            None
        } else if matches!(self.peek(), Some(Token::Var)) {
            Some(Box::new(self.var_decl()?))
        } else {
            Some(Box::new(self.expr_bp(0)?.node))
        };
        self.expect(&Token::Semicolon, "after the loop initializer")?;
        let cond = if self.peek() == Some(&Token::Semicolon) {
            None
        } else {
            let c = self.expr_bp(0)?;
            self.require_scalar(&c)?;
            Some(Box::new(c.node))
        };
        self.expect(&Token::Semicolon, "after the loop condition")?;
        let step = if self.peek() == Some(&Token::RParen) {
            None
        } else {
            Some(Box::new(self.expr_bp(0)?.node))
        };
        let header_end = self.expect(&Token::RParen, "to close the loop header")?;
        self.loop_depth += 1;
        let body = self.branch();
        self.loop_depth -= 1;
        Some(Node::For {
            init,
            cond,
            step,
            body: Box::new(body?),
            span: start..header_end,
        })
    }

    fn while_stmt(&mut self) -> Option<Node> {
        let start = self.current_span().start;
        self.expect(&Token::While, "")?;
        self.expect(&Token::LParen, "after 'while'")?;
        let cond = self.expr_bp(0)?;
        self.require_scalar(&cond)?;
        let header_end = self.expect(&Token::RParen, "after the condition")?;
        self.loop_depth += 1;
        let body = self.branch();
        self.loop_depth -= 1;
        Some(Node::While {
            cond: Box::new(cond.node),
            body: Box::new(body?),
            span: start..header_end,
        })
    }

    fn repeat_stmt(&mut self) -> Option<Node> {
        let start = self.current_span().start;
        self.expect(&Token::Repeat, "")?;
        self.loop_depth += 1;
        let stmts = self.statement_list(Terminator::Until);
        self.loop_depth -= 1;
        self.expect(&Token::Until, "to end the repeat body")?;
        self.expect(&Token::LParen, "after 'until'")?;
        let cond = self.expr_bp(0)?;
        self.require_scalar(&cond)?;
        let end = self.expect(&Token::RParen, "after the condition")?;
        Some(Node::Repeat {
            body: Box::new(Node::Block(stmts)),
            until: Box::new(cond.node),
            span: start..end,
        })
    }

    fn break_stmt(&mut self) -> Option<Node> {
        let span = self.current_span();
        self.expect(&Token::Break, "")?;
        if self.loop_depth == 0 {
            self.error(
                CompileErrorKind::Semantic,
                span,
                "'break' outside of a loop".to_owned(),
            );
            return None;
        }
        let value = if self.eat(&Token::LBracket) {
            let v = self.expr_bp(0)?;
            self.require_scalar(&v)?;
            self.expect(&Token::RBracket, "after the break value")?;
            Some(Box::new(v.node))
        } else {
            None
        };
        Some(Node::Break { value })
    }

    fn return_stmt(&mut self) -> Option<Node> {
        self.expect(&Token::Return, "")?;
        self.expect(&Token::LBracket, "after 'return'")?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RBracket) {
            loop {
                let arg = self.expr_bp(0)?;
                args.push(self.into_call_arg(arg));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RBracket, "to close the return list")?;
        Some(Node::Return { args })
    }

    fn assert_stmt(&mut self) -> Option<Node> {
        let start = self.current_span().start;
        self.expect(&Token::Assert, "")?;
        self.expect(&Token::LParen, "after 'assert'")?;
        let cond_start = self.current_span().start;
        let cond = self.expr_bp(0)?;
        self.require_scalar(&cond)?;
        let cond_end = self.prev_span_end();
        let end = self.expect(&Token::RParen, "after the assertion")?;
        let message = self.source[cond_start..cond_end].trim().to_owned();
        Some(Node::Assert {
            cond: Box::new(cond.node),
            message,
            span: start..end,
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions (precedence climbing)
    // ═══════════════════════════════════════════════════════════════════

    fn expr_bp(&mut self, min_bp: u8) -> Option<PExpr> {
        if !self.step() {
            return None;
        }
        let mut lhs = self.prefix()?;
        loop {
            let Some(tok) = self.peek() else { break };
            let implied_mul = matches!(tok, Token::Ident(_) | Token::LParen)
                && self.pos > 0
                && matches!(
                    self.tokens[self.pos - 1].token,
                    Token::Number(_) | Token::Ident(_) | Token::RParen | Token::RBracket
                );
            let (kind, l_bp, r_bp, consume) = match tok {
                Token::Assign => (OpKind::Assign(AssignOp::Set), 2, 1, true),
                Token::AddAssign => (OpKind::Assign(AssignOp::Add), 2, 1, true),
                Token::SubAssign => (OpKind::Assign(AssignOp::Sub), 2, 1, true),
                Token::MulAssign => (OpKind::Assign(AssignOp::Mul), 2, 1, true),
                Token::DivAssign => (OpKind::Assign(AssignOp::Div), 2, 1, true),
                Token::ModAssign => (OpKind::Assign(AssignOp::Mod), 2, 1, true),
                Token::SwapOp => (OpKind::Swap, 2, 1, true),
                Token::Question => (OpKind::Ternary, 4, 3, true),
                Token::Or => (OpKind::Log(LogicOp::Or), 5, 6, true),
                Token::Nor => (OpKind::Log(LogicOp::Nor), 5, 6, true),
                Token::Xor => (OpKind::Log(LogicOp::Xor), 5, 6, true),
                Token::Nand => (OpKind::Log(LogicOp::Nand), 5, 6, true),
                Token::And => (OpKind::Log(LogicOp::And), 7, 8, true),
                Token::EqEq | Token::Eq => (OpKind::Cmp(CompareOp::Eq), 9, 10, true),
                Token::Ne | Token::NeAlt => (OpKind::Cmp(CompareOp::Ne), 9, 10, true),
                Token::Lt => (OpKind::Cmp(CompareOp::Lt), 9, 10, true),
                Token::Le => (OpKind::Cmp(CompareOp::Le), 9, 10, true),
                Token::Gt => (OpKind::Cmp(CompareOp::Gt), 9, 10, true),
                Token::Ge => (OpKind::Cmp(CompareOp::Ge), 9, 10, true),
                Token::Plus => (OpKind::Bin(BinaryOp::Add), 11, 12, true),
                Token::Minus => (OpKind::Bin(BinaryOp::Sub), 11, 12, true),
                Token::Star => (OpKind::Bin(BinaryOp::Mul), 13, 14, true),
                Token::Slash => (OpKind::Bin(BinaryOp::Div), 13, 14, true),
                Token::Percent => (OpKind::Bin(BinaryOp::Mod), 13, 14, true),
                Token::Caret => (OpKind::Bin(BinaryOp::Pow), 18, 17, true),
                // Adjacency multiplication: `2x`, `3(x + 1)`.
                _ if implied_mul => (OpKind::Bin(BinaryOp::Mul), 13, 14, false),
                _ => break,
            };
            if l_bp < min_bp {
                break;
            }
            if consume {
                self.pos += 1;
            }
            lhs = match kind {
                OpKind::Bin(op) => {
                    let rhs = self.expr_bp(r_bp)?;
                    self.make_binary(op, lhs, rhs)?
                }
                OpKind::Cmp(op) => {
                    let rhs = self.expr_bp(r_bp)?;
                    self.make_compare(op, lhs, rhs)?
                }
                OpKind::Log(op) => {
                    let rhs = self.expr_bp(r_bp)?;
                    self.make_logic(op, lhs, rhs)?
                }
                OpKind::Assign(op) => {
                    let rhs = self.expr_bp(r_bp)?;
                    self.make_assign(lhs, op, rhs)?
                }
                OpKind::Swap => {
                    let rhs = self.expr_bp(r_bp)?;
                    self.make_swap(lhs, rhs)?
                }
                OpKind::Ternary => {
                    self.require_scalar(&lhs)?;
                    let then = self.expr_bp(0)?;
                    self.expect(&Token::Colon, "in conditional expression")?;
                    let otherwise = self.expr_bp(r_bp)?;
                    let ty = if then.ty == otherwise.ty {
                        then.ty
                    } else {
                        Ty::Scalar
                    };
                    let span = lhs.span.start..otherwise.span.end;
                    PExpr::new(
                        Node::If {
                            cond: Box::new(lhs.node),
                            then: Box::new(then.node),
                            otherwise: Some(Box::new(otherwise.node)),
                        },
                        ty,
                        span,
                    )
                }
            };
        }
        Some(lhs)
    }

    fn prefix(&mut self) -> Option<PExpr> {
        let Spanned { token, span } = self.tokens.get(self.pos).cloned().or_else(|| {
            let span = self.current_span();
            self.error(
                CompileErrorKind::Syntax,
                span,
                "expected an expression, found end of input".to_owned(),
            );
            None
        })?;
        match token {
            Token::Number(n) => {
                self.pos += 1;
                Some(PExpr::number(n, span))
            }
            Token::True => {
                self.pos += 1;
                Some(PExpr::number(1.0, span))
            }
            Token::False => {
                self.pos += 1;
                Some(PExpr::number(0.0, span))
            }
            Token::StringLit(s) => {
                self.pos += 1;
                let e = PExpr::new(Node::Str(s), Ty::Str, span);
                self.postfix(e)
            }
            Token::Minus => {
                self.pos += 1;
                let operand = self.expr_bp(15)?;
                let full = span.start..operand.span.end;
                if let Some(n) = operand.node.as_number() {
                    return Some(PExpr::number(-n, full));
                }
                if operand.ty == Ty::Str {
                    self.error(
                        CompileErrorKind::Semantic,
                        full,
                        "cannot negate a string".to_owned(),
                    );
                    return None;
                }
                let ty = operand.ty;
                Some(PExpr::new(
                    Node::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand.node),
                    },
                    ty,
                    full,
                ))
            }
            Token::Plus => {
                self.pos += 1;
                self.expr_bp(15)
            }
            Token::Not => {
                self.pos += 1;
                let operand = self.expr_bp(15)?;
                self.require_scalar(&operand)?;
                let full = span.start..operand.span.end;
                if let Some(n) = operand.node.as_number() {
                    return Some(PExpr::number(if n == 0.0 { 1.0 } else { 0.0 }, full));
                }
                Some(PExpr::new(
                    Node::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand.node),
                    },
                    Ty::Scalar,
                    full,
                ))
            }
            Token::LParen => {
                self.pos += 1;
                let mut e = self.expr_bp(0)?;
                let end = self.expect(&Token::RParen, "to close the group")?;
                e.span = span.start..end;
                self.postfix(e)
            }
            Token::Ident(name) => {
                self.pos += 1;
                let e = self.resolve_ident(name, span)?;
                self.postfix(e)
            }
            other => {
                self.error(
                    CompileErrorKind::Syntax,
                    span,
                    format!("expected an expression, found {}", other.describe()),
                );
                None
            }
        }
    }

    /// Postfix `[..]` forms: element access, size, and ranges over
    /// vectors; ranges over strings.
    fn postfix(&mut self, mut e: PExpr) -> Option<PExpr> {
        while self.peek() == Some(&Token::LBracket) {
            let open = self.current_span();
            self.pos += 1;
            match e.ty {
                Ty::Vector => {
                    let view = match e.node {
                        Node::VectorRead(view) => view,
                        _ => {
                            self.error(
                                CompileErrorKind::Semantic,
                                open,
                                "only named vectors can be indexed".to_owned(),
                            );
                            return None;
                        }
                    };
                    if self.peek() == Some(&Token::RBracket) {
                        let end = self.expect(&Token::RBracket, "")?;
                        e = PExpr::new(
                            Node::VectorSize(view),
                            Ty::Scalar,
                            e.span.start..end,
                        );
                        continue;
                    }
                    let lo = if self.peek() == Some(&Token::Colon) {
                        None
                    } else {
                        let i = self.expr_bp(0)?;
                        self.require_scalar(&i)?;
                        Some(i)
                    };
                    if self.eat(&Token::Colon) {
                        let hi = if self.peek() == Some(&Token::RBracket) {
                            None
                        } else {
                            let i = self.expr_bp(0)?;
                            self.require_scalar(&i)?;
                            Some(i)
                        };
                        let end = self.expect(&Token::RBracket, "to close the range")?;
                        let span = e.span.start..end;
                        e = PExpr::new(
                            Node::VectorSlice {
                                vec: view,
                                lo: lo.map(|i| Box::new(i.node)),
                                hi: hi.map(|i| Box::new(i.node)),
                                span: span.clone(),
                            },
                            Ty::Vector,
                            span,
                        );
                    } else {
                        let index = lo?;
                        let end = self.expect(&Token::RBracket, "after the index")?;
                        let span = e.span.start..end;
                        e = PExpr::new(
                            Node::VectorElem {
                                vec: view,
                                index: Box::new(index.node),
                                span: span.clone(),
                            },
                            Ty::Scalar,
                            span,
                        );
                    }
                }
                Ty::Str => {
                    let lo = if self.peek() == Some(&Token::Colon) {
                        None
                    } else {
                        let i = self.expr_bp(0)?;
                        self.require_scalar(&i)?;
                        Some(i)
                    };
                    if !self.eat(&Token::Colon) {
                        self.error(
                            CompileErrorKind::Syntax,
                            open,
                            "string access is by range, e.g. s[i : j]".to_owned(),
                        );
                        return None;
                    }
                    let hi = if self.peek() == Some(&Token::RBracket) {
                        None
                    } else {
                        let i = self.expr_bp(0)?;
                        self.require_scalar(&i)?;
                        Some(i)
                    };
                    let end = self.expect(&Token::RBracket, "to close the range")?;
                    let span = e.span.start..end;
                    e = PExpr::new(
                        Node::StringSlice {
                            value: Box::new(e.node),
                            lo: lo.map(|i| Box::new(i.node)),
                            hi: hi.map(|i| Box::new(i.node)),
                            span: span.clone(),
                        },
                        Ty::Str,
                        span,
                    );
                }
                Ty::Scalar => {
                    self.error(
                        CompileErrorKind::Semantic,
                        open,
                        "cannot index a scalar value".to_owned(),
                    );
                    return None;
                }
            }
        }
        Some(e)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Name resolution and calls
    // ═══════════════════════════════════════════════════════════════════

    fn resolve_ident(&mut self, name: String, span: Span) -> Option<PExpr> {
        for scope in self.scopes.iter().rev() {
            if let Some(local) = scope.get(&name) {
                return Some(match local.clone() {
                    Local::Scalar(cell) => PExpr::new(Node::Variable(cell), Ty::Scalar, span),
                    Local::Vector(view) => PExpr::new(Node::VectorRead(view), Ty::Vector, span),
                    Local::Str(cell) => PExpr::new(Node::StringVar(cell), Ty::Str, span),
                    Local::Const(v) => PExpr::number(v, span),
                });
            }
        }
        for table in self.tables.clone() {
            let Some(symbol) = table.get(&name) else {
                continue;
            };
            let readonly = table.is_immutable();
            return Some(match symbol {
                Symbol::Scalar(cell) => {
                    let mut e = PExpr::new(Node::Variable(cell), Ty::Scalar, span);
                    e.readonly = readonly;
                    e
                }
                Symbol::Vector(view) => {
                    let mut e = PExpr::new(Node::VectorRead(view), Ty::Vector, span);
                    e.readonly = readonly;
                    e
                }
                Symbol::Str(cell) => {
                    let mut e = PExpr::new(Node::StringVar(cell), Ty::Str, span);
                    e.readonly = readonly;
                    e
                }
                Symbol::Constant(v) => PExpr::number(v, span),
                Symbol::Function(entry) => return self.call(name, entry, span),
            });
        }

        // Unknown: offer it to the resolver, if any.
        if let Some(resolver) = self.resolver.clone() {
            if let Some(value) = resolver.borrow_mut().resolve(&name) {
                for table in &self.tables[..self.tables.len() - 1] {
                    if !table.is_immutable() {
                        table.add_variable(&name, value);
                        log::debug!("resolver created variable '{name}' = {value}");
                        let cell = table
                            .variable_ref(&name)
                            .unwrap_or_else(|| Rc::new(RefCell::new(value)));
                        return Some(PExpr::new(Node::Variable(cell), Ty::Scalar, span));
                    }
                }
                self.error(
                    CompileErrorKind::Semantic,
                    span,
                    format!("cannot create '{name}': no mutable symbol table in the chain"),
                );
                return None;
            }
        }
        self.error(
            CompileErrorKind::Semantic,
            span,
            format!("undefined symbol '{name}'"),
        );
        None
    }

    fn call(&mut self, name: String, entry: FunctionEntry, name_span: Span) -> Option<PExpr> {
        if self.peek() != Some(&Token::LParen) {
            self.error(
                CompileErrorKind::Syntax,
                name_span,
                format!("'{name}' is a function; expected '(' after its name"),
            );
            return None;
        }
        self.pos += 1;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.expr_bp(0)?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Token::RParen, "to close the argument list")?;
        let span = name_span.start..end;

        match entry {
            FunctionEntry::Scalar(func) => {
                if args.len() != func.arity() {
                    self.error(
                        CompileErrorKind::Semantic,
                        span,
                        format!(
                            "function '{name}' expects {} argument(s), got {}",
                            func.arity(),
                            args.len()
                        ),
                    );
                    return None;
                }
                let mut nodes = Vec::with_capacity(args.len());
                for arg in args {
                    self.require_scalar(&arg)?;
                    nodes.push(arg.node);
                }
                // Pure calls over literals fold away.
                if !func.has_side_effects() {
                    if let Some(values) = nodes
                        .iter()
                        .map(Node::as_number)
                        .collect::<Option<Vec<f64>>>()
                    {
                        return Some(PExpr::number(func.call(&values), span));
                    }
                }
                Some(PExpr::new(
                    Node::ScalarCall { name, func, args: nodes },
                    Ty::Scalar,
                    span,
                ))
            }
            FunctionEntry::Generic { func, signature } => {
                self.generic_call(name, func, &signature, args, span)
            }
            FunctionEntry::Composed(def) => {
                let arity = def.borrow().arity();
                if args.len() != arity {
                    self.error(
                        CompileErrorKind::Semantic,
                        span,
                        format!(
                            "function '{name}' expects {arity} argument(s), got {}",
                            args.len()
                        ),
                    );
                    return None;
                }
                let mut nodes = Vec::with_capacity(args.len());
                for arg in args {
                    self.require_scalar(&arg)?;
                    nodes.push(arg.node);
                }
                let weak = Rc::downgrade(&def);
                self.retained.push(def);
                Some(PExpr::new(
                    Node::ComposedCall {
                        name,
                        func: weak,
                        args: nodes,
                    },
                    Ty::Scalar,
                    span,
                ))
            }
        }
    }

    fn generic_call(
        &mut self,
        name: String,
        func: crate::native::GenericFunctionRef,
        signature: &Signature,
        args: Vec<PExpr>,
        span: Span,
    ) -> Option<PExpr> {
        let tags: Vec<TypeTag> = args.iter().map(|a| a.ty.tag()).collect();
        let Some(overload) = signature.match_args(&tags) else {
            let got: String = tags.iter().map(|t| t.to_string()).collect();
            self.error(
                CompileErrorKind::Semantic,
                span,
                format!(
                    "no overload of '{name}' accepts ({got}); candidates: {}",
                    signature.describe()
                ),
            );
            return None;
        };
        let string_result = func.returns_string();
        let call_args = args.into_iter().map(|a| self.into_call_arg(a)).collect();
        let ty = if string_result { Ty::Str } else { Ty::Scalar };
        Some(PExpr::new(
            Node::GenericCall {
                name,
                func,
                overload,
                string_result,
                args: call_args,
            },
            ty,
            span,
        ))
    }

    fn into_call_arg(&mut self, arg: PExpr) -> CallArg {
        match arg.ty {
            Ty::Scalar => CallArg::Scalar(arg.node),
            Ty::Str => CallArg::Str(arg.node),
            Ty::Vector => CallArg::Vector(match arg.node {
                // Named vectors pass as live views; computed vectors
                // materialize into temporaries.
                Node::VectorRead(view) => VecSource::View(view),
                other => VecSource::Expr(Box::new(other)),
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Operator construction and folding
    // ═══════════════════════════════════════════════════════════════════

    fn require_scalar(&mut self, e: &PExpr) -> Option<()> {
        if e.ty == Ty::Scalar {
            Some(())
        } else {
            self.error(
                CompileErrorKind::Semantic,
                e.span.clone(),
                format!("expected a scalar value, got a {}", e.ty.name()),
            );
            None
        }
    }

    fn make_binary(&mut self, op: BinaryOp, lhs: PExpr, rhs: PExpr) -> Option<PExpr> {
        let span = lhs.span.start..rhs.span.end;
        if let (Some(a), Some(b)) = (lhs.node.as_number(), rhs.node.as_number()) {
            return Some(PExpr::number(apply_binary(op, a, b), span));
        }
        let ty = match (lhs.ty, rhs.ty) {
            (Ty::Scalar, Ty::Scalar) => Ty::Scalar,
            (Ty::Str, Ty::Str) if op == BinaryOp::Add => Ty::Str,
            (Ty::Vector, Ty::Scalar) | (Ty::Scalar, Ty::Vector) | (Ty::Vector, Ty::Vector) => {
                Ty::Vector
            }
            (l, r) => {
                self.error(
                    CompileErrorKind::Semantic,
                    span,
                    format!("invalid operands: {} and {}", l.name(), r.name()),
                );
                return None;
            }
        };
        Some(PExpr::new(
            Node::Binary {
                op,
                lhs: Box::new(lhs.node),
                rhs: Box::new(rhs.node),
            },
            ty,
            span,
        ))
    }

    fn make_compare(&mut self, op: CompareOp, lhs: PExpr, rhs: PExpr) -> Option<PExpr> {
        let span = lhs.span.start..rhs.span.end;
        if let (Some(a), Some(b)) = (lhs.node.as_number(), rhs.node.as_number()) {
            return Some(PExpr::number(apply_compare(op, a, b), span));
        }
        match (lhs.ty, rhs.ty) {
            (Ty::Scalar, Ty::Scalar) | (Ty::Str, Ty::Str) => {}
            (l, r) => {
                self.error(
                    CompileErrorKind::Semantic,
                    span,
                    format!("cannot compare {} with {}", l.name(), r.name()),
                );
                return None;
            }
        }
        Some(PExpr::new(
            Node::Compare {
                op,
                lhs: Box::new(lhs.node),
                rhs: Box::new(rhs.node),
            },
            Ty::Scalar,
            span,
        ))
    }

    fn make_logic(&mut self, op: LogicOp, lhs: PExpr, rhs: PExpr) -> Option<PExpr> {
        let span = lhs.span.start..rhs.span.end;
        self.require_scalar(&lhs)?;
        self.require_scalar(&rhs)?;
        if let (Some(a), Some(b)) = (lhs.node.as_number(), rhs.node.as_number()) {
            return Some(PExpr::number(apply_logic(op, a != 0.0, b != 0.0), span));
        }
        Some(PExpr::new(
            Node::Logic {
                op,
                lhs: Box::new(lhs.node),
                rhs: Box::new(rhs.node),
            },
            Ty::Scalar,
            span,
        ))
    }

    fn into_lvalue(&mut self, e: PExpr, verb: &str) -> Option<(LValue, Ty)> {
        if e.readonly {
            self.error(
                CompileErrorKind::Semantic,
                e.span,
                format!("cannot {verb} a symbol from an immutable table"),
            );
            return None;
        }
        let ty = e.ty;
        let lvalue = match e.node {
            Node::Variable(cell) => LValue::Scalar(cell),
            Node::StringVar(cell) => LValue::Str(cell),
            Node::VectorRead(view) => LValue::Vector(view),
            Node::VectorElem { vec, index, span } => LValue::VectorElem { vec, index, span },
            Node::VectorSlice { vec, lo, hi, span } => LValue::VectorSlice { vec, lo, hi, span },
            Node::Number(_) => {
                self.error(
                    CompileErrorKind::Semantic,
                    e.span,
                    format!("cannot {verb} a constant"),
                );
                return None;
            }
            _ => {
                self.error(
                    CompileErrorKind::Semantic,
                    e.span,
                    format!("cannot {verb} this expression"),
                );
                return None;
            }
        };
        Some((lvalue, ty))
    }

    fn make_assign(&mut self, lhs: PExpr, op: AssignOp, rhs: PExpr) -> Option<PExpr> {
        let span = lhs.span.start..rhs.span.end;
        let (target, target_ty) = self.into_lvalue(lhs, "assign to")?;
        match (&target, rhs.ty) {
            (LValue::Scalar(_) | LValue::VectorElem { .. }, Ty::Scalar) => {}
            (LValue::Str(_), Ty::Str) if matches!(op, AssignOp::Set | AssignOp::Add) => {}
            (LValue::Vector(_) | LValue::VectorSlice { .. }, Ty::Scalar | Ty::Vector) => {}
            _ => {
                self.error(
                    CompileErrorKind::Semantic,
                    span,
                    format!(
                        "cannot assign a {} to a {} target",
                        rhs.ty.name(),
                        target_ty.name()
                    ),
                );
                return None;
            }
        }
        Some(PExpr::new(
            Node::Assign {
                target,
                op,
                value: Box::new(rhs.node),
                span: span.clone(),
            },
            target_ty,
            span,
        ))
    }

    fn make_swap(&mut self, lhs: PExpr, rhs: PExpr) -> Option<PExpr> {
        let span = lhs.span.start..rhs.span.end;
        let (a, a_ty) = self.into_lvalue(lhs, "swap")?;
        let (b, b_ty) = self.into_lvalue(rhs, "swap")?;
        let compatible = matches!(
            (&a, &b),
            (
                LValue::Scalar(_) | LValue::VectorElem { .. },
                LValue::Scalar(_) | LValue::VectorElem { .. },
            ) | (LValue::Str(_), LValue::Str(_))
        );
        if !compatible {
            self.error(
                CompileErrorKind::Semantic,
                span,
                format!("cannot swap a {} with a {}", a_ty.name(), b_ty.name()),
            );
            return None;
        }
        Some(PExpr::new(
            Node::Swap {
                a,
                b,
                span: span.clone(),
            },
            Ty::Scalar,
            span,
        ))
    }
}
