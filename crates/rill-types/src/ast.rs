//! AST node types for the Rill guest language.
//!
//! Every node carries a [`Span`] for error reporting. Recursive children are
//! reference-counted rather than boxed: the resumable evaluator suspends
//! mid-expression, and its frames hold cheap `Rc` handles into the tree
//! instead of cloning subtrees.

use crate::Span;
use std::rc::Rc;

/// Shared handle to an expression node.
pub type ExprRef = Rc<Expr>;
/// Shared handle to a statement node.
pub type StmtRef = Rc<Stmt>;
/// Shared handle to a statement list (program, function, or block body).
pub type BlockRef = Rc<Vec<StmtRef>>;

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// A complete guest program: a statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: BlockRef,
    pub span: Span,
}

/// A spanned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A single `var` declarator: `name` or `name = init`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub name: Ident,
    pub init: Option<ExprRef>,
}

/// Initializer clause of a `for` statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(Rc<Vec<VarDeclarator>>),
    Expr(ExprRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `var a = 1, b;`
    Var(Rc<Vec<VarDeclarator>>),
    /// `function name(params) { body }` — hoisted to the top of its
    /// enclosing program or function body before execution.
    Function(Ident, Rc<FunctionExpr>),
    /// An expression evaluated for its value/effects.
    Expr(ExprRef),
    /// `return;` / `return expr;` — also legal at top level.
    Return(Option<ExprRef>),
    /// `if (cond) cons` / `if (cond) cons else alt`
    If {
        cond: ExprRef,
        cons: StmtRef,
        alt: Option<StmtRef>,
    },
    /// `while (cond) body`
    While { cond: ExprRef, body: StmtRef },
    /// `for (init; cond; update) body` — every clause optional.
    For {
        init: Option<ForInit>,
        cond: Option<ExprRef>,
        update: Option<ExprRef>,
        body: StmtRef,
    },
    /// `break;` — parser guarantees it appears inside a loop.
    Break,
    /// `continue;` — parser guarantees it appears inside a loop.
    Continue,
    /// `throw expr;`
    Throw(ExprRef),
    /// `try { block } catch (param) { handler }`
    Try {
        block: BlockRef,
        param: Ident,
        handler: BlockRef,
    },
    /// `{ statements }`
    Block(BlockRef),
    /// Lone `;`
    Empty,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A function expression or declaration body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    /// Present for declarations and named function expressions.
    pub name: Option<String>,
    pub params: Vec<Ident>,
    pub body: BlockRef,
    pub span: Span,
}

/// One `key: value` entry of an object literal. Identifier, string, and
/// number keys are normalized to their property-name string.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub value: ExprRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    This,
    Identifier(String),
    Array(Vec<ExprRef>),
    Object(Vec<ObjectEntry>),
    Function(Rc<FunctionExpr>),
    /// `object.property`
    Member { object: ExprRef, property: String },
    /// `object[index]`
    Index { object: ExprRef, index: ExprRef },
    Call { callee: ExprRef, args: Vec<ExprRef> },
    New { callee: ExprRef, args: Vec<ExprRef> },
    Unary { op: UnaryOp, operand: ExprRef },
    /// `++x`, `x--`, …
    Update {
        op: UpdateOp,
        prefix: bool,
        target: ExprRef,
    },
    Binary {
        op: BinOp,
        left: ExprRef,
        right: ExprRef,
    },
    Logical {
        op: LogicalOp,
        left: ExprRef,
        right: ExprRef,
    },
    /// `cond ? cons : alt`
    Conditional {
        cond: ExprRef,
        cons: ExprRef,
        alt: ExprRef,
    },
    /// `target = value` or `target op= value`.
    Assign {
        op: Option<BinOp>,
        target: ExprRef,
        value: ExprRef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    ShiftLeft,
    ShiftRight,
    ShiftRightZeroFill,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    LooseEq,
    LooseNotEq,
    StrictEq,
    StrictNotEq,
    BitAnd,
    BitXor,
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}
