//! Evaluator frames and completions.
//!
//! The evaluator is an explicit stack machine: every partially evaluated
//! statement or expression is a [`Frame`], and every finished one produces a
//! [`Completion`] that the next frame down consumes. Suspending a
//! computation is therefore just not calling `step` again.

use crate::error::Fault;
use crate::scope::Scope;
use crate::value::{ObjectRef, Value};
use rill_types::ast::{
    BinOp, BlockRef, ExprRef, LogicalOp, ObjectEntry, StmtRef, UnaryOp, UpdateOp, VarDeclarator,
};
use std::rc::Rc;

/// A guest exception in flight. Keeps the original fault and the call
/// stack at the throw site around so the engine can classify and report
/// the error if nothing catches it.
#[derive(Clone)]
pub struct Thrown {
    pub value: Value,
    pub fault: Option<Fault>,
    pub stack: Option<Vec<String>>,
}

/// How a statement or expression finished.
#[derive(Clone)]
pub enum Completion {
    Normal(Value),
    Return(Value),
    Break,
    Continue,
    Throw(Thrown),
}

impl Completion {
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum ForPhase {
    Init,
    Cond,
    Body,
    Update,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallPhase {
    /// Evaluating a plain callee expression.
    Callee,
    /// Evaluating the receiver of a method call.
    Object,
    /// Evaluating the computed key of a method call.
    Index,
    /// Evaluating arguments.
    Args,
}

/// An `f(...)`, `o.m(...)`, `o[k](...)`, or `new f(...)` in progress.
pub(crate) struct CallFrame {
    pub member: Option<String>,
    pub index_expr: Option<ExprRef>,
    pub args: Vec<ExprRef>,
    pub phase: CallPhase,
    pub this_val: Value,
    pub func: Value,
    pub arg_index: usize,
    pub arg_vals: Vec<Value>,
    pub is_new: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignPhase {
    Object,
    Index,
    Value,
}

/// A member or index assignment in progress.
pub(crate) struct AssignFrame {
    pub op: Option<BinOp>,
    pub name: Option<String>,
    pub index_expr: Option<ExprRef>,
    pub value_expr: ExprRef,
    pub phase: AssignPhase,
    pub object: Option<Value>,
    pub key: Option<String>,
}

pub(crate) enum Frame {
    // ── Statements ────────────────────────────────────────────────────────
    Program {
        body: BlockRef,
        index: usize,
        /// Value of the last expression statement, the program's result
        /// when it finishes without `return`.
        last: Value,
    },
    Block {
        body: BlockRef,
        index: usize,
    },
    VarDecl {
        decls: Rc<Vec<VarDeclarator>>,
        index: usize,
    },
    ReturnStmt,
    ThrowStmt,
    IfStmt {
        cons: StmtRef,
        alt: Option<StmtRef>,
    },
    WhileLoop {
        cond: ExprRef,
        body: StmtRef,
        in_body: bool,
    },
    ForLoop {
        cond: Option<ExprRef>,
        update: Option<ExprRef>,
        body: StmtRef,
        phase: ForPhase,
    },
    TryCatch {
        param: String,
        handler: BlockRef,
        saved_scope: Option<Scope>,
        in_handler: bool,
    },
    /// Marks the base of a guest function activation. Restores the caller's
    /// scope and converts the body's completion into the call result.
    FunctionReturn {
        saved_scope: Scope,
        is_new: bool,
        new_this: Option<Value>,
    },

    // ── Expressions ───────────────────────────────────────────────────────
    Binary {
        op: BinOp,
        right: Option<ExprRef>,
        left: Option<Value>,
    },
    Logical {
        op: LogicalOp,
        right: ExprRef,
    },
    Unary {
        op: UnaryOp,
    },
    Conditional {
        cons: ExprRef,
        alt: ExprRef,
    },
    ArrayLit {
        elements: Vec<ExprRef>,
        index: usize,
        array: ObjectRef,
    },
    ObjectLit {
        entries: Vec<ObjectEntry>,
        index: usize,
        object: ObjectRef,
    },
    MemberGet {
        name: String,
    },
    IndexGet {
        index_expr: Option<ExprRef>,
        object: Option<Value>,
    },
    Call(CallFrame),
    AssignVar {
        name: String,
        op: Option<BinOp>,
    },
    AssignMember(Box<AssignFrame>),
    UpdateMember {
        op: UpdateOp,
        prefix: bool,
        name: Option<String>,
        index_expr: Option<ExprRef>,
        object: Option<Value>,
    },
    /// A host-initiated guest call: the whole computation is one
    /// invocation.
    Invoke {
        func: Value,
        this: Value,
        args: Vec<Value>,
    },
}

impl Frame {
    /// Whether an abrupt completion stops at this frame. Frames that return
    /// `false` are discarded as the completion unwinds past them.
    pub(crate) fn handles(&self, c: &Completion) -> bool {
        match (self, c) {
            (Frame::Program { .. }, Completion::Return(_)) => true,
            (
                Frame::WhileLoop { .. } | Frame::ForLoop { .. },
                Completion::Break | Completion::Continue,
            ) => true,
            (
                Frame::TryCatch {
                    in_handler: false, ..
                },
                Completion::Throw(_),
            ) => true,
            // An active catch handler must restore the saved scope no
            // matter how it completes.
            (Frame::TryCatch { in_handler: true, .. }, _) => true,
            (Frame::FunctionReturn { .. }, _) => true,
            _ => false,
        }
    }
}
