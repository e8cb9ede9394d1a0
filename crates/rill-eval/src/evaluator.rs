//! The resumable evaluator.
//!
//! A [`Computation`] advances one frame transition per [`Computation::step`]
//! call and suspends between steps, so the host decides when and how much
//! guest code runs. Completions travel through a single pending slot: a
//! frame that finishes leaves its completion there, and the next step
//! delivers it to the frame below. Abrupt completions unwind one frame per
//! step until something claims them.

use crate::environment::Environment;
use crate::error::{EngineError, Fault, FaultKind, GuestFault};
use crate::frame::{
    AssignFrame, AssignPhase, CallFrame, CallPhase, Completion, ForPhase, Frame, Thrown,
};
use crate::native::Native;
use crate::ops;
use crate::scope::Scope;
use crate::value::{BuiltinOutcome, GuestFunctionData, ObjectKind, Property, Value};
use rill_types::ast::{
    ExprKind, ExprRef, ForInit, FunctionExpr, LogicalOp, Program, StmtKind, StmtRef, UnaryOp,
    UpdateOp,
};
use std::rc::Rc;

/// Lifecycle of a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Loaded, no step taken yet.
    Ready,
    /// Inside a `step` call.
    Running,
    /// Between steps.
    Suspended,
    /// Finished with a result.
    Completed,
    /// Stopped by the step bound.
    Aborted,
    /// Finished with an uncaught error.
    Failed,
}

/// What `advance` produced for one frame.
enum Flow {
    Done(Completion),
    Pending,
}

/// A suspendable run of guest code: a whole program or a single function
/// invocation.
pub struct Computation {
    env: Rc<Environment>,
    stack: Vec<Frame>,
    pending: Option<Completion>,
    scope: Scope,
    steps: u64,
    limit: u64,
    state: RunState,
    call_names: Vec<String>,
    result: Option<Value>,
}

impl Computation {
    /// A computation over a parsed program. Top-level code runs directly in
    /// the global scope; function declarations are hoisted before the first
    /// step.
    pub fn new(env: Rc<Environment>, program: &Program) -> Self {
        let scope = env.global_scope();
        let limit = env.options().step_limit;
        let comp = Self {
            env,
            stack: vec![Frame::Program {
                body: program.body.clone(),
                index: 0,
                last: Value::Undefined,
            }],
            pending: None,
            scope,
            steps: 0,
            limit,
            state: RunState::Ready,
            call_names: Vec::new(),
            result: None,
        };
        comp.hoist_functions(&program.body);
        comp
    }

    /// A computation that performs a single guest call, used for
    /// host-initiated invocations.
    pub fn call(env: Rc<Environment>, func: Value, this: Value, args: Vec<Value>) -> Self {
        let scope = env.global_scope();
        let limit = env.options().step_limit;
        Self {
            env,
            stack: vec![Frame::Invoke { func, this, args }],
            pending: None,
            scope,
            steps: 0,
            limit,
            state: RunState::Ready,
            call_names: Vec::new(),
            result: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The final value once the computation has completed.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Advance by one frame transition. Returns `Ok(true)` when the
    /// computation completed on this step. Stepping a finished computation
    /// is an [`EngineError::Internal`].
    pub fn step(&mut self) -> Result<bool, EngineError> {
        match self.state {
            RunState::Ready | RunState::Running | RunState::Suspended => {}
            RunState::Completed => {
                return Err(EngineError::Internal(
                    "computation already completed".to_string(),
                ))
            }
            RunState::Aborted => {
                return Err(EngineError::Internal("computation was aborted".to_string()))
            }
            RunState::Failed => {
                return Err(EngineError::Internal(
                    "computation already failed".to_string(),
                ))
            }
        }
        self.steps += 1;
        if self.steps > self.limit {
            self.state = RunState::Aborted;
            return Err(EngineError::BoundExceeded { steps: self.limit });
        }
        self.state = RunState::Running;

        let input = self.pending.take();
        let frame = match self.stack.pop() {
            Some(f) => f,
            None => {
                self.state = RunState::Failed;
                return Err(EngineError::Internal(
                    "computation stack underflow".to_string(),
                ));
            }
        };

        // Unwind abrupt completions past frames that don't claim them, one
        // frame per step.
        if let Some(c) = &input {
            if c.is_abrupt() && !frame.handles(c) {
                let c = input.unwrap_or(Completion::Normal(Value::Undefined));
                return self.deliver(c);
            }
        }

        match self.advance(frame, input) {
            Ok(Flow::Done(c)) => self.deliver(c),
            Ok(Flow::Pending) => {
                self.state = RunState::Suspended;
                Ok(false)
            }
            Err(e) => {
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    /// Run until the computation finishes or exhausts its step bound.
    pub fn run_to_completion(&mut self) -> Result<Value, EngineError> {
        loop {
            if self.step()? {
                return Ok(self.result.clone().unwrap_or(Value::Undefined));
            }
        }
    }

    fn deliver(&mut self, c: Completion) -> Result<bool, EngineError> {
        if self.stack.is_empty() {
            self.finish(c)
        } else {
            self.pending = Some(c);
            self.state = RunState::Suspended;
            Ok(false)
        }
    }

    fn finish(&mut self, c: Completion) -> Result<bool, EngineError> {
        match c {
            Completion::Normal(v) | Completion::Return(v) => {
                self.result = Some(v);
                self.state = RunState::Completed;
                Ok(true)
            }
            Completion::Throw(t) => {
                self.state = RunState::Failed;
                Err(self.thrown_to_error(t))
            }
            Completion::Break | Completion::Continue => {
                self.state = RunState::Failed;
                Err(EngineError::Internal(
                    "loop completion escaped the program".to_string(),
                ))
            }
        }
    }

    fn thrown_to_error(&self, t: Thrown) -> EngineError {
        // The stack was captured at the throw site; the unwind has already
        // torn the activation records down by the time we get here.
        let stack = t.stack;
        match t.fault {
            Some(f) if f.kind == FaultKind::AccessDenied => EngineError::AccessDenied {
                message: f.message,
                stack,
            },
            Some(f) => EngineError::Guest(GuestFault {
                kind: f.kind,
                message: f.message,
                stack,
            }),
            None => {
                let message = match &t.value {
                    Value::Object(o) => o
                        .borrow()
                        .properties
                        .get("message")
                        .map(|p| ops::to_string_value(&p.value)),
                    _ => None,
                }
                .unwrap_or_else(|| ops::to_string_value(&t.value));
                EngineError::Guest(GuestFault {
                    kind: FaultKind::Error,
                    message,
                    stack,
                })
            }
        }
    }

    fn collect_stack(&self) -> Option<Vec<String>> {
        if !self.env.options().add_extra_error_info_to_stacks {
            return None;
        }
        let mut frames: Vec<String> = self.call_names.iter().rev().cloned().collect();
        frames.push("<program>".to_string());
        if self.env.options().add_internal_stack {
            frames.push(format!("<evaluator: {} frames>", self.stack.len()));
        }
        Some(frames)
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    /// Queue a statement: push its frames, or leave its immediate
    /// completion in the pending slot.
    fn push_stmt(&mut self, stmt: &StmtRef) -> Result<(), EngineError> {
        match self.enter_stmt(stmt)? {
            Flow::Done(c) => {
                self.pending = Some(c);
                Ok(())
            }
            Flow::Pending => Ok(()),
        }
    }

    /// Queue an expression, same contract as [`Self::push_stmt`].
    fn push_expr(&mut self, expr: &ExprRef) -> Result<(), EngineError> {
        match self.enter_expr(expr)? {
            Flow::Done(c) => {
                self.pending = Some(c);
                Ok(())
            }
            Flow::Pending => Ok(()),
        }
    }

    fn throw_fault(&self, fault: Fault) -> Completion {
        Completion::Throw(Thrown {
            value: self.env.error_object(&fault),
            fault: Some(fault),
            stack: self.collect_stack(),
        })
    }

    fn fault_flow(&self, r: Result<Value, Fault>) -> Result<Flow, EngineError> {
        Ok(match r {
            Ok(v) => Flow::Done(Completion::Normal(v)),
            Err(f) => Flow::Done(self.throw_fault(f)),
        })
    }

    fn make_closure(&self, fx: &Rc<FunctionExpr>) -> Value {
        self.env.new_function(GuestFunctionData {
            name: fx.name.clone(),
            params: fx.params.iter().map(|p| p.name.clone()).collect(),
            body: fx.body.clone(),
            closure: self.scope.clone(),
        })
    }

    /// Bind the function declarations of a body into the current scope.
    fn hoist_functions(&self, body: &[StmtRef]) {
        for stmt in body {
            if let StmtKind::Function(name, fx) = &stmt.kind {
                let f = self.make_closure(fx);
                self.scope.bind(name.name.clone(), f, true);
            }
        }
    }

    // ── Statement Entry ───────────────────────────────────────────────────

    fn enter_stmt(&mut self, stmt: &StmtRef) -> Result<Flow, EngineError> {
        match &stmt.kind {
            StmtKind::Empty => Ok(Flow::Done(Completion::Normal(Value::Undefined))),
            StmtKind::Function(name, fx) => {
                let f = self.make_closure(fx);
                self.scope.bind(name.name.clone(), f, true);
                Ok(Flow::Done(Completion::Normal(Value::Undefined)))
            }
            StmtKind::Break => Ok(Flow::Done(Completion::Break)),
            StmtKind::Continue => Ok(Flow::Done(Completion::Continue)),
            StmtKind::Return(None) => Ok(Flow::Done(Completion::Return(Value::Undefined))),
            StmtKind::Return(Some(e)) => {
                self.stack.push(Frame::ReturnStmt);
                self.push_expr(e)?;
                Ok(Flow::Pending)
            }
            StmtKind::Throw(e) => {
                self.stack.push(Frame::ThrowStmt);
                self.push_expr(e)?;
                Ok(Flow::Pending)
            }
            StmtKind::Var(decls) => {
                self.stack.push(Frame::VarDecl {
                    decls: decls.clone(),
                    index: 0,
                });
                Ok(Flow::Pending)
            }
            StmtKind::Expr(e) => {
                self.push_expr(e)?;
                Ok(Flow::Pending)
            }
            StmtKind::If { cond, cons, alt } => {
                self.stack.push(Frame::IfStmt {
                    cons: cons.clone(),
                    alt: alt.clone(),
                });
                self.push_expr(cond)?;
                Ok(Flow::Pending)
            }
            StmtKind::While { cond, body } => {
                self.stack.push(Frame::WhileLoop {
                    cond: cond.clone(),
                    body: body.clone(),
                    in_body: false,
                });
                self.push_expr(cond)?;
                Ok(Flow::Pending)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => match init {
                Some(ForInit::Var(decls)) => {
                    self.stack.push(Frame::ForLoop {
                        cond: cond.clone(),
                        update: update.clone(),
                        body: body.clone(),
                        phase: ForPhase::Init,
                    });
                    self.stack.push(Frame::VarDecl {
                        decls: decls.clone(),
                        index: 0,
                    });
                    Ok(Flow::Pending)
                }
                Some(ForInit::Expr(e)) => {
                    self.stack.push(Frame::ForLoop {
                        cond: cond.clone(),
                        update: update.clone(),
                        body: body.clone(),
                        phase: ForPhase::Init,
                    });
                    self.push_expr(e)?;
                    Ok(Flow::Pending)
                }
                None => self.for_to_cond(cond.clone(), update.clone(), body.clone()),
            },
            StmtKind::Try {
                block,
                param,
                handler,
            } => {
                self.stack.push(Frame::TryCatch {
                    param: param.name.clone(),
                    handler: handler.clone(),
                    saved_scope: None,
                    in_handler: false,
                });
                self.stack.push(Frame::Block {
                    body: block.clone(),
                    index: 0,
                });
                Ok(Flow::Pending)
            }
            StmtKind::Block(body) => {
                self.stack.push(Frame::Block {
                    body: body.clone(),
                    index: 0,
                });
                Ok(Flow::Pending)
            }
        }
    }

    // ── Expression Entry ──────────────────────────────────────────────────

    fn enter_expr(&mut self, expr: &ExprRef) -> Result<Flow, EngineError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Flow::Done(Completion::Normal(Value::Number(*n)))),
            ExprKind::String(s) => Ok(Flow::Done(Completion::Normal(Value::String(s.clone())))),
            ExprKind::Boolean(b) => Ok(Flow::Done(Completion::Normal(Value::Boolean(*b)))),
            ExprKind::Null => Ok(Flow::Done(Completion::Normal(Value::Null))),
            ExprKind::This => Ok(Flow::Done(Completion::Normal(
                self.scope.lookup("this").unwrap_or(Value::Undefined),
            ))),
            ExprKind::Identifier(name) => match self.scope.lookup(name) {
                Some(v) => Ok(Flow::Done(Completion::Normal(v))),
                None => Ok(Flow::Done(self.throw_fault(Fault::reference_error(
                    format!("{name} is not defined"),
                )))),
            },
            ExprKind::Function(fx) => Ok(Flow::Done(Completion::Normal(self.make_closure(fx)))),
            ExprKind::Array(elements) => {
                let array = self.env.new_array();
                if elements.is_empty() {
                    return Ok(Flow::Done(Completion::Normal(Value::Object(array))));
                }
                let first = elements[0].clone();
                self.stack.push(Frame::ArrayLit {
                    elements: elements.clone(),
                    index: 0,
                    array,
                });
                self.push_expr(&first)?;
                Ok(Flow::Pending)
            }
            ExprKind::Object(entries) => {
                let object = self.env.new_object();
                if entries.is_empty() {
                    return Ok(Flow::Done(Completion::Normal(Value::Object(object))));
                }
                let first = entries[0].value.clone();
                self.stack.push(Frame::ObjectLit {
                    entries: entries.clone(),
                    index: 0,
                    object,
                });
                self.push_expr(&first)?;
                Ok(Flow::Pending)
            }
            ExprKind::Member { object, property } => {
                self.stack.push(Frame::MemberGet {
                    name: property.clone(),
                });
                self.push_expr(object)?;
                Ok(Flow::Pending)
            }
            ExprKind::Index { object, index } => {
                self.stack.push(Frame::IndexGet {
                    index_expr: Some(index.clone()),
                    object: None,
                });
                self.push_expr(object)?;
                Ok(Flow::Pending)
            }
            ExprKind::Unary { op, operand } => {
                // `typeof` of an unresolved name is "undefined", not an
                // error.
                if *op == UnaryOp::Typeof {
                    if let ExprKind::Identifier(name) = &operand.kind {
                        if !self.scope.contains(name) {
                            return Ok(Flow::Done(Completion::Normal(Value::String(
                                "undefined".to_string(),
                            ))));
                        }
                    }
                }
                self.stack.push(Frame::Unary { op: *op });
                self.push_expr(operand)?;
                Ok(Flow::Pending)
            }
            ExprKind::Update { op, prefix, target } => match &target.kind {
                ExprKind::Identifier(name) => {
                    let old_v = match self.scope.lookup(name) {
                        Some(v) => v,
                        None => {
                            return Ok(Flow::Done(self.throw_fault(Fault::reference_error(
                                format!("{name} is not defined"),
                            ))))
                        }
                    };
                    let old = ops::to_number(&old_v);
                    let new = match op {
                        UpdateOp::Increment => old + 1.0,
                        UpdateOp::Decrement => old - 1.0,
                    };
                    if let Err(f) = self.scope.assign(name, Value::Number(new)) {
                        return Ok(Flow::Done(self.throw_fault(f)));
                    }
                    Ok(Flow::Done(Completion::Normal(Value::Number(if *prefix {
                        new
                    } else {
                        old
                    }))))
                }
                ExprKind::Member { object, property } => {
                    self.stack.push(Frame::UpdateMember {
                        op: *op,
                        prefix: *prefix,
                        name: Some(property.clone()),
                        index_expr: None,
                        object: None,
                    });
                    self.push_expr(object)?;
                    Ok(Flow::Pending)
                }
                ExprKind::Index { object, index } => {
                    self.stack.push(Frame::UpdateMember {
                        op: *op,
                        prefix: *prefix,
                        name: None,
                        index_expr: Some(index.clone()),
                        object: None,
                    });
                    self.push_expr(object)?;
                    Ok(Flow::Pending)
                }
                _ => Err(EngineError::Internal("invalid update target".to_string())),
            },
            ExprKind::Binary { op, left, right } => {
                self.stack.push(Frame::Binary {
                    op: *op,
                    right: Some(right.clone()),
                    left: None,
                });
                self.push_expr(left)?;
                Ok(Flow::Pending)
            }
            ExprKind::Logical { op, left, right } => {
                self.stack.push(Frame::Logical {
                    op: *op,
                    right: right.clone(),
                });
                self.push_expr(left)?;
                Ok(Flow::Pending)
            }
            ExprKind::Conditional { cond, cons, alt } => {
                self.stack.push(Frame::Conditional {
                    cons: cons.clone(),
                    alt: alt.clone(),
                });
                self.push_expr(cond)?;
                Ok(Flow::Pending)
            }
            ExprKind::Assign { op, target, value } => match &target.kind {
                ExprKind::Identifier(name) => {
                    self.stack.push(Frame::AssignVar {
                        name: name.clone(),
                        op: *op,
                    });
                    self.push_expr(value)?;
                    Ok(Flow::Pending)
                }
                ExprKind::Member { object, property } => {
                    self.stack.push(Frame::AssignMember(Box::new(AssignFrame {
                        op: *op,
                        name: Some(property.clone()),
                        index_expr: None,
                        value_expr: value.clone(),
                        phase: AssignPhase::Object,
                        object: None,
                        key: None,
                    })));
                    self.push_expr(object)?;
                    Ok(Flow::Pending)
                }
                ExprKind::Index { object, index } => {
                    self.stack.push(Frame::AssignMember(Box::new(AssignFrame {
                        op: *op,
                        name: None,
                        index_expr: Some(index.clone()),
                        value_expr: value.clone(),
                        phase: AssignPhase::Object,
                        object: None,
                        key: None,
                    })));
                    self.push_expr(object)?;
                    Ok(Flow::Pending)
                }
                _ => Err(EngineError::Internal(
                    "invalid assignment target".to_string(),
                )),
            },
            ExprKind::Call { callee, args } => {
                match &callee.kind {
                    ExprKind::Member { object, property } => {
                        self.stack.push(Frame::Call(CallFrame {
                            member: Some(property.clone()),
                            index_expr: None,
                            args: args.clone(),
                            phase: CallPhase::Object,
                            this_val: Value::Undefined,
                            func: Value::Undefined,
                            arg_index: 0,
                            arg_vals: Vec::new(),
                            is_new: false,
                        }));
                        self.push_expr(object)?;
                    }
                    ExprKind::Index { object, index } => {
                        self.stack.push(Frame::Call(CallFrame {
                            member: None,
                            index_expr: Some(index.clone()),
                            args: args.clone(),
                            phase: CallPhase::Object,
                            this_val: Value::Undefined,
                            func: Value::Undefined,
                            arg_index: 0,
                            arg_vals: Vec::new(),
                            is_new: false,
                        }));
                        self.push_expr(object)?;
                    }
                    _ => {
                        self.stack.push(Frame::Call(CallFrame {
                            member: None,
                            index_expr: None,
                            args: args.clone(),
                            phase: CallPhase::Callee,
                            this_val: Value::Undefined,
                            func: Value::Undefined,
                            arg_index: 0,
                            arg_vals: Vec::new(),
                            is_new: false,
                        }));
                        self.push_expr(callee)?;
                    }
                }
                Ok(Flow::Pending)
            }
            ExprKind::New { callee, args } => {
                self.stack.push(Frame::Call(CallFrame {
                    member: None,
                    index_expr: None,
                    args: args.clone(),
                    phase: CallPhase::Callee,
                    this_val: Value::Undefined,
                    func: Value::Undefined,
                    arg_index: 0,
                    arg_vals: Vec::new(),
                    is_new: true,
                }));
                self.push_expr(callee)?;
                Ok(Flow::Pending)
            }
        }
    }

    // ── Frame Advancement ─────────────────────────────────────────────────

    fn advance(&mut self, frame: Frame, input: Option<Completion>) -> Result<Flow, EngineError> {
        match frame {
            Frame::Program {
                body,
                index,
                mut last,
            } => {
                let capture = index > 0
                    && matches!(
                        body.get(index - 1).map(|s| &s.kind),
                        Some(StmtKind::Expr(_))
                    );
                match input {
                    Some(Completion::Normal(v)) => {
                        if capture {
                            last = v;
                        }
                    }
                    Some(Completion::Return(v)) => return Ok(Flow::Done(Completion::Normal(v))),
                    Some(_) => {
                        return Err(EngineError::Internal(
                            "unexpected completion at top level".to_string(),
                        ))
                    }
                    None => {}
                }
                if index < body.len() {
                    let stmt = body[index].clone();
                    self.stack.push(Frame::Program {
                        body,
                        index: index + 1,
                        last,
                    });
                    self.push_stmt(&stmt)?;
                    Ok(Flow::Pending)
                } else {
                    Ok(Flow::Done(Completion::Normal(last)))
                }
            }

            Frame::Block { body, index } => {
                if index < body.len() {
                    let stmt = body[index].clone();
                    self.stack.push(Frame::Block {
                        body,
                        index: index + 1,
                    });
                    self.push_stmt(&stmt)?;
                    Ok(Flow::Pending)
                } else {
                    Ok(Flow::Done(Completion::Normal(Value::Undefined)))
                }
            }

            Frame::VarDecl { decls, mut index } => {
                if let Some(Completion::Normal(v)) = input {
                    let name = decls[index].name.name.clone();
                    self.scope.bind(name, v, true);
                    index += 1;
                }
                while index < decls.len() {
                    match &decls[index].init {
                        None => {
                            let name = decls[index].name.name.clone();
                            self.scope.bind(name, Value::Undefined, true);
                            index += 1;
                        }
                        Some(init) => {
                            let init = init.clone();
                            self.stack.push(Frame::VarDecl { decls, index });
                            self.push_expr(&init)?;
                            return Ok(Flow::Pending);
                        }
                    }
                }
                Ok(Flow::Done(Completion::Normal(Value::Undefined)))
            }

            Frame::ReturnStmt => {
                let v = expect_normal(input)?;
                Ok(Flow::Done(Completion::Return(v)))
            }

            Frame::ThrowStmt => {
                let v = expect_normal(input)?;
                Ok(Flow::Done(Completion::Throw(Thrown {
                    value: v,
                    fault: None,
                    stack: self.collect_stack(),
                })))
            }

            Frame::IfStmt { cons, alt } => {
                let v = expect_normal(input)?;
                if ops::truthy(&v) {
                    self.push_stmt(&cons)?;
                    Ok(Flow::Pending)
                } else if let Some(alt) = alt {
                    self.push_stmt(&alt)?;
                    Ok(Flow::Pending)
                } else {
                    Ok(Flow::Done(Completion::Normal(Value::Undefined)))
                }
            }

            Frame::WhileLoop {
                cond,
                body,
                in_body,
            } => {
                let input = input.ok_or_else(|| missing_input("while"))?;
                if in_body {
                    match input {
                        Completion::Break => Ok(Flow::Done(Completion::Normal(Value::Undefined))),
                        Completion::Normal(_) | Completion::Continue => {
                            let c = cond.clone();
                            self.stack.push(Frame::WhileLoop {
                                cond,
                                body,
                                in_body: false,
                            });
                            self.push_expr(&c)?;
                            Ok(Flow::Pending)
                        }
                        _ => Err(missing_input("while body")),
                    }
                } else {
                    match input {
                        Completion::Normal(v) => {
                            if ops::truthy(&v) {
                                let b = body.clone();
                                self.stack.push(Frame::WhileLoop {
                                    cond,
                                    body,
                                    in_body: true,
                                });
                                self.push_stmt(&b)?;
                                Ok(Flow::Pending)
                            } else {
                                Ok(Flow::Done(Completion::Normal(Value::Undefined)))
                            }
                        }
                        _ => Err(missing_input("while condition")),
                    }
                }
            }

            Frame::ForLoop {
                cond,
                update,
                body,
                phase,
            } => {
                let input = input.ok_or_else(|| missing_input("for"))?;
                match phase {
                    ForPhase::Init => match input {
                        Completion::Normal(_) => self.for_to_cond(cond, update, body),
                        _ => Err(missing_input("for init")),
                    },
                    ForPhase::Cond => match input {
                        Completion::Normal(v) => {
                            if ops::truthy(&v) {
                                self.for_enter_body(cond, update, body)
                            } else {
                                Ok(Flow::Done(Completion::Normal(Value::Undefined)))
                            }
                        }
                        _ => Err(missing_input("for condition")),
                    },
                    ForPhase::Body => match input {
                        Completion::Break => Ok(Flow::Done(Completion::Normal(Value::Undefined))),
                        Completion::Normal(_) | Completion::Continue => {
                            if let Some(u) = update.clone() {
                                self.stack.push(Frame::ForLoop {
                                    cond,
                                    update,
                                    body,
                                    phase: ForPhase::Update,
                                });
                                self.push_expr(&u)?;
                                Ok(Flow::Pending)
                            } else {
                                self.for_to_cond(cond, update, body)
                            }
                        }
                        _ => Err(missing_input("for body")),
                    },
                    ForPhase::Update => match input {
                        Completion::Normal(_) => self.for_to_cond(cond, update, body),
                        _ => Err(missing_input("for update")),
                    },
                }
            }

            Frame::TryCatch {
                param,
                handler,
                saved_scope,
                in_handler,
            } => {
                let input = input.ok_or_else(|| missing_input("try"))?;
                if in_handler {
                    if let Some(scope) = saved_scope {
                        self.scope = scope;
                    }
                    return Ok(Flow::Done(input));
                }
                match input {
                    Completion::Throw(t) => {
                        let saved = self.scope.clone();
                        let catch_scope = saved.child();
                        catch_scope.bind(param.clone(), t.value, true);
                        self.scope = catch_scope;
                        self.stack.push(Frame::TryCatch {
                            param,
                            handler: handler.clone(),
                            saved_scope: Some(saved),
                            in_handler: true,
                        });
                        self.stack.push(Frame::Block {
                            body: handler,
                            index: 0,
                        });
                        Ok(Flow::Pending)
                    }
                    other => Ok(Flow::Done(other)),
                }
            }

            Frame::FunctionReturn {
                saved_scope,
                is_new,
                new_this,
            } => {
                self.scope = saved_scope;
                self.call_names.pop();
                let input = input.ok_or_else(|| missing_input("function body"))?;
                let value = match input {
                    Completion::Return(v) => v,
                    Completion::Normal(_) => Value::Undefined,
                    Completion::Throw(t) => return Ok(Flow::Done(Completion::Throw(t))),
                    _ => {
                        return Err(EngineError::Internal(
                            "loop completion escaped a function body".to_string(),
                        ))
                    }
                };
                let result = if is_new {
                    if value.is_object_like() {
                        value
                    } else {
                        new_this.unwrap_or(Value::Undefined)
                    }
                } else {
                    value
                };
                Ok(Flow::Done(Completion::Normal(result)))
            }

            Frame::Binary { op, right, left } => {
                let v = expect_normal(input)?;
                match left {
                    None => {
                        let right_expr =
                            right.ok_or_else(|| missing_input("binary operand"))?;
                        self.stack.push(Frame::Binary {
                            op,
                            right: None,
                            left: Some(v),
                        });
                        self.push_expr(&right_expr)?;
                        Ok(Flow::Pending)
                    }
                    Some(l) => self.fault_flow(ops::binary_op(op, &l, &v)),
                }
            }

            Frame::Logical { op, right } => {
                let l = expect_normal(input)?;
                let continue_right = match op {
                    LogicalOp::And => ops::truthy(&l),
                    LogicalOp::Or => !ops::truthy(&l),
                };
                if continue_right {
                    self.push_expr(&right)?;
                    Ok(Flow::Pending)
                } else {
                    Ok(Flow::Done(Completion::Normal(l)))
                }
            }

            Frame::Unary { op } => {
                let v = expect_normal(input)?;
                Ok(Flow::Done(Completion::Normal(ops::unary_op(op, &v))))
            }

            Frame::Conditional { cons, alt } => {
                let v = expect_normal(input)?;
                if ops::truthy(&v) {
                    self.push_expr(&cons)?;
                } else {
                    self.push_expr(&alt)?;
                }
                Ok(Flow::Pending)
            }

            Frame::ArrayLit {
                elements,
                mut index,
                array,
            } => {
                let v = expect_normal(input)?;
                {
                    let mut data = array.borrow_mut();
                    let key = index.to_string();
                    data.properties.insert(key.clone(), Property::data(v));
                    data.adjust_array_length(&key);
                }
                index += 1;
                if index < elements.len() {
                    let next = elements[index].clone();
                    self.stack.push(Frame::ArrayLit {
                        elements,
                        index,
                        array,
                    });
                    self.push_expr(&next)?;
                    Ok(Flow::Pending)
                } else {
                    Ok(Flow::Done(Completion::Normal(Value::Object(array))))
                }
            }

            Frame::ObjectLit {
                entries,
                mut index,
                object,
            } => {
                let v = expect_normal(input)?;
                object
                    .borrow_mut()
                    .properties
                    .insert(entries[index].key.clone(), Property::data(v));
                index += 1;
                if index < entries.len() {
                    let next = entries[index].value.clone();
                    self.stack.push(Frame::ObjectLit {
                        entries,
                        index,
                        object,
                    });
                    self.push_expr(&next)?;
                    Ok(Flow::Pending)
                } else {
                    Ok(Flow::Done(Completion::Normal(Value::Object(object))))
                }
            }

            Frame::MemberGet { name } => {
                let obj = expect_normal(input)?;
                self.fault_flow(ops::get_member(&self.env, &obj, &name))
            }

            Frame::IndexGet { index_expr, object } => {
                let v = expect_normal(input)?;
                match object {
                    None => {
                        let ix = index_expr.ok_or_else(|| missing_input("index"))?;
                        self.stack.push(Frame::IndexGet {
                            index_expr: None,
                            object: Some(v),
                        });
                        self.push_expr(&ix)?;
                        Ok(Flow::Pending)
                    }
                    Some(obj) => {
                        let key = ops::index_key(&v);
                        self.fault_flow(ops::get_member(&self.env, &obj, &key))
                    }
                }
            }

            Frame::Call(mut cf) => {
                let v = expect_normal(input)?;
                match cf.phase {
                    CallPhase::Callee => {
                        cf.func = v;
                        self.call_args(cf)
                    }
                    CallPhase::Object => {
                        cf.this_val = v;
                        if let Some(ix) = cf.index_expr.take() {
                            cf.phase = CallPhase::Index;
                            self.stack.push(Frame::Call(cf));
                            self.push_expr(&ix)?;
                            Ok(Flow::Pending)
                        } else {
                            let name = match cf.member.clone() {
                                Some(n) => n,
                                None => return Err(missing_input("method name")),
                            };
                            match ops::get_member(&self.env, &cf.this_val, &name) {
                                Ok(f) => {
                                    cf.func = f;
                                    self.call_args(cf)
                                }
                                Err(fault) => Ok(Flow::Done(self.throw_fault(fault))),
                            }
                        }
                    }
                    CallPhase::Index => {
                        let key = ops::index_key(&v);
                        match ops::get_member(&self.env, &cf.this_val, &key) {
                            Ok(f) => {
                                cf.func = f;
                                self.call_args(cf)
                            }
                            Err(fault) => Ok(Flow::Done(self.throw_fault(fault))),
                        }
                    }
                    CallPhase::Args => {
                        cf.arg_vals.push(v);
                        cf.arg_index += 1;
                        self.call_args(cf)
                    }
                }
            }

            Frame::AssignVar { name, op } => {
                let v = expect_normal(input)?;
                let final_v = match op {
                    Some(binop) => {
                        let old = match self.scope.lookup(&name) {
                            Some(v) => v,
                            None => {
                                return Ok(Flow::Done(self.throw_fault(Fault::reference_error(
                                    format!("{name} is not defined"),
                                ))))
                            }
                        };
                        match ops::binary_op(binop, &old, &v) {
                            Ok(x) => x,
                            Err(f) => return Ok(Flow::Done(self.throw_fault(f))),
                        }
                    }
                    None => v,
                };
                match self.scope.assign(&name, final_v.clone()) {
                    Ok(()) => Ok(Flow::Done(Completion::Normal(final_v))),
                    Err(f) => Ok(Flow::Done(self.throw_fault(f))),
                }
            }

            Frame::AssignMember(mut af) => {
                let v = expect_normal(input)?;
                match af.phase {
                    AssignPhase::Object => {
                        af.object = Some(v);
                        if let Some(name) = af.name.take() {
                            af.key = Some(name);
                            af.phase = AssignPhase::Value;
                            let value_expr = af.value_expr.clone();
                            self.stack.push(Frame::AssignMember(af));
                            self.push_expr(&value_expr)?;
                        } else {
                            let ix = match af.index_expr.take() {
                                Some(ix) => ix,
                                None => return Err(missing_input("assignment key")),
                            };
                            af.phase = AssignPhase::Index;
                            self.stack.push(Frame::AssignMember(af));
                            self.push_expr(&ix)?;
                        }
                        Ok(Flow::Pending)
                    }
                    AssignPhase::Index => {
                        af.key = Some(ops::index_key(&v));
                        af.phase = AssignPhase::Value;
                        let value_expr = af.value_expr.clone();
                        self.stack.push(Frame::AssignMember(af));
                        self.push_expr(&value_expr)?;
                        Ok(Flow::Pending)
                    }
                    AssignPhase::Value => {
                        let object = af.object.ok_or_else(|| missing_input("assignment"))?;
                        let key = af.key.ok_or_else(|| missing_input("assignment"))?;
                        let final_v = match af.op {
                            Some(binop) => {
                                let old = match ops::get_member(&self.env, &object, &key) {
                                    Ok(v) => v,
                                    Err(f) => return Ok(Flow::Done(self.throw_fault(f))),
                                };
                                match ops::binary_op(binop, &old, &v) {
                                    Ok(x) => x,
                                    Err(f) => return Ok(Flow::Done(self.throw_fault(f))),
                                }
                            }
                            None => v,
                        };
                        match ops::set_member(&self.env, &object, &key, final_v.clone()) {
                            Ok(()) => Ok(Flow::Done(Completion::Normal(final_v))),
                            Err(f) => Ok(Flow::Done(self.throw_fault(f))),
                        }
                    }
                }
            }

            Frame::UpdateMember {
                op,
                prefix,
                name,
                index_expr,
                object,
            } => {
                let v = expect_normal(input)?;
                match object {
                    None => {
                        if let Some(key) = name {
                            self.update_member(op, prefix, &v, &key)
                        } else {
                            let ix = index_expr.ok_or_else(|| missing_input("update key"))?;
                            self.stack.push(Frame::UpdateMember {
                                op,
                                prefix,
                                name: None,
                                index_expr: None,
                                object: Some(v),
                            });
                            self.push_expr(&ix)?;
                            Ok(Flow::Pending)
                        }
                    }
                    Some(obj) => {
                        let key = ops::index_key(&v);
                        self.update_member(op, prefix, &obj, &key)
                    }
                }
            }

            Frame::Invoke { func, this, args } => self.begin_invoke(func, this, args, false),
        }
    }

    fn for_to_cond(
        &mut self,
        cond: Option<ExprRef>,
        update: Option<ExprRef>,
        body: StmtRef,
    ) -> Result<Flow, EngineError> {
        if let Some(c) = cond.clone() {
            self.stack.push(Frame::ForLoop {
                cond,
                update,
                body,
                phase: ForPhase::Cond,
            });
            self.push_expr(&c)?;
            Ok(Flow::Pending)
        } else {
            self.for_enter_body(cond, update, body)
        }
    }

    fn for_enter_body(
        &mut self,
        cond: Option<ExprRef>,
        update: Option<ExprRef>,
        body: StmtRef,
    ) -> Result<Flow, EngineError> {
        let b = body.clone();
        self.stack.push(Frame::ForLoop {
            cond,
            update,
            body,
            phase: ForPhase::Body,
        });
        self.push_stmt(&b)?;
        Ok(Flow::Pending)
    }

    fn call_args(&mut self, mut cf: CallFrame) -> Result<Flow, EngineError> {
        cf.phase = CallPhase::Args;
        if cf.arg_index < cf.args.len() {
            let next = cf.args[cf.arg_index].clone();
            self.stack.push(Frame::Call(cf));
            self.push_expr(&next)?;
            Ok(Flow::Pending)
        } else {
            self.begin_invoke(cf.func, cf.this_val, cf.arg_vals, cf.is_new)
        }
    }

    fn update_member(
        &mut self,
        op: UpdateOp,
        prefix: bool,
        object: &Value,
        key: &str,
    ) -> Result<Flow, EngineError> {
        let old_v = match ops::get_member(&self.env, object, key) {
            Ok(v) => v,
            Err(f) => return Ok(Flow::Done(self.throw_fault(f))),
        };
        let old = ops::to_number(&old_v);
        let new = match op {
            UpdateOp::Increment => old + 1.0,
            UpdateOp::Decrement => old - 1.0,
        };
        if let Err(f) = ops::set_member(&self.env, object, key, Value::Number(new)) {
            return Ok(Flow::Done(self.throw_fault(f)));
        }
        Ok(Flow::Done(Completion::Normal(Value::Number(if prefix {
            new
        } else {
            old
        }))))
    }

    /// Start a call. Guest functions push an activation; builtins and host
    /// functions run synchronously within the current step.
    fn begin_invoke(
        &mut self,
        func: Value,
        this: Value,
        args: Vec<Value>,
        is_new: bool,
    ) -> Result<Flow, EngineError> {
        match &func {
            Value::Object(obj) => {
                let kind = obj.borrow().kind.clone();
                match kind {
                    ObjectKind::Function(data) => {
                        let new_this = if is_new {
                            Some(self.make_instance(&func))
                        } else {
                            None
                        };
                        let call_this = new_this.clone().unwrap_or(this);
                        let frame_scope = data.closure.child();
                        for (i, param) in data.params.iter().enumerate() {
                            frame_scope.bind(
                                param.clone(),
                                args.get(i).cloned().unwrap_or(Value::Undefined),
                                true,
                            );
                        }
                        frame_scope.bind("this", call_this, true);
                        let saved = std::mem::replace(&mut self.scope, frame_scope);
                        self.hoist_functions(&data.body);
                        self.call_names.push(
                            data.name
                                .clone()
                                .unwrap_or_else(|| "<anonymous>".to_string()),
                        );
                        self.stack.push(Frame::FunctionReturn {
                            saved_scope: saved,
                            is_new,
                            new_this,
                        });
                        self.stack.push(Frame::Block {
                            body: data.body.clone(),
                            index: 0,
                        });
                        Ok(Flow::Pending)
                    }
                    ObjectKind::Builtin(b) => match (b.func)(&self.env, &this, &args) {
                        Ok(BuiltinOutcome::Value(v)) => Ok(Flow::Done(Completion::Normal(v))),
                        Ok(BuiltinOutcome::Invoke { func, this, args }) => {
                            self.begin_invoke(func, this, args, false)
                        }
                        Err(f) => Ok(Flow::Done(self.throw_fault(f))),
                    },
                    _ => Ok(Flow::Done(
                        self.throw_fault(Fault::type_error(not_a_function(&func))),
                    )),
                }
            }
            Value::Bridge(Native::Function(nf)) => {
                let native_this = self.env.to_native(&this);
                let native_args: Vec<Native> =
                    args.iter().map(|a| self.env.to_native(a)).collect();
                let callee = if is_new {
                    nf.construct.clone().unwrap_or_else(|| nf.call.clone())
                } else {
                    nf.call.clone()
                };
                match callee(native_this, &native_args) {
                    Ok(r) => Ok(Flow::Done(Completion::Normal(self.env.from_native(&r)))),
                    Err(f) => Ok(Flow::Done(self.throw_fault(f))),
                }
            }
            _ => Ok(Flow::Done(
                self.throw_fault(Fault::type_error(not_a_function(&func))),
            )),
        }
    }

    /// The fresh `this` for a `new` expression, linked to the function's
    /// `prototype` object.
    fn make_instance(&self, func: &Value) -> Value {
        let instance = self.env.new_object();
        if let Value::Object(fobj) = func {
            if let Some(p) = fobj.borrow().properties.get("prototype") {
                if let Value::Object(proto) = &p.value {
                    instance.borrow_mut().prototype = Some(proto.clone());
                }
            }
        }
        Value::Object(instance)
    }
}

fn expect_normal(input: Option<Completion>) -> Result<Value, EngineError> {
    match input {
        Some(Completion::Normal(v)) => Ok(v),
        _ => Err(EngineError::Internal(
            "expression frame expected a value".to_string(),
        )),
    }
}

fn missing_input(context: &str) -> EngineError {
    EngineError::Internal(format!("evaluator frame desynchronized at {context}"))
}

fn not_a_function(v: &Value) -> String {
    format!("{} is not a function", ops::debug_string(v))
}
