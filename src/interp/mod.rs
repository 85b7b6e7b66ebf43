//! Tree-walking interpreter for type-checked programs.
//!
//! Contract checks are not interpreted from the specifications directly: the
//! weaver emits [`CheckCode`]s into a [`WovenProgram`], and the interpreter
//! runs whatever codes sit at each program point it passes.

mod error;
mod value;

pub use error::RuntimeError;
pub use value::{Heap, HeapObject, Value};

use std::collections::HashMap;

use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::contracts::effects::{Root, Step};
use crate::contracts::{BoundClause, CheckCode, CodeEmitter, ContractViolation, ProgramPoint, TargetPath, ThrowsCheck, ViolationKind};
use crate::parser::ast::{BinOp, CallSiteId, DeclId, UnaryOp};
use crate::span::{Span, Spanned};
use crate::typeck::env::{Env, InitItem};
use crate::typeck::typed::{Receiver, SlotId, TCatch, TExpr, TStmt, TypedExpr};

/// Checks emitted by the weaver, keyed by declaration and program point.
#[derive(Debug, Default)]
pub struct CheckTable {
    codes: HashMap<(DeclId, ProgramPoint), Vec<CheckCode>>,
}

impl CheckTable {
    /// Codes at `point` of `decl`, in emission order.
    pub fn codes_at(&self, decl: DeclId, point: ProgramPoint) -> &[CheckCode] {
        self.codes.get(&(decl, point)).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.codes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl CodeEmitter for CheckTable {
    fn emit_at(&mut self, decl: DeclId, point: ProgramPoint, code: CheckCode) {
        self.codes.entry((decl, point)).or_default().push(code);
    }
}

/// A type-checked program together with the checks woven into it.
#[derive(Debug)]
pub struct WovenProgram {
    pub env: Env,
    pub checks: CheckTable,
}

impl WovenProgram {
    pub fn new(env: Env, checks: CheckTable) -> Self {
        Self { env, checks }
    }

    pub fn codes_at(&self, decl: DeclId, point: ProgramPoint) -> &[CheckCode] {
        self.checks.codes_at(decl, point)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Returned(Value),
    /// An exception escaped the entry point.
    Threw { class: String },
    Violated(ContractViolation),
}

/// Why evaluation stopped early.
#[derive(Debug)]
enum Unwind {
    /// A program exception; catchable.
    Throw(usize),
    /// Never caught by the program, though `finally` blocks still run.
    Violation(ContractViolation),
    Fatal(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(e: RuntimeError) -> Self {
        Unwind::Fatal(e)
    }
}

impl From<ContractViolation> for Unwind {
    fn from(v: ContractViolation) -> Self {
        tracing::debug!(kind = %v.kind, member = %v.member, clause = %v.clause, "contract violated");
        Unwind::Violation(v)
    }
}

type Exec<T> = Result<T, Unwind>;

fn internal(message: impl Into<String>) -> Unwind {
    Unwind::Fatal(RuntimeError::internal(message))
}

enum Flow {
    Normal,
    Return(Value, Span),
}

struct Frame {
    decl: DeclId,
    this: Option<usize>,
    /// Argument values as passed; clauses read parameters from here.
    args: Vec<Value>,
    scopes: Vec<HashMap<String, Value>>,
    slots: HashMap<SlotId, Value>,
    result: Value,
    /// Return statement that ended the body, if any.
    exit: Option<Span>,
    thrown: Option<usize>,
}

impl Frame {
    fn new(decl: DeclId, this: Option<usize>, args: Vec<Value>) -> Self {
        Self {
            decl,
            this,
            args,
            scopes: vec![HashMap::new()],
            slots: HashMap::new(),
            result: Value::Void,
            exit: None,
            thrown: None,
        }
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn assign(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }
}

pub struct Interpreter<'p> {
    program: &'p WovenProgram,
    heap: Heap,
    /// (declaring class, field) → value.
    statics: HashMap<(String, String), Value>,
    depth: usize,
    max_depth: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p WovenProgram, config: &RuntimeConfig) -> Self {
        Self { program, heap: Heap::default(), statics: HashMap::new(), depth: 0, max_depth: config.max_call_depth }
    }

    fn env(&self) -> &'p Env {
        &self.program.env
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Initialize static fields, then call `entry` (`Class.method`, static and
    /// without parameters).
    pub fn run(&mut self, entry: &str) -> Result<Outcome, RuntimeError> {
        let method = self.find_entry(entry)?;
        tracing::info!(entry, "running");
        let result = self.init_statics().and_then(|()| self.invoke(method, None, Vec::new()));
        match result {
            Ok(value) => Ok(Outcome::Returned(value)),
            Err(Unwind::Throw(exception)) => {
                let class = self.heap.class_of(exception).unwrap_or_default().to_string();
                Ok(Outcome::Threw { class })
            }
            Err(Unwind::Violation(violation)) => Ok(Outcome::Violated(violation)),
            Err(Unwind::Fatal(e)) => Err(e),
        }
    }

    fn find_entry(&self, entry: &str) -> Result<DeclId, RuntimeError> {
        let unknown = || RuntimeError::UnknownEntry { entry: entry.to_string() };
        let (class, name) = entry.split_once('.').ok_or_else(unknown)?;
        let candidates = self.env().lookup_methods(class, name);
        if candidates.is_empty() {
            return Err(unknown());
        }
        candidates
            .into_iter()
            .find(|m| m.is_static && m.params.is_empty())
            .map(|m| m.id)
            .ok_or_else(|| RuntimeError::BadEntry { entry: entry.to_string() })
    }

    fn init_statics(&mut self) -> Exec<()> {
        let env = self.env();
        let statics: Vec<_> = env
            .classes
            .values()
            .flat_map(|c| c.fields.iter())
            .filter_map(|id| env.field(*id))
            .filter(|f| f.is_static)
            .collect();

        for field in &statics {
            self.statics.insert((field.owner.clone(), field.name.clone()), Value::default_for(&field.ty));
        }
        for field in statics {
            let Some(init) = env.field_inits.get(&field.id) else { continue };
            let mut frame = Frame::new(field.id, None, Vec::new());
            let value = self.eval(&mut frame, init)?;
            self.statics.insert((field.owner.clone(), field.name.clone()), value);
        }
        Ok(())
    }

    // ── Members ──────────────────────────────────────────────────────

    fn invoke(&mut self, decl: DeclId, this: Option<usize>, args: Vec<Value>) -> Exec<Value> {
        let env = self.env();
        let method = env.method(decl).ok_or_else(|| internal(format!("unknown member {decl}")))?;
        if self.depth >= self.max_depth {
            return Err(RuntimeError::RecursionLimitExceeded { member: method.qualified_name(), limit: self.max_depth }.into());
        }
        self.depth += 1;
        tracing::trace!(member = %method.qualified_name(), depth = self.depth, "invoke");

        let mut frame = Frame::new(decl, this, args);
        for ((name, _), value) in method.params.iter().zip(frame.args.clone()) {
            frame.declare(name, value);
        }
        let completed = self.run_member(&mut frame, method.is_constructor);
        let result = self.exit(&mut frame, completed);
        self.depth -= 1;
        result
    }

    fn run_member(&mut self, frame: &mut Frame, is_ctor: bool) -> Exec<Flow> {
        self.run_codes(frame, ProgramPoint::Entry)?;
        if is_ctor {
            return self.construct(frame);
        }
        let env = self.env();
        match env.method(frame.decl).filter(|m| m.has_body).and_then(|_| env.body(frame.decl)) {
            Some(body) => self.exec_stmts(frame, body),
            None => {
                let class = frame.this.and_then(|r| self.heap.class_of(r)).unwrap_or_default().to_string();
                Err(RuntimeError::NoImplementation { member: env.describe(frame.decl), class }.into())
            }
        }
    }

    /// Superclass constructor, then initializers, then the rest of the body.
    fn construct(&mut self, frame: &mut Frame) -> Exec<Flow> {
        let env = self.env();
        let this = frame.this.ok_or_else(|| internal("constructor without an object"))?;
        let ctor = env.method(frame.decl).ok_or_else(|| internal("unknown constructor"))?;
        let body = env.body(frame.decl).unwrap_or(&[]);

        let rest = match body.split_first() {
            Some((Spanned { node: TStmt::SuperCall { ctor: sup, args, .. }, .. }, rest)) => {
                let args = self.eval_args(frame, args)?;
                self.invoke(*sup, Some(this), args)?;
                rest
            }
            _ => {
                if let Some(sup) = env.class(&ctor.owner).and_then(|c| c.superclass.as_deref()) {
                    let default = env
                        .constructors(sup)
                        .into_iter()
                        .find(|c| c.params.is_empty())
                        .ok_or_else(|| internal(format!("`{sup}` has no no-argument constructor")))?;
                    self.invoke(default.id, Some(this), Vec::new())?;
                }
                body
            }
        };

        self.run_initializers(&ctor.owner, this)?;
        self.exec_stmts(frame, rest)
    }

    fn run_initializers(&mut self, class: &str, this: usize) -> Exec<()> {
        let env = self.env();
        let Some(info) = env.class(class) else { return Ok(()) };
        for item in &info.init_order {
            match *item {
                InitItem::Field(id) => {
                    let (Some(field), Some(init)) = (env.field(id), env.field_inits.get(&id)) else { continue };
                    let mut frame = Frame::new(id, Some(this), Vec::new());
                    let value = self.eval(&mut frame, init)?;
                    self.set_field(this, &field.name, value)?;
                }
                InitItem::Block(id) => {
                    let mut frame = Frame::new(id, Some(this), Vec::new());
                    self.exec_stmts(&mut frame, env.body(id).unwrap_or(&[]))?;
                }
            }
        }
        Ok(())
    }

    /// Exit checks run after every `finally` block of the body.
    fn exit(&mut self, frame: &mut Frame, completed: Exec<Flow>) -> Exec<Value> {
        match completed {
            Ok(flow) => {
                let value = match flow {
                    Flow::Return(value, span) => {
                        frame.exit = Some(span);
                        value
                    }
                    Flow::Normal => Value::Void,
                };
                frame.result = value.clone();
                self.run_codes(frame, ProgramPoint::NormalExit)?;
                Ok(value)
            }
            Err(Unwind::Throw(exception)) => {
                frame.thrown = Some(exception);
                self.run_codes(frame, ProgramPoint::ExceptionalExit)?;
                Err(Unwind::Throw(exception))
            }
            Err(other) => Err(other),
        }
    }

    // ── Woven checks ─────────────────────────────────────────────────

    fn run_codes(&mut self, frame: &mut Frame, point: ProgramPoint) -> Exec<()> {
        let program = self.program;
        for code in program.codes_at(frame.decl, point) {
            match code {
                CheckCode::Snapshot(site) => {
                    for (slot, expr) in &site.slots {
                        let value = self.eval(frame, expr)?;
                        frame.slots.insert(*slot, value);
                    }
                }
                CheckCode::Precondition(groups) => self.check_preconditions(frame, groups)?,
                CheckCode::Postcondition(posts) => {
                    for post in posts {
                        if !self.holds(frame, post)? {
                            let detail = match frame.exit {
                                Some(_) => "at return".to_string(),
                                None => "at end of body".to_string(),
                            };
                            return Err(self.violation(ViolationKind::Postcondition, frame, post, detail).into());
                        }
                    }
                }
                CheckCode::Throws { throws, may_throw } => self.check_throws(frame, throws, may_throw)?,
                CheckCode::Reverify(_) => {}
            }
        }
        Ok(())
    }

    fn holds(&mut self, frame: &mut Frame, clause: &BoundClause) -> Exec<bool> {
        self.eval(frame, &clause.expr)?
            .as_bool()
            .ok_or_else(|| internal(format!("clause `{}` did not evaluate to a boolean", clause.text)))
    }

    fn violation(&self, kind: ViolationKind, frame: &Frame, clause: &BoundClause, detail: String) -> ContractViolation {
        ContractViolation {
            kind,
            member: self.env().describe(frame.decl),
            clause: clause.text.clone(),
            span: clause.span,
            site: frame.exit,
            detail,
        }
    }

    fn check_preconditions(&mut self, frame: &mut Frame, groups: &[Vec<BoundClause>]) -> Exec<()> {
        let mut failed: Vec<&BoundClause> = Vec::new();
        'groups: for group in groups {
            for clause in group {
                if !self.holds(frame, clause)? {
                    failed.push(clause);
                    continue 'groups;
                }
            }
            return Ok(());
        }
        let clause = failed.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" || ");
        let span = failed.first().map_or(Span::dummy(), |c| c.span);
        Err(ContractViolation {
            kind: ViolationKind::Precondition,
            member: self.env().describe(frame.decl),
            clause,
            span,
            site: None,
            detail: "at entry".to_string(),
        }
        .into())
    }

    fn check_throws(&self, frame: &Frame, throws: &[ThrowsCheck], may_throw: &[String]) -> Exec<()> {
        let env = self.env();
        let held: Vec<&ThrowsCheck> =
            throws.iter().filter(|t| frame.slots.get(&t.slot) == Some(&Value::Bool(true))).collect();
        let kind = ViolationKind::ExceptionalPostcondition;

        let Some(exception) = frame.thrown else {
            return match held.first() {
                Some(t) => {
                    let detail = format!("completed normally although it must throw {}", t.exception);
                    Err(self.violation(kind, frame, &t.clause, detail).into())
                }
                None => Ok(()),
            };
        };

        let class = self.heap.class_of(exception).unwrap_or_default();
        if let Some(t) = held.iter().find(|t| !env.is_subtype(class, &t.exception)) {
            let detail = format!("threw {class} but must throw {}", t.exception);
            return Err(self.violation(kind, frame, &t.clause, detail).into());
        }
        if let Some(named) = throws.iter().find(|t| env.is_subtype(class, &t.exception)) {
            // A slot left empty means the entry checks threw before reaching it
            let unknown =
                throws.iter().any(|t| env.is_subtype(class, &t.exception) && !frame.slots.contains_key(&t.slot));
            let licensed = unknown
                || held.iter().any(|t| env.is_subtype(class, &t.exception))
                || may_throw.iter().any(|m| env.is_subtype(class, m));
            if !licensed {
                let detail = format!("threw {class} although no condition for it held at entry");
                return Err(self.violation(kind, frame, &named.clause, detail).into());
            }
        }
        Ok(())
    }

    /// Re-check the invariants the weaver attached to a call site.
    fn after_call(&mut self, caller: DeclId, site: CallSiteId, this: Option<usize>, args: &[Value]) -> Exec<()> {
        let program = self.program;
        let env = self.env();
        for code in program.codes_at(caller, ProgramPoint::AfterCall(site)) {
            let CheckCode::Reverify(obligations) = code else { continue };
            for obligation in obligations {
                for object in self.reach(&obligation.object, this, args)? {
                    let mut frame = Frame::new(obligation.clause.origin, Some(object), Vec::new());
                    if self.holds(&mut frame, &obligation.clause)? {
                        continue;
                    }
                    let call = env.call_sites.get(&site);
                    let callee = call.map(|s| env.describe(s.callee)).unwrap_or_default();
                    return Err(ContractViolation {
                        kind: ViolationKind::Invariant,
                        member: obligation.class.clone(),
                        clause: obligation.clause.text.clone(),
                        span: obligation.clause.span,
                        site: call.map(|s| s.span),
                        detail: format!("after call to {callee}, on {}", obligation.object),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Objects a path denotes from the callee's receiver and arguments. Null
    /// links end navigation along that branch.
    fn reach(&mut self, path: &TargetPath, this: Option<usize>, args: &[Value]) -> Exec<Vec<usize>> {
        let mut steps = path.steps.iter();
        let mut current: Vec<Value> = match &path.root {
            Root::This => this.map(Value::Ref).into_iter().collect(),
            Root::Param(index) => args.get(*index).cloned().into_iter().collect(),
            Root::Static(class) => match steps.next() {
                Some((Step::Field(field), _)) => {
                    let key = self.static_key(class, field);
                    self.statics.get(&key).cloned().into_iter().collect()
                }
                _ => Vec::new(),
            },
        };

        for (step, _) in steps {
            let mut next = Vec::new();
            for value in current {
                let Value::Ref(r) = value else { continue };
                match step {
                    Step::Field(field) => next.push(self.get_field(r, field)?),
                    Step::Accessor(name) => next.push(self.call_accessor(r, name)?),
                    Step::Elements => {
                        if let Some(HeapObject::Array { items }) = self.heap.get(r) {
                            next.extend(items.iter().cloned());
                        }
                    }
                }
            }
            current = next;
        }
        Ok(current.iter().filter_map(Value::as_object).collect())
    }

    fn call_accessor(&mut self, object: usize, name: &str) -> Exec<Value> {
        let env = self.env();
        let class = self.heap.class_of(object).unwrap_or_default().to_string();
        let method = env
            .lookup_methods(&class, name)
            .into_iter()
            .find(|m| !m.is_static && m.params.is_empty())
            .ok_or_else(|| internal(format!("no accessor `{name}` on `{class}`")))?;
        self.invoke(env.dispatch(&class, method.id), Some(object), Vec::new())
    }

    // ── Statements ───────────────────────────────────────────────────

    fn exec_stmts(&mut self, frame: &mut Frame, stmts: &[Spanned<TStmt>]) -> Exec<Flow> {
        for stmt in stmts {
            let flow = self.exec(frame, stmt)?;
            if matches!(flow, Flow::Return(..)) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, frame: &mut Frame, stmts: &[Spanned<TStmt>]) -> Exec<Flow> {
        frame.scopes.push(HashMap::new());
        let flow = self.exec_stmts(frame, stmts);
        frame.scopes.pop();
        flow
    }

    fn exec_nested(&mut self, frame: &mut Frame, stmt: &Spanned<TStmt>) -> Exec<Flow> {
        frame.scopes.push(HashMap::new());
        let flow = self.exec(frame, stmt);
        frame.scopes.pop();
        flow
    }

    fn exec(&mut self, frame: &mut Frame, stmt: &Spanned<TStmt>) -> Exec<Flow> {
        match &stmt.node {
            TStmt::Local { name, ty, value } => {
                let value = match value {
                    Some(e) => self.eval(frame, e)?,
                    None => Value::default_for(ty),
                };
                frame.declare(name, value);
            }
            TStmt::AssignLocal { name, value } => {
                let value = self.eval(frame, value)?;
                if !frame.assign(name, value) {
                    return Err(internal(format!("assignment to unbound local `{name}`")));
                }
            }
            TStmt::AssignField { object, field, value } => {
                let object = self.eval_object(frame, object)?;
                let value = self.eval(frame, value)?;
                self.set_field(object, field, value)?;
            }
            TStmt::AssignStatic { class, field, value } => {
                let value = self.eval(frame, value)?;
                let key = self.static_key(class, field);
                self.statics.insert(key, value);
            }
            TStmt::AssignIndex { array, index, value } => {
                let array = self.eval_object(frame, array)?;
                let index = self.eval_int(frame, index)?;
                let value = self.eval(frame, value)?;
                self.store_element(array, index, value)?;
            }
            TStmt::Expr(e) => {
                self.eval(frame, e)?;
            }
            TStmt::If { cond, then_branch, else_branch } => {
                if self.eval_bool(frame, cond)? {
                    return self.exec_nested(frame, then_branch);
                }
                if let Some(else_branch) = else_branch {
                    return self.exec_nested(frame, else_branch);
                }
            }
            TStmt::While { cond, body } => {
                while self.eval_bool(frame, cond)? {
                    let flow = self.exec_nested(frame, body)?;
                    if matches!(flow, Flow::Return(..)) {
                        return Ok(flow);
                    }
                }
            }
            TStmt::Return(value) => {
                let value = match value {
                    Some(e) => self.eval(frame, e)?,
                    None => Value::Void,
                };
                return Ok(Flow::Return(value, stmt.span));
            }
            TStmt::Throw(e) => {
                let exception = self.eval_object(frame, e)?;
                return Err(Unwind::Throw(exception));
            }
            // Handled by `construct`
            TStmt::SuperCall { .. } => {}
            TStmt::Try { body, catches, finally } => return self.exec_try(frame, body, catches, finally.as_deref()),
            TStmt::Block(stmts) => return self.exec_block(frame, stmts),
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        frame: &mut Frame,
        body: &[Spanned<TStmt>],
        catches: &[TCatch],
        finally: Option<&[Spanned<TStmt>]>,
    ) -> Exec<Flow> {
        let mut outcome = self.exec_block(frame, body);

        if let Err(Unwind::Throw(exception)) = &outcome {
            let exception = *exception;
            let env = self.env();
            let class = self.heap.class_of(exception).unwrap_or_default().to_string();
            if let Some(handler) = catches.iter().find(|c| env.is_subtype(&class, &c.class)) {
                frame.scopes.push(HashMap::from([(handler.var.clone(), Value::Ref(exception))]));
                outcome = self.exec_stmts(frame, &handler.body);
                frame.scopes.pop();
            }
        }

        let Some(finally) = finally else { return outcome };
        let cleanup = self.exec_block(frame, finally);
        // A violation or fatal error keeps unwinding whatever `finally` does
        if matches!(outcome, Err(Unwind::Violation(_) | Unwind::Fatal(_))) {
            return outcome;
        }
        match cleanup? {
            flow @ Flow::Return(..) => Ok(flow),
            Flow::Normal => outcome,
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn eval(&mut self, frame: &mut Frame, expr: &TypedExpr) -> Exec<Value> {
        match &expr.kind {
            TExpr::Int(n) => Ok(Value::Int(*n)),
            TExpr::Bool(b) => Ok(Value::Bool(*b)),
            TExpr::Null => Ok(Value::Null),
            TExpr::This => frame.this.map(Value::Ref).ok_or_else(|| internal("`this` outside an instance")),
            TExpr::Local(name) => frame.lookup(name).cloned().ok_or_else(|| internal(format!("unbound local `{name}`"))),
            TExpr::Param { index, name } => {
                frame.args.get(*index).cloned().ok_or_else(|| internal(format!("missing argument `{name}`")))
            }
            TExpr::Field { object, field } => {
                let object = self.eval_object(frame, object)?;
                self.get_field(object, field)
            }
            TExpr::StaticField { class, field } => {
                let key = self.static_key(class, field);
                Ok(self.statics.get(&key).cloned().unwrap_or(Value::Null))
            }
            TExpr::Length(array) => {
                let array = self.eval_object(frame, array)?;
                match self.heap.get(array) {
                    Some(HeapObject::Array { items }) => Ok(Value::Int(items.len() as i64)),
                    _ => Err(internal("`length` of a non-array")),
                }
            }
            TExpr::Index { array, index } => {
                let array = self.eval_object(frame, array)?;
                let index = self.eval_int(frame, index)?;
                self.load_element(array, index)
            }
            TExpr::Binary { op, lhs, rhs } => self.eval_binary(frame, *op, lhs, rhs),
            TExpr::Unary { op, operand } => match (op, self.eval(frame, operand)?) {
                (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (_, value) => Err(internal(format!("cannot apply {op} to {value}"))),
            },
            TExpr::Call { site, receiver, method, args, .. } => self.eval_call(frame, *site, receiver, *method, args),
            TExpr::New { site, class, ctor, args } => {
                let args = self.eval_args(frame, args)?;
                let object = self.instantiate(class);
                self.invoke(*ctor, Some(object), args.clone())?;
                self.after_call(frame.decl, *site, Some(object), &args)?;
                Ok(Value::Ref(object))
            }
            TExpr::NewArray { elem, len } => {
                let len = self.eval_int(frame, len)?;
                let Ok(len) = usize::try_from(len) else {
                    return Err(self.exception("IllegalArgumentException"));
                };
                let items = vec![Value::default_for(elem); len];
                Ok(Value::Ref(self.heap.alloc(HeapObject::Array { items })))
            }
            TExpr::Result => Ok(frame.result.clone()),
            TExpr::Slot(slot) => frame.slots.get(slot).cloned().ok_or_else(|| internal(format!("empty slot {expr}"))),
            TExpr::Old(_) | TExpr::Spread(_) => Err(internal(format!("`{expr}` cannot be evaluated"))),
        }
    }

    fn eval_binary(&mut self, frame: &mut Frame, op: BinOp, lhs: &TypedExpr, rhs: &TypedExpr) -> Exec<Value> {
        match op {
            BinOp::And => return Ok(Value::Bool(self.eval_bool(frame, lhs)? && self.eval_bool(frame, rhs)?)),
            BinOp::Or => return Ok(Value::Bool(self.eval_bool(frame, lhs)? || self.eval_bool(frame, rhs)?)),
            _ => {}
        }
        let l = self.eval(frame, lhs)?;
        let r = self.eval(frame, rhs)?;
        let (a, b) = match (op, &l, &r) {
            (BinOp::Eq, ..) => return Ok(Value::Bool(l == r)),
            (BinOp::Neq, ..) => return Ok(Value::Bool(l != r)),
            (_, Value::Int(a), Value::Int(b)) => (*a, *b),
            _ => return Err(internal(format!("cannot apply {op} to {l} and {r}"))),
        };
        Ok(match op {
            BinOp::Add => Value::Int(a.wrapping_add(b)),
            BinOp::Sub => Value::Int(a.wrapping_sub(b)),
            BinOp::Mul => Value::Int(a.wrapping_mul(b)),
            BinOp::Div | BinOp::Mod if b == 0 => return Err(self.exception("ArithmeticException")),
            BinOp::Div => Value::Int(a.wrapping_div(b)),
            BinOp::Mod => Value::Int(a.wrapping_rem(b)),
            BinOp::Lt => Value::Bool(a < b),
            BinOp::Gt => Value::Bool(a > b),
            BinOp::LtEq => Value::Bool(a <= b),
            BinOp::GtEq => Value::Bool(a >= b),
            BinOp::Eq | BinOp::Neq | BinOp::And | BinOp::Or => return Err(internal(format!("unexpected {op}"))),
        })
    }

    fn eval_call(
        &mut self,
        frame: &mut Frame,
        site: CallSiteId,
        receiver: &Receiver,
        method: DeclId,
        args: &[TypedExpr],
    ) -> Exec<Value> {
        let this = match receiver {
            Receiver::Static => None,
            Receiver::Virtual(object) => Some(self.eval_object(frame, object)?),
        };
        let args = self.eval_args(frame, args)?;
        let target = match this {
            Some(r) => self.env().dispatch(self.heap.class_of(r).unwrap_or_default(), method),
            None => method,
        };
        match self.invoke(target, this, args.clone()) {
            Ok(value) => {
                self.after_call(frame.decl, site, this, &args)?;
                Ok(value)
            }
            // A mutator that throws may still have broken an invariant
            Err(Unwind::Throw(exception)) => {
                self.after_call(frame.decl, site, this, &args)?;
                Err(Unwind::Throw(exception))
            }
            Err(other) => Err(other),
        }
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &[TypedExpr]) -> Exec<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(frame, arg)?);
        }
        Ok(values)
    }

    fn eval_bool(&mut self, frame: &mut Frame, expr: &TypedExpr) -> Exec<bool> {
        let value = self.eval(frame, expr)?;
        value.as_bool().ok_or_else(|| internal(format!("expected a boolean, got {value}")))
    }

    fn eval_int(&mut self, frame: &mut Frame, expr: &TypedExpr) -> Exec<i64> {
        let value = self.eval(frame, expr)?;
        value.as_int().ok_or_else(|| internal(format!("expected an int, got {value}")))
    }

    /// Evaluate to a heap reference; `null` throws.
    fn eval_object(&mut self, frame: &mut Frame, expr: &TypedExpr) -> Exec<usize> {
        match self.eval(frame, expr)? {
            Value::Ref(r) => Ok(r),
            Value::Null => Err(self.exception("NullPointerException")),
            other => Err(internal(format!("expected an object, got {other}"))),
        }
    }

    // ── Heap ─────────────────────────────────────────────────────────

    /// Allocate an instance with every field at its default value.
    fn instantiate(&mut self, class: &str) -> usize {
        let env = self.env();
        let fields = env
            .class_chain(class)
            .into_iter()
            .flat_map(|c| c.fields.iter())
            .filter_map(|id| env.field(*id))
            .filter(|f| !f.is_static)
            .map(|f| (f.name.clone(), Value::default_for(&f.ty)))
            .collect();
        self.heap.alloc(HeapObject::Instance { class: class.to_string(), fields })
    }

    /// A fresh built-in exception, ready to throw.
    fn exception(&mut self, class: &str) -> Unwind {
        tracing::debug!(class, "runtime exception");
        Unwind::Throw(self.heap.alloc(HeapObject::Instance { class: class.to_string(), fields: HashMap::new() }))
    }

    fn static_key(&self, class: &str, field: &str) -> (String, String) {
        match self.env().lookup_field(class, field) {
            Some(f) => (f.owner.clone(), f.name.clone()),
            None => (class.to_string(), field.to_string()),
        }
    }

    fn get_field(&self, object: usize, field: &str) -> Exec<Value> {
        match self.heap.get(object) {
            Some(HeapObject::Instance { fields, .. }) => {
                fields.get(field).cloned().ok_or_else(|| internal(format!("no field `{field}`")))
            }
            _ => Err(internal(format!("field `{field}` of a non-object"))),
        }
    }

    fn set_field(&mut self, object: usize, field: &str, value: Value) -> Exec<()> {
        match self.heap.get_mut(object) {
            Some(HeapObject::Instance { fields, .. }) => {
                fields.insert(field.to_string(), value);
                Ok(())
            }
            _ => Err(internal(format!("field `{field}` of a non-object"))),
        }
    }

    fn element_index(&self, array: usize, index: i64) -> Exec<Option<usize>> {
        match self.heap.get(array) {
            Some(HeapObject::Array { items }) => {
                Ok(usize::try_from(index).ok().filter(|i| *i < items.len()))
            }
            _ => Err(internal("indexing a non-array")),
        }
    }

    fn load_element(&mut self, array: usize, index: i64) -> Exec<Value> {
        let Some(i) = self.element_index(array, index)? else {
            return Err(self.exception("ArrayIndexOutOfBoundsException"));
        };
        match self.heap.get(array) {
            Some(HeapObject::Array { items }) => Ok(items[i].clone()),
            _ => Err(internal("indexing a non-array")),
        }
    }

    fn store_element(&mut self, array: usize, index: i64, value: Value) -> Exec<()> {
        let Some(i) = self.element_index(array, index)? else {
            return Err(self.exception("ArrayIndexOutOfBoundsException"));
        };
        if let Some(HeapObject::Array { items }) = self.heap.get_mut(array) {
            items[i] = value;
        }
        Ok(())
    }
}
