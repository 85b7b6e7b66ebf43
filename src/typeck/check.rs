//! Type checking of bodies, field initializers and clause expressions.

use std::collections::HashMap;

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::span::{Span, Spanned};

use super::env::{CallKind, CallSite, Env, MethodInfo};
use super::register::resolve_type;
use super::typed::{Receiver, TCatch, TExpr, TStmt, TypedExpr};
use super::types::Type;

/// Names a clause expression may refer to besides the owner's members.
#[derive(Debug, Clone)]
pub struct ClauseFrame {
    pub params: Vec<(String, Type)>,
    /// Type of `result`; `None` where `result` has no value.
    pub result: Option<Type>,
}

pub(crate) struct Checker<'e> {
    env: &'e Env,
    class: String,
    decl: DeclId,
    is_static: bool,
    is_ctor: bool,
    return_type: Type,
    scopes: Vec<HashMap<String, Type>>,
    clause: Option<ClauseFrame>,
    pub(crate) sites: Vec<CallSite>,
}

impl<'e> Checker<'e> {
    pub(crate) fn for_body(env: &'e Env, class: &str, decl: DeclId, is_static: bool) -> Self {
        Self {
            env,
            class: class.to_string(),
            decl,
            is_static,
            is_ctor: false,
            return_type: Type::Void,
            scopes: vec![HashMap::new()],
            clause: None,
            sites: Vec::new(),
        }
    }

    pub(crate) fn for_method(env: &'e Env, method: &MethodInfo) -> Self {
        let mut checker = Self::for_body(env, &method.owner, method.id, method.is_static);
        checker.is_ctor = method.is_constructor;
        checker.return_type = method.ret.clone();
        for (name, ty) in &method.params {
            checker.declare_param(name, ty.clone());
        }
        checker
    }

    pub(crate) fn for_clause(env: &'e Env, class: &str, decl: DeclId, is_static: bool, frame: ClauseFrame) -> Self {
        let mut checker = Self::for_body(env, class, decl, is_static);
        checker.clause = Some(frame);
        checker
    }

    fn declare_param(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn lookup_local(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn declare_local(&mut self, name: &Spanned<String>, ty: Type) -> Result<(), CompileError> {
        if self.lookup_local(&name.node).is_some() {
            return Err(CompileError::type_err(
                format!("variable `{}` is already defined", name.node),
                name.span,
            ));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.node.clone(), ty);
        }
        Ok(())
    }

    fn in_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, CompileError>) -> Result<T, CompileError> {
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn expect_assignable(&self, expr: &TypedExpr, to: &Type, what: &str) -> Result<(), CompileError> {
        if self.env.is_assignable(&expr.ty, to) {
            Ok(())
        } else {
            Err(CompileError::type_err(
                format!("{what}: expected {to}, found {}", expr.ty),
                expr.span,
            ))
        }
    }

    // ── statements ───────────────────────────────────────────────

    pub(crate) fn check_body(&mut self, block: &Spanned<Block>) -> Result<Vec<Spanned<TStmt>>, CompileError> {
        let mut out = Vec::new();
        for (i, stmt) in block.node.stmts.iter().enumerate() {
            if let Stmt::SuperCall { site, args } = &stmt.node {
                if !self.is_ctor || i != 0 {
                    return Err(CompileError::type_err(
                        "super(...) must be the first statement of a constructor",
                        stmt.span,
                    ));
                }
                out.push(self.check_super_call(*site, args, stmt.span)?);
                continue;
            }
            out.push(self.check_stmt(stmt)?);
        }

        if self.return_type != Type::Void && !always_exits(&out) {
            return Err(CompileError::type_err(
                format!("missing return statement in method returning {}", self.return_type),
                Span::new(block.span.end.saturating_sub(1), block.span.end),
            ));
        }
        Ok(out)
    }

    fn check_block(&mut self, block: &Spanned<Block>) -> Result<Vec<Spanned<TStmt>>, CompileError> {
        self.in_scope(|this| block.node.stmts.iter().map(|s| this.check_stmt(s)).collect())
    }

    fn check_super_call(
        &mut self,
        site: CallSiteId,
        args: &[Spanned<Expr>],
        span: Span,
    ) -> Result<Spanned<TStmt>, CompileError> {
        let Some(superclass) = self.env.class(&self.class).and_then(|c| c.superclass.clone()) else {
            return Err(CompileError::type_err(format!("`{}` has no superclass", self.class), span));
        };
        let args = self.check_args(args)?;
        let ctor = self.select_overload(self.env.constructors(&superclass), &args, &superclass, span)?;
        self.record_site(site, ctor, CallKind::Super, Some(self.this_expr(span)), &args, span);
        Ok(Spanned::new(TStmt::SuperCall { site, ctor, args }, span))
    }

    fn check_stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<Spanned<TStmt>, CompileError> {
        let span = stmt.span;
        let node = match &stmt.node {
            Stmt::Local { ty, name, value } => {
                let ty = resolve_type(self.env, ty)?;
                let value = match value {
                    Some(v) => {
                        let v = self.check_expr(v)?;
                        self.expect_assignable(&v, &ty, "initializer")?;
                        Some(v)
                    }
                    None => None,
                };
                self.declare_local(name, ty.clone())?;
                TStmt::Local { name: name.node.clone(), ty, value }
            }
            Stmt::Assign { target, value } => self.check_assign(target, value)?,
            Stmt::Expr(expr) => TStmt::Expr(self.check_expr(expr)?),
            Stmt::If { condition, then_branch, else_branch } => {
                let cond = self.check_condition(condition)?;
                let then_branch = Box::new(self.in_scope(|this| this.check_stmt(then_branch))?);
                let else_branch = match else_branch {
                    Some(e) => Some(Box::new(self.in_scope(|this| this.check_stmt(e))?)),
                    None => None,
                };
                TStmt::If { cond, then_branch, else_branch }
            }
            Stmt::While { condition, body } => {
                let cond = self.check_condition(condition)?;
                let body = Box::new(self.in_scope(|this| this.check_stmt(body))?);
                TStmt::While { cond, body }
            }
            Stmt::Return(value) => {
                let return_type = self.return_type.clone();
                let value = match (value, &return_type) {
                    (None, Type::Void) => None,
                    (Some(v), Type::Void) => {
                        return Err(CompileError::type_err("cannot return a value from a void member", v.span));
                    }
                    (None, ty) => {
                        return Err(CompileError::type_err(format!("missing return value of type {ty}"), span));
                    }
                    (Some(v), ty) => {
                        let v = self.check_expr(v)?;
                        self.expect_assignable(&v, ty, "return value")?;
                        Some(v)
                    }
                };
                TStmt::Return(value)
            }
            Stmt::Throw(value) => {
                let value = self.check_expr(value)?;
                let is_exception = value.ty.class_name().is_some_and(|c| self.env.is_exception_class(c));
                if !is_exception {
                    return Err(CompileError::type_err(
                        format!("only exceptions can be thrown, found {}", value.ty),
                        value.span,
                    ));
                }
                TStmt::Throw(value)
            }
            Stmt::SuperCall { .. } => {
                return Err(CompileError::type_err(
                    "super(...) must be the first statement of a constructor",
                    span,
                ));
            }
            Stmt::Try { body, catches, finally } => {
                let body = self.check_block(body)?;
                let mut typed_catches = Vec::new();
                for catch in catches {
                    if !self.env.is_exception_class(&catch.class.node) {
                        return Err(CompileError::type_err(
                            format!("`{}` is not an exception class", catch.class.node),
                            catch.class.span,
                        ));
                    }
                    let class = catch.class.node.clone();
                    let body = self.in_scope(|this| {
                        this.declare_local(&catch.var, Type::Class(class.clone()))?;
                        this.check_block(&catch.body)
                    })?;
                    typed_catches.push(TCatch { class, var: catch.var.node.clone(), body });
                }
                let finally = match finally {
                    Some(f) => Some(self.check_block(f)?),
                    None => None,
                };
                TStmt::Try { body, catches: typed_catches, finally }
            }
            Stmt::Block(block) => TStmt::Block(self.check_block(block)?),
        };
        Ok(Spanned::new(node, span))
    }

    fn check_condition(&mut self, expr: &Spanned<Expr>) -> Result<TypedExpr, CompileError> {
        let cond = self.check_expr(expr)?;
        self.expect_assignable(&cond, &Type::Boolean, "condition")?;
        Ok(cond)
    }

    fn check_assign(&mut self, target: &Spanned<Expr>, value: &Spanned<Expr>) -> Result<TStmt, CompileError> {
        let value = self.check_expr(value)?;
        let target = self.check_expr(target)?;
        self.expect_assignable(&value, &target.ty, "assignment")?;
        match target.kind {
            TExpr::Local(name) => Ok(TStmt::AssignLocal { name, value }),
            TExpr::Field { object, field } => Ok(TStmt::AssignField { object: *object, field, value }),
            TExpr::StaticField { class, field } => Ok(TStmt::AssignStatic { class, field, value }),
            TExpr::Index { array, index } => Ok(TStmt::AssignIndex { array: *array, index: *index, value }),
            _ => Err(CompileError::type_err("invalid assignment target", target.span)),
        }
    }

    // ── expressions ──────────────────────────────────────────────

    fn this_expr(&self, span: Span) -> TypedExpr {
        TypedExpr::new(TExpr::This, Type::Class(self.class.clone()), span)
    }

    fn require_instance(&self, what: &str, span: Span) -> Result<(), CompileError> {
        if self.is_static {
            Err(CompileError::type_err(format!("{what} cannot be used in a static context"), span))
        } else {
            Ok(())
        }
    }

    /// Whether `name` in expression position names a class rather than a value.
    fn names_class(&self, expr: &Spanned<Expr>) -> Option<String> {
        let Expr::Ident(name) = &expr.node else { return None };
        let shadowed = self.lookup_local(name).is_some()
            || self.clause_param(name).is_some()
            || self.env.lookup_field(&self.class, name).is_some();
        if !shadowed && self.env.class(name).is_some() {
            Some(name.clone())
        } else {
            None
        }
    }

    fn clause_param(&self, name: &str) -> Option<(usize, &Type)> {
        let frame = self.clause.as_ref()?;
        frame.params.iter().enumerate().find(|(_, (n, _))| n == name).map(|(i, (_, ty))| (i, ty))
    }

    pub(crate) fn check_expr(&mut self, expr: &Spanned<Expr>) -> Result<TypedExpr, CompileError> {
        let span = expr.span;
        match &expr.node {
            Expr::IntLit(n) => Ok(TypedExpr::new(TExpr::Int(*n), Type::Int, span)),
            Expr::BoolLit(b) => Ok(TypedExpr::new(TExpr::Bool(*b), Type::Boolean, span)),
            Expr::Null => Ok(TypedExpr::new(TExpr::Null, Type::Null, span)),
            Expr::This => {
                self.require_instance("`this`", span)?;
                Ok(self.this_expr(span))
            }
            Expr::Ident(name) => self.check_ident(name, span),
            Expr::BinOp { op, lhs, rhs } => self.check_binop(*op, lhs, rhs, span),
            Expr::UnaryOp { op, operand } => {
                let operand = self.check_expr(operand)?;
                let ty = match op {
                    UnaryOp::Neg => Type::Int,
                    UnaryOp::Not => Type::Boolean,
                };
                self.expect_assignable(&operand, &ty, &format!("operand of `{op}`"))?;
                Ok(TypedExpr::new(TExpr::Unary { op: *op, operand: Box::new(operand) }, ty, span))
            }
            Expr::FieldAccess { object, field } => self.check_field_access(object, field, span),
            Expr::Call { site, name, args } => self.check_unqualified_call(*site, name, args, span),
            Expr::MethodCall { site, object, method, args } => {
                self.check_method_call(*site, object, method, args, span)
            }
            Expr::New { site, class, args } => {
                let Some(info) = self.env.class(&class.node) else {
                    return Err(CompileError::type_err(format!("unknown class `{}`", class.node), class.span));
                };
                if info.is_interface {
                    return Err(CompileError::type_err(
                        format!("cannot instantiate interface `{}`", class.node),
                        class.span,
                    ));
                }
                let args = self.check_args(args)?;
                let ctor = self.select_overload(self.env.constructors(&class.node), &args, &class.node, span)?;
                self.record_site(*site, ctor, CallKind::New, None, &args, span);
                Ok(TypedExpr::new(
                    TExpr::New { site: *site, class: class.node.clone(), ctor, args },
                    Type::Class(class.node.clone()),
                    span,
                ))
            }
            Expr::NewArray { elem, len } => {
                let elem = resolve_type(self.env, elem)?;
                let len = self.check_expr(len)?;
                self.expect_assignable(&len, &Type::Int, "array length")?;
                Ok(TypedExpr::new(
                    TExpr::NewArray { elem: elem.clone(), len: Box::new(len) },
                    Type::Array(Box::new(elem)),
                    span,
                ))
            }
            Expr::Index { object, index } => {
                let array = self.check_expr(object)?;
                let Type::Array(elem) = array.ty.clone() else {
                    return Err(CompileError::type_err(format!("cannot index into {}", array.ty), array.span));
                };
                let index = self.check_expr(index)?;
                self.expect_assignable(&index, &Type::Int, "array index")?;
                Ok(TypedExpr::new(
                    TExpr::Index { array: Box::new(array), index: Box::new(index) },
                    *elem,
                    span,
                ))
            }
            Expr::Old(inner) => {
                let inner = self.check_expr(inner)?;
                let ty = inner.ty.clone();
                Ok(TypedExpr::new(TExpr::Old(Box::new(inner)), ty, span))
            }
            Expr::Result => match self.clause.as_ref().and_then(|c| c.result.clone()) {
                Some(ty) => Ok(TypedExpr::new(TExpr::Result, ty, span)),
                None => Err(CompileError::type_err("`result` has no value here", span)),
            },
            Expr::Spread(inner) => {
                let inner = self.check_expr(inner)?;
                let ty = match &inner.ty {
                    Type::Array(elem) => (**elem).clone(),
                    other => other.clone(),
                };
                Ok(TypedExpr::new(TExpr::Spread(Box::new(inner)), ty, span))
            }
        }
    }

    fn check_ident(&self, name: &str, span: Span) -> Result<TypedExpr, CompileError> {
        if let Some(ty) = self.lookup_local(name) {
            return Ok(TypedExpr::new(TExpr::Local(name.to_string()), ty.clone(), span));
        }
        if let Some((index, ty)) = self.clause_param(name) {
            return Ok(TypedExpr::new(TExpr::Param { index, name: name.to_string() }, ty.clone(), span));
        }
        if let Some(field) = self.env.lookup_field(&self.class, name) {
            if field.is_static {
                return Ok(TypedExpr::new(
                    TExpr::StaticField { class: field.owner.clone(), field: field.name.clone() },
                    field.ty.clone(),
                    span,
                ));
            }
            self.require_instance(&format!("field `{name}`"), span)?;
            return Ok(TypedExpr::new(
                TExpr::Field { object: Box::new(self.this_expr(span)), field: field.name.clone() },
                field.ty.clone(),
                span,
            ));
        }
        Err(CompileError::type_err(format!("unknown name `{name}`"), span))
    }

    fn check_binop(
        &mut self,
        op: BinOp,
        lhs: &Spanned<Expr>,
        rhs: &Spanned<Expr>,
        span: Span,
    ) -> Result<TypedExpr, CompileError> {
        let lhs = self.check_expr(lhs)?;
        let rhs = self.check_expr(rhs)?;
        let ty = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                self.expect_assignable(&lhs, &Type::Int, &format!("left operand of `{op}`"))?;
                self.expect_assignable(&rhs, &Type::Int, &format!("right operand of `{op}`"))?;
                Type::Int
            }
            BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => {
                self.expect_assignable(&lhs, &Type::Int, &format!("left operand of `{op}`"))?;
                self.expect_assignable(&rhs, &Type::Int, &format!("right operand of `{op}`"))?;
                Type::Boolean
            }
            BinOp::And | BinOp::Or => {
                self.expect_assignable(&lhs, &Type::Boolean, &format!("left operand of `{op}`"))?;
                self.expect_assignable(&rhs, &Type::Boolean, &format!("right operand of `{op}`"))?;
                Type::Boolean
            }
            BinOp::Eq | BinOp::Neq => {
                let comparable = self.env.is_assignable(&lhs.ty, &rhs.ty) || self.env.is_assignable(&rhs.ty, &lhs.ty);
                if !comparable {
                    return Err(CompileError::type_err(
                        format!("cannot compare {} with {}", lhs.ty, rhs.ty),
                        span,
                    ));
                }
                Type::Boolean
            }
        };
        Ok(TypedExpr::new(TExpr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty, span))
    }

    fn check_field_access(
        &mut self,
        object: &Spanned<Expr>,
        field: &Spanned<String>,
        span: Span,
    ) -> Result<TypedExpr, CompileError> {
        if let Some(class) = self.names_class(object) {
            return match self.env.lookup_field(&class, &field.node) {
                Some(f) if f.is_static => Ok(TypedExpr::new(
                    TExpr::StaticField { class: f.owner.clone(), field: f.name.clone() },
                    f.ty.clone(),
                    span,
                )),
                Some(_) => Err(CompileError::type_err(
                    format!("field `{}` of `{class}` is not static", field.node),
                    field.span,
                )),
                None => Err(CompileError::type_err(
                    format!("`{class}` has no field `{}`", field.node),
                    field.span,
                )),
            };
        }

        let object = self.check_expr(object)?;
        match &object.ty {
            Type::Array(_) if field.node == "length" => {
                Ok(TypedExpr::new(TExpr::Length(Box::new(object)), Type::Int, span))
            }
            Type::Class(class) => {
                let Some(f) = self.env.lookup_field(class, &field.node) else {
                    return Err(CompileError::type_err(
                        format!("`{class}` has no field `{}`", field.node),
                        field.span,
                    ));
                };
                if f.is_static {
                    return Ok(TypedExpr::new(
                        TExpr::StaticField { class: f.owner.clone(), field: f.name.clone() },
                        f.ty.clone(),
                        span,
                    ));
                }
                let ty = f.ty.clone();
                let name = f.name.clone();
                Ok(TypedExpr::new(TExpr::Field { object: Box::new(object), field: name }, ty, span))
            }
            other => Err(CompileError::type_err(
                format!("{other} has no field `{}`", field.node),
                field.span,
            )),
        }
    }

    fn check_args(&mut self, args: &[Spanned<Expr>]) -> Result<Vec<TypedExpr>, CompileError> {
        args.iter().map(|a| self.check_expr(a)).collect()
    }

    /// Pick the applicable candidate, preferring an exact parameter match.
    fn select_overload(
        &self,
        candidates: Vec<&MethodInfo>,
        args: &[TypedExpr],
        name: &str,
        span: Span,
    ) -> Result<DeclId, CompileError> {
        let applicable: Vec<&MethodInfo> = candidates
            .into_iter()
            .filter(|m| {
                m.params.len() == args.len()
                    && m.param_types().zip(args).all(|(p, a)| self.env.is_assignable(&a.ty, p))
            })
            .collect();
        let exact = applicable.iter().find(|m| m.param_types().zip(args).all(|(p, a)| *p == a.ty));
        match exact.or(applicable.first()) {
            Some(m) => Ok(m.id),
            None => {
                let types: Vec<String> = args.iter().map(|a| a.ty.to_string()).collect();
                Err(CompileError::type_err(
                    format!("no applicable `{name}` for arguments ({})", types.join(", ")),
                    span,
                ))
            }
        }
    }

    fn record_site(
        &mut self,
        id: CallSiteId,
        callee: DeclId,
        kind: CallKind,
        receiver: Option<TypedExpr>,
        args: &[TypedExpr],
        span: Span,
    ) {
        // Calls inside clauses are evaluated by checks, never woven
        if self.clause.is_some() {
            return;
        }
        self.sites.push(CallSite { id, caller: self.decl, callee, kind, receiver, args: args.to_vec(), span });
    }

    fn check_unqualified_call(
        &mut self,
        site: CallSiteId,
        name: &Spanned<String>,
        args: &[Spanned<Expr>],
        span: Span,
    ) -> Result<TypedExpr, CompileError> {
        let args = self.check_args(args)?;
        let candidates = self.env.lookup_methods(&self.class, &name.node);
        let method = self.select_overload(candidates, &args, &name.node, span)?;
        let Some(info) = self.env.method(method) else {
            return Err(CompileError::type_err(format!("unknown method `{}`", name.node), name.span));
        };
        let ret = info.ret.clone();
        let receiver = if info.is_static {
            Receiver::Static
        } else {
            self.require_instance(&format!("instance method `{}`", name.node), name.span)?;
            Receiver::Virtual(Box::new(self.this_expr(name.span)))
        };
        let recorded = match &receiver {
            Receiver::Static => None,
            Receiver::Virtual(object) => Some((**object).clone()),
        };
        self.record_site(site, method, CallKind::Method, recorded, &args, span);
        Ok(TypedExpr::new(
            TExpr::Call { site, receiver, method, name: name.node.clone(), args },
            ret,
            span,
        ))
    }

    fn check_method_call(
        &mut self,
        site: CallSiteId,
        object: &Spanned<Expr>,
        method: &Spanned<String>,
        args: &[Spanned<Expr>],
        span: Span,
    ) -> Result<TypedExpr, CompileError> {
        let (class, receiver_expr) = match self.names_class(object) {
            Some(class) => (class, None),
            None => {
                let r = self.check_expr(object)?;
                let Type::Class(c) = &r.ty else {
                    return Err(CompileError::type_err(
                        format!("{} has no method `{}`", r.ty, method.node),
                        method.span,
                    ));
                };
                (c.clone(), Some(r))
            }
        };

        let args = self.check_args(args)?;
        let candidates = self.env.lookup_methods(&class, &method.node);
        let callee = self.select_overload(candidates, &args, &method.node, span)?;
        let Some(info) = self.env.method(callee) else {
            return Err(CompileError::type_err(format!("unknown method `{}`", method.node), method.span));
        };
        let ret = info.ret.clone();

        let receiver = match receiver_expr {
            _ if info.is_static => Receiver::Static,
            Some(r) => Receiver::Virtual(Box::new(r)),
            None => {
                return Err(CompileError::type_err(
                    format!("method `{}` of `{class}` is not static", method.node),
                    method.span,
                ));
            }
        };
        let recorded = match &receiver {
            Receiver::Static => None,
            Receiver::Virtual(object) => Some((**object).clone()),
        };
        self.record_site(site, callee, CallKind::Method, recorded, &args, span);
        Ok(TypedExpr::new(
            TExpr::Call { site, receiver, method: callee, name: method.node.clone(), args },
            ret,
            span,
        ))
    }
}

/// Whether control can never fall off the end of `stmts`.
pub(crate) fn always_exits(stmts: &[Spanned<TStmt>]) -> bool {
    stmts.last().is_some_and(|s| stmt_exits(&s.node))
}

fn stmt_exits(stmt: &TStmt) -> bool {
    match stmt {
        TStmt::Return(_) | TStmt::Throw(_) => true,
        TStmt::Block(stmts) => always_exits(stmts),
        TStmt::If { then_branch, else_branch: Some(else_branch), .. } => {
            stmt_exits(&then_branch.node) && stmt_exits(&else_branch.node)
        }
        TStmt::While { cond, .. } => matches!(cond.kind, TExpr::Bool(true)),
        TStmt::Try { body, catches, finally } => {
            finally.as_ref().is_some_and(|f| always_exits(f))
                || (always_exits(body) && catches.iter().all(|c| always_exits(&c.body)))
        }
        _ => false,
    }
}
