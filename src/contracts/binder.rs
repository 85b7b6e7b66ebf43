//! Binding clauses to typed expressions in the scope of their declaration.

use indexmap::IndexMap;

use crate::clauses::{ClauseRecord, ClauseTag};
use crate::diagnostics::{CompileError, Diagnostics};
use crate::parser::ast::{DeclId, Expr};
use crate::parser::clause::{parse_clause, ClauseBody};
use crate::span::Spanned;
use crate::typeck::env::{DeclKind, Env};
use crate::typeck::typed::{Receiver, TExpr, TypedExpr};
use crate::typeck::types::Type;

use super::{BoundClause, ClauseScope, DeclClauses, ExprResolver, ThrowsClause};

#[derive(Debug, Default)]
pub struct Bound {
    pub decls: IndexMap<DeclId, DeclClauses>,
    pub invariants: IndexMap<String, Vec<BoundClause>>,
    pub diagnostics: Diagnostics,
}

/// Bind every record. A clause that fails to parse or type is dropped with a
/// diagnostic; the other clauses of the declaration are still bound.
pub fn bind(env: &Env, records: &[ClauseRecord], first_site: u32) -> Bound {
    let mut bound = Bound::default();
    let mut next_site = first_site;

    for record in records {
        match bind_record(env, record, &mut next_site) {
            Ok(Binding::Condition(clause)) => {
                let decl = bound.decls.entry(record.owner).or_default();
                match record.tag {
                    ClauseTag::Precondition => decl.preconditions.push(clause),
                    ClauseTag::Postcondition => decl.postconditions.push(clause),
                    ClauseTag::Invariant => {
                        let class = env.owner_of(record.owner).unwrap_or_default().to_string();
                        bound.invariants.entry(class).or_default().push(clause.clone());
                        decl.invariants.push(clause);
                    }
                    ClauseTag::Throws | ClauseTag::MayThrow => {
                        let exception = record.subject.as_ref().map(|s| s.node.clone()).unwrap_or_default();
                        let throws = ThrowsClause { exception, condition: clause };
                        if record.tag == ClauseTag::Throws {
                            decl.throws.push(throws);
                        } else {
                            decl.may_throw.push(throws);
                        }
                    }
                    ClauseTag::Inspects | ClauseTag::Mutates | ClauseTag::MutatesProperties => {}
                }
            }
            Ok(Binding::Targets(targets)) => {
                let effects = &mut bound.decls.entry(record.owner).or_default().effects;
                let list = match record.tag {
                    ClauseTag::Inspects => &mut effects.inspects,
                    ClauseTag::Mutates => &mut effects.mutates,
                    _ => &mut effects.mutates_properties,
                };
                list.extend(targets);
            }
            Err(err) => {
                tracing::debug!(decl = %env.describe(record.owner), tag = %record.tag, "dropped clause: {err}");
                bound.diagnostics.error(Some(record.owner), err);
            }
        }
    }

    tracing::debug!(
        decls = bound.decls.len(),
        errors = bound.diagnostics.errors.len(),
        "bound clauses"
    );
    bound
}

enum Binding {
    Condition(BoundClause),
    Targets(Vec<BoundClause>),
}

fn bind_record(env: &Env, record: &ClauseRecord, next_site: &mut u32) -> Result<Binding, CompileError> {
    let scope = scope_for(env, record)?;
    if record.tag.has_subject() {
        check_subject(env, record)?;
    }

    let (body, next) = parse_clause(record, *next_site)?;
    *next_site = next;

    match body {
        ClauseBody::Condition(expr) => {
            check_placement(&expr, record.tag, scope.result.is_some())?;
            let typed = env.resolve_expression(&scope, &expr)?;
            if typed.ty != Type::Boolean {
                return Err(CompileError::type_err(
                    format!("{} clause must be boolean, found {}", record.tag, typed.ty),
                    typed.span,
                ));
            }
            Ok(Binding::Condition(bound_clause(record, typed)))
        }
        ClauseBody::Targets(targets) => {
            let mut out = Vec::new();
            for target in &targets {
                check_placement(target, record.tag, false)?;
                let typed = env.resolve_expression(&scope, target)?;
                check_spreads(env, &typed)?;
                if !is_path(&typed) {
                    return Err(CompileError::type_err(
                        format!("effect target `{typed}` is not a path"),
                        typed.span,
                    ));
                }
                out.push(bound_clause(record, typed));
            }
            Ok(Binding::Targets(out))
        }
    }
}

fn bound_clause(record: &ClauseRecord, expr: TypedExpr) -> BoundClause {
    BoundClause { tag: record.tag, origin: record.owner, text: record.raw_text.clone(), expr, span: record.span }
}

/// Scope of the clause's owner, or an error if the tag is misplaced.
fn scope_for(env: &Env, record: &ClauseRecord) -> Result<ClauseScope, CompileError> {
    let kind = env.decl_kind(record.owner);
    let misplaced = |what: &str| {
        Err(CompileError::type_err(format!("{} clauses are not allowed on {what}", record.tag), record.span))
    };

    if record.tag == ClauseTag::Invariant {
        return match kind {
            Some(DeclKind::Class) => Ok(ClauseScope {
                decl: record.owner,
                class: env.owner_of(record.owner).unwrap_or_default().to_string(),
                is_static: false,
                params: Vec::new(),
                result: None,
            }),
            _ => Err(CompileError::type_err("invariants are only allowed on classes", record.span)),
        };
    }

    match kind {
        Some(DeclKind::Method | DeclKind::Constructor) => {}
        Some(DeclKind::Class | DeclKind::Interface) => return misplaced("types"),
        Some(DeclKind::Field) => return misplaced("fields"),
        Some(DeclKind::Initializer) => return misplaced("initializer blocks"),
        None => return misplaced("this declaration"),
    }
    let Some(method) = env.method(record.owner) else {
        return misplaced("this declaration");
    };

    let result = match (record.tag, &method.ret) {
        (ClauseTag::Postcondition, Type::Void) => None,
        (ClauseTag::Postcondition, ret) if !method.is_constructor => Some(ret.clone()),
        _ => None,
    };
    Ok(ClauseScope {
        decl: method.id,
        class: method.owner.clone(),
        is_static: method.is_static,
        params: method.params.clone(),
        result,
    })
}

fn check_subject(env: &Env, record: &ClauseRecord) -> Result<(), CompileError> {
    let Some(subject) = &record.subject else {
        return Err(CompileError::type_err(format!("{} needs an exception type", record.tag), record.span));
    };
    if env.is_exception_class(&subject.node) {
        Ok(())
    } else {
        Err(CompileError::type_err(format!("`{}` is not an exception class", subject.node), subject.span))
    }
}

/// `old` only in postconditions and never nested; `result` only in
/// postconditions of members that return a value.
fn check_placement(expr: &Spanned<Expr>, tag: ClauseTag, has_result: bool) -> Result<(), CompileError> {
    let mut err = None;
    visit(expr, false, &mut |e, in_old| {
        if err.is_some() {
            return;
        }
        match &e.node {
            Expr::Old(_) if tag != ClauseTag::Postcondition => {
                err = Some(CompileError::type_err("old(...) is only allowed in postconditions", e.span));
            }
            Expr::Old(_) if in_old => {
                err = Some(CompileError::type_err("old(...) cannot be nested", e.span));
            }
            Expr::Result if tag != ClauseTag::Postcondition => {
                err = Some(CompileError::type_err("`result` is only allowed in postconditions", e.span));
            }
            Expr::Result if !has_result => {
                err = Some(CompileError::type_err(
                    "`result` has no value in a void member or constructor",
                    e.span,
                ));
            }
            _ => {}
        }
    });
    err.map_or(Ok(()), Err)
}

fn visit(expr: &Spanned<Expr>, in_old: bool, f: &mut impl FnMut(&Spanned<Expr>, bool)) {
    f(expr, in_old);
    match &expr.node {
        Expr::IntLit(_) | Expr::BoolLit(_) | Expr::Null | Expr::This | Expr::Ident(_) | Expr::Result => {}
        Expr::BinOp { lhs, rhs, .. } => {
            visit(lhs, in_old, f);
            visit(rhs, in_old, f);
        }
        Expr::UnaryOp { operand, .. } => visit(operand, in_old, f),
        Expr::FieldAccess { object, .. } => visit(object, in_old, f),
        Expr::Index { object, index } => {
            visit(object, in_old, f);
            visit(index, in_old, f);
        }
        Expr::Call { args, .. } | Expr::New { args, .. } => args.iter().for_each(|a| visit(a, in_old, f)),
        Expr::MethodCall { object, args, .. } => {
            visit(object, in_old, f);
            args.iter().for_each(|a| visit(a, in_old, f));
        }
        Expr::NewArray { len, .. } => visit(len, in_old, f),
        Expr::Old(inner) => visit(inner, true, f),
        Expr::Spread(inner) => visit(inner, in_old, f),
    }
}

fn check_spreads(env: &Env, expr: &TypedExpr) -> Result<(), CompileError> {
    let mut err = None;
    expr.walk(&mut |e| {
        if let TExpr::Spread(inner) = &e.kind {
            if err.is_none() && env.iterable_element_type(&inner.ty).is_none() {
                err = Some(CompileError::type_err(format!("cannot spread over {}", inner.ty), e.span));
            }
        }
    });
    err.map_or(Ok(()), Err)
}

/// `this`, a parameter, a static field, or a field / no-argument accessor /
/// spread step applied to a path.
pub(crate) fn is_path(expr: &TypedExpr) -> bool {
    match &expr.kind {
        TExpr::This | TExpr::Param { .. } | TExpr::StaticField { .. } => true,
        TExpr::Field { object, .. } => is_path(object),
        TExpr::Call { receiver: Receiver::Virtual(object), args, .. } => args.is_empty() && is_path(object),
        TExpr::Spread(inner) => is_path(inner),
        _ => false,
    }
}
