pub mod check;
pub mod env;
pub mod register;
pub mod resolve;
pub mod typed;
pub mod types;

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::span::Spanned;
use check::Checker;
use env::{CallSite, Env};
use typed::{TStmt, TypedExpr};

pub fn typecheck(unit: &CompilationUnit) -> Result<Env, CompileError> {
    let mut env = Env::new(unit.decl_count);

    // Pass 0: built-in exception classes
    register::register_builtins(&mut env);

    // Pass 1: type names, headers, cycles
    register::register_types(&mut env, unit)?;

    // Pass 2: fields, constructors, methods, overrides
    register::register_members(&mut env, unit)?;

    // Pass 3: bodies and initializers
    let checked = check_unit(&env, unit)?;
    check_implicit_super(&env, &checked.bodies)?;

    let site_count = checked.sites.len();
    env.bodies.extend(checked.bodies);
    env.field_inits.extend(checked.field_inits);
    env.call_sites.extend(checked.sites.into_iter().map(|s| (s.id, s)));
    env.call_sites.sort_keys();

    tracing::info!(
        classes = env.classes.values().filter(|c| !c.is_builtin).count(),
        methods = env.methods.len(),
        call_sites = site_count,
        "type check complete"
    );
    Ok(env)
}

#[derive(Default)]
struct Checked {
    bodies: Vec<(DeclId, Vec<Spanned<TStmt>>)>,
    field_inits: Vec<(DeclId, TypedExpr)>,
    sites: Vec<CallSite>,
}

fn check_unit(env: &Env, unit: &CompilationUnit) -> Result<Checked, CompileError> {
    let mut out = Checked::default();
    for ty in &unit.types {
        let class = ty.node.name.node.as_str();
        for member in &ty.node.members {
            match member {
                Member::Field(f) => {
                    let Some(init) = &f.node.init else { continue };
                    let Some(info) = env.field(f.node.id) else { continue };
                    let mut checker = Checker::for_body(env, class, f.node.id, f.node.is_static);
                    let value = checker.check_expr(init)?;
                    if !env.is_assignable(&value.ty, &info.ty) {
                        return Err(CompileError::type_err(
                            format!("initializer: expected {}, found {}", info.ty, value.ty),
                            value.span,
                        ));
                    }
                    out.sites.append(&mut checker.sites);
                    out.field_inits.push((f.node.id, value));
                }
                Member::Constructor(m) | Member::Method(m) => {
                    let Some(body) = &m.node.body else { continue };
                    let Some(info) = env.method(m.node.id) else { continue };
                    let mut checker = Checker::for_method(env, info);
                    let stmts = checker.check_body(body)?;
                    tracing::debug!(decl = %info.qualified_name(), "checked body");
                    out.sites.append(&mut checker.sites);
                    out.bodies.push((m.node.id, stmts));
                }
                Member::Initializer(b) => {
                    let mut checker = Checker::for_body(env, class, b.node.id, false);
                    let stmts = checker.check_body(&b.node.body)?;
                    out.sites.append(&mut checker.sites);
                    out.bodies.push((b.node.id, stmts));
                }
            }
        }
    }
    Ok(out)
}

/// Constructors without `super(...)` chain to the superclass's no-argument
/// constructor, which therefore has to exist.
fn check_implicit_super(env: &Env, bodies: &[(DeclId, Vec<Spanned<TStmt>>)]) -> Result<(), CompileError> {
    for class in env.classes.values() {
        let Some(superclass) = &class.superclass else { continue };
        let has_default = env.constructors(superclass).iter().any(|c| c.params.is_empty());
        if has_default {
            continue;
        }
        for ctor in &class.ctors {
            let explicit = bodies
                .iter()
                .find(|(id, _)| id == ctor)
                .and_then(|(_, stmts)| stmts.first())
                .is_some_and(|s| matches!(s.node, TStmt::SuperCall { .. }));
            if !explicit {
                let span = env.method(*ctor).map(|m| m.span).unwrap_or(class.span);
                return Err(CompileError::type_err(
                    format!("`{superclass}` has no no-argument constructor; call super(...) explicitly"),
                    span,
                ));
            }
        }
    }
    Ok(())
}
