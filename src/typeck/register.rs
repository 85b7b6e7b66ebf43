use std::collections::HashSet;

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::span::{Span, Spanned};

use super::env::{ClassInfo, Env, FieldInfo, InitItem, MethodInfo};
use super::types::Type;

/// Built-in exception hierarchy, parents first.
pub const BUILTIN_EXCEPTIONS: &[(&str, Option<&str>)] = &[
    ("Throwable", None),
    ("Exception", Some("Throwable")),
    ("RuntimeException", Some("Exception")),
    ("IllegalArgumentException", Some("RuntimeException")),
    ("IllegalStateException", Some("RuntimeException")),
    ("NullPointerException", Some("RuntimeException")),
    ("ArithmeticException", Some("RuntimeException")),
    ("ArrayIndexOutOfBoundsException", Some("RuntimeException")),
    ("UnsupportedOperationException", Some("RuntimeException")),
];

pub(crate) fn register_builtins(env: &mut Env) {
    for (name, parent) in BUILTIN_EXCEPTIONS {
        let id = env.fresh_decl();
        let ctor = env.fresh_decl();
        env.methods.insert(ctor, MethodInfo {
            id: ctor,
            name: name.to_string(),
            owner: name.to_string(),
            params: Vec::new(),
            ret: Type::Void,
            is_static: false,
            is_constructor: true,
            has_body: true,
            span: Span::dummy(),
        });
        env.bodies.insert(ctor, Vec::new());
        env.type_decls.insert(id, name.to_string());
        env.classes.insert(name.to_string(), ClassInfo {
            id,
            name: name.to_string(),
            is_interface: false,
            is_builtin: true,
            superclass: parent.map(str::to_string),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            ctors: vec![ctor],
            init_order: Vec::new(),
            span: Span::dummy(),
        });
    }
}

pub(crate) fn register_types(env: &mut Env, unit: &CompilationUnit) -> Result<(), CompileError> {
    for ty in &unit.types {
        let decl = &ty.node;
        if env.classes.contains_key(&decl.name.node) {
            return Err(CompileError::type_err(
                format!("type `{}` is already defined", decl.name.node),
                decl.name.span,
            ));
        }
        env.type_decls.insert(decl.id, decl.name.node.clone());
        env.classes.insert(decl.name.node.clone(), ClassInfo {
            id: decl.id,
            name: decl.name.node.clone(),
            is_interface: decl.kind == TypeKind::Interface,
            is_builtin: false,
            superclass: decl.superclass.as_ref().map(|s| s.node.clone()),
            interfaces: decl.interfaces.iter().map(|s| s.node.clone()).collect(),
            fields: Vec::new(),
            methods: Vec::new(),
            ctors: Vec::new(),
            init_order: Vec::new(),
            span: ty.span,
        });
    }

    for ty in &unit.types {
        check_header(env, &ty.node)?;
    }
    for ty in &unit.types {
        check_acyclic(env, &ty.node)?;
    }
    Ok(())
}

fn check_header(env: &Env, decl: &TypeDecl) -> Result<(), CompileError> {
    if let Some(sup) = &decl.superclass {
        match env.class(&sup.node) {
            None => {
                return Err(CompileError::type_err(format!("unknown class `{}`", sup.node), sup.span));
            }
            Some(info) if info.is_interface => {
                return Err(CompileError::type_err(
                    format!("`{}` is an interface; use implements", sup.node),
                    sup.span,
                ));
            }
            Some(_) => {}
        }
    }
    for iface in &decl.interfaces {
        match env.class(&iface.node) {
            Some(info) if info.is_interface => {}
            Some(_) => {
                return Err(CompileError::type_err(format!("`{}` is not an interface", iface.node), iface.span));
            }
            None => {
                return Err(CompileError::type_err(format!("unknown interface `{}`", iface.node), iface.span));
            }
        }
    }
    Ok(())
}

fn direct_supertypes<'e>(env: &'e Env, name: &str) -> Vec<&'e str> {
    env.classes
        .get(name)
        .map(|info| info.superclass.iter().chain(info.interfaces.iter()).map(|s| s.as_str()).collect())
        .unwrap_or_default()
}

fn check_acyclic(env: &Env, decl: &TypeDecl) -> Result<(), CompileError> {
    // Depth-first over every supertype edge; reaching the start again is a cycle
    let start = decl.name.node.as_str();
    let mut stack = direct_supertypes(env, start);
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == start {
            return Err(CompileError::type_err(
                format!("inheritance cycle involving `{start}`"),
                decl.name.span,
            ));
        }
        if seen.insert(current) {
            stack.extend(direct_supertypes(env, current));
        }
    }
    Ok(())
}

pub(crate) fn resolve_type(env: &Env, ty: &Spanned<TypeExpr>) -> Result<Type, CompileError> {
    match &ty.node {
        TypeExpr::Int => Ok(Type::Int),
        TypeExpr::Boolean => Ok(Type::Boolean),
        TypeExpr::Named(name) => {
            if env.classes.contains_key(name) {
                Ok(Type::Class(name.clone()))
            } else {
                Err(CompileError::type_err(format!("unknown type `{name}`"), ty.span))
            }
        }
        TypeExpr::Array(inner) => Ok(Type::Array(Box::new(resolve_type(env, inner)?))),
    }
}

fn method_info(env: &Env, owner: &str, m: &Spanned<MethodDecl>) -> Result<MethodInfo, CompileError> {
    let decl = &m.node;
    let mut params = Vec::new();
    let mut names = HashSet::new();
    for p in &decl.params {
        if !names.insert(p.name.node.as_str()) {
            return Err(CompileError::type_err(
                format!("duplicate parameter `{}`", p.name.node),
                p.name.span,
            ));
        }
        params.push((p.name.node.clone(), resolve_type(env, &p.ty)?));
    }
    let ret = match &decl.return_type {
        Some(ty) => resolve_type(env, ty)?,
        None => Type::Void,
    };
    Ok(MethodInfo {
        id: decl.id,
        name: decl.name.node.clone(),
        owner: owner.to_string(),
        params,
        ret,
        is_static: decl.is_static,
        is_constructor: decl.is_constructor,
        has_body: decl.body.is_some(),
        span: decl.name.span,
    })
}

pub(crate) fn register_members(env: &mut Env, unit: &CompilationUnit) -> Result<(), CompileError> {
    for ty in &unit.types {
        let decl = &ty.node;
        let owner = decl.name.node.clone();
        let mut fields = Vec::new();
        let mut methods: Vec<MethodInfo> = Vec::new();
        let mut ctors: Vec<MethodInfo> = Vec::new();
        let mut init_order = Vec::new();

        for member in &decl.members {
            match member {
                Member::Field(f) => {
                    if fields.iter().any(|x: &FieldInfo| x.name == f.node.name.node) {
                        return Err(CompileError::type_err(
                            format!("field `{}` is already defined in `{owner}`", f.node.name.node),
                            f.node.name.span,
                        ));
                    }
                    if !f.node.is_static && f.node.init.is_some() {
                        init_order.push(InitItem::Field(f.node.id));
                    }
                    fields.push(FieldInfo {
                        id: f.node.id,
                        name: f.node.name.node.clone(),
                        owner: owner.clone(),
                        ty: resolve_type(env, &f.node.ty)?,
                        is_static: f.node.is_static,
                        span: f.node.name.span,
                    });
                }
                Member::Constructor(c) => {
                    let info = method_info(env, &owner, c)?;
                    if ctors.iter().any(|x| x.same_signature(&info)) {
                        return Err(CompileError::type_err(
                            format!("constructor `{owner}` with these parameters is already defined"),
                            info.span,
                        ));
                    }
                    ctors.push(info);
                }
                Member::Method(m) => {
                    let info = method_info(env, &owner, m)?;
                    if methods.iter().any(|x| x.same_signature(&info)) {
                        return Err(CompileError::type_err(
                            format!("method `{}` with these parameters is already defined in `{owner}`", info.name),
                            info.span,
                        ));
                    }
                    if info.is_static && !info.has_body {
                        return Err(CompileError::type_err("static methods need a body", info.span));
                    }
                    methods.push(info);
                }
                Member::Initializer(b) => {
                    env.init_blocks.insert(b.node.id, owner.clone());
                    init_order.push(InitItem::Block(b.node.id));
                }
            }
        }

        if decl.kind == TypeKind::Class && ctors.is_empty() {
            let id = env.fresh_decl();
            env.bodies.insert(id, Vec::new());
            ctors.push(MethodInfo {
                id,
                name: owner.clone(),
                owner: owner.clone(),
                params: Vec::new(),
                ret: Type::Void,
                is_static: false,
                is_constructor: true,
                has_body: true,
                span: decl.name.span,
            });
        }

        let Some(class) = env.classes.get_mut(&owner) else { continue };
        class.fields = fields.iter().map(|f| f.id).collect();
        class.methods = methods.iter().map(|m| m.id).collect();
        class.ctors = ctors.iter().map(|m| m.id).collect();
        class.init_order = init_order;
        for f in fields {
            env.fields.insert(f.id, f);
        }
        for m in methods.into_iter().chain(ctors) {
            env.methods.insert(m.id, m);
        }
    }

    check_field_hiding(env)?;
    compute_overrides(env)
}

fn check_field_hiding(env: &Env) -> Result<(), CompileError> {
    for class in env.classes.values() {
        let chain = env.class_chain(&class.name);
        for id in &class.fields {
            let Some(field) = env.fields.get(id) else { continue };
            let hidden = chain
                .iter()
                .skip(1)
                .flat_map(|c| c.fields.iter())
                .filter_map(|f| env.fields.get(f))
                .any(|f| f.name == field.name);
            if hidden {
                return Err(CompileError::type_err(
                    format!("field `{}` hides an inherited field", field.name),
                    field.span,
                ));
            }
        }
    }
    Ok(())
}

fn compute_overrides(env: &mut Env) -> Result<(), CompileError> {
    let mut overrides = Vec::new();
    for class in env.classes.values() {
        let supers: Vec<&str> = env.supertypes(&class.name).into_iter().skip(1).collect();
        for id in &class.methods {
            let Some(method) = env.methods.get(id) else { continue };
            if method.is_static {
                continue;
            }
            let mut bases = Vec::new();
            for sup in &supers {
                let Some(info) = env.classes.get(*sup) else { continue };
                for base_id in &info.methods {
                    let Some(base) = env.methods.get(base_id) else { continue };
                    if base.is_static || !base.same_signature(method) {
                        continue;
                    }
                    if base.ret != method.ret {
                        return Err(CompileError::type_err(
                            format!(
                                "`{}` overrides `{}` with a different return type",
                                method.qualified_name(),
                                base.qualified_name()
                            ),
                            method.span,
                        ));
                    }
                    bases.push(*base_id);
                }
            }
            if !bases.is_empty() {
                overrides.push((*id, bases));
            }
        }
    }
    env.overrides.extend(overrides);
    Ok(())
}
