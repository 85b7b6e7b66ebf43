use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::parser::ast::{CallSiteId, DeclId};
use crate::span::{Span, Spanned};

use super::typed::{TStmt, TypedExpr};
use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitItem {
    Field(DeclId),
    Block(DeclId),
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub id: DeclId,
    pub name: String,
    pub is_interface: bool,
    pub is_builtin: bool,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<DeclId>,
    pub methods: Vec<DeclId>,
    pub ctors: Vec<DeclId>,
    /// Instance field initializers and initializer blocks, in textual order.
    pub init_order: Vec<InitItem>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub id: DeclId,
    pub name: String,
    pub owner: String,
    pub ty: Type,
    pub is_static: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub id: DeclId,
    pub name: String,
    pub owner: String,
    pub params: Vec<(String, Type)>,
    /// `Void` for void methods and constructors.
    pub ret: Type,
    pub is_static: bool,
    pub is_constructor: bool,
    pub has_body: bool,
    pub span: Span,
}

impl MethodInfo {
    pub fn param_types(&self) -> impl Iterator<Item = &Type> {
        self.params.iter().map(|(_, ty)| ty)
    }

    pub fn same_signature(&self, other: &MethodInfo) -> bool {
        self.name == other.name && self.param_types().eq(other.param_types())
    }

    /// `Owner.name` for messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Method,
    New,
    Super,
}

/// A resolved call in some body, with the receiver and argument expressions
/// as the caller sees them.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub id: CallSiteId,
    pub caller: DeclId,
    pub callee: DeclId,
    pub kind: CallKind,
    /// `None` for static calls and `new`.
    pub receiver: Option<TypedExpr>,
    pub args: Vec<TypedExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Interface,
    Field,
    Constructor,
    Method,
    Initializer,
}

#[derive(Debug, Default)]
pub struct Env {
    pub classes: IndexMap<String, ClassInfo>,
    pub methods: IndexMap<DeclId, MethodInfo>,
    pub fields: IndexMap<DeclId, FieldInfo>,
    pub type_decls: HashMap<DeclId, String>,
    /// Initializer block → owning class.
    pub init_blocks: HashMap<DeclId, String>,
    /// Typed bodies of methods, constructors and initializer blocks.
    pub bodies: HashMap<DeclId, Vec<Spanned<TStmt>>>,
    pub field_inits: HashMap<DeclId, TypedExpr>,
    pub call_sites: IndexMap<CallSiteId, CallSite>,
    /// Method → methods it overrides or implements, nearest first.
    pub overrides: HashMap<DeclId, Vec<DeclId>>,
    pub(crate) next_decl: u32,
}

impl Env {
    pub fn new(first_free_decl: u32) -> Self {
        Self { next_decl: first_free_decl, ..Default::default() }
    }

    pub(crate) fn fresh_decl(&mut self) -> DeclId {
        let id = DeclId(self.next_decl);
        self.next_decl += 1;
        id
    }

    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn method(&self, id: DeclId) -> Option<&MethodInfo> {
        self.methods.get(&id)
    }

    pub fn field(&self, id: DeclId) -> Option<&FieldInfo> {
        self.fields.get(&id)
    }

    pub fn decl_kind(&self, id: DeclId) -> Option<DeclKind> {
        if let Some(name) = self.type_decls.get(&id) {
            let is_interface = self.classes.get(name).is_some_and(|c| c.is_interface);
            return Some(if is_interface { DeclKind::Interface } else { DeclKind::Class });
        }
        if let Some(m) = self.methods.get(&id) {
            return Some(if m.is_constructor { DeclKind::Constructor } else { DeclKind::Method });
        }
        if self.fields.contains_key(&id) {
            return Some(DeclKind::Field);
        }
        if self.init_blocks.contains_key(&id) {
            return Some(DeclKind::Initializer);
        }
        None
    }

    /// Class owning a declaration; a type declaration owns itself.
    pub fn owner_of(&self, id: DeclId) -> Option<&str> {
        if let Some(name) = self.type_decls.get(&id) {
            return Some(name);
        }
        if let Some(m) = self.methods.get(&id) {
            return Some(&m.owner);
        }
        if let Some(f) = self.fields.get(&id) {
            return Some(&f.owner);
        }
        self.init_blocks.get(&id).map(|s| s.as_str())
    }

    /// Human-readable name of a declaration.
    pub fn describe(&self, id: DeclId) -> String {
        if let Some(name) = self.type_decls.get(&id) {
            return name.clone();
        }
        if let Some(m) = self.methods.get(&id) {
            return m.qualified_name();
        }
        if let Some(f) = self.fields.get(&id) {
            return format!("{}.{}", f.owner, f.name);
        }
        match self.init_blocks.get(&id) {
            Some(owner) => format!("{owner}.<init>"),
            None => id.to_string(),
        }
    }

    /// The class itself followed by its superclass chain.
    pub fn class_chain(&self, name: &str) -> Vec<&ClassInfo> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.classes.get(name);
        while let Some(info) = current {
            if !seen.insert(info.name.as_str()) {
                break;
            }
            chain.push(info);
            current = info.superclass.as_deref().and_then(|s| self.classes.get(s));
        }
        chain
    }

    /// Every supertype (superclasses and interfaces, transitively), nearest
    /// first, starting with the type itself.
    pub fn supertypes(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(name);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(info) = self.classes.get(current) else { continue };
            out.push(info.name.as_str());
            if let Some(sup) = &info.superclass {
                queue.push_back(sup.as_str());
            }
            for iface in &info.interfaces {
                queue.push_back(iface.as_str());
            }
        }
        out
    }

    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.supertypes(sub).contains(&sup)
    }

    pub fn is_assignable(&self, from: &Type, to: &Type) -> bool {
        match (from, to) {
            _ if from == to => true,
            (Type::Null, to) => matches!(to, Type::Class(_) | Type::Array(_)),
            (Type::Class(a), Type::Class(b)) => self.is_subtype(a, b),
            _ => false,
        }
    }

    pub fn is_exception_class(&self, name: &str) -> bool {
        self.classes.get(name).is_some_and(|c| !c.is_interface) && self.is_subtype(name, "Throwable")
    }

    /// Field visible from `class` (declared there or in a superclass).
    pub fn lookup_field(&self, class: &str, name: &str) -> Option<&FieldInfo> {
        self.class_chain(class)
            .into_iter()
            .flat_map(|c| c.fields.iter())
            .filter_map(|id| self.fields.get(id))
            .find(|f| f.name == name)
    }

    /// Methods called `name` visible from `class`, nearest declaration first.
    pub fn lookup_methods(&self, class: &str, name: &str) -> Vec<&MethodInfo> {
        self.supertypes(class)
            .into_iter()
            .filter_map(|c| self.classes.get(c))
            .flat_map(|c| c.methods.iter())
            .filter_map(|id| self.methods.get(id))
            .filter(|m| m.name == name)
            .collect()
    }

    pub fn constructors(&self, class: &str) -> Vec<&MethodInfo> {
        self.classes
            .get(class)
            .map(|c| c.ctors.iter().filter_map(|id| self.methods.get(id)).collect())
            .unwrap_or_default()
    }

    /// Implementation of `decl` that runs for a receiver of class `runtime`.
    pub fn dispatch(&self, runtime: &str, decl: DeclId) -> DeclId {
        let Some(target) = self.methods.get(&decl) else { return decl };
        if target.is_static || target.is_constructor {
            return decl;
        }
        for class in self.class_chain(runtime) {
            for id in &class.methods {
                if let Some(m) = self.methods.get(id) {
                    if m.has_body && !m.is_static && m.same_signature(target) {
                        return *id;
                    }
                }
            }
        }
        decl
    }

    pub fn body(&self, decl: DeclId) -> Option<&[Spanned<TStmt>]> {
        self.bodies.get(&decl).map(|b| b.as_slice())
    }

    /// Call sites whose caller is `decl`, in body order.
    pub fn call_sites_of(&self, decl: DeclId) -> impl Iterator<Item = &CallSite> {
        self.call_sites.values().filter(move |s| s.caller == decl)
    }
}
