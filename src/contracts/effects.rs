//! Effect analysis: which invariants a call can break.
//!
//! Members are classified by their effect clauses. The closed mutated set of
//! a member is its `mutates` targets plus, for every call licensed by one of
//! its `mutates_properties` targets, the callee's closed set rewritten into
//! the caller's frame. Only declared sets are followed; nothing is inferred
//! from bodies. An unconstrained member contributes nothing to a closure, but
//! a direct call to one re-checks its receiver and arguments.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::parser::ast::{CallSiteId, DeclId};
use crate::typeck::env::{CallKind, CallSite, Env};
use crate::typeck::typed::{Receiver, TExpr, TStmt, TypedExpr};
use crate::typeck::types::Type;

use super::{BoundClause, SpecificationSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Root {
    This,
    Param(usize),
    Static(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Step {
    Field(String),
    /// No-argument method call, by name.
    Accessor(String),
    /// Every element of an array.
    Elements,
}

/// A normalised effect target or read path. Every step records the static
/// type it produces; types take no part in comparisons.
#[derive(Debug, Clone, Serialize)]
pub struct TargetPath {
    pub root: Root,
    pub root_ty: Type,
    pub steps: Vec<(Step, Type)>,
}

impl PartialEq for TargetPath {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
            && self.steps.len() == other.steps.len()
            && self.steps.iter().zip(&other.steps).all(|(a, b)| a.0 == b.0)
    }
}

impl TargetPath {
    pub fn this(class: &str) -> Self {
        Self { root: Root::This, root_ty: Type::Class(class.to_string()), steps: Vec::new() }
    }

    /// Path denoted by a clause or body expression. Body locals count as
    /// paths only when they name a parameter.
    pub fn of(expr: &TypedExpr, params: &[(String, Type)]) -> Option<Self> {
        let root = |root: Root| Some(Self { root, root_ty: expr.ty.clone(), steps: Vec::new() });
        match &expr.kind {
            TExpr::This => root(Root::This),
            TExpr::Param { index, .. } => root(Root::Param(*index)),
            TExpr::Local(name) => {
                let index = params.iter().position(|(p, _)| p == name)?;
                root(Root::Param(index))
            }
            TExpr::StaticField { class, field } => Some(Self {
                root: Root::Static(class.clone()),
                root_ty: Type::Void,
                steps: vec![(Step::Field(field.clone()), expr.ty.clone())],
            }),
            TExpr::Field { object, field } => Self::of(object, params)?.then(Step::Field(field.clone()), &expr.ty),
            TExpr::Call { receiver: Receiver::Virtual(object), args, name, .. } if args.is_empty() => {
                Self::of(object, params)?.then(Step::Accessor(name.clone()), &expr.ty)
            }
            TExpr::Index { array, .. } => Self::of(array, params)?.then(Step::Elements, &expr.ty),
            TExpr::Spread(inner) => Self::of(inner, params)?.then(Step::Elements, &expr.ty),
            TExpr::Length(object) => Self::of(object, params),
            _ => None,
        }
    }

    fn then(mut self, step: Step, ty: &Type) -> Option<Self> {
        self.steps.push((step, ty.clone()));
        Some(self)
    }

    /// Static type of the object the path denotes.
    pub fn ty(&self) -> &Type {
        self.steps.last().map(|(_, ty)| ty).unwrap_or(&self.root_ty)
    }

    /// `self` is a prefix of, or equal to, `other`.
    pub fn dominates(&self, other: &TargetPath) -> bool {
        self.root == other.root
            && self.steps.len() <= other.steps.len()
            && self.steps.iter().zip(&other.steps).all(|(a, b)| a.0 == b.0)
    }

    pub fn overlaps(&self, other: &TargetPath) -> bool {
        self.dominates(other) || other.dominates(self)
    }

    /// Every prefix, shortest (the bare root) first.
    pub fn prefixes(&self) -> impl Iterator<Item = TargetPath> + '_ {
        (0..=self.steps.len()).map(|n| TargetPath {
            root: self.root.clone(),
            root_ty: self.root_ty.clone(),
            steps: self.steps[..n].to_vec(),
        })
    }

    /// Replace a `this` root by `at`.
    pub fn reroot(&self, at: &TargetPath) -> TargetPath {
        match self.root {
            Root::This => TargetPath {
                root: at.root.clone(),
                root_ty: at.root_ty.clone(),
                steps: at.steps.iter().chain(&self.steps).cloned().collect(),
            },
            _ => self.clone(),
        }
    }

    /// Rewrite a callee path into the caller's frame; `None` when the root
    /// has no path there.
    pub fn substitute(&self, receiver: Option<&TargetPath>, args: &[Option<TargetPath>]) -> Option<TargetPath> {
        let base = match &self.root {
            Root::This => receiver?.clone(),
            Root::Param(i) => args.get(*i)?.clone()?,
            Root::Static(_) => return Some(self.clone()),
        };
        Some(TargetPath {
            root: base.root.clone(),
            root_ty: base.root_ty.clone(),
            steps: base.steps.iter().chain(&self.steps).cloned().collect(),
        })
    }
}

impl std::fmt::Display for TargetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            Root::This => write!(f, "this")?,
            Root::Param(i) => write!(f, "param#{i}")?,
            Root::Static(class) => write!(f, "{class}")?,
        }
        for (step, _) in &self.steps {
            match step {
                Step::Field(name) => write!(f, ".{name}")?,
                Step::Accessor(name) => write!(f, ".{name}()")?,
                Step::Elements => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EffectClass {
    /// Has at least one effect clause, own or inherited.
    Declared,
    /// Reads but never writes; mutates nothing.
    PureAccessor,
    /// May mutate anything, but declares nothing to follow.
    Unconstrained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reverification {
    Required,
    NotRequired,
    /// The member declares no effects; only the objects it was handed are
    /// re-checked.
    Gap,
}

/// An invariant to re-check on `object` (in the callee's frame) after a call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvariantObligation {
    pub object: TargetPath,
    /// Class declaring the invariant.
    pub class: String,
    pub clause: BoundClause,
}

#[derive(Debug)]
pub struct EffectAnalysis {
    /// Declarations with call edges labelled by call site.
    pub graph: DiGraph<DeclId, CallSiteId>,
    nodes: HashMap<DeclId, NodeIndex>,
    pub classes: IndexMap<DeclId, EffectClass>,
    pub closures: IndexMap<DeclId, Vec<TargetPath>>,
    pub obligations: IndexMap<DeclId, Vec<InvariantObligation>>,
}

/// Invariants of `class` and its superclasses, superclasses first.
pub(crate) fn class_invariants<'i>(
    env: &Env,
    invariants: &'i IndexMap<String, Vec<BoundClause>>,
    class: &str,
) -> Vec<(&'i str, &'i BoundClause)> {
    let mut out = Vec::new();
    for info in env.class_chain(class).into_iter().rev() {
        if let Some((owner, clauses)) = invariants.get_key_value(info.name.as_str()) {
            out.extend(clauses.iter().map(|c| (owner.as_str(), c)));
        }
    }
    out
}

/// Every object path an invariant reads a property of, rooted at `this`.
pub fn read_set(invariant: &BoundClause) -> Vec<TargetPath> {
    let mut reads: Vec<TargetPath> = Vec::new();
    invariant.expr.walk(&mut |e| {
        let path = match &e.kind {
            TExpr::Field { .. } | TExpr::Index { .. } | TExpr::Length(_) | TExpr::StaticField { .. } => {
                TargetPath::of(e, &[])
            }
            TExpr::Call { receiver: Receiver::Virtual(object), args, .. } => {
                // A call with arguments may read anything reachable from its receiver
                if args.is_empty() { TargetPath::of(e, &[]) } else { TargetPath::of(object, &[]) }
            }
            _ => None,
        };
        if let Some(path) = path {
            if !reads.contains(&path) {
                reads.push(path);
            }
        }
    });
    reads
}

impl EffectAnalysis {
    pub fn build(
        env: &Env,
        specs: &IndexMap<DeclId, SpecificationSet>,
        invariants: &IndexMap<String, Vec<BoundClause>>,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut analysis = EffectAnalysis {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            classes: IndexMap::new(),
            closures: IndexMap::new(),
            obligations: IndexMap::new(),
        };

        for site in env.call_sites.values() {
            let from = analysis.node(site.caller);
            let to = analysis.node(site.callee);
            analysis.graph.add_edge(from, to, site.id);
        }

        let accessors = referenced_accessors(specs);
        for (id, method) in &env.methods {
            let class = if specs.get(id).is_some_and(|s| !s.effects.is_empty()) {
                EffectClass::Declared
            } else if is_pure_accessor(env, specs, *id, &accessors, &mut HashSet::new()) {
                EffectClass::PureAccessor
            } else {
                EffectClass::Unconstrained
            };
            tracing::trace!(member = %method.qualified_name(), ?class, "classified");
            analysis.classes.insert(*id, class);
        }

        let declared: Vec<DeclId> =
            analysis.classes.iter().filter(|(_, c)| **c == EffectClass::Declared).map(|(id, _)| *id).collect();
        for id in declared {
            let closure = analysis.closure(env, specs, id, &mut HashSet::new());
            analysis.closures.insert(id, closure);
        }
        for id in analysis.closures.keys().copied().collect::<Vec<_>>() {
            let obligations = analysis.compute_obligations(env, invariants, id);
            if !obligations.is_empty() {
                analysis.obligations.insert(id, obligations);
            }
        }
        let unconstrained: Vec<DeclId> =
            analysis.classes.iter().filter(|(_, c)| **c == EffectClass::Unconstrained).map(|(id, _)| *id).collect();
        for id in unconstrained {
            let obligations = conservative_obligations(env, invariants, id);
            if !obligations.is_empty() {
                analysis.obligations.insert(id, obligations);
            }
        }

        analysis.report_gaps(env, specs, diagnostics);
        tracing::info!(
            declared = analysis.closures.len(),
            with_obligations = analysis.obligations.len(),
            call_edges = analysis.graph.edge_count(),
            "effect analysis complete"
        );
        analysis
    }

    fn node(&mut self, decl: DeclId) -> NodeIndex {
        if let Some(ix) = self.nodes.get(&decl) {
            return *ix;
        }
        let ix = self.graph.add_node(decl);
        self.nodes.insert(decl, ix);
        ix
    }

    pub fn class_of(&self, decl: DeclId) -> EffectClass {
        self.classes.get(&decl).copied().unwrap_or(EffectClass::Unconstrained)
    }

    /// Call sites in the body of `decl`.
    fn sites_of<'e>(&self, env: &'e Env, decl: DeclId) -> Vec<&'e CallSite> {
        let Some(ix) = self.nodes.get(&decl) else { return Vec::new() };
        let mut sites: Vec<&CallSite> =
            self.graph.edges(*ix).filter_map(|e| env.call_sites.get(e.weight())).collect();
        sites.sort_by_key(|s| s.id);
        sites
    }

    fn closure(
        &self,
        env: &Env,
        specs: &IndexMap<DeclId, SpecificationSet>,
        decl: DeclId,
        visiting: &mut HashSet<DeclId>,
    ) -> Vec<TargetPath> {
        if self.class_of(decl) != EffectClass::Declared || !visiting.insert(decl) {
            return Vec::new();
        }
        let (Some(set), Some(method)) = (specs.get(&decl), env.method(decl)) else {
            return Vec::new();
        };

        let mut out: Vec<TargetPath> = Vec::new();
        if method.is_constructor {
            out.push(TargetPath::this(&method.owner));
        }
        for target in &set.effects.mutates {
            if let Some(path) = TargetPath::of(&target.expr, &[]) {
                push_unique(&mut out, path);
            }
        }

        let licences: Vec<TargetPath> =
            set.effects.mutates_properties.iter().filter_map(|t| TargetPath::of(&t.expr, &[])).collect();
        for site in self.sites_of(env, decl) {
            if site.kind != CallKind::Method {
                continue;
            }
            let Some(receiver) = site.receiver.as_ref().and_then(|r| TargetPath::of(r, &method.params)) else {
                continue;
            };
            if !licences.iter().any(|l| l.dominates(&receiver)) {
                continue;
            }
            let args: Vec<Option<TargetPath>> = site.args.iter().map(|a| TargetPath::of(a, &method.params)).collect();
            for target in self.closure(env, specs, site.callee, visiting) {
                if let Some(path) = target.substitute(Some(&receiver), &args) {
                    push_unique(&mut out, path);
                }
            }
        }

        visiting.remove(&decl);
        out
    }

    /// Whether `invariant`, checked on `object` in the frame of `root`, can
    /// be broken by a call to `root`.
    pub fn reverification(&self, root: DeclId, object: &TargetPath, invariant: &BoundClause) -> Reverification {
        if self.class_of(root) == EffectClass::Unconstrained {
            return Reverification::Gap;
        }
        let Some(closure) = self.closures.get(&root) else {
            return Reverification::NotRequired;
        };
        let overlaps = read_set(invariant)
            .iter()
            .map(|r| r.reroot(object))
            .any(|r| closure.iter().any(|c| c.overlaps(&r)));
        if overlaps { Reverification::Required } else { Reverification::NotRequired }
    }

    fn compute_obligations(
        &self,
        env: &Env,
        invariants: &IndexMap<String, Vec<BoundClause>>,
        decl: DeclId,
    ) -> Vec<InvariantObligation> {
        let mut out: Vec<InvariantObligation> = Vec::new();
        let Some(closure) = self.closures.get(&decl) else { return out };
        for target in closure {
            for prefix in target.prefixes() {
                let Some(class) = prefix.ty().class_name() else { continue };
                for (owner, clause) in class_invariants(env, invariants, class) {
                    if self.reverification(decl, &prefix, clause) != Reverification::Required {
                        continue;
                    }
                    let duplicate = out.iter().any(|o| o.object == prefix && o.clause == *clause);
                    if !duplicate {
                        out.push(InvariantObligation {
                            object: prefix.clone(),
                            class: owner.to_string(),
                            clause: clause.clone(),
                        });
                    }
                }
            }
        }
        out
    }

    /// Note every call through an unconstrained member that a declared caller
    /// licenses: whatever it mutates is missing from the caller's closure, so
    /// invariants of enclosing objects are not re-verified.
    fn report_gaps(
        &self,
        env: &Env,
        specs: &IndexMap<DeclId, SpecificationSet>,
        diagnostics: &mut Diagnostics,
    ) {
        for site in env.call_sites.values() {
            if site.kind != CallKind::Method || self.class_of(site.callee) != EffectClass::Unconstrained {
                continue;
            }
            let Some(receiver) = &site.receiver else { continue };
            let licensed = self.class_of(site.caller) == EffectClass::Declared
                && env.method(site.caller).is_some_and(|m| {
                    let path = TargetPath::of(receiver, &m.params);
                    specs.get(&site.caller).is_some_and(|s| {
                        s.effects.mutates_properties.iter().filter_map(|t| TargetPath::of(&t.expr, &[])).any(
                            |l| path.as_ref().is_some_and(|p| l.dominates(p)),
                        )
                    })
                });
            if !licensed {
                continue;
            }
            let callee = env.describe(site.callee);
            let msg = format!(
                "`{callee}` declares no effects; invariants of objects enclosing its receiver are not re-verified"
            );
            tracing::warn!(caller = %env.describe(site.caller), %callee, "soundness gap");
            diagnostics.note(msg, site.span);
        }
    }
}

fn push_unique(out: &mut Vec<TargetPath>, path: TargetPath) {
    if !out.contains(&path) {
        out.push(path);
    }
}

/// Methods named as accessor steps of `inspects` / `mutates_properties` targets.
fn referenced_accessors(specs: &IndexMap<DeclId, SpecificationSet>) -> HashSet<DeclId> {
    let mut out = HashSet::new();
    for set in specs.values() {
        for target in set.effects.inspects.iter().chain(&set.effects.mutates_properties) {
            target.expr.walk(&mut |e| {
                if let TExpr::Call { method, args, .. } = &e.kind {
                    if args.is_empty() {
                        out.insert(*method);
                    }
                }
            });
        }
    }
    out
}

/// Every invariant of the receiver's class and of each class-typed
/// parameter: a member that declares nothing may have touched any of them.
fn conservative_obligations(
    env: &Env,
    invariants: &IndexMap<String, Vec<BoundClause>>,
    decl: DeclId,
) -> Vec<InvariantObligation> {
    let Some(method) = env.method(decl) else { return Vec::new() };
    let mut roots = Vec::new();
    if !method.is_static {
        roots.push(TargetPath::this(&method.owner));
    }
    for (index, (_, ty)) in method.params.iter().enumerate() {
        roots.push(TargetPath { root: Root::Param(index), root_ty: ty.clone(), steps: Vec::new() });
    }

    let mut out = Vec::new();
    for object in roots {
        let Some(class) = object.ty().class_name() else { continue };
        for (owner, clause) in class_invariants(env, invariants, class) {
            out.push(InvariantObligation { object: object.clone(), class: owner.to_string(), clause: clause.clone() });
        }
    }
    out
}

/// A no-argument, non-void instance method whose body is one `return E`,
/// where `E` creates nothing and only calls members that mutate nothing.
fn is_pure_accessor(
    env: &Env,
    specs: &IndexMap<DeclId, SpecificationSet>,
    decl: DeclId,
    referenced: &HashSet<DeclId>,
    visiting: &mut HashSet<DeclId>,
) -> bool {
    if let Some(set) = specs.get(&decl).filter(|s| !s.effects.is_empty()) {
        return set.effects.mutates.is_empty() && set.effects.mutates_properties.is_empty();
    }
    let Some(method) = env.method(decl) else { return false };
    if method.is_static || method.is_constructor || !method.params.is_empty() || method.ret == Type::Void {
        return false;
    }
    if !method.has_body {
        return referenced.contains(&decl);
    }
    let Some([stmt]) = env.body(decl) else { return false };
    let TStmt::Return(Some(value)) = &stmt.node else { return false };
    let creates_or_passes = value.contains(|k| match k {
        TExpr::Call { args, .. } => !args.is_empty(),
        TExpr::New { .. } | TExpr::NewArray { .. } => true,
        _ => false,
    });
    if creates_or_passes || !visiting.insert(decl) {
        return false;
    }

    let mut callees = Vec::new();
    value.walk(&mut |e| {
        if let TExpr::Call { method, .. } = &e.kind {
            callees.push(*method);
        }
    });
    let pure = callees.into_iter().all(|callee| is_pure_accessor(env, specs, callee, referenced, visiting));
    visiting.remove(&decl);
    pure
}
