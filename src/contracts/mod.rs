//! Design-by-contract passes.
//!
//! Clauses flow extractor → parser → [`binder`] → [`inherit`] →
//! [`snapshot`] → [`effects`] → [`weave`]. Every pass before the weaver only
//! produces descriptive data; the weaver hands check code to a
//! [`CodeEmitter`] owned by the host.

pub mod binder;
pub mod effects;
pub mod inherit;
pub mod snapshot;
pub mod weave;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clauses::{self, ClauseTag};
use crate::diagnostics::{CompileError, Diagnostics};
use crate::parser::ast::{CompilationUnit, DeclId, Expr};
use crate::span::{Span, Spanned};
use crate::typeck::env::Env;
use crate::typeck::typed::{SlotId, TypedExpr};
use crate::typeck::types::Type;

pub use effects::{EffectAnalysis, EffectClass, InvariantObligation, Reverification, TargetPath};
pub use snapshot::{SnapshotPoint, SnapshotSite};
pub use weave::{CheckCode, ProgramPoint, ThrowsCheck};

/// What a clause expression may refer to.
#[derive(Debug, Clone)]
pub struct ClauseScope {
    /// Declaration the clause is written on.
    pub decl: DeclId,
    /// Class whose members are in scope.
    pub class: String,
    pub is_static: bool,
    /// Parameters, positionally.
    pub params: Vec<(String, Type)>,
    /// Type of `result`; `None` where `result` has no value.
    pub result: Option<Type>,
}

/// Name resolution and typing of clause expressions, provided by the host.
pub trait ExprResolver {
    fn resolve_expression(&self, scope: &ClauseScope, expr: &Spanned<Expr>) -> Result<TypedExpr, CompileError>;

    /// Element type when `ty` can be spread with `...`.
    fn iterable_element_type(&self, ty: &Type) -> Option<Type>;
}

/// Receives the checks woven into a declaration.
pub trait CodeEmitter {
    fn emit_at(&mut self, decl: DeclId, point: ProgramPoint, code: CheckCode);
}

/// One bound clause: its typed expression plus where it was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundClause {
    pub tag: ClauseTag,
    /// Declaration the clause was written on; differs from the set's owner for
    /// inherited clauses.
    pub origin: DeclId,
    pub text: String,
    pub expr: TypedExpr,
    pub span: Span,
}

/// A `@throws` or `@may_throw` clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThrowsClause {
    pub exception: String,
    pub condition: BoundClause,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectClauses {
    pub inspects: Vec<BoundClause>,
    pub mutates: Vec<BoundClause>,
    pub mutates_properties: Vec<BoundClause>,
}

impl EffectClauses {
    pub fn is_empty(&self) -> bool {
        self.inspects.is_empty() && self.mutates.is_empty() && self.mutates_properties.is_empty()
    }
}

/// Clauses written on one declaration, before inheritance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeclClauses {
    pub preconditions: Vec<BoundClause>,
    pub postconditions: Vec<BoundClause>,
    pub invariants: Vec<BoundClause>,
    pub throws: Vec<ThrowsClause>,
    pub may_throw: Vec<ThrowsClause>,
    pub effects: EffectClauses,
}

/// The effective specification of a member after inheritance combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecificationSet {
    pub member: String,
    /// Disjunction of conjunctions: one group per declaration contributing a
    /// precondition, own group first.
    pub preconditions: Vec<Vec<BoundClause>>,
    pub postconditions: Vec<BoundClause>,
    pub throws: Vec<ThrowsClause>,
    pub may_throw: Vec<ThrowsClause>,
    pub effects: EffectClauses,
    /// Snapshot slot holding the entry value of each `throws` condition,
    /// parallel to `throws`.
    pub throws_slots: Vec<SlotId>,
}

impl SpecificationSet {
    pub fn is_empty(&self) -> bool {
        self.preconditions.is_empty()
            && self.postconditions.is_empty()
            && self.throws.is_empty()
            && self.may_throw.is_empty()
            && self.effects.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    Precondition,
    Postcondition,
    Invariant,
    ExceptionalPostcondition,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::Precondition => write!(f, "precondition"),
            ViolationKind::Postcondition => write!(f, "postcondition"),
            ViolationKind::Invariant => write!(f, "invariant"),
            ViolationKind::ExceptionalPostcondition => write!(f, "exceptional postcondition"),
        }
    }
}

/// A contract that evaluated to false at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind} violated in {member}: {clause} ({detail})")]
pub struct ContractViolation {
    pub kind: ViolationKind,
    /// Member whose contract failed; the class for invariants.
    pub member: String,
    /// Clause text; the failing disjuncts joined with `||` for preconditions.
    pub clause: String,
    /// The clause in the source.
    pub span: Span,
    /// The return statement or call site where the check ran, when there is one.
    pub site: Option<Span>,
    /// Where it failed: the exit site, the call site, the thrown exception.
    pub detail: String,
}

/// Everything the weaver needs, for one compilation unit.
#[derive(Debug)]
pub struct ContractPlan {
    pub specs: IndexMap<DeclId, SpecificationSet>,
    /// Class → invariants written on it (not inherited ones).
    pub invariants: IndexMap<String, Vec<BoundClause>>,
    pub snapshots: IndexMap<DeclId, SnapshotSite>,
    pub effects: EffectAnalysis,
    pub diagnostics: Diagnostics,
}

impl ContractPlan {
    /// Invariants that hold for instances of `class`, superclasses first.
    pub fn invariants_of<'p>(&'p self, env: &Env, class: &str) -> Vec<(&'p str, &'p BoundClause)> {
        effects::class_invariants(env, &self.invariants, class)
    }

    /// Effective specifications as JSON: per member its combined clauses,
    /// effect classification and snapshot slots, per class its invariants.
    pub fn report(&self, env: &Env) -> serde_json::Value {
        let texts = |clauses: &[BoundClause]| clauses.iter().map(|c| c.text.clone()).collect::<Vec<_>>();
        let throws = |clauses: &[ThrowsClause]| {
            clauses
                .iter()
                .map(|t| serde_json::json!({ "exception": t.exception, "when": t.condition.text }))
                .collect::<Vec<_>>()
        };

        let members: Vec<serde_json::Value> = self
            .specs
            .iter()
            .map(|(decl, set)| {
                let snapshot = self.snapshots.get(decl).map(|site| {
                    site.slots.iter().map(|(slot, expr)| format!("$old{} = {expr}", slot.0)).collect::<Vec<_>>()
                });
                serde_json::json!({
                    "member": set.member,
                    "effect_class": self.effects.class_of(*decl),
                    "preconditions": set.preconditions.iter().map(|g| texts(g)).collect::<Vec<_>>(),
                    "postconditions": texts(&set.postconditions),
                    "throws": throws(&set.throws),
                    "may_throw": throws(&set.may_throw),
                    "inspects": texts(&set.effects.inspects),
                    "mutates": texts(&set.effects.mutates),
                    "mutates_properties": texts(&set.effects.mutates_properties),
                    "snapshot": snapshot,
                })
            })
            .collect();

        let invariants: serde_json::Map<String, serde_json::Value> = env
            .classes
            .keys()
            .filter_map(|class| {
                let all = self.invariants_of(env, class);
                (!all.is_empty()).then(|| {
                    let list = all.iter().map(|(_, c)| c.text.clone()).collect::<Vec<_>>();
                    (class.clone(), serde_json::json!(list))
                })
            })
            .collect();

        let notes: Vec<&str> = self.diagnostics.notes.iter().map(|n| n.msg.as_str()).collect();
        serde_json::json!({ "members": members, "invariants": invariants, "notes": notes })
    }
}

/// Run every contract pass over a type-checked unit.
pub fn analyze(unit: &CompilationUnit, env: &Env) -> ContractPlan {
    let records = clauses::extract_unit(unit);
    let bound = binder::bind(env, &records, unit.site_count);
    let mut specs = inherit::combine(env, &bound.decls);
    let snapshots = snapshot::schedule(env, &mut specs);

    let mut diagnostics = bound.diagnostics;
    let effects = EffectAnalysis::build(env, &specs, &bound.invariants, &mut diagnostics);

    tracing::info!(
        clauses = records.len(),
        specified = specs.len(),
        snapshot_sites = snapshots.len(),
        errors = diagnostics.errors.len(),
        notes = diagnostics.notes.len(),
        "contract analysis complete"
    );
    ContractPlan { specs, invariants: bound.invariants, snapshots, effects, diagnostics }
}
