//! Turning specifications into runtime checks at program points.

use serde::Serialize;

use crate::config::ChecksConfig;
use crate::parser::ast::{CallSiteId, DeclId};
use crate::typeck::env::{CallKind, Env};
use crate::typeck::typed::SlotId;

use super::effects::{InvariantObligation, TargetPath};
use super::snapshot::SnapshotSite;
use super::{BoundClause, CodeEmitter, ContractPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProgramPoint {
    Entry,
    /// Every normal exit, after `finally` blocks have run.
    NormalExit,
    ExceptionalExit,
    AfterCall(CallSiteId),
}

/// A `@throws` clause as checked at exit: its condition was stored in `slot`
/// at entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThrowsCheck {
    pub exception: String,
    pub slot: SlotId,
    pub clause: BoundClause,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CheckCode {
    Snapshot(SnapshotSite),
    /// Holds when every clause of at least one group holds.
    Precondition(Vec<Vec<BoundClause>>),
    Postcondition(Vec<BoundClause>),
    Throws { throws: Vec<ThrowsCheck>, may_throw: Vec<String> },
    /// Invariants to re-check on objects reached from the callee's receiver
    /// (the new object after `new`) and arguments.
    Reverify(Vec<InvariantObligation>),
}

/// Emit the checks of every specified member and every call site that needs
/// invariant re-verification. Returns the number of codes emitted.
pub fn weave(env: &Env, plan: &ContractPlan, checks: &ChecksConfig, emitter: &mut impl CodeEmitter) -> usize {
    let mut emitted = 0;
    let mut emit = |decl, point, code| {
        emitter.emit_at(decl, point, code);
        emitted += 1;
    };

    for (decl, set) in &plan.specs {
        let is_ctor = env.method(*decl).is_some_and(|m| m.is_constructor);
        let snapshot = plan
            .snapshots
            .get(decl)
            .filter(|_| checks.postconditions || checks.exceptional)
            .map(|site| CheckCode::Snapshot(site.clone()));
        let pre = (checks.preconditions && !set.preconditions.is_empty())
            .then(|| CheckCode::Precondition(set.preconditions.clone()));

        // Constructors snapshot before anything runs, methods after the
        // precondition holds
        let entry = if is_ctor { [snapshot, pre] } else { [pre, snapshot] };
        for code in entry.into_iter().flatten() {
            emit(*decl, ProgramPoint::Entry, code);
        }

        if checks.postconditions && !set.postconditions.is_empty() {
            emit(*decl, ProgramPoint::NormalExit, CheckCode::Postcondition(set.postconditions.clone()));
        }

        if checks.exceptional && !set.throws.is_empty() {
            let throws: Vec<ThrowsCheck> = set
                .throws
                .iter()
                .zip(&set.throws_slots)
                .map(|(t, slot)| ThrowsCheck { exception: t.exception.clone(), slot: *slot, clause: t.condition.clone() })
                .collect();
            let may_throw: Vec<String> = set.may_throw.iter().map(|t| t.exception.clone()).collect();
            for point in [ProgramPoint::NormalExit, ProgramPoint::ExceptionalExit] {
                emit(*decl, point, CheckCode::Throws { throws: throws.clone(), may_throw: may_throw.clone() });
            }
        }
    }

    if checks.invariants {
        for site in env.call_sites.values() {
            let mut obligations: Vec<InvariantObligation> = match site.kind {
                CallKind::Super => continue,
                CallKind::Method => Vec::new(),
                CallKind::New => establish(env, plan, site.callee),
            };
            for o in plan.effects.obligations.get(&site.callee).into_iter().flatten() {
                if !obligations.iter().any(|e| e.object == o.object && e.clause == o.clause) {
                    obligations.push(o.clone());
                }
            }
            if !obligations.is_empty() {
                emit(site.caller, ProgramPoint::AfterCall(site.id), CheckCode::Reverify(obligations));
            }
        }
    }

    tracing::info!(codes = emitted, "woven runtime checks");
    emitted
}

/// Every invariant of the constructed class, checked on the new object.
fn establish(env: &Env, plan: &ContractPlan, ctor: DeclId) -> Vec<InvariantObligation> {
    let Some(class) = env.method(ctor).map(|m| m.owner.as_str()) else { return Vec::new() };
    plan.invariants_of(env, class)
        .into_iter()
        .map(|(owner, clause)| InvariantObligation {
            object: TargetPath::this(class),
            class: owner.to_string(),
            clause: clause.clone(),
        })
        .collect()
}
