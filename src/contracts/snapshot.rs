//! Entry snapshots: where `old(..)` terms and `@throws` conditions are
//! evaluated, and the slots that carry their values to the exit checks.

use indexmap::IndexMap;
use serde::Serialize;

use crate::parser::ast::DeclId;
use crate::typeck::env::Env;
use crate::typeck::typed::{SlotId, TExpr, TypedExpr};

use super::SpecificationSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SnapshotPoint {
    /// After the precondition check, before the first body statement.
    MethodEntry,
    /// First instruction of the constructor, ahead of the precondition check,
    /// the superclass constructor and every initializer.
    ConstructorPrologue,
}

/// The single place where a declaration's entry values are stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSite {
    pub point: SnapshotPoint,
    pub slots: Vec<(SlotId, TypedExpr)>,
}

impl SnapshotSite {
    /// Slot shared by every equal term from `shared_from` on.
    fn slot_for(&mut self, expr: TypedExpr, shared_from: usize) -> SlotId {
        let key = expr.to_string();
        let existing = self.slots[shared_from..].iter().find(|(_, e)| e.ty == expr.ty && e.to_string() == key);
        if let Some((slot, _)) = existing {
            return *slot;
        }
        let slot = SlotId(self.slots.len() as u32);
        self.slots.push((slot, expr));
        slot
    }

    /// Dedicated slot; never shared even with an equal expression.
    fn fresh_slot(&mut self, expr: TypedExpr) -> SlotId {
        let slot = SlotId(self.slots.len() as u32);
        self.slots.push((slot, expr));
        slot
    }
}

/// Give every `old(E)` of a member's postconditions a slot at the member's
/// snapshot site and rewrite the postconditions to read the slot. `throws`
/// conditions get slots of their own so they are judged as at entry; they
/// come first, so an `old` term that throws cannot leave them unfilled.
pub fn schedule(env: &Env, specs: &mut IndexMap<DeclId, SpecificationSet>) -> IndexMap<DeclId, SnapshotSite> {
    let mut sites = IndexMap::new();

    for (id, set) in specs.iter_mut() {
        let is_ctor = env.method(*id).is_some_and(|m| m.is_constructor);
        let point = if is_ctor { SnapshotPoint::ConstructorPrologue } else { SnapshotPoint::MethodEntry };
        let mut site = SnapshotSite { point, slots: Vec::new() };

        set.throws_slots = set.throws.iter().map(|t| site.fresh_slot(t.condition.expr.clone())).collect();
        let shared_from = site.slots.len();

        for post in &mut set.postconditions {
            let expr = std::mem::replace(&mut post.expr, placeholder());
            post.expr = expr.rewrite(&mut |e| match e.kind {
                TExpr::Old(inner) => {
                    let slot = site.slot_for(*inner, shared_from);
                    TypedExpr::new(TExpr::Slot(slot), e.ty, e.span)
                }
                _ => e,
            });
        }

        if !site.slots.is_empty() {
            tracing::debug!(member = %set.member, slots = site.slots.len(), "scheduled snapshot");
            sites.insert(*id, site);
        }
    }
    sites
}

fn placeholder() -> TypedExpr {
    TypedExpr::new(TExpr::Null, crate::typeck::types::Type::Null, crate::span::Span::dummy())
}
