use indexmap::IndexMap;

use crate::parser::ast::DeclId;
use crate::typeck::env::Env;

use super::{DeclClauses, SpecificationSet};

/// Effective specification of every member that has one.
///
/// Preconditions of an override and the declarations it overrides are
/// disjoined, postconditions conjoined, `throws` and `may_throw` unioned. An
/// override declaring any effect clause replaces the inherited effects.
/// Constructors and static methods only ever carry their own clauses.
pub fn combine(env: &Env, decls: &IndexMap<DeclId, DeclClauses>) -> IndexMap<DeclId, SpecificationSet> {
    let empty = DeclClauses::default();
    let mut specs = IndexMap::new();

    for (id, method) in &env.methods {
        let own = decls.get(id).unwrap_or(&empty);
        let ancestors: &[DeclId] = match env.overrides.get(id) {
            Some(list) if !method.is_constructor && !method.is_static => list,
            _ => &[],
        };
        let chain: Vec<&DeclClauses> =
            std::iter::once(own).chain(ancestors.iter().filter_map(|a| decls.get(a))).collect();

        let mut set = SpecificationSet { member: method.qualified_name(), ..Default::default() };
        for clauses in &chain {
            if !clauses.preconditions.is_empty() {
                set.preconditions.push(clauses.preconditions.clone());
            }
            set.postconditions.extend(clauses.postconditions.iter().cloned());
            set.throws.extend(clauses.throws.iter().cloned());
            set.may_throw.extend(clauses.may_throw.iter().cloned());
        }
        if let Some(effects) = chain.iter().map(|c| &c.effects).find(|e| !e.is_empty()) {
            set.effects = effects.clone();
        }

        if !set.is_empty() {
            if !ancestors.is_empty() {
                tracing::debug!(member = %set.member, inherited_from = ancestors.len(), "combined specification");
            }
            specs.insert(*id, set);
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clauses::extract_unit;
    use crate::contracts::binder::bind;
    use crate::parser::parse_source;
    use crate::typeck::typecheck;

    fn specs(src: &str) -> (Env, IndexMap<DeclId, SpecificationSet>) {
        let unit = parse_source(src).unwrap();
        let env = typecheck(&unit).unwrap();
        let bound = bind(&env, &extract_unit(&unit), unit.site_count);
        assert!(!bound.diagnostics.has_errors(), "{:?}", bound.diagnostics.errors);
        let specs = combine(&env, &bound.decls);
        (env, specs)
    }

    fn texts(clauses: &[crate::contracts::BoundClause]) -> Vec<&str> {
        clauses.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn override_disjoins_pre_and_conjoins_post() {
        let (env, specs) = specs(
            "class Base {
                /** @pre | x > 0
                  * @post | result > 0 */
                int f(int x) { return x; }
            }
            class Sub extends Base {
                /** @pre | x > -10
                  * @post | result < 100 */
                int f(int x) { return x + 1; }
            }",
        );
        let sub_f = env.lookup_methods("Sub", "f")[0].id;
        let set = &specs[&sub_f];
        assert_eq!(set.preconditions.len(), 2);
        assert_eq!(texts(&set.preconditions[0]), vec!["x > -10"]);
        assert_eq!(texts(&set.preconditions[1]), vec!["x > 0"]);
        assert_eq!(texts(&set.postconditions), vec!["result < 100", "result > 0"]);
    }

    #[test]
    fn interface_clauses_are_inherited_by_implementations() {
        let (env, specs) = specs(
            "interface Stack {
                /** @pre | n >= 0
                  * @mutates | this */
                void push(int n);
            }
            class ArrayStack implements Stack { void push(int n) {} }",
        );
        let push = env.lookup_methods("ArrayStack", "push")[0].id;
        let set = &specs[&push];
        assert_eq!(texts(&set.preconditions[0]), vec!["n >= 0"]);
        assert_eq!(set.effects.mutates.len(), 1);
    }

    #[test]
    fn own_effects_replace_inherited_ones() {
        let (env, specs) = specs(
            "class Base { int x; int y; /** @mutates | x */ void f() {} }
             class Sub extends Base { /** @inspects | y */ void f() {} }",
        );
        let sub_f = env.lookup_methods("Sub", "f")[0].id;
        let effects = &specs[&sub_f].effects;
        assert!(effects.mutates.is_empty());
        assert_eq!(effects.inspects.len(), 1);
    }

    #[test]
    fn overloads_are_independent() {
        let (env, specs) = specs(
            "class A {
                /** @pre | x > 0 */ void f(int x) {}
                void f(boolean b) {}
            }",
        );
        let overloads = env.lookup_methods("A", "f");
        let by_int = overloads.iter().find(|m| m.params[0].0 == "x").unwrap();
        let by_bool = overloads.iter().find(|m| m.params[0].0 == "b").unwrap();
        assert!(specs.contains_key(&by_int.id));
        assert!(!specs.contains_key(&by_bool.id));
    }

    #[test]
    fn constructors_are_not_combined() {
        let (env, specs) = specs(
            "class Base { /** @pre | x > 0 */ Base(int x) {} }
             class Sub extends Base { Sub(int x) { super(x); } }",
        );
        let sub_ctor = env.constructors("Sub")[0].id;
        assert!(!specs.contains_key(&sub_ctor));
    }
}
