mod common;
use common::{run, run_int, run_violation};
use specweave::contracts::{EffectClass, ViolationKind};
use specweave::interp::{Outcome, Value};

const CHAIN: &str = r#"
class Cell {
    int value;
    /** @mutates | this.value */
    void set(int v) { value = v; }
}
class Level3 {
    Cell cell = new Cell();
    /** @mutates_properties | this.cell */
    void update(int v) { cell.set(v); }
}
class Level2 {
    Level3 inner = new Level3();
    /** @mutates_properties | this.inner */
    void update(int v) { inner.update(v); }
}
class Level1 {
    Level2 inner = new Level2();
    /** @mutates_properties | this.inner */
    void update(int v) { inner.update(v); }
}
/** @invar | level.inner.inner.cell.value >= 0 */
class Top {
    Level1 level = new Level1();
    /** @mutates_properties | this.level */
    void run(int v) { level.update(v); }
}
"#;

fn with_main(chain: &str, body: &str) -> String {
    format!("{chain}\nclass Main {{ static int main() {{ {body} }} }}")
}

#[test]
fn deep_mutation_reverifies_top_invariant() {
    let src = with_main(CHAIN, "Top t = new Top(); t.run(-5); return 0;");
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Invariant);
    assert_eq!(v.member, "Top");
    assert_eq!(v.clause, "level.inner.inner.cell.value >= 0");
    let site = v.site.expect("call site");
    assert_eq!(&src[site.start..site.end], "t.run(-5)");
}

const ENTRIES: [(&str, &str, &str); 4] = [
    ("Level3", "cell.value >= 0", "Level3 l = new Level3(); l.update(-5); return 0;"),
    ("Level2", "inner.cell.value >= 0", "Level2 l = new Level2(); l.update(-5); return 0;"),
    ("Level1", "inner.inner.cell.value >= 0", "Level1 l = new Level1(); l.update(-5); return 0;"),
    ("Top", "level.inner.inner.cell.value >= 0", "Top t = new Top(); t.run(-5); return 0;"),
];

/// The chain with an invariant on `class` only.
fn guarded_at(class: &str, invariant: &str) -> String {
    let unguarded = CHAIN.replace("/** @invar | level.inner.inner.cell.value >= 0 */\n", "");
    unguarded.replace(&format!("class {class} {{"), &format!("/** @invar | {invariant} */\nclass {class} {{"))
}

#[test]
fn each_level_reverifies_its_own_invariant() {
    for (class, invariant, body) in ENTRIES {
        let src = with_main(&guarded_at(class, invariant), body);
        let v = run_violation(&src);
        assert_eq!(v.kind, ViolationKind::Invariant, "entry at {class}");
        assert_eq!(v.member, class);
        assert_eq!(v.clause, invariant);
    }
}

#[test]
fn deepest_violation_is_caught_from_every_entry() {
    let mut chain = CHAIN.to_string();
    for (class, invariant, _) in &ENTRIES[..3] {
        chain = chain.replace(&format!("class {class} {{"), &format!("/** @invar | {invariant} */\nclass {class} {{"));
    }
    for (class, _, body) in ENTRIES {
        let v = run_violation(&with_main(&chain, body));
        assert_eq!(v.kind, ViolationKind::Invariant, "entry at {class}");
        assert_eq!(v.member, "Level3", "entry at {class}");
        assert_eq!(v.clause, "cell.value >= 0");
    }
}

#[test]
fn harmless_deep_mutation_passes() {
    let src = with_main(CHAIN, "Top t = new Top(); t.run(5); return t.level.inner.inner.cell.value;");
    assert_eq!(run_int(&src), 5);
}

#[test]
fn closure_is_rerooted_through_every_level() {
    let (env, plan) = specweave::analyze(&with_main(CHAIN, "return 0;")).unwrap();
    let run = env.lookup_methods("Top", "run")[0].id;
    let closure: Vec<String> = plan.effects.closures[&run].iter().map(|p| p.to_string()).collect();
    assert_eq!(closure, vec!["this.level.inner.inner.cell.value"]);
    assert_eq!(plan.effects.obligations[&run].len(), 1);
}

#[test]
fn undeclared_level_hides_the_violation() {
    let chain = CHAIN.replace(
        "/** @mutates_properties | this.inner */\n    void update(int v) { inner.update(v); }\n}\nclass Level1",
        "void update(int v) { inner.update(v); }\n}\nclass Level1",
    );
    assert_ne!(chain, CHAIN);
    let src = with_main(&chain, "Top t = new Top(); t.run(-5); return 0;");

    let (env, plan) = specweave::analyze(&src).unwrap();
    let level2 = env.lookup_methods("Level2", "update")[0].id;
    assert_eq!(plan.effects.class_of(level2), EffectClass::Unconstrained);
    assert!(
        plan.diagnostics.notes.iter().any(|n| n.msg.contains("Level2.update")),
        "expected a soundness note, got {:?}",
        plan.diagnostics.notes
    );

    assert_eq!(run(&src), Outcome::Returned(Value::Int(0)));
}

#[test]
fn inspects_only_calls_are_not_reverified() {
    let src = r#"
/** @invar | value >= 0 */
class Gauge {
    int value;
    /** @inspects | this.value */
    int read() { return value; }
}
class Main {
    static int main() {
        Gauge g = new Gauge();
        g.value = -1;
        return g.read();
    }
}
"#;
    assert_eq!(run_int(src), -1);
}

#[test]
fn spread_targets_cover_array_elements() {
    let src = r#"
/** @invar | value >= 0 */
class Slot {
    int value;
    /** @mutates | this.value */
    void put(int v) { value = v; }
}
/** @invar | slots[0].value >= 0 */
class Rack {
    Slot[] slots = new Slot[2];
    { slots[0] = new Slot(); slots[1] = new Slot(); }
    /** @mutates_properties | ...slots */
    void fill(int i, int v) { slots[i].put(v); }
}
class Main {
    static int main() { Rack r = new Rack(); r.fill(1, 4); r.fill(0, -2); return 0; }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.kind, ViolationKind::Invariant);
}

#[test]
fn direct_call_to_undeclared_member_is_reverified() {
    let src = r#"
/** @invar | balance >= 0 */
class Account {
    int balance;
    void corrupt() { balance = -1; }
    void reset() { balance = 0; }
}
class Main {
    static int main() { Account a = new Account(); a.reset(); a.corrupt(); return a.balance; }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.kind, ViolationKind::Invariant);
    assert_eq!(v.member, "Account");
    let site = v.site.expect("call site");
    assert_eq!(&src[site.start..site.end], "a.corrupt()");
}

#[test]
fn undeclared_member_rechecks_its_arguments() {
    let src = r#"
/** @invar | balance >= 0 */
class Account { int balance; }
class Main {
    static void drain(Account a) { a.balance = -3; }
    static int main() { Account a = new Account(); drain(a); return a.balance; }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.member, "Account");
    assert!(v.detail.contains("param#0"), "{}", v.detail);
}
