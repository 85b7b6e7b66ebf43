mod common;
use common::{run_int, run_violation};
use specweave::contracts::ViolationKind;

// ── Preconditions weaken ─────────────────────────────────────────────────────

const WEAKENED: &str = r#"
class Base {
    /** @pre | x > 0 */
    int f(int x) { return x; }
}
class Derived extends Base {
    /** @pre | x > -10 */
    int f(int x) { return x + 100; }
}
"#;

fn with_main(prelude: &str, body: &str) -> String {
    format!("{prelude}\nclass Main {{ static int main() {{ {body} }} }}")
}

#[test]
fn override_accepts_its_own_weaker_precondition() {
    let src = with_main(WEAKENED, "Base b = new Derived(); return b.f(-5);");
    assert_eq!(run_int(&src), 95);
}

#[test]
fn failing_every_disjunct_reports_all_of_them() {
    let src = with_main(WEAKENED, "Base b = new Derived(); return b.f(-50);");
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Precondition);
    assert_eq!(v.member, "Derived.f");
    assert_eq!(v.clause, "x > -10 || x > 0");
}

#[test]
fn base_instances_keep_the_base_precondition() {
    let src = with_main(WEAKENED, "Base b = new Base(); return b.f(-5);");
    assert_eq!(run_violation(&src).clause, "x > 0");
}

#[test]
fn override_without_precondition_inherits_it() {
    let src = with_main(
        r#"
class Base {
    /** @pre | x > 0 */
    int f(int x) { return x; }
}
class Derived extends Base {
    int f(int x) { return x * 2; }
}
"#,
        "Derived d = new Derived(); return d.f(-1);",
    );
    assert_eq!(run_violation(&src).member, "Derived.f");
}

// ── Postconditions strengthen ────────────────────────────────────────────────

#[test]
fn inherited_postcondition_binds_override() {
    let src = with_main(
        r#"
class Base {
    /** @post | result >= 0 */
    int size() { return 0; }
}
class Derived extends Base {
    /** @post | result < 10 */
    int size() { return -1; }
}
"#,
        "Base b = new Derived(); return b.size();",
    );
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Postcondition);
    assert_eq!(v.member, "Derived.size");
    assert_eq!(v.clause, "result >= 0");
}

#[test]
fn interface_contracts_bind_implementations() {
    let src = with_main(
        r#"
interface Shape {
    /** @post | result >= 0 */
    int area();
}
class Square implements Shape {
    int side;
    Square(int s) { side = s; }
    int area() { return side * side; }
}
class Broken implements Shape {
    int area() { return -1; }
}
"#,
        "Shape s = new Square(3); int a = s.area(); Shape t = new Broken(); return a + t.area();",
    );
    let v = run_violation(&src);
    assert_eq!(v.member, "Broken.area");
    assert_eq!(v.clause, "result >= 0");
}

// ── Invariants ───────────────────────────────────────────────────────────────

#[test]
fn superclass_invariant_holds_for_subclass_objects() {
    let src = with_main(
        r#"
/** @invar | count >= 0 */
class Counter {
    int count;
    /** @mutates | this.count */
    void add(int n) { count = count + n; }
}
/** @invar | count <= limit */
class Bounded extends Counter {
    int limit = 5;
}
"#,
        "Bounded b = new Bounded(); b.add(3); b.add(-4); return b.count;",
    );
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Invariant);
    assert_eq!(v.member, "Counter");
}
