mod common;
use common::{run_int, run_violation};
use specweave::contracts::ViolationKind;

// ── Snapshot in the prologue ─────────────────────────────────────────────────

const ANCESTRY: &str = r#"
class Ancestor {
    static int counter = 0;
    Ancestor() { Ancestor.counter = Ancestor.counter + 1; }
}
class Child extends Ancestor {
    int tag;
    /** @post | Ancestor.counter == old(Ancestor.counter) + 1 */
    Child(int t) {
        tag = t;
        if (t < 0) { return; }
        tag = t * 2;
    }
}
"#;

fn with_main(prelude: &str, body: &str) -> String {
    format!("{prelude}\nclass Main {{ static int main() {{ {body} }} }}")
}

#[test]
fn old_is_taken_before_the_superclass_constructor() {
    let src = with_main(ANCESTRY, "Child c = new Child(4); Child d = new Child(5); return Ancestor.counter * 100 + c.tag;");
    assert_eq!(run_int(&src), 208);
}

#[test]
fn early_return_still_checks_postcondition() {
    let src = with_main(ANCESTRY, "Child c = new Child(-1); return c.tag;");
    assert_eq!(run_int(&src), -1);

    let broken = src.replace("old(Ancestor.counter) + 1", "old(Ancestor.counter) + 2");
    let v = run_violation(&broken);
    assert_eq!(v.kind, ViolationKind::Postcondition);
    assert_eq!(v.member, "Child.Child");
    assert_eq!(v.detail, "at return");
}

// ── Preconditions and invariants ─────────────────────────────────────────────

const ACCOUNT: &str = r#"
/** @invar | balance >= 0 */
class Account {
    int balance;
    /** @pre | start > -100 */
    Account(int start) { balance = start; }
}
"#;

#[test]
fn constructor_precondition() {
    let src = with_main(ACCOUNT, "Account a = new Account(-500); return a.balance;");
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Precondition);
    assert_eq!(v.member, "Account.Account");
}

#[test]
fn constructed_object_must_establish_invariants() {
    let src = with_main(ACCOUNT, "Account a = new Account(10); return a.balance;");
    assert_eq!(run_int(&src), 10);

    let src = with_main(ACCOUNT, "Account a = new Account(-5); return a.balance;");
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Invariant);
    assert_eq!(v.member, "Account");
    assert_eq!(v.clause, "balance >= 0");
    let site = v.site.expect("call site");
    assert_eq!(&src[site.start..site.end], "new Account(-5)");
}

// ── Construction order ───────────────────────────────────────────────────────

#[test]
fn initializers_run_after_super_in_textual_order() {
    let src = with_main(
        r#"
class Base { int trace; Base() { trace = 1; } }
class Derived extends Base {
    int a = trace * 10;
    { a = a + 2; }
    int b = a + 1;
    Derived() { b = b * 100; }
}
"#,
        "Derived d = new Derived(); return d.b;",
    );
    assert_eq!(run_int(&src), 1300);
}

#[test]
fn explicit_super_call_passes_arguments() {
    let src = with_main(
        r#"
class Point { int x; Point(int x0) { x = x0; } }
class Labeled extends Point {
    int label;
    /** @post | x == 4 && label == 9 */
    Labeled() { super(4); label = 9; }
}
"#,
        "Labeled p = new Labeled(); return p.x + p.label;",
    );
    assert_eq!(run_int(&src), 13);
}
