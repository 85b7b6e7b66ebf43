mod common;
use common::{run_int, run_throws, run_violation, run_with};
use specweave::config::ChecksConfig;
use specweave::contracts::ViolationKind;
use specweave::interp::Outcome;

// ── Results ──────────────────────────────────────────────────────────────────

#[test]
fn postcondition_on_result_holds() {
    let src = r#"
class Main {
    /** @post | result == x * 2 */
    static int twice(int x) { return x + x; }
    static int main() { return twice(21); }
}
"#;
    assert_eq!(run_int(src), 42);
}

#[test]
fn wrong_result_is_a_violation_at_the_return() {
    let src = r#"
class Main {
    /** @post | result >= 0 */
    static int abs(int x) {
        if (x > 0) { return x; }
        return x;
    }
    static int main() { return abs(-3); }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.kind, ViolationKind::Postcondition);
    assert_eq!(v.member, "Main.abs");
    assert_eq!(v.detail, "at return");
    let site = v.site.expect("exit site");
    // The second return is the one taken
    assert_eq!(&src[site.start..site.end], "return x;");
    assert!(site.start > src.find("return x; }").unwrap());
}

#[test]
fn fall_through_exit_is_checked() {
    let src = r#"
class Box {
    int value;
    /** @post | value == v */
    void store(int v) { value = v + 1; }
}
class Main {
    static int main() { Box b = new Box(); b.store(3); return b.value; }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.clause, "value == v");
    assert_eq!(v.detail, "at end of body");
    assert_eq!(v.site, None);
}

// ── finally ──────────────────────────────────────────────────────────────────

const FINALLY: &str = r#"
class Holder {
    int x;
    /** @post | x == 7
      * @post | result == 5 */
    int f() {
        try { x = 5; return x; } finally { x = 7; }
    }
}
class Main {
    static int main() { Holder h = new Holder(); return h.f(); }
}
"#;

#[test]
fn postcondition_sees_state_after_finally() {
    assert_eq!(run_int(FINALLY), 5);
}

#[test]
fn postcondition_on_pre_finally_state_fails() {
    let src = FINALLY.replace("@post | x == 7", "@post | x == 5");
    let v = run_violation(&src);
    assert_eq!(v.clause, "x == 5");
}

// ── Exceptional exits ────────────────────────────────────────────────────────

#[test]
fn postconditions_are_not_checked_when_throwing() {
    let src = r#"
class Main {
    /** @post | result > 100 */
    static int fail() { throw new IllegalStateException(); }
    static int main() { return fail(); }
}
"#;
    assert_eq!(run_throws(src), "IllegalStateException");
}

#[test]
fn disabled_postconditions_are_not_checked() {
    let src = r#"
class Main {
    /** @post | result == 1 */
    static int two() { return 2; }
    static int main() { return two(); }
}
"#;
    let checks = ChecksConfig { postconditions: false, ..ChecksConfig::default() };
    assert!(matches!(run_with(src, &checks), Outcome::Returned(_)));
}
