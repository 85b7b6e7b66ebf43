mod common;
use common::{run_int, run_violation, run_with};
use specweave::config::ChecksConfig;
use specweave::contracts::ViolationKind;
use specweave::interp::{Outcome, Value};

const ACCOUNT: &str = r#"
class Account {
    int balance;
    boolean open = true;

    /** @pre | amount > 0
      * @pre | open */
    void deposit(int amount) { balance = balance + amount; }

    void close() { open = false; }

    boolean isOpen() { return open; }

    /** @pre | isOpen() */
    int peek() { return balance; }
}
"#;

fn with_main(body: &str) -> String {
    format!("{ACCOUNT}\nclass Main {{ static int main() {{ {body} }} }}")
}

// ── Satisfied preconditions ──────────────────────────────────────────────────

#[test]
fn satisfied_precondition_runs_body() {
    let src = with_main("Account a = new Account(); a.deposit(5); a.deposit(2); return a.balance;");
    assert_eq!(run_int(&src), 7);
}

#[test]
fn clause_may_call_methods() {
    let src = with_main("Account a = new Account(); a.deposit(3); return a.peek();");
    assert_eq!(run_int(&src), 3);
}

// ── Violations ───────────────────────────────────────────────────────────────

#[test]
fn failing_precondition_is_reported_at_entry() {
    let src = with_main("Account a = new Account(); a.deposit(0); return a.balance;");
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Precondition);
    assert_eq!(v.member, "Account.deposit");
    assert_eq!(v.clause, "amount > 0");
    assert_eq!(v.detail, "at entry");
    assert_eq!(&src[v.span.start..v.span.end], "@pre | amount > 0");
}

#[test]
fn every_clause_must_hold() {
    let src = with_main("Account a = new Account(); a.close(); a.deposit(4); return a.balance;");
    let v = run_violation(&src);
    assert_eq!(v.clause, "open");
}

#[test]
fn method_call_in_clause_is_evaluated() {
    let src = with_main("Account a = new Account(); a.close(); return a.peek();");
    assert_eq!(run_violation(&src).clause, "isOpen()");
}

#[test]
fn body_does_not_run_when_precondition_fails() {
    let src = r#"
class Counter {
    static int calls = 0;
    /** @pre | n >= 0 */
    static void bump(int n) { Counter.calls = Counter.calls + 1; }
}
class Main {
    static int main() { Counter.bump(-1); return Counter.calls; }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.member, "Counter.bump");
}

#[test]
fn parameters_are_read_as_passed() {
    // Reassigning a parameter in the body does not affect the entry check
    let src = r#"
class Main {
    /** @pre | n > 0 */
    static int twice(int n) { n = -n; return n * -2; }
    static int main() { return twice(4); }
}
"#;
    assert_eq!(run_int(src), 8);
}

#[test]
fn violations_escape_catch_blocks() {
    let src = with_main(
        "Account a = new Account(); try { a.deposit(-1); } catch (Throwable t) { return 1; } finally { a.balance = 9; } return 2;",
    );
    assert_eq!(run_violation(&src).kind, ViolationKind::Precondition);
}

// ── Configuration ────────────────────────────────────────────────────────────

#[test]
fn disabled_preconditions_are_not_checked() {
    let src = with_main("Account a = new Account(); a.deposit(-3); return a.balance;");
    let checks = ChecksConfig { preconditions: false, ..ChecksConfig::default() };
    assert_eq!(run_with(&src, &checks), Outcome::Returned(Value::Int(-3)));
}
