mod common;
use common::{run_int, run_throws, run_violation, run_with};
use specweave::config::ChecksConfig;
use specweave::contracts::ViolationKind;
use specweave::interp::{Outcome, Value};

fn account(deposit_body: &str) -> String {
    format!(
        r#"
class Account {{
    int balance;
    /**
     * Adds to the balance.
     * @throws IllegalArgumentException if the amount is negative
     *    | amount < 0
     * @post | balance == old(balance) + amount
     */
    void deposit(int amount) {{ {deposit_body} }}
}}
"#
    )
}

fn with_main(prelude: &str, body: &str) -> String {
    format!("{prelude}\nclass Main {{ static int main() {{ {body} }} }}")
}

const CORRECT: &str = "if (amount < 0) { throw new IllegalArgumentException(); } balance = balance + amount;";

#[test]
fn required_exception_is_thrown() {
    let src = with_main(
        &account(CORRECT),
        "Account a = new Account(); try { a.deposit(-1); } catch (IllegalArgumentException e) { return 1; } return 0;",
    );
    assert_eq!(run_int(&src), 1);
}

#[test]
fn normal_completion_when_exception_required() {
    let src = with_main(&account("balance = balance + amount;"), "Account a = new Account(); a.deposit(-1); return 0;");
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::ExceptionalPostcondition);
    assert_eq!(v.member, "Account.deposit");
    assert_eq!(v.clause, "amount < 0");
    assert!(v.detail.contains("completed normally"), "{}", v.detail);
}

#[test]
fn wrong_exception_type() {
    let src = with_main(
        &account("if (amount < 0) { throw new IllegalStateException(); }"),
        "Account a = new Account(); a.deposit(-1); return 0;",
    );
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::ExceptionalPostcondition);
    assert!(v.detail.contains("threw IllegalStateException"), "{}", v.detail);
}

#[test]
fn named_exception_without_its_condition() {
    let src = with_main(
        &account("if (amount == 0) { throw new IllegalArgumentException(); } balance = balance + amount;"),
        "Account a = new Account(); a.deposit(0); return 0;",
    );
    let v = run_violation(&src);
    assert!(v.detail.contains("no condition for it held"), "{}", v.detail);
}

#[test]
fn unrelated_exceptions_pass_through() {
    let src = with_main(
        &account("int z = 0; balance = amount / z;"),
        "Account a = new Account(); a.deposit(3); return 0;",
    );
    assert_eq!(run_throws(&src), "ArithmeticException");
}

#[test]
fn condition_is_judged_at_entry() {
    let src = r#"
class Wallet {
    int balance = 3;
    /** @throws IllegalStateException | balance < amount */
    void withdraw(int amount) {
        if (balance < amount) { balance = 100; throw new IllegalStateException(); }
        balance = balance - amount;
    }
}
class Main {
    static int main() {
        Wallet w = new Wallet();
        try { w.withdraw(5); } catch (IllegalStateException e) { return w.balance; }
        return 0;
    }
}
"#;
    assert_eq!(run_int(src), 100);
}

#[test]
fn may_throw_licenses_a_named_exception() {
    let src = r#"
class Main {
    /** @throws ArithmeticException | d < 0
      * @may_throw ArithmeticException | true */
    static int div(int n, int d) {
        if (d < 0) { throw new ArithmeticException(); }
        return n / d;
    }
    static int main() { return div(4, 0); }
}
"#;
    assert_eq!(run_throws(src), "ArithmeticException");

    let unlicensed = src.replace("      * @may_throw ArithmeticException | true */", "*/");
    let v = run_violation(&unlicensed);
    assert_eq!(v.kind, ViolationKind::ExceptionalPostcondition);
}

#[test]
fn subclass_of_named_exception_satisfies_clause() {
    let src = r#"
class Main {
    /** @throws RuntimeException | x < 0 */
    static int check(int x) {
        if (x < 0) { throw new IllegalArgumentException(); }
        return x;
    }
    static int main() {
        try { check(-2); } catch (RuntimeException e) { return 7; }
        return 0;
    }
}
"#;
    assert_eq!(run_int(src), 7);
}

#[test]
fn disabled_exceptional_checks() {
    let src = with_main(&account("balance = balance + amount;"), "Account a = new Account(); a.deposit(-1); return 0;");
    let checks = ChecksConfig { exceptional: false, ..ChecksConfig::default() };
    assert_eq!(run_with(&src, &checks), Outcome::Returned(Value::Int(0)));
}

// ── Entry values that throw ──────────────────────────────────────────────────

const NULLABLE_BOX: &str = r#"
class Box { int v; }
class Main {
    /** @throws NullPointerException | b == null
      * @post | old(b.v) == b.v */
    static int read(Box b) { return b.v; }
"#;

#[test]
fn sanctioned_exception_from_a_throwing_old_term() {
    let src = format!("{NULLABLE_BOX}    static int main() {{ return read(null); }}\n}}");
    assert_eq!(run_throws(&src), "NullPointerException");

    let src = format!("{NULLABLE_BOX}    static int main() {{ Box b = new Box(); b.v = 6; return read(b); }}\n}}");
    assert_eq!(run_int(&src), 6);
}

#[test]
fn throwing_old_term_is_not_suppressed() {
    let src = r#"
class Box { int v; }
class Main {
    /** @post | old(b.v) <= b.v */
    static int read(Box b) { return 1; }
    static int main() {
        int r = 0;
        try { r = read(null); } catch (NullPointerException e) { r = 9; }
        return r;
    }
}
"#;
    assert_eq!(run_int(src), 9);
}

// ── Invariants after a throwing call ─────────────────────────────────────────

#[test]
fn invariant_rechecked_when_mutator_throws() {
    let src = r#"
/** @invar | balance >= 0 */
class Account {
    int balance;
    /** @mutates | this.balance */
    void withdraw(int n) { balance = balance - n; throw new IllegalStateException(); }
}
class Main {
    static int main() {
        Account a = new Account();
        try { a.withdraw(5); } catch (IllegalStateException e) { return a.balance; }
        return 0;
    }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.kind, ViolationKind::Invariant);
    assert_eq!(v.member, "Account");
    let site = v.site.expect("call site");
    assert_eq!(&src[site.start..site.end], "a.withdraw(5)");

    let harmless = src.replace("balance = balance - n; ", "");
    assert_eq!(run_int(&harmless), 0);
}
