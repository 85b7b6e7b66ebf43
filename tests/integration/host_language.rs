mod common;
use common::{compile_should_fail_with, run_int, run_throws};

// ── Execution ────────────────────────────────────────────────────────────────

#[test]
fn loops_and_arrays() {
    let src = r#"
class Main {
    static int main() {
        int[] squares = new int[5];
        int i = 0;
        while (i < squares.length) { squares[i] = i * i; i = i + 1; }
        int sum = 0;
        i = 0;
        while (i < 5) { sum = sum + squares[i]; i = i + 1; }
        return sum;
    }
}
"#;
    assert_eq!(run_int(src), 30);
}

#[test]
fn recursion_and_overloads() {
    let src = r#"
class Main {
    static int fact(int n) { if (n <= 1) { return 1; } return n * fact(n - 1); }
    static int pick(int a) { return 1; }
    static int pick(boolean b) { return 2; }
    static int main() { return fact(5) + pick(true) * 1000 + pick(3) * 10000; }
}
"#;
    assert_eq!(run_int(src), 12120);
}

#[test]
fn null_dereference_throws() {
    let src = "class Node { int v; } class Main { static int main() { Node n = null; return n.v; } }";
    assert_eq!(run_throws(src), "NullPointerException");
}

#[test]
fn user_exceptions_extend_builtins() {
    let src = r#"
class InsufficientFunds extends RuntimeException {}
class Main {
    static void spend() { throw new InsufficientFunds(); }
    static int main() {
        try { spend(); } catch (IllegalStateException e) { return 1; } catch (RuntimeException e) { return 2; }
        return 3;
    }
}
"#;
    assert_eq!(run_int(src), 2);
}

#[test]
fn finally_return_overrides_exception() {
    let src = r#"
class Main {
    static int f() { try { throw new IllegalStateException(); } finally { return 4; } }
    static int main() { return f(); }
}
"#;
    assert_eq!(run_int(src), 4);
}

// ── Static errors ────────────────────────────────────────────────────────────

#[test]
fn missing_return_is_rejected() {
    compile_should_fail_with("class A { int f(boolean b) { if (b) { return 1; } } }", "missing return");
}

#[test]
fn this_in_static_context_is_rejected() {
    compile_should_fail_with("class A { int x; static int f() { return x; } }", "static context");
}

#[test]
fn inheritance_cycles_are_rejected() {
    compile_should_fail_with("class A extends B {} class B extends A {}", "inheritance cycle");
}

#[test]
fn syntax_errors_are_reported() {
    let err = specweave::analyze("class A { int f( { } }").unwrap_err();
    assert!(err.is_syntax());
}
