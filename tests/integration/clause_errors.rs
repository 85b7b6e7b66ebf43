mod common;
use common::{clause_error_with, clause_errors};

// ── Syntax ───────────────────────────────────────────────────────────────────

#[test]
fn truncated_expression_is_a_syntax_error() {
    let src = "class A { /** @pre | x > */ void f(int x) {} }";
    let errors = clause_errors(src);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Syntax error"), "{errors:?}");
}

#[test]
fn comment_inside_clause_is_a_syntax_error() {
    let (_, plan) = specweave::analyze("class A {\n/**\n * @pre | x > 0\n *   | // trailing\n */\nvoid f(int x) {} }").unwrap();
    assert!(plan.diagnostics.errors[0].error.is_syntax());
}

#[test]
fn error_spans_point_into_the_comment() {
    let src = "class A {\n  /**\n   * @pre | x > 0 &&\n   *   | flag\n   */\n  void f(int x) {}\n}";
    let (_, plan) = specweave::analyze(src).unwrap();
    let span = plan.diagnostics.errors[0].error.span().unwrap();
    assert_eq!(&src[span.start..span.end], "flag");
}

// ── Types and names ──────────────────────────────────────────────────────────

#[test]
fn non_boolean_condition() {
    clause_error_with("class A { /** @post | result + 1 */ int f() { return 1; } }", "@post clause must be boolean, found int");
}

#[test]
fn unknown_name_in_clause() {
    clause_error_with("class A { /** @pre | missing > 0 */ void f() {} }", "unknown name `missing`");
}

#[test]
fn field_access_from_static_member() {
    clause_error_with("class A { int x; /** @pre | x > 0 */ static void f() {} }", "static context");
}

#[test]
fn throws_subject_must_be_an_exception() {
    clause_error_with("class A { /** @throws A | true */ void f() {} }", "`A` is not an exception class");
}

// ── Placement ────────────────────────────────────────────────────────────────

#[test]
fn old_outside_postcondition() {
    clause_error_with("class A { int x; /** @pre | old(x) > 0 */ void f() {} }", "old(...) is only allowed in postconditions");
}

#[test]
fn nested_old() {
    clause_error_with("class A { int x; /** @post | old(old(x)) == x */ void f() {} }", "old(...) cannot be nested");
}

#[test]
fn result_in_void_member() {
    clause_error_with("class A { /** @post | result == 0 */ void f() {} }", "`result` has no value");
}

#[test]
fn result_in_constructor() {
    clause_error_with("class A { /** @post | result == null */ A() {} }", "`result` has no value");
}

#[test]
fn invariant_on_a_method() {
    clause_error_with("class A { int x; /** @invar | x > 0 */ void f() {} }", "invariants are only allowed on classes");
}

#[test]
fn precondition_on_a_field() {
    clause_error_with("class A { /** @pre | true */ int x; }", "@pre clauses are not allowed on fields");
}

#[test]
fn effect_target_must_be_a_path() {
    clause_error_with("class A { int x; /** @mutates | x + 1 */ void f() {} }", "is not a path");
}

#[test]
fn spread_over_a_non_array() {
    clause_error_with("class A { int x; /** @mutates_properties | ...x */ void f() {} }", "cannot spread over int");
}

// ── Isolation ────────────────────────────────────────────────────────────────

#[test]
fn bad_clause_keeps_its_siblings() {
    let src = "class A {\n  int x;\n  /** @pre | x >\n    * @post | x == 0 */\n  void f() { x = 0; }\n}";
    let (env, plan) = specweave::analyze(src).unwrap();
    assert_eq!(plan.diagnostics.errors.len(), 1);
    let f = env.lookup_methods("A", "f")[0].id;
    assert_eq!(plan.specs[&f].postconditions.len(), 1);
}

#[test]
fn invalid_clauses_fail_the_build() {
    let err = specweave::build("class A { /** @pre | 1 */ void f() {} }", &Default::default()).unwrap_err();
    assert!(matches!(err, specweave::BuildError::Contracts(_)));
}
