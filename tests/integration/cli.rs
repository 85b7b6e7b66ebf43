mod common;
use common::specweave;

const PROGRAM: &str = r#"
class Account {
    int balance;
    /** @pre | amount > 0
      * @post | balance == old(balance) + amount */
    void deposit(int amount) { balance = balance + amount; }
}
class Main {
    static int main() { Account a = new Account(); a.deposit(4); return a.balance; }
    static int bad() { Account a = new Account(); a.deposit(-4); return a.balance; }
    static int boom() { int z = 0; return 1 / z; }
}
"#;

fn write_program(dir: &tempfile::TempDir, source: &str) -> std::path::PathBuf {
    let path = dir.path().join("main.java");
    std::fs::write(&path, source).unwrap();
    path
}

#[test]
fn run_prints_returned_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, PROGRAM);
    let output = specweave().arg("run").arg(&path).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Main.main returned 4");
}

#[test]
fn violation_exits_with_dedicated_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, PROGRAM);
    let output = specweave().args(["run", "--entry", "Main.bad"]).arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("precondition violated in Account.deposit"), "{stderr}");
}

#[test]
fn uncaught_exception_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, PROGRAM);
    let output = specweave().args(["run", "--entry", "Main.boom"]).arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("uncaught ArithmeticException"));
}

#[test]
fn config_next_to_source_disables_checks() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, PROGRAM);
    std::fs::write(dir.path().join("specweave.toml"), "[checks]\npreconditions = false\npostconditions = false\n")
        .unwrap();
    let output = specweave().args(["run", "--entry", "Main.bad"]).arg(&path).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Main.bad returned -4");
}

#[test]
fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, PROGRAM);
    let config = dir.path().join("custom.toml");
    std::fs::write(&config, "[checks\n").unwrap();
    let output = specweave().arg("--config").arg(&config).arg("run").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid syntax"));
}

#[test]
fn check_reports_clause_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "class A { /** @pre | old(1) > 0 */ void f() {} }");
    let output = specweave().arg("check").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("only allowed in postconditions"));
}

#[test]
fn check_accepts_valid_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, PROGRAM);
    let output = specweave().arg("check").arg(&path).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("1 specified member(s)"));
}

#[test]
fn specs_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, PROGRAM);
    let output = specweave().arg("specs").arg(&path).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let member = &json["members"][0];
    assert_eq!(member["member"], "Account.deposit");
    assert_eq!(member["preconditions"][0][0], "amount > 0");
    assert_eq!(member["snapshot"][0], "$old0 = this.balance");
}

#[test]
fn missing_file_is_an_io_error() {
    let output = specweave().args(["check", "/nonexistent/main.java"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error[io]"));
}
