mod common;
use common::{run_int, run_violation};
use specweave::contracts::ViolationKind;

const PLAYER: &str = r#"
class Player {
    int health = 100;

    int getHealth() { return health; }

    /** @pre | damage >= 0
      * @post | getHealth() == old(getHealth()) - damage */
    void hit(int damage) { health = health - damage; }

    /** @post | getHealth() == old(getHealth()) + amount */
    void heal(int amount) { health = health + amount * 2; }
}
"#;

fn with_main(body: &str) -> String {
    format!("{PLAYER}\nclass Main {{ static int main() {{ {body} }} }}")
}

#[test]
fn old_method_call_is_evaluated_at_entry() {
    let src = with_main("Player p = new Player(); p.hit(30); p.hit(5); return p.getHealth();");
    assert_eq!(run_int(&src), 65);
}

#[test]
fn wrong_update_is_caught_against_entry_value() {
    let src = with_main("Player p = new Player(); p.heal(10); return p.getHealth();");
    let v = run_violation(&src);
    assert_eq!(v.kind, ViolationKind::Postcondition);
    assert_eq!(v.member, "Player.heal");
    assert_eq!(v.clause, "getHealth() == old(getHealth()) + amount");
}

#[test]
fn old_of_compound_expression() {
    let src = r#"
class Pair {
    int a; int b;
    /** @post | a + b == old(a + b)
      * @post | a == old(b) && b == old(a) */
    void swap() { int t = a; a = b; b = t; }
}
class Main {
    static int main() {
        Pair p = new Pair(); p.a = 1; p.b = 2;
        p.swap();
        return p.a * 10 + p.b;
    }
}
"#;
    assert_eq!(run_int(src), 21);
}

#[test]
fn old_through_a_parameter() {
    let src = r#"
class Cell { int value; }
class Main {
    /** @post | c.value == old(c.value) + 1 */
    static void inc(Cell c) { c.value = c.value + 2; }
    static int main() { Cell c = new Cell(); inc(c); return c.value; }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.member, "Main.inc");
}

#[test]
fn old_of_static_field() {
    let src = r#"
class Registry {
    static int size = 3;
    /** @post | Registry.size == old(Registry.size) + 1 */
    static void add() { Registry.size = Registry.size + 1; }
}
class Main {
    static int main() { Registry.add(); Registry.add(); return Registry.size; }
}
"#;
    assert_eq!(run_int(src), 5);
}

#[test]
fn old_is_taken_after_the_precondition_holds() {
    // A failing precondition reports before any entry value is evaluated
    let src = r#"
class Main {
    static int[] data = new int[2];
    /** @pre | i >= 0 && i < 2
      * @post | Main.data[i] == old(Main.data[i]) + 1 */
    static void bump(int i) { Main.data[i] = Main.data[i] + 1; }
    static int main() { bump(1); bump(5); return 0; }
}
"#;
    let v = run_violation(src);
    assert_eq!(v.kind, ViolationKind::Precondition);
}
