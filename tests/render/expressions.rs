use super::render;
use altar::{Context, Value};

#[test]
fn arithmetic_precedence() {
    assert_eq!(render("{{ 2 + 3 * 4 }}", Context::new()).unwrap(), "14");
    assert_eq!(render("{{ (2 + 3) * 4 }}", Context::new()).unwrap(), "20");
    assert_eq!(render("{{ 7 // 2 }}", Context::new()).unwrap(), "3");
    assert_eq!(render("{{ 2 ** 3 ** 2 }}", Context::new()).unwrap(), "512");
}

#[test]
fn string_concat_operator() {
    assert_eq!(render("{{ 'a' ~ 1 ~ 'b' }}", Context::new()).unwrap(), "a1b");
}

#[test]
fn comparisons_chain() {
    assert_eq!(render("{{ 1 < 2 < 3 }}", Context::new()).unwrap(), "true");
    assert_eq!(render("{{ 1 < 2 < 1 }}", Context::new()).unwrap(), "false");
}

#[test]
fn in_and_not_in() {
    assert_eq!(render("{{ 2 in [1, 2, 3] }}", Context::new()).unwrap(), "true");
    assert_eq!(render("{{ 4 not in [1, 2, 3] }}", Context::new()).unwrap(), "true");
}

#[test]
fn conditional_expression() {
    assert_eq!(render("{{ 'yes' if 1 == 1 else 'no' }}", Context::new()).unwrap(), "yes");
    assert_eq!(render("{{ 'yes' if 1 == 2 else 'no' }}", Context::new()).unwrap(), "no");
}

#[test]
fn negative_index_and_slice() {
    let mut ctx = Context::new();
    ctx.insert("xs", Value::seq(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]));
    assert_eq!(render("{{ xs[-1] }}", ctx.clone()).unwrap(), "4");
    assert_eq!(render("{{ xs[1:3] }}", ctx).unwrap(), "[2, 3]");
}

#[test]
fn filter_chain_and_test() {
    assert_eq!(render("{{ ' Hi ' | trim | upper }}", Context::new()).unwrap(), "HI");
    assert_eq!(render("{{ 4 is even }}", Context::new()).unwrap(), "true");
    assert_eq!(render("{{ 4 is not odd }}", Context::new()).unwrap(), "true");
}

#[test]
fn undefined_renders_empty_and_is_falsy() {
    assert_eq!(render("[{{ missing }}]", Context::new()).unwrap(), "[]");
    assert_eq!(render("{{ 'y' if missing else 'n' }}", Context::new()).unwrap(), "n");
}

#[test]
fn dict_and_getattr() {
    assert_eq!(render("{{ {'a': 1, 'b': 2}.a }}", Context::new()).unwrap(), "1");
}
