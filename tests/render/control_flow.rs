use super::render;
use altar::{Context, Value};

#[test]
fn if_elif_else() {
    let tmpl = "{% if x == 1 %}one{% elif x == 2 %}two{% else %}other{% endif %}";
    let mut ctx = Context::new();
    ctx.insert("x", Value::Int(2));
    assert_eq!(render(tmpl, ctx).unwrap(), "two");
}

#[test]
fn for_loop_basics() {
    let mut ctx = Context::new();
    ctx.insert(
        "items",
        Value::seq(vec![Value::str("a"), Value::str("b"), Value::str("c")]),
    );
    let tmpl = "{% for item in items %}{{ loop.index }}.{{ item }}{% if not loop.last %},{% endif %}{% endfor %}";
    assert_eq!(render(tmpl, ctx).unwrap(), "1.a,2.b,3.c");
}

#[test]
fn for_loop_else_on_empty_sequence() {
    let mut ctx = Context::new();
    ctx.insert("items", Value::seq(vec![]));
    let tmpl = "{% for item in items %}{{ item }}{% else %}empty{% endfor %}";
    assert_eq!(render(tmpl, ctx).unwrap(), "empty");
}

#[test]
fn for_loop_with_inline_filter() {
    let mut ctx = Context::new();
    ctx.insert(
        "items",
        Value::seq(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]),
    );
    let tmpl = "{% for n in items if n is even %}{{ n }}{% endfor %}";
    assert_eq!(render(tmpl, ctx).unwrap(), "24");
}

#[test]
fn set_statement_binds_a_variable() {
    assert_eq!(render("{% set x = 1 + 1 %}{{ x }}", Context::new()).unwrap(), "2");
}

#[test]
fn set_block_form_captures_rendered_body() {
    assert_eq!(
        render("{% set greeting %}hi {{ 1 + 1 }}{% endset %}{{ greeting }}", Context::new()).unwrap(),
        "hi 2"
    );
}
