use super::render;
use altar::{Context, Value};

#[test]
fn string_filters() {
    assert_eq!(render("{{ 'hello' | capitalize }}", Context::new()).unwrap(), "Hello");
    assert_eq!(render("{{ 'hello world' | title }}", Context::new()).unwrap(), "Hello World");
    assert_eq!(render("{{ 'a very long sentence indeed' | truncate(10) }}", Context::new()).unwrap(), "a very...");
    assert_eq!(render("{{ '<b>hi</b>' | striptags }}", Context::new()).unwrap(), "hi");
    assert_eq!(render("{{ 'ab' | ljust(5) }}[end]", Context::new()).unwrap(), "ab   [end]");
}

#[test]
fn escape_and_safe() {
    assert_eq!(render("{{ '<b>' | escape }}", Context::new()).unwrap(), "&lt;b&gt;");
    assert_eq!(render("{{ ('<b>' | escape) | safe }}", Context::new()).unwrap(), "&lt;b&gt;");
}

#[test]
fn sequence_filters() {
    let mut ctx = Context::new();
    ctx.insert(
        "xs",
        Value::seq(vec![Value::Int(3), Value::Int(1), Value::Int(2)]),
    );
    assert_eq!(render("{{ xs | sort | join(',') }}", ctx.clone()).unwrap(), "1,2,3");
    assert_eq!(render("{{ xs | length }}", ctx.clone()).unwrap(), "3");
    assert_eq!(render("{{ xs | sum }}", ctx.clone()).unwrap(), "6");
    assert_eq!(render("{{ xs | max }}", ctx.clone()).unwrap(), "3");
    assert_eq!(render("{{ xs | min }}", ctx).unwrap(), "1");
}

#[test]
fn select_and_map() {
    let mut ctx = Context::new();
    ctx.insert(
        "xs",
        Value::seq(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]),
    );
    assert_eq!(render("{{ (xs | select('even')) | join(',') }}", ctx.clone()).unwrap(), "2,4");
    assert_eq!(render("{{ (xs | reject('even')) | join(',') }}", ctx.clone()).unwrap(), "1,3");
    assert_eq!(render("{{ (xs | map('string')) | join(',') }}", ctx).unwrap(), "1,2,3,4");
}

#[test]
fn selectattr_and_rejectattr() {
    let mut ctx = Context::new();
    let mut a = indexmap::IndexMap::new();
    a.insert("active".to_string(), Value::Bool(true));
    a.insert("name".to_string(), Value::str("a"));
    let mut b = indexmap::IndexMap::new();
    b.insert("active".to_string(), Value::Bool(false));
    b.insert("name".to_string(), Value::str("b"));
    ctx.insert("users", Value::seq(vec![Value::map(a), Value::map(b)]));
    assert_eq!(
        render("{% for u in users | selectattr('active') %}{{ u.name }}{% endfor %}", ctx).unwrap(),
        "a"
    );
}

#[test]
fn default_filter() {
    assert_eq!(render("{{ missing | default('x') }}", Context::new()).unwrap(), "x");
    assert_eq!(render("{{ '' | default('x', true) }}", Context::new()).unwrap(), "x");
}

#[test]
fn number_filters() {
    assert_eq!(render("{{ -3 | abs }}", Context::new()).unwrap(), "3");
    assert_eq!(render("{{ 3.14159 | round(2) }}", Context::new()).unwrap(), "3.14");
    assert_eq!(render("{{ '42' | int }}", Context::new()).unwrap(), "42");
}

#[test]
fn mapping_filters() {
    let mut m = indexmap::IndexMap::new();
    m.insert("b".to_string(), Value::Int(2));
    m.insert("a".to_string(), Value::Int(1));
    let mut ctx = Context::new();
    ctx.insert("m", Value::map(m));
    assert_eq!(
        render("{% for pair in m | dictsort %}{{ pair[0] }}={{ pair[1] }};{% endfor %}", ctx).unwrap(),
        "a=1;b=2;"
    );
}

#[test]
fn groupby_groups_by_attribute_sorted_by_grouper() {
    let mut ctx = Context::new();
    let mut fruit = indexmap::IndexMap::new();
    fruit.insert("kind".to_string(), Value::str("fruit"));
    fruit.insert("name".to_string(), Value::str("apple"));
    let mut veg = indexmap::IndexMap::new();
    veg.insert("kind".to_string(), Value::str("veg"));
    veg.insert("name".to_string(), Value::str("carrot"));
    let mut fruit2 = indexmap::IndexMap::new();
    fruit2.insert("kind".to_string(), Value::str("fruit"));
    fruit2.insert("name".to_string(), Value::str("banana"));
    ctx.insert(
        "items",
        Value::seq(vec![Value::map(fruit), Value::map(veg), Value::map(fruit2)]),
    );
    assert_eq!(
        render(
            "{% for grouper, group in items | groupby('kind') %}{{ grouper }}:{% for i in group %}{{ i.name }},{% endfor %};{% endfor %}",
            ctx
        )
        .unwrap(),
        "fruit:apple,banana,;veg:carrot,;"
    );
}

#[test]
fn dictsort_case_sensitive_kwarg_toggles_ordering() {
    let mut m = indexmap::IndexMap::new();
    m.insert("B".to_string(), Value::Int(2));
    m.insert("a".to_string(), Value::Int(1));
    let mut ctx = Context::new();
    ctx.insert("m", Value::map(m));
    assert_eq!(
        render(
            "{% for pair in m | dictsort %}{{ pair[0] }};{% endfor %}",
            ctx.clone()
        )
        .unwrap(),
        "a;B;"
    );
    assert_eq!(
        render(
            "{% for pair in m | dictsort(case_sensitive=true) %}{{ pair[0] }};{% endfor %}",
            ctx
        )
        .unwrap(),
        "B;a;"
    );
}

#[test]
fn dictsort_by_value() {
    let mut m = indexmap::IndexMap::new();
    m.insert("a".to_string(), Value::Int(2));
    m.insert("b".to_string(), Value::Int(1));
    let mut ctx = Context::new();
    ctx.insert("m", Value::map(m));
    assert_eq!(
        render("{% for pair in m | dictsort(by='value') %}{{ pair[0] }};{% endfor %}", ctx).unwrap(),
        "b;a;"
    );
}

#[test]
fn random_returns_one_of_the_items() {
    let mut ctx = Context::new();
    ctx.insert(
        "xs",
        Value::seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );
    let result = render("{{ xs | random }}", ctx).unwrap();
    assert!(["1", "2", "3"].contains(&result.as_str()));
}

#[test]
fn is_tests() {
    assert_eq!(render("{{ 4 is integer }}", Context::new()).unwrap(), "true");
    assert_eq!(render("{{ 'x' is string }}", Context::new()).unwrap(), "true");
    assert_eq!(render("{{ [] is sequence }}", Context::new()).unwrap(), "true");
    assert_eq!(render("{{ missing is undefined }}", Context::new()).unwrap(), "true");
}
