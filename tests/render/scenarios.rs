use super::{engine_with, render};
use altar::{AutoEscape, Context, Engine, Value};

#[test]
fn scenario_1_loop_basics() {
    let mut ctx = Context::new();
    ctx.insert(
        "items",
        Value::seq(vec![Value::str("a"), Value::str("b"), Value::str("c")]),
    );
    let tmpl = "{% for i in items -%}{{ loop.index }}.{{ i }}{% if not loop.last %},{% endif %}{%- endfor %}";
    assert_eq!(render(tmpl, ctx).unwrap(), "1.a,2.b,3.c");
}

#[test]
fn scenario_2_raw_block() {
    let tmpl = "X{% raw %}{{ y }}{% endraw %}Z";
    assert_eq!(render(tmpl, Context::new()).unwrap(), "X{{ y }}Z");
}

#[test]
fn scenario_3_inheritance_with_super() {
    let engine = engine_with(&[
        ("base.alt", "{% block c %}B{% endblock %}"),
        ("child.alt", "{% extends 'base.alt' %}{% block c %}{{ super() }}-C{% endblock %}"),
    ]);
    assert_eq!(engine.render_path("child.alt", &Context::new()).unwrap(), "B-C");
}

#[test]
fn scenario_4_call_block() {
    let tmpl = "{% macro dlg(title) %}<div><h2>{{ title }}</h2><div>{{ caller() }}</div></div>{% endmacro %}\
                {% call dlg('T') %}inner{% endcall %}";
    assert_eq!(render(tmpl, Context::new()).unwrap(), "<div><h2>T</h2><div>inner</div></div>");
}

#[test]
fn scenario_5_array_include_fallback() {
    let engine = engine_with(&[
        ("main.alt", "{% include ['missing.alt', 'present.alt'] %}"),
        ("present.alt", "present-content"),
    ]);
    assert_eq!(engine.render_path("main.alt", &Context::new()).unwrap(), "present-content");
}

#[test]
fn scenario_5_array_include_fallback_all_missing_with_ignore() {
    let engine = engine_with(&[("main.alt", "{% include ['missing.alt', 'also_missing.alt'] ignore missing %}")]);
    assert_eq!(engine.render_path("main.alt", &Context::new()).unwrap(), "");
}

#[test]
fn scenario_6_auto_escape_and_safe() {
    let engine = Engine::new().set_auto_escape(AutoEscape::Always);
    let mut ctx = Context::new();
    ctx.insert("s", Value::str("<b>"));
    assert_eq!(engine.render("{{ s }}", &ctx).unwrap(), "&lt;b&gt;");
    assert_eq!(engine.render("{{ s | safe }}", &ctx).unwrap(), "<b>");
}

#[test]
fn invariant_delimiter_round_trip() {
    let plain = "just plain text, no delimiters here.\nsecond line.";
    assert_eq!(render(plain, Context::new()).unwrap(), plain);
}

#[test]
fn invariant_filter_chaining_matches_composition() {
    let chained = render("{{ 'HELLO' | lower | capitalize }}", Context::new()).unwrap();
    let composed = render("{{ ('HELLO' | lower) | capitalize }}", Context::new()).unwrap();
    assert_eq!(chained, composed);
    assert_eq!(chained, "Hello");
}

#[test]
fn invariant_undefined_swallow() {
    assert_eq!(render("{{ nope }}", Context::new()).unwrap(), "");
    assert_eq!(render("{{ nope | default('x') }}", Context::new()).unwrap(), "x");
}
