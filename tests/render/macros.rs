use super::render;
use altar::Context;

#[test]
fn macro_with_default_argument() {
    let tmpl = "{% macro greet(name, greeting='Hi') %}{{ greeting }}, {{ name }}!{% endmacro %}{{ greet('Ann') }}";
    assert_eq!(render(tmpl, Context::new()).unwrap(), "Hi, Ann!");
}

#[test]
fn macro_call_overrides_default() {
    let tmpl = "{% macro greet(name, greeting='Hi') %}{{ greeting }}, {{ name }}!{% endmacro %}{{ greet('Ann', 'Hey') }}";
    assert_eq!(render(tmpl, Context::new()).unwrap(), "Hey, Ann!");
}

#[test]
fn call_block_exposes_caller() {
    let tmpl = "{% macro wrap() %}<div>{{ caller() }}</div>{% endmacro %}\
                {% call wrap() %}inner{% endcall %}";
    assert_eq!(render(tmpl, Context::new()).unwrap(), "<div>inner</div>");
}

#[test]
fn call_block_passes_params_to_caller() {
    let tmpl = "{% macro dlist(items) %}{% for i in items %}{{ caller(i) }}{% endfor %}{% endmacro %}\
                {% call(item) dlist([1, 2]) %}<{{ item }}>{% endcall %}";
    assert_eq!(render(tmpl, Context::new()).unwrap(), "<1><2>");
}
