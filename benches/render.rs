use altar::{Context, Engine, Value};
use criterion::{Criterion, criterion_group, criterion_main};
use once_cell::sync::Lazy;
use std::hint::black_box;

const SMALL_TEMPLATE: &str = "Hello, {{ name }}! You have {{ count }} messages.";
const MEDIUM_TEMPLATE: &str = "\
{% for item in items -%}
{{ loop.index }}. {{ item.name | capitalize }}: {{ item.price | round(2) }}
{% endfor -%}
Total: {{ items | map(attribute='price') | sum }}";
static LARGE_TEMPLATE: Lazy<String> = Lazy::new(|| {
    let mut s = String::from("{% for item in items %}");
    for _ in 0..200 {
        s.push_str("{{ item.name | upper }}-{{ item.price }};");
    }
    s.push_str("{% endfor %}");
    s
});

fn item(name: &str, price: f64) -> Value {
    let mut m = indexmap::IndexMap::new();
    m.insert("name".to_string(), Value::str(name));
    m.insert("price".to_string(), Value::Float(price));
    Value::map(m)
}

fn sample_context() -> Context {
    let mut ctx = Context::new();
    ctx.insert("name", Value::str("Ada"));
    ctx.insert("count", Value::Int(3));
    ctx.insert(
        "items",
        Value::seq(vec![
            item("apples", 1.5),
            item("bread", 2.25),
            item("cheese", 5.0),
        ]),
    );
    ctx
}

fn bench_parsing(c: &mut Criterion) {
    let cases = [
        ("small", SMALL_TEMPLATE),
        ("medium", MEDIUM_TEMPLATE),
        ("large", LARGE_TEMPLATE.as_str()),
    ];
    let mut group = c.benchmark_group("template_parsing");
    for (name, tpl) in cases {
        let engine = Engine::new().set_cache_enabled(false);
        let ctx = Context::new();
        group.bench_function(name, |b| {
            b.iter(|| engine.render(black_box(tpl), black_box(&ctx)))
        });
    }
    group.finish();
}

fn bench_rendering(c: &mut Criterion) {
    let ctx = sample_context();
    let cases = [
        ("small", SMALL_TEMPLATE),
        ("medium", MEDIUM_TEMPLATE),
        ("large", LARGE_TEMPLATE.as_str()),
    ];
    let mut group = c.benchmark_group("template_rendering");
    for (name, tpl) in cases {
        let engine = Engine::new();
        // warm the compiled-template cache before measuring.
        engine.render(tpl, &ctx).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| engine.render(black_box(tpl), black_box(&ctx)))
        });
    }
    group.finish();
}

fn bench_cache_effect(c: &mut Criterion) {
    let ctx = sample_context();
    let mut group = c.benchmark_group("cache_effect");

    group.bench_function("cache_disabled", |b| {
        let engine = Engine::new().set_cache_enabled(false);
        b.iter(|| engine.render(black_box(MEDIUM_TEMPLATE), black_box(&ctx)))
    });

    group.bench_function("cache_enabled", |b| {
        let engine = Engine::new();
        engine.render(MEDIUM_TEMPLATE, &ctx).unwrap();
        b.iter(|| engine.render(black_box(MEDIUM_TEMPLATE), black_box(&ctx)))
    });

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_rendering, bench_cache_effect);
criterion_main!(benches);
