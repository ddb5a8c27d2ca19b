use super::engine_with;
use altar::Context;

#[test]
fn child_block_overrides_parent() {
    let engine = engine_with(&[
        ("base.txt", "A{% block body %}base{% endblock %}Z"),
        ("child.txt", "{% extends 'base.txt' %}{% block body %}child{% endblock %}"),
    ]);
    assert_eq!(engine.render_path("child.txt", &Context::new()).unwrap(), "AchildZ");
}

#[test]
fn super_renders_the_parent_blocks_content() {
    let engine = engine_with(&[
        ("base.txt", "{% block body %}B{% endblock %}"),
        ("child.txt", "{% extends 'base.txt' %}{% block body %}{{ super() }}-C{% endblock %}"),
    ]);
    assert_eq!(engine.render_path("child.txt", &Context::new()).unwrap(), "B-C");
}

#[test]
fn three_level_inheritance_chains_super() {
    let engine = engine_with(&[
        ("grandparent.txt", "{% block body %}G{% endblock %}"),
        ("parent.txt", "{% extends 'grandparent.txt' %}{% block body %}{{ super() }}P{% endblock %}"),
        ("child.txt", "{% extends 'parent.txt' %}{% block body %}{{ super() }}C{% endblock %}"),
    ]);
    assert_eq!(engine.render_path("child.txt", &Context::new()).unwrap(), "GPC");
}

#[test]
fn parent_non_block_content_still_renders() {
    let engine = engine_with(&[
        ("base.txt", "<{% block body %}x{% endblock %}>"),
        ("child.txt", "{% extends 'base.txt' %}{% block body %}y{% endblock %}"),
    ]);
    assert_eq!(engine.render_path("child.txt", &Context::new()).unwrap(), "<y>");
}

#[test]
fn include_missing_with_ignore_missing_is_silent() {
    let engine = engine_with(&[("main.txt", "before{% include 'missing.txt' ignore missing %}after")]);
    assert_eq!(engine.render_path("main.txt", &Context::new()).unwrap(), "beforeafter");
}

#[test]
fn include_array_falls_back_to_first_found() {
    let engine = engine_with(&[
        ("main.txt", "{% include ['missing.txt', 'fallback.txt'] %}"),
        ("fallback.txt", "fallback-content"),
    ]);
    assert_eq!(engine.render_path("main.txt", &Context::new()).unwrap(), "fallback-content");
}

#[test]
fn include_missing_without_ignore_missing_errors() {
    let engine = engine_with(&[("main.txt", "{% include 'missing.txt' %}")]);
    assert!(engine.render_path("main.txt", &Context::new()).is_err());
}
