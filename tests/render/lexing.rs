use super::render_empty;

#[test]
fn plain_text_passes_through() {
    assert_eq!(render_empty("hello world").unwrap(), "hello world");
}

#[test]
fn comment_is_dropped() {
    assert_eq!(render_empty("a{# a comment #}b").unwrap(), "ab");
}

#[test]
fn raw_block_is_emitted_verbatim() {
    assert_eq!(render_empty("{% raw %}X{{ y }}Z{% endraw %}").unwrap(), "X{{ y }}Z");
}

#[test]
fn trim_left_strips_preceding_whitespace_and_one_newline() {
    assert_eq!(render_empty("a \n  {%- if true %}b{% endif %}").unwrap(), "ab");
}

#[test]
fn trim_right_strips_following_whitespace_and_one_newline() {
    assert_eq!(render_empty("{% if true -%}\n  b{% endif %}").unwrap(), "b");
}

#[test]
fn comment_trim_right_strips_following_newline() {
    assert_eq!(render_empty("{# c -#}\nb").unwrap(), "b");
}

#[test]
fn unterminated_variable_tag_is_a_lex_error() {
    assert!(render_empty("{{ x").is_err());
}

#[test]
fn trim_markers_apply_around_raw_blocks() {
    assert_eq!(
        render_empty("a \n  {%- raw -%}\n  X{{ y }}Z\n{%- endraw -%}\n  b").unwrap(),
        "aX{{ y }}Zb"
    );
}
