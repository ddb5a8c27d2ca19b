use super::render_empty;
use altar::Error;

#[test]
fn render_error_reports_statement_line_and_column() {
    let err = render_empty("line one\nline two {% for x in 5 %}{{ x }}{% endfor %}").unwrap_err();
    match err {
        Error::Render(e) => {
            assert_eq!(e.position.line, 2);
            assert!(e.position.column > 0);
        }
        other => panic!("expected a render error, got {other:?}"),
    }
}

#[test]
fn render_error_position_tracks_nested_block() {
    let err = render_empty("a\nb\n{% if true %}\n{% for x in 1 %}{{ x }}{% endfor %}\n{% endif %}")
        .unwrap_err();
    match err {
        Error::Render(e) => assert_eq!(e.position.line, 4),
        other => panic!("expected a render error, got {other:?}"),
    }
}
