use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const BINARY_NAME: &str = "altar";

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--bin", BINARY_NAME, "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn run_cli_with_stdin(args: &[&str], stdin_input: &str) -> std::process::Output {
    let mut cmd = Command::new("cargo")
        .args(["run", "--bin", BINARY_NAME, "--"])
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .expect("Failed to spawn command");

    if let Some(stdin) = cmd.stdin.as_mut() {
        stdin
            .write_all(stdin_input.as_bytes())
            .expect("Failed to write to stdin");
    }

    cmd.wait_with_output().expect("Failed to read stdout")
}

fn create_temp_template(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write to temp file");
    file
}

#[test]
fn renders_template_from_stdin() {
    let output = run_cli_with_stdin(&["-"], "{{ 1 + 1 }}");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2");
}

#[test]
fn renders_template_file() {
    let file = create_temp_template("hello {{ name }}");
    let output = run_cli(&[file.path().to_str().unwrap(), "--define", "name=world"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello world");
}

#[test]
fn context_flag_loads_json_file() {
    let mut ctx_file = NamedTempFile::new().unwrap();
    ctx_file.write_all(br#"{"name": "Ada", "count": 3}"#).unwrap();
    let output = run_cli_with_stdin(
        &["-", "--context", ctx_file.path().to_str().unwrap()],
        "{{ name }} x{{ count }}",
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Ada x3");
}

#[test]
fn define_flag_is_repeatable() {
    let output = run_cli_with_stdin(
        &["-", "--define", "a=1", "--define", "b=2"],
        "{{ a }}-{{ b }}",
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1-2");
}

#[test]
fn autoescape_always_escapes_html() {
    let mut ctx_file = NamedTempFile::new().unwrap();
    ctx_file.write_all(br#"{"s": "<b>"}"#).unwrap();
    let output = run_cli_with_stdin(
        &["-", "--context", ctx_file.path().to_str().unwrap(), "--autoescape", "always"],
        "{{ s }}",
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "&lt;b&gt;");
}

#[test]
fn list_filters_prints_tables() {
    let output = run_cli(&["--list-filters", "-"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("filter"));
    assert!(text.contains("test"));
}

#[test]
fn undefined_template_path_is_a_failure() {
    let output = run_cli(&["/no/such/template.alt"]);
    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}

#[test]
fn malformed_expression_reports_an_error() {
    let output = run_cli_with_stdin(&["-"], "{{ 1 + }}");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"));
}
