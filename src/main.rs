//! `altar`: render a template from the command line.
//!
//! The derive `Cli` struct and the overall shape (positional input, stdin
//! fallback, repeatable ad-hoc flags) follow the teacher's own `Cli` struct
//! in its `main.rs`; the `--info` style table output uses `comfy-table` the
//! way the teacher's dependency list hints at but never calls.

use altar::{AltarResult, AutoEscape, Context, Engine, Error, FsLoader, Value};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use crossterm::style::Stylize;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "altar", version, about = "Render a Jinja-compatible template.")]
struct Cli {
    /// Template path, or `-` to read from stdin.
    template: String,

    /// JSON file to load as the render context.
    #[arg(long, value_name = "FILE")]
    context: Option<PathBuf>,

    /// Additional scalar context entries as KEY=VALUE; repeatable.
    #[arg(long = "define", value_name = "KEY=VALUE")]
    defines: Vec<String>,

    /// Print a trace of block/filter/include resolution to stderr.
    #[arg(long)]
    trace: bool,

    /// Skip the compiled-template cache (always reparse).
    #[arg(long = "no-cache")]
    no_cache: bool,

    /// Auto-escape policy: `auto` (by file extension), `always`, `never`.
    #[arg(long, default_value = "auto")]
    autoescape: String,

    /// List the built-in filters and tests, then exit.
    #[arg(long = "list-filters")]
    list_filters: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_filters {
        print_filter_table();
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(rendered) => {
            print!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> AltarResult<String> {
    let auto_escape = match cli.autoescape.as_str() {
        "always" => AutoEscape::Always,
        "never" => AutoEscape::Never,
        _ => AutoEscape::default(),
    };

    let mut context = match &cli.context {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| Error::render(format!("failed to read context file: {e}"), Default::default()))?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| Error::render(format!("invalid JSON context: {e}"), Default::default()))?;
            Context::from_json(json)?
        }
        None => Context::new(),
    };

    for define in &cli.defines {
        let (key, value) = define.split_once('=').ok_or_else(|| {
            Error::render(format!("invalid --define '{define}', expected KEY=VALUE"), Default::default())
        })?;
        context.insert(key, Value::str(value));
    }

    let engine = Engine::new()
        .set_auto_escape(auto_escape)
        .set_cache_enabled(!cli.no_cache)
        .set_trace_enabled(cli.trace);

    if cli.template == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .map_err(|e| Error::render(format!("failed to read stdin: {e}"), Default::default()))?;
        engine.render(&source, &context)
    } else {
        let path = PathBuf::from(&cli.template);
        if let Some(dir) = path.parent() {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let engine = engine.set_loader(FsLoader::new(dir));
            engine.render_path(&name, &context)
        } else {
            engine.render_file(&path, &context)
        }
    }
}

fn print_error(e: &Error) {
    let message = e.to_string();
    if std::io::stderr().is_terminal() {
        eprintln!("{} {message}", "error:".red().bold());
    } else {
        eprintln!("error: {message}");
    }
}

fn print_filter_table() {
    let engine = Engine::new();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["filter"]);
    let mut names: Vec<&String> = engine.filters().keys().collect();
    names.sort();
    for name in names {
        table.add_row(vec![name.as_str()]);
    }
    println!("{table}");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["test"]);
    let mut names: Vec<&String> = engine.tests().keys().collect();
    names.sort();
    for name in names {
        table.add_row(vec![name.as_str()]);
    }
    println!("{table}");
}
