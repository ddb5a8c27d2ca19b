//! Generates a man page for the `altar` binary at build time via
//! `clap_mangen`, the way the teacher's `clap_mangen` build-dependency is
//! declared to be used (no `build.rs` shipped in the retrieved copy, so
//! this follows `clap_mangen`'s own documented `clap::Command` -> `Man`
//! usage rather than a file this crate descends from).

use clap::{Arg, ArgAction, Command};
use std::env;
use std::fs;
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("altar")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Render a Jinja-compatible template.")
        .arg(Arg::new("template").required(true))
        .arg(Arg::new("context").long("context").value_name("FILE"))
        .arg(Arg::new("define").long("define").value_name("KEY=VALUE").action(ArgAction::Append))
        .arg(Arg::new("trace").long("trace").action(ArgAction::SetTrue))
        .arg(Arg::new("no-cache").long("no-cache").action(ArgAction::SetTrue))
        .arg(Arg::new("autoescape").long("autoescape").default_value("auto"))
        .arg(Arg::new("list-filters").long("list-filters").action(ArgAction::SetTrue))
}

fn main() {
    let out_dir = match env::var_os("OUT_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => return,
    };

    let cmd = cli();
    let man = clap_mangen::Man::new(cmd);
    let mut buffer = Vec::new();
    if man.render(&mut buffer).is_ok() {
        let _ = fs::write(out_dir.join("altar.1"), buffer);
    }

    println!("cargo:rerun-if-changed=build.rs");
}
