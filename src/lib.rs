//! # altar
//!
//! A Jinja-compatible text-template engine: lexer, recursive-descent
//! parser, and a tree-walking evaluator sitting behind an [`Engine`]
//! façade with a per-instance compiled-template cache.

pub mod ast;
pub mod engine;
pub mod error;
pub mod eval;
mod filters;
mod lexer;
mod parser;
mod predicates;
pub mod value;

pub use engine::{AutoEscape, Engine, FsLoader, Loader};
pub use error::{AltarResult, Error, Position};
pub use eval::Context;
pub use lexer::SyntaxConfig;
pub use value::Value;
