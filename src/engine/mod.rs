//! The `Engine` façade: syntax/loader/auto-escape configuration, the
//! compiled-template cache, and the `render`/`render_path`/`parse`/
//! `get_template` entry points (spec §4.5, §5).
//!
//! The cache generalizes the teacher's process-wide
//! `Lazy<Mutex<HashMap<...>>>` (`REGEX_CACHE`/`SPLIT_CACHE` in
//! `pipeline/mod.rs`) into a per-`Engine` `dashmap::DashMap`, so two
//! `Engine`s never share compiled templates and dropping one engine frees
//! its cache. The builder surface (`set_loader`, `add_filter`,
//! `set_auto_escape`, `set_syntax`) mirrors
//! `other_examples/…minijinja-src-environment.rs.rs`'s `Environment`,
//! reimplemented over owned `String`s to match the teacher's ownership
//! style instead of `Cow<'source, str>`.

pub mod trace;

use crate::ast;
use crate::error::{AltarResult, Error, Position};
use crate::eval::{self, Context};
use crate::filters;
use crate::lexer::{Lexer, SyntaxConfig};
use crate::parser;
use crate::predicates;
use crate::value::Value;
use dashmap::DashMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

pub type FilterFn =
    Arc<dyn Fn(&Value, &[Value], &IndexMap<String, Value>) -> AltarResult<Value> + Send + Sync>;
pub type TestFn = Arc<dyn Fn(&Value, &[Value]) -> AltarResult<bool> + Send + Sync>;

static DEFAULT_FILTERS: Lazy<HashMap<String, FilterFn>> = Lazy::new(filters::build_table);
static DEFAULT_TESTS: Lazy<HashMap<String, TestFn>> = Lazy::new(predicates::build_table);

/// Resolves a template name to its source text. Implementors return
/// `Error::TemplateNotFound` for an unknown name so `{% include ... ignore
/// missing %}` can tell that apart from a read failure worth surfacing.
pub trait Loader: Send + Sync {
    fn load(&self, name: &str) -> AltarResult<String>;
}

/// Loads templates from a directory on disk.
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsLoader { root: root.into() }
    }
}

impl Loader for FsLoader {
    fn load(&self, name: &str) -> AltarResult<String> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|_| Error::template_not_found(name))
    }
}

#[derive(Debug, Clone)]
pub enum AutoEscape {
    Never,
    Always,
    /// Enabled for template names ending in any of these suffixes (e.g.
    /// `.html`, `.xml`), the way `select_autoescape`-style helpers in the
    /// Python ecosystem decide per-template.
    Suffixes(Vec<String>),
}

impl Default for AutoEscape {
    fn default() -> Self {
        AutoEscape::Suffixes(vec![".html".to_string(), ".htm".to_string(), ".xml".to_string()])
    }
}

pub struct Engine {
    syntax: SyntaxConfig,
    loader: Option<Arc<dyn Loader>>,
    auto_escape: AutoEscape,
    filters: HashMap<String, FilterFn>,
    tests: HashMap<String, TestFn>,
    cache: DashMap<String, Arc<ast::Template>>,
    cache_enabled: bool,
    trace_enabled: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Engine {
            syntax: SyntaxConfig::default(),
            loader: None,
            auto_escape: AutoEscape::default(),
            filters: DEFAULT_FILTERS.clone(),
            tests: DEFAULT_TESTS.clone(),
            cache: DashMap::new(),
            cache_enabled: true,
            trace_enabled: false,
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    pub fn set_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn set_auto_escape(mut self, auto_escape: AutoEscape) -> Self {
        self.auto_escape = auto_escape;
        self
    }

    pub fn set_syntax(mut self, syntax: SyntaxConfig) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn set_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn set_trace_enabled(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }

    pub fn add_filter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &[Value], &IndexMap<String, Value>) -> AltarResult<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(f));
        self
    }

    pub fn add_test<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> AltarResult<bool> + Send + Sync + 'static,
    {
        self.tests.insert(name.into(), Arc::new(f));
        self
    }

    pub fn filters(&self) -> &HashMap<String, FilterFn> {
        &self.filters
    }

    pub fn tests(&self) -> &HashMap<String, TestFn> {
        &self.tests
    }

    pub fn should_auto_escape(&self, name: &str) -> bool {
        match &self.auto_escape {
            AutoEscape::Never => false,
            AutoEscape::Always => true,
            AutoEscape::Suffixes(suffixes) => suffixes.iter().any(|s| name.ends_with(s.as_str())),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Parses `source` without going through the loader or the cache.
    /// Used for one-off strings (spec.md §4.5's `parse` entry point).
    pub fn parse(&self, source: &str, name: Option<&str>) -> AltarResult<Rc<ast::Template>> {
        let tokens = Lexer::new(source, &self.syntax, name).tokenize()?;
        let template = parser::parse(tokens, name)?;
        Ok(Rc::new(template))
    }

    /// Compiles `source` under `name`, consulting and populating the cache
    /// keyed by `name` + a hash of `source` so edited sources on disk don't
    /// serve stale cached ASTs.
    fn compile_cached(&self, name: &str, source: &str) -> AltarResult<Rc<ast::Template>> {
        if !self.cache_enabled {
            return self.parse(source, Some(name));
        }
        let key = format!("{name}#{:x}", source_hash(source));
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Rc::new((**cached.value()).clone()));
        }
        let tmpl = self.parse(source, Some(name))?;
        // Arc is what the cache stores (needs to be Send+Sync to cross
        // threads); the Rc the rest of the pipeline uses is rebuilt from it
        // per lookup, since the AST itself holds no thread-unsafe data.
        let arc_tmpl: Arc<ast::Template> = Arc::new((*tmpl).clone());
        self.cache.insert(key, Arc::clone(&arc_tmpl));
        Ok(Rc::new((*arc_tmpl).clone()))
    }

    /// Resolves `name` through the configured loader, compiling (and
    /// caching) its source. This is how `extends`/`include`/`import` find
    /// templates other than the one passed directly to `render`.
    pub fn get_template(&self, name: &str) -> AltarResult<Rc<ast::Template>> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| Error::template_not_found(name))?;
        let source = loader.load(name)?;
        self.compile_cached(name, &source)
    }

    /// Renders `source` directly, with no name and no loader involvement.
    pub fn render(&self, source: &str, context: &Context) -> AltarResult<String> {
        let template = self.parse(source, None)?;
        let tracer = trace::RenderTrace::new(self.trace_enabled);
        eval::render(self, &template, context, &tracer)
    }

    /// Loads, compiles, and renders a template by name via the configured
    /// loader (spec.md §4.5's `render_path`, generalized to any `Loader`).
    pub fn render_path(&self, name: &str, context: &Context) -> AltarResult<String> {
        let template = self.get_template(name)?;
        let tracer = trace::RenderTrace::new(self.trace_enabled);
        eval::render(self, &template, context, &tracer)
    }

    /// Convenience for the CLI: reads a file directly from the filesystem
    /// and renders it, bypassing the loader/cache (a one-shot render of a
    /// path given on the command line).
    pub fn render_file(&self, path: &Path, context: &Context) -> AltarResult<String> {
        let source = fs::read_to_string(path)
            .map_err(|_| Error::template_not_found(path.to_string_lossy().to_string()))?;
        let name = path.to_string_lossy().to_string();
        let template = self.parse(&source, Some(&name))?;
        let tracer = trace::RenderTrace::new(self.trace_enabled);
        eval::render(self, &template, context, &tracer)
    }
}

fn source_hash(source: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}
