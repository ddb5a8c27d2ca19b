//! Compiler/evaluator: frame stack, output buffer with sub-buffer
//! redirection for `super()`/macros, inheritance merge, and filter/test
//! application (spec §4.3).
//!
//! The teacher has no nested-output concept (`pipeline::template::format`
//! just accumulates into one growing `String`), so the sub-buffer
//! redirection machinery here has no direct teacher precedent; the
//! block-chain-for-`super()` idea is grounded instead in
//! `other_examples/…tera__src-renderer-ast_processor.rs.rs`'s
//! `blocks: Vec<(&str, &str, usize)>` stack.

use crate::ast::{self, BinOp, CompareOp, Const, Expr, SetValue, Stmt, StmtKind, UnaryOp};
use crate::engine::Engine;
use crate::engine::trace::RenderTrace;
use crate::error::{AltarResult, Error, Position};
use crate::value::{MacroValue, Value};
use indexmap::IndexMap;
use std::rc::Rc;

/// The caller-supplied name-to-value mapping for a render call.
#[derive(Debug, Clone, Default)]
pub struct Context(pub IndexMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Context(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn from_json(value: serde_json::Value) -> AltarResult<Context> {
        match Value::from_json(value) {
            Value::Map(m) => Ok(Context((*m).clone())),
            _ => Err(Error::render(
                "context must be a JSON object",
                Position::unknown(),
            )),
        }
    }
}

type Frame = IndexMap<String, Value>;

struct BlockChain {
    name: String,
    defs: Rc<Vec<ast::Block>>,
    position: usize,
}

struct Eval<'a> {
    engine: &'a Engine,
    trace: &'a RenderTrace,
    frames: Vec<Frame>,
    block_stack: Vec<BlockChain>,
    /// Most-derived definition of every block name in the active
    /// inheritance chain, ordered child-most first; used by
    /// `self.blockname()` and to seed a fresh `BlockChain`.
    block_table: IndexMap<String, Rc<Vec<ast::Block>>>,
    template_name: String,
    auto_escape: bool,
    /// Line/column of the statement currently being rendered, updated at the
    /// top of `render_stmt`; reported by `pos()` for `RenderError`s raised
    /// anywhere underneath, including inside a nested expression evaluation.
    current_pos: (usize, usize),
}

pub fn render(
    engine: &Engine,
    template: &Rc<ast::Template>,
    context: &Context,
    trace: &RenderTrace,
) -> AltarResult<String> {
    let name = template.name.clone().unwrap_or_else(|| "<string>".to_string());
    trace.print_enter_template(&name);

    let chain = resolve_chain(engine, template, context)?;
    let block_table = effective_blocks(&chain);
    let auto_escape = engine.should_auto_escape(&name);

    let mut eval = Eval {
        engine,
        trace,
        frames: vec![context.0.clone()],
        block_stack: Vec::new(),
        block_table,
        template_name: name.clone(),
        auto_escape,
        current_pos: (0, 0),
    };

    let root = chain.last().expect("chain always has at least one template");
    let mut out = String::new();
    eval.render_body(&root.body, &mut out)?;
    trace.print_render_result(&name, out.len());
    Ok(out)
}

/// Walks the `extends` chain from `template` (child-most) up to a template
/// with no `extends` (root-most). `extends` target expressions are
/// evaluated against the caller's top-level context, matching real-world
/// engines that resolve inheritance before any block-local scoping exists.
fn resolve_chain(
    engine: &Engine,
    template: &Rc<ast::Template>,
    context: &Context,
) -> AltarResult<Vec<Rc<ast::Template>>> {
    let mut chain = vec![Rc::clone(template)];
    let mut current = Rc::clone(template);
    loop {
        let Some(extends_expr) = &current.extends else {
            break;
        };
        let name = const_string(extends_expr, context).ok_or_else(|| {
            Error::render(
                "'extends' target must evaluate to a string",
                Position::unknown(),
            )
        })?;
        let parent = engine.get_template(&name)?;
        chain.push(Rc::clone(&parent));
        current = parent;
    }
    Ok(chain)
}

/// Evaluates a restricted subset of expressions (name lookups against the
/// top-level context, string/name literals) -- enough for typical `extends`
/// targets -- without needing a full `Eval` instance.
fn const_string(expr: &Expr, context: &Context) -> Option<String> {
    match expr {
        Expr::Const(Const::Str(s)) => Some(s.clone()),
        Expr::Name(n) => context.0.get(n).and_then(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

fn effective_blocks(chain: &[Rc<ast::Template>]) -> IndexMap<String, Rc<Vec<ast::Block>>> {
    let mut by_name: IndexMap<String, Vec<ast::Block>> = IndexMap::new();
    for tmpl in chain {
        for block in &tmpl.blocks {
            by_name.entry(block.name.clone()).or_default().push(block.clone());
        }
    }
    by_name
        .into_iter()
        .map(|(name, defs)| (name, Rc::new(defs)))
        .collect()
}

enum Flow {
    Normal,
}

impl<'a> Eval<'a> {
    fn pos(&self) -> Position {
        Position::new(Some(&self.template_name), self.current_pos.0, self.current_pos.1)
    }

    fn lookup(&self, name: &str) -> Value {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return v.clone();
            }
        }
        Value::Undefined
    }

    fn set_var(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    fn render_body(&mut self, body: &[Stmt], out: &mut String) -> AltarResult<Flow> {
        for stmt in body {
            self.render_stmt(stmt, out)?;
        }
        Ok(Flow::Normal)
    }

    fn render_stmt(&mut self, stmt: &Stmt, out: &mut String) -> AltarResult<()> {
        self.current_pos = (stmt.line, stmt.column);
        match &stmt.kind {
            StmtKind::Text(t) => out.push_str(t),
            StmtKind::Raw(t) => out.push_str(t),
            StmtKind::Output(expr) => {
                let value = self.eval(expr)?;
                self.write_output(&value, out);
            }
            StmtKind::If {
                branches,
                else_body,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.is_truthy() {
                        self.render_body(body, out)?;
                        return Ok(());
                    }
                }
                if let Some(body) = else_body {
                    self.render_body(body, out)?;
                }
            }
            StmtKind::For {
                targets,
                iter,
                body,
                else_body,
                filter,
            } => self.render_for(targets, iter, body, else_body, filter, out)?,
            StmtKind::Block(block) => self.render_block_ref(&block.name, out)?,
            StmtKind::Extends(_) => {}
            StmtKind::Include {
                template,
                with_context,
                ignore_missing,
            } => self.render_include(template, *with_context, *ignore_missing, out)?,
            StmtKind::Import {
                template,
                alias,
                with_context,
            } => {
                let ns = self.import_namespace(template, *with_context)?;
                self.set_var(alias, Value::map(ns));
            }
            StmtKind::FromImport {
                template,
                names,
                with_context,
            } => {
                let ns = self.import_namespace(template, *with_context)?;
                for (name, alias) in names {
                    let value = ns.get(name).cloned().unwrap_or(Value::Undefined);
                    self.set_var(alias.as_deref().unwrap_or(name), value);
                }
            }
            StmtKind::Set { target, value } => match value {
                SetValue::Expr(expr) => {
                    let v = self.eval(expr)?;
                    self.set_var(target, v);
                }
                SetValue::Block(body) => {
                    let mut buf = String::new();
                    self.render_body(body, &mut buf)?;
                    self.set_var(target, Value::str(buf));
                }
            },
            StmtKind::Macro { name, params, body } => {
                let m = Value::Macro(Rc::new(MacroValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    captured_scope: self.frames.clone(),
                }));
                self.set_var(name, m);
            }
            StmtKind::CallBlock {
                call,
                call_params,
                body,
            } => self.render_call_block(call, call_params, body, out)?,
            StmtKind::Do(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Filter { name, args, body } => {
                let mut buf = String::new();
                self.render_body(body, &mut buf)?;
                let arg_values: Vec<Value> =
                    args.iter().map(|a| self.eval(a)).collect::<AltarResult<_>>()?;
                let filtered = self.call_filter(name, &Value::str(buf), &arg_values, &IndexMap::new())?;
                out.push_str(&filtered.render_to_string());
            }
        }
        Ok(())
    }

    fn write_output(&self, value: &Value, out: &mut String) {
        if self.auto_escape && !value.is_safe() {
            out.push_str(&html_escape(&value.render_to_string()));
        } else {
            out.push_str(&value.render_to_string());
        }
    }

    fn render_for(
        &mut self,
        targets: &[String],
        iter: &Expr,
        body: &[Stmt],
        else_body: &Option<Vec<Stmt>>,
        filter: &Option<Expr>,
        out: &mut String,
    ) -> AltarResult<()> {
        let iterable = self.eval(iter)?;
        let items = self.sequence_items(&iterable)?;
        // Open Question resolution (SPEC_FULL.md / DESIGN.md): `loop.length`
        // reflects the pre-filter count.
        let total_len = items.len();

        let mut filtered_indices = Vec::new();
        self.frames.push(Frame::new());
        for (i0, item) in items.iter().enumerate() {
            self.bind_targets(targets, item);
            let keep = match filter {
                Some(f) => self.eval(f)?.is_truthy(),
                None => true,
            };
            if keep {
                filtered_indices.push(i0);
            }
        }
        self.frames.pop();

        if filtered_indices.is_empty() {
            if let Some(else_body) = else_body {
                self.render_body(else_body, out)?;
            }
            return Ok(());
        }

        let count = filtered_indices.len();
        self.frames.push(Frame::new());
        let depth = self.for_depth();
        for (post_i, &orig_i) in filtered_indices.iter().enumerate() {
            self.bind_targets(targets, &items[orig_i]);
            let loop_local = self.make_loop_local(post_i, count, total_len, depth, &items, &filtered_indices);
            self.set_var("loop", loop_local);
            self.render_body(body, out)?;
        }
        self.frames.pop();
        Ok(())
    }

    fn for_depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.contains_key("loop"))
            .count()
            + 1
    }

    fn bind_targets(&mut self, targets: &[String], item: &Value) {
        if targets.len() == 1 {
            self.set_var(&targets[0], item.clone());
        } else if let Some(seq) = item.as_seq() {
            for (i, name) in targets.iter().enumerate() {
                self.set_var(name, seq.get(i).cloned().unwrap_or(Value::Undefined));
            }
        } else {
            for name in targets {
                self.set_var(name, Value::Undefined);
            }
        }
    }

    fn make_loop_local(
        &self,
        post_i: usize,
        count: usize,
        total_len: usize,
        depth: usize,
        items: &[Value],
        filtered_indices: &[usize],
    ) -> Value {
        let mut m = IndexMap::new();
        m.insert("index".into(), Value::Int(post_i as i64 + 1));
        m.insert("index0".into(), Value::Int(post_i as i64));
        m.insert("revindex".into(), Value::Int((count - post_i) as i64));
        m.insert("revindex0".into(), Value::Int((count - post_i - 1) as i64));
        m.insert("first".into(), Value::Bool(post_i == 0));
        m.insert("last".into(), Value::Bool(post_i + 1 == count));
        m.insert("length".into(), Value::Int(total_len as i64));
        m.insert("depth".into(), Value::Int(depth as i64));
        m.insert("depth0".into(), Value::Int(depth as i64 - 1));
        m.insert(
            "previtem".into(),
            if post_i == 0 {
                Value::Undefined
            } else {
                items[filtered_indices[post_i - 1]].clone()
            },
        );
        m.insert(
            "nextitem".into(),
            if post_i + 1 >= count {
                Value::Undefined
            } else {
                items[filtered_indices[post_i + 1]].clone()
            },
        );
        // Sentinel consumed by the `loop.cycle(...)` special case in `eval`.
        m.insert("__loop_index0__".into(), Value::Int(post_i as i64));
        Value::map(m)
    }

    fn sequence_items(&self, value: &Value) -> AltarResult<Vec<Value>> {
        match value {
            Value::Seq(items) => Ok((**items).clone()),
            Value::Map(m) => Ok(m.keys().map(|k| Value::str(k.clone())).collect()),
            Value::Str(s) | Value::SafeStr(s) => {
                Ok(s.chars().map(|c| Value::str(c.to_string())).collect())
            }
            Value::Undefined => Ok(Vec::new()),
            other => Err(Error::render(
                format!("'{}' is not iterable", other.type_name()),
                self.pos(),
            )),
        }
    }

    fn render_block_ref(&mut self, name: &str, out: &mut String) -> AltarResult<()> {
        let chain = self
            .block_table
            .get(name)
            .cloned()
            .ok_or_else(|| Error::render(format!("unknown block '{name}'"), self.pos()))?;
        self.block_stack.push(BlockChain {
            name: name.to_string(),
            defs: Rc::clone(&chain),
            position: 0,
        });
        self.trace.print_block_resolution(name, 0);
        let body = chain[0].body.clone();
        let scoped = chain[0].scoped;
        if scoped {
            self.frames.push(Frame::new());
        }
        let result = self.render_body(&body, out).map(|_| ());
        if scoped {
            self.frames.pop();
        }
        self.block_stack.pop();
        result
    }

    fn render_super(&mut self, out: &mut String) -> AltarResult<()> {
        let Some(top) = self.block_stack.last() else {
            return Err(Error::render(
                "'super()' used outside of a block",
                self.pos(),
            ));
        };
        let next_position = top.position + 1;
        let defs = Rc::clone(&top.defs);
        let name = top.name.clone();
        if next_position >= defs.len() {
            return Err(Error::render(
                format!("'{name}' has no parent block to call super() on"),
                self.pos(),
            ));
        }
        self.block_stack.push(BlockChain {
            name: name.clone(),
            defs: Rc::clone(&defs),
            position: next_position,
        });
        self.trace.print_block_resolution(&name, next_position);
        let body = defs[next_position].body.clone();
        let result = self.render_body(&body, out).map(|_| ());
        self.block_stack.pop();
        result
    }

    fn render_self_block(&mut self, name: &str, out: &mut String) -> AltarResult<()> {
        self.render_block_ref(name, out)
    }

    fn render_include(
        &mut self,
        template: &Expr,
        with_context: bool,
        ignore_missing: bool,
        out: &mut String,
    ) -> AltarResult<()> {
        let candidates = self.include_candidates(template)?;
        for name in &candidates {
            match self.engine.get_template(name) {
                Ok(tmpl) => {
                    self.trace.print_include(name, true);
                    let mut sub = Eval {
                        engine: self.engine,
                        trace: self.trace,
                        frames: if with_context {
                            self.frames.clone()
                        } else {
                            vec![Frame::new()]
                        },
                        block_stack: Vec::new(),
                        block_table: effective_blocks(&[Rc::clone(&tmpl)]),
                        template_name: name.clone(),
                        auto_escape: self.auto_escape,
                        current_pos: (0, 0),
                    };
                    sub.render_body(&tmpl.body, out)?;
                    return Ok(());
                }
                Err(e) if e.is_template_not_found() => {
                    self.trace.print_include(name, false);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        if ignore_missing {
            Ok(())
        } else {
            Err(Error::template_not_found(candidates.join(", ")))
        }
    }

    fn include_candidates(&mut self, template: &Expr) -> AltarResult<Vec<String>> {
        let value = self.eval(template)?;
        match &value {
            Value::Str(s) | Value::SafeStr(s) => Ok(vec![s.to_string()]),
            Value::Seq(items) => Ok(items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()),
            other => Err(Error::render(
                format!("include target must be a string or list of strings, got {}", other.type_name()),
                self.pos(),
            )),
        }
    }

    fn import_namespace(
        &mut self,
        template: &Expr,
        with_context: bool,
    ) -> AltarResult<IndexMap<String, Value>> {
        let name = match self.eval(template)? {
            Value::Str(s) | Value::SafeStr(s) => s.to_string(),
            other => {
                return Err(Error::render(
                    format!("import target must be a string, got {}", other.type_name()),
                    self.pos(),
                ));
            }
        };
        let tmpl = self.engine.get_template(&name)?;
        let mut sub = Eval {
            engine: self.engine,
            trace: self.trace,
            frames: if with_context {
                self.frames.clone()
            } else {
                vec![Frame::new()]
            },
            block_stack: Vec::new(),
            block_table: effective_blocks(&[Rc::clone(&tmpl)]),
            template_name: name,
            auto_escape: self.auto_escape,
            current_pos: (0, 0),
        };
        let mut discard = String::new();
        sub.render_body(&tmpl.body, &mut discard)?;
        Ok(sub.frames.into_iter().next_back().unwrap_or_default())
    }

    fn render_call_block(
        &mut self,
        call: &Expr,
        call_params: &[String],
        body: &[Stmt],
        out: &mut String,
    ) -> AltarResult<()> {
        let (macro_value, args, kwargs) = self.resolve_call(call)?;
        self.invoke_macro(&macro_value, &args, &kwargs, Some((call_params, body)), out)
    }

    fn resolve_call(&mut self, expr: &Expr) -> AltarResult<(Rc<MacroValue>, Vec<Value>, IndexMap<String, Value>)> {
        let Expr::Call { callee, args, kwargs } = expr else {
            return Err(Error::render("call target must be a macro invocation", self.pos()));
        };
        let callee_val = self.eval(callee)?;
        let Value::Macro(m) = callee_val else {
            return Err(Error::render(
                format!("'{}' is not a macro", callee_val.type_name()),
                self.pos(),
            ));
        };
        let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect::<AltarResult<_>>()?;
        let mut kwarg_values = IndexMap::new();
        for (k, v) in kwargs {
            kwarg_values.insert(k.clone(), self.eval(v)?);
        }
        Ok((m, arg_values, kwarg_values))
    }

    fn invoke_macro(
        &mut self,
        m: &MacroValue,
        args: &[Value],
        kwargs: &IndexMap<String, Value>,
        caller: Option<(&[String], &[Stmt])>,
        out: &mut String,
    ) -> AltarResult<()> {
        let mut scope = Frame::new();
        for (i, (name, default)) in m.params.iter().enumerate() {
            let value = if let Some(v) = kwargs.get(name) {
                v.clone()
            } else if let Some(v) = args.get(i) {
                v.clone()
            } else if let Some(default_expr) = default {
                self.eval(default_expr)?
            } else {
                Value::Undefined
            };
            scope.insert(name.clone(), value);
        }

        let mut call_frames = m.captured_scope.clone();
        call_frames.push(scope);

        if let Some((call_params, caller_body)) = caller {
            let caller_macro = MacroValue {
                name: "caller".to_string(),
                params: call_params.iter().map(|p| (p.clone(), None)).collect(),
                body: caller_body.to_vec(),
                captured_scope: self.frames.clone(),
            };
            call_frames
                .last_mut()
                .unwrap()
                .insert("caller".to_string(), Value::Macro(Rc::new(caller_macro)));
        }

        let mut sub = Eval {
            engine: self.engine,
            trace: self.trace,
            frames: call_frames,
            block_stack: Vec::new(),
            block_table: self.block_table.clone(),
            template_name: self.template_name.clone(),
            auto_escape: self.auto_escape,
            current_pos: self.current_pos,
        };
        sub.render_body(&m.body, out)?;
        Ok(())
    }

    fn call_macro_expr(&mut self, m: &MacroValue, args: &[Value], kwargs: &IndexMap<String, Value>) -> AltarResult<Value> {
        let mut out = String::new();
        self.invoke_macro(m, args, kwargs, None, &mut out)?;
        Ok(Value::safe(out))
    }

    /// `select(test, *args)` / `reject(...)` keep items where a named test
    /// passes / fails; `selectattr`/`rejectattr` apply the test to
    /// `item[attr]` instead of `item`; `map(filter, *args)` / `map(attribute=...)`
    /// transforms every item through a named filter or attribute lookup.
    fn eval_higher_order_filter(
        &mut self,
        name: &str,
        value: &Value,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> AltarResult<Value> {
        let items = self.sequence_items(value)?;
        let kw_attribute = kwargs
            .iter()
            .find(|(k, _)| k == "attribute")
            .and_then(|(_, e)| expr_const_str(e));
        match name {
            "select" | "reject" => {
                let negate = name == "reject";
                let test_name = args.first().and_then(expr_const_str);
                let rest: Vec<Value> = args
                    .iter()
                    .skip(1)
                    .map(|a| self.eval(a))
                    .collect::<AltarResult<_>>()?;
                let mut out = Vec::new();
                for item in items {
                    let keep = match &test_name {
                        Some(t) => self.call_test(t, &item, &rest)?,
                        None => item.is_truthy(),
                    };
                    if keep != negate {
                        out.push(item);
                    }
                }
                Ok(Value::seq(out))
            }
            "selectattr" | "rejectattr" => {
                let negate = name == "rejectattr";
                let attr = args.first().and_then(expr_const_str).ok_or_else(|| {
                    Error::render(format!("'{name}' requires an attribute name"), self.pos())
                })?;
                let test_name = args.get(1).and_then(expr_const_str);
                let rest: Vec<Value> = args
                    .iter()
                    .skip(2)
                    .map(|a| self.eval(a))
                    .collect::<AltarResult<_>>()?;
                let mut out = Vec::new();
                for item in items {
                    let attr_value = self.getattr(&item, &attr);
                    let keep = match &test_name {
                        Some(t) => self.call_test(t, &attr_value, &rest)?,
                        None => attr_value.is_truthy(),
                    };
                    if keep != negate {
                        out.push(item);
                    }
                }
                Ok(Value::seq(out))
            }
            "map" => {
                if let Some(attr) = kw_attribute {
                    let default = kwargs.iter().find(|(k, _)| k == "default");
                    let mut out = Vec::new();
                    for item in items {
                        let v = self.getattr(&item, &attr);
                        let v = match default {
                            Some((_, d)) if v.is_undefined() => self.eval(d)?,
                            _ => v,
                        };
                        out.push(v);
                    }
                    return Ok(Value::seq(out));
                }
                let filter_name = args.first().and_then(expr_const_str).ok_or_else(|| {
                    Error::render("'map' requires a filter or attribute name", self.pos())
                })?;
                let rest: Vec<Value> = args
                    .iter()
                    .skip(1)
                    .map(|a| self.eval(a))
                    .collect::<AltarResult<_>>()?;
                let mut out = Vec::new();
                for item in items {
                    out.push(self.call_filter(&filter_name, &item, &rest, &IndexMap::new())?);
                }
                Ok(Value::seq(out))
            }
            _ => unreachable!(),
        }
    }

    fn call_filter(
        &self,
        name: &str,
        value: &Value,
        args: &[Value],
        kwargs: &IndexMap<String, Value>,
    ) -> AltarResult<Value> {
        self.trace.print_filter_call(name, value.type_name());
        let f = self
            .engine
            .filters()
            .get(name)
            .ok_or_else(|| Error::render(format!("no filter named '{name}'"), self.pos()))?;
        f(value, args, kwargs)
    }

    fn call_test(&self, name: &str, value: &Value, args: &[Value]) -> AltarResult<bool> {
        let f = self
            .engine
            .tests()
            .get(name)
            .ok_or_else(|| Error::render(format!("no test named '{name}'"), self.pos()))?;
        f(value, args)
    }

    fn eval(&mut self, expr: &Expr) -> AltarResult<Value> {
        match expr {
            Expr::Name(n) => Ok(self.lookup(n)),
            Expr::Const(c) => Ok(match c {
                Const::None => Value::Null,
                Const::Bool(b) => Value::Bool(*b),
                Const::Int(i) => Value::Int(*i),
                Const::Float(f) => Value::Float(*f),
                Const::Str(s) => Value::str(s.clone()),
            }),
            Expr::List(items) | Expr::Tuple(items) => {
                let values = items.iter().map(|e| self.eval(e)).collect::<AltarResult<_>>()?;
                Ok(Value::seq(values))
            }
            Expr::Dict(entries) => {
                let mut m = IndexMap::new();
                for (k, v) in entries {
                    let key = self.eval(k)?;
                    let key = key.as_str().map(str::to_string).unwrap_or_else(|| key.render_to_string());
                    m.insert(key, self.eval(v)?);
                }
                Ok(Value::map(m))
            }
            Expr::Getattr(obj, attr) => {
                if let Expr::Name(n) = obj.as_ref() {
                    if n == "self" {
                        // `self.blockname` without the call form is handled
                        // via `Expr::SelfBlock`; a bare `self.x` getattr is
                        // not otherwise meaningful.
                    }
                }
                let value = self.eval(obj)?;
                Ok(self.getattr(&value, attr))
            }
            Expr::Getitem(obj, key) => {
                let obj_v = self.eval(obj)?;
                let key_v = self.eval(key)?;
                Ok(self.getitem(&obj_v, &key_v))
            }
            Expr::Slice {
                obj,
                start,
                stop,
                step,
            } => {
                let obj_v = self.eval(obj)?;
                let start = start.as_ref().map(|e| self.eval(e)).transpose()?;
                let stop = stop.as_ref().map(|e| self.eval(e)).transpose()?;
                let step = step.as_ref().map(|e| self.eval(e)).transpose()?;
                self.slice(&obj_v, start, stop, step)
            }
            Expr::Call { callee, args, kwargs } => self.eval_call(callee, args, kwargs),
            Expr::Filter {
                value,
                name,
                args,
                kwargs,
            } => {
                // `select`/`reject`/`selectattr`/`rejectattr`/`map` need to
                // resolve a *second* name (a test or filter) against the
                // engine's tables, which a plain `Value -> Value` filter
                // function has no access to -- handled here instead of in
                // `filters::build_table`.
                if matches!(name.as_str(), "select" | "reject" | "selectattr" | "rejectattr" | "map") {
                    let v = self.eval(value)?;
                    return self.eval_higher_order_filter(name, &v, args, kwargs);
                }
                let v = self.eval(value)?;
                let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect::<AltarResult<_>>()?;
                let mut kwarg_values = IndexMap::new();
                for (k, e) in kwargs {
                    kwarg_values.insert(k.clone(), self.eval(e)?);
                }
                self.call_filter(name, &v, &arg_values, &kwarg_values)
            }
            Expr::Test {
                value,
                name,
                args,
                negated,
            } => {
                let v = self.eval(value)?;
                let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect::<AltarResult<_>>()?;
                let result = self.call_test(name, &v, &arg_values)?;
                Ok(Value::Bool(result != *negated))
            }
            Expr::BinOp { op, left, right } => self.eval_binop(*op, left, right),
            Expr::UnaryOp { op, operand } => self.eval_unary(*op, operand),
            Expr::Compare {
                left,
                ops,
                comparators,
            } => self.eval_compare(left, ops, comparators),
            Expr::Conditional { cond, then, else_ } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(else_)
                }
            }
            Expr::Concat(parts) => {
                let mut s = String::new();
                for p in parts {
                    s.push_str(&self.eval(p)?.render_to_string());
                }
                Ok(Value::str(s))
            }
            Expr::Super => {
                let mut out = String::new();
                self.render_super(&mut out)?;
                Ok(Value::safe(out))
            }
            Expr::SelfBlock(name) => {
                let mut out = String::new();
                self.render_self_block(name, &mut out)?;
                Ok(Value::safe(out))
            }
            Expr::Caller(args) => {
                let Value::Macro(m) = self.lookup("caller") else {
                    return Err(Error::render(
                        "'caller()' used outside of a call block",
                        self.pos(),
                    ));
                };
                let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect::<AltarResult<_>>()?;
                self.call_macro_expr(&m, &arg_values, &IndexMap::new())
            }
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> AltarResult<Value> {
        // `loop.cycle(a, b, ...)`: special-cased rather than general
        // method dispatch, same way the loop local's other fields are
        // plain data, not callables.
        if let Expr::Getattr(obj, attr) = callee {
            if attr == "cycle" {
                let obj_v = self.eval(obj)?;
                if let Some(map) = obj_v.as_map() {
                    if let Some(Value::Int(i0)) = map.get("__loop_index0__") {
                        if !args.is_empty() {
                            let values: Vec<Value> =
                                args.iter().map(|a| self.eval(a)).collect::<AltarResult<_>>()?;
                            let idx = (*i0 as usize) % values.len();
                            return Ok(values[idx].clone());
                        }
                    }
                }
            }
        }
        let callee_v = self.eval(callee)?;
        let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect::<AltarResult<_>>()?;
        let mut kwarg_values = IndexMap::new();
        for (k, e) in kwargs {
            kwarg_values.insert(k.clone(), self.eval(e)?);
        }
        match callee_v {
            Value::Macro(m) => self.call_macro_expr(&m, &arg_values, &kwarg_values),
            other => Err(Error::render(
                format!("'{}' is not callable", other.type_name()),
                self.pos(),
            )),
        }
    }

    fn getattr(&self, obj: &Value, attr: &str) -> Value {
        match obj {
            Value::Map(m) => m.get(attr).cloned().unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    fn getitem(&self, obj: &Value, key: &Value) -> Value {
        match (obj, key) {
            (Value::Map(m), k) => {
                let key = k.as_str().map(str::to_string).unwrap_or_else(|| k.render_to_string());
                m.get(&key).cloned().unwrap_or(Value::Undefined)
            }
            (Value::Seq(items), Value::Int(i)) => {
                let idx = Value::resolve_index(*i, items.len());
                items.get(idx).cloned().unwrap_or(Value::Undefined)
            }
            (Value::Str(s), Value::Int(i)) | (Value::SafeStr(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = Value::resolve_index(*i, chars.len());
                chars.get(idx).map(|c| Value::str(c.to_string())).unwrap_or(Value::Undefined)
            }
            _ => Value::Undefined,
        }
    }

    fn slice(
        &self,
        obj: &Value,
        start: Option<Value>,
        stop: Option<Value>,
        step: Option<Value>,
    ) -> AltarResult<Value> {
        let step_n = step.as_ref().and_then(Value::as_int).unwrap_or(1);
        if step_n == 0 {
            return Err(Error::render("slice step cannot be zero", self.pos()));
        }
        match obj {
            Value::Seq(items) => {
                let selected = slice_indices(items.len(), &start, &stop, step_n)
                    .into_iter()
                    .map(|i| items[i].clone())
                    .collect();
                Ok(Value::seq(selected))
            }
            Value::Str(s) | Value::SafeStr(s) => {
                let chars: Vec<char> = s.chars().collect();
                let selected: String = slice_indices(chars.len(), &start, &stop, step_n)
                    .into_iter()
                    .map(|i| chars[i])
                    .collect();
                Ok(Value::str(selected))
            }
            Value::Undefined => Ok(Value::Undefined),
            other => Err(Error::render(
                format!("cannot slice a {}", other.type_name()),
                self.pos(),
            )),
        }
    }

    fn eval_binop(&mut self, op: BinOp, left: &Expr, right: &Expr) -> AltarResult<Value> {
        match op {
            BinOp::And => {
                let l = self.eval(left)?;
                if !l.is_truthy() {
                    return Ok(l);
                }
                self.eval(right)
            }
            BinOp::Or => {
                let l = self.eval(left)?;
                if l.is_truthy() {
                    return Ok(l);
                }
                self.eval(right)
            }
            _ => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                arithmetic(op, &l, &r).map_err(|msg| Error::render(msg, self.pos()))
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> AltarResult<Value> {
        let v = self.eval(operand)?;
        match op {
            UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
            UnaryOp::Neg => match v {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(Error::render(
                    format!("cannot negate a {}", other.type_name()),
                    self.pos(),
                )),
            },
            UnaryOp::Pos => match v {
                Value::Int(_) | Value::Float(_) => Ok(v),
                other => Err(Error::render(
                    format!("unary '+' not supported for {}", other.type_name()),
                    self.pos(),
                )),
            },
        }
    }

    fn eval_compare(&mut self, left: &Expr, ops: &[CompareOp], comparators: &[Expr]) -> AltarResult<Value> {
        let mut lhs = self.eval(left)?;
        for (op, comparator) in ops.iter().zip(comparators) {
            let rhs = self.eval(comparator)?;
            let ok = match op {
                CompareOp::Eq => lhs == rhs,
                CompareOp::Ne => lhs != rhs,
                CompareOp::Lt => lhs.partial_cmp(&rhs) == Some(std::cmp::Ordering::Less),
                CompareOp::Le => matches!(
                    lhs.partial_cmp(&rhs),
                    Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                ),
                CompareOp::Gt => lhs.partial_cmp(&rhs) == Some(std::cmp::Ordering::Greater),
                CompareOp::Ge => matches!(
                    lhs.partial_cmp(&rhs),
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                ),
                CompareOp::In => self.contains(&rhs, &lhs),
                CompareOp::NotIn => !self.contains(&rhs, &lhs),
            };
            if !ok {
                return Ok(Value::Bool(false));
            }
            lhs = rhs;
        }
        Ok(Value::Bool(true))
    }

    fn contains(&self, container: &Value, needle: &Value) -> bool {
        match container {
            Value::Seq(items) => items.contains(needle),
            Value::Map(m) => needle.as_str().is_some_and(|k| m.contains_key(k)),
            Value::Str(s) | Value::SafeStr(s) => {
                needle.as_str().is_some_and(|n| s.contains(n))
            }
            _ => false,
        }
    }
}

fn slice_indices(len: usize, start: &Option<Value>, stop: &Option<Value>, step: i64) -> Vec<usize> {
    let len_i = len as i64;
    let (default_start, default_stop) = if step > 0 { (0, len_i) } else { (len_i - 1, -1) };
    let start_i = start.as_ref().and_then(Value::as_int).map(|i| clamp_index(i, len_i)).unwrap_or(default_start);
    let stop_i = stop.as_ref().and_then(Value::as_int).map(|i| clamp_index(i, len_i)).unwrap_or(default_stop);

    let mut out = Vec::new();
    if step > 0 {
        let mut i = start_i;
        while i < stop_i && i < len_i {
            if i >= 0 {
                out.push(i as usize);
            }
            i += step;
        }
    } else {
        let mut i = start_i;
        while i > stop_i && i >= 0 {
            if i < len_i {
                out.push(i as usize);
            }
            i += step;
        }
    }
    out
}

fn expr_const_str(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Const(Const::Str(s)) => Some(s.clone()),
        Expr::Name(n) => Some(n.clone()),
        _ => None,
    }
}

fn clamp_index(i: i64, len: i64) -> i64 {
    if i < 0 { (len + i).max(0) } else { i.min(len) }
}

fn arithmetic(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    use BinOp::*;
    match (op, l, r) {
        (Add, Value::Str(a), b) | (Add, Value::SafeStr(a), b) if matches!(b, Value::Str(_) | Value::SafeStr(_)) => {
            Ok(Value::str(format!("{a}{}", b.render_to_string())))
        }
        (Add, Value::Seq(a), Value::Seq(b)) => {
            let mut v = (**a).clone();
            v.extend((**b).iter().cloned());
            Ok(Value::seq(v))
        }
        (Add, a, b) => numeric2(a, b, |x, y| x + y, |x, y| x + y),
        (Sub, a, b) => numeric2(a, b, |x, y| x - y, |x, y| x - y),
        (Mul, a, b) => numeric2(a, b, |x, y| x * y, |x, y| x * y),
        (Mod, a, b) => {
            let (af, bf) = (a.as_f64(), b.as_f64());
            match (af, bf) {
                (Some(_), Some(0.0)) => Err("division by zero".to_string()),
                (Some(x), Some(y)) => {
                    if matches!(a, Value::Float(_)) || matches!(b, Value::Float(_)) {
                        Ok(Value::Float(x % y))
                    } else {
                        Ok(Value::Int((x as i64) % (y as i64)))
                    }
                }
                _ => Err(type_error("%", a, b)),
            }
        }
        (Div, a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(_), Some(y)) if y == 0.0 => Err("division by zero".to_string()),
            (Some(x), Some(y)) => Ok(Value::Float(x / y)),
            _ => Err(type_error("/", a, b)),
        },
        (FloorDiv, a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(_), Some(y)) if y == 0.0 => Err("division by zero".to_string()),
            (Some(x), Some(y)) => {
                if matches!(a, Value::Float(_)) || matches!(b, Value::Float(_)) {
                    Ok(Value::Float((x / y).floor()))
                } else {
                    Ok(Value::Int((x / y).floor() as i64))
                }
            }
            _ => Err(type_error("//", a, b)),
        },
        (Pow, a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => {
                if matches!(a, Value::Float(_)) || matches!(b, Value::Float(_)) {
                    Ok(Value::Float(x.powf(y)))
                } else {
                    Ok(Value::Int(x.powf(y) as i64))
                }
            }
            _ => Err(type_error("**", a, b)),
        },
        (And, _, _) | (Or, _, _) => unreachable!("short-circuit ops handled in eval_binop"),
    }
}

fn numeric2(a: &Value, b: &Value, fi: fn(i64, i64) -> i64, ff: fn(f64, f64) -> f64) -> Result<Value, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(fi(*x, *y))),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Ok(Value::Float(ff(a.as_f64().unwrap(), b.as_f64().unwrap())))
        }
        _ => Err(type_error("arithmetic", a, b)),
    }
}

fn type_error(op: &str, a: &Value, b: &Value) -> String {
    format!(
        "unsupported operand types for {op}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    )
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
