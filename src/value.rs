//! The heterogeneous runtime value model (spec data model §3).
//!
//! One tagged variant, all operators defined once against it, matching the
//! teacher's own small `Value { Str, List }` enum in shape -- just with the
//! full scalar/sequence/mapping/undefined arm set a template context needs.

use crate::ast::Stmt;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A string known not to need HTML-escaping (produced by `safe`, or by
    /// auto-escape itself once it has already escaped a value).
    SafeStr(Rc<str>),
    Seq(Rc<Vec<Value>>),
    Map(Rc<IndexMap<String, Value>>),
    /// A macro bound at render time, capturing the scope it was defined in
    /// (spec §4.3: "a callable bound at render time, capturing the current
    /// context").
    Macro(Rc<MacroValue>),
}

#[derive(Debug, Clone)]
pub struct MacroValue {
    pub name: String,
    pub params: Vec<(String, Option<crate::ast::Expr>)>,
    pub body: Vec<Stmt>,
    pub captured_scope: Vec<IndexMap<String, Value>>,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(Rc::from(s.into()))
    }

    pub fn safe(s: impl Into<String>) -> Value {
        Value::SafeStr(Rc::from(s.into()))
    }

    pub fn seq(items: Vec<Value>) -> Value {
        Value::Seq(Rc::new(items))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Value {
        Value::Map(Rc::new(entries))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Value::SafeStr(_))
    }

    /// Truthiness per spec §4.3: false for null/undefined/false/0/0.0/empty
    /// string/empty sequence/empty mapping.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) | Value::SafeStr(s) => !s.is_empty(),
            Value::Seq(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Macro(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) | Value::SafeStr(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Macro(_) => "macro",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::SafeStr(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Render this value the way `{{ expr }}` does, before auto-escape is
    /// applied. Undefined renders as empty, per spec §3.
    pub fn render_to_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) | Value::SafeStr(s) => s.to_string(),
            Value::Seq(items) => {
                let parts: Vec<String> = items.iter().map(Value::render_to_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let parts: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{k:?}: {}", v.render_to_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Macro(m) => format!("<macro {}>", m.name),
        }
    }

    /// Resolve a possibly-negative index against a sequence length the way
    /// the pipeline this crate descends from resolves negative split/
    /// substring indices: clamp out-of-range indices to the nearest bound.
    pub fn resolve_index(idx: i64, len: usize) -> usize {
        if idx < 0 {
            let from_end = (-idx) as usize;
            if from_end > len { 0 } else { len - from_end }
        } else {
            (idx as usize).min(len)
        }
    }

    /// Converts a parsed JSON document into a context value, the way the
    /// CLI's `--context FILE` populates the render context.
    pub fn from_json(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => Value::seq(items.into_iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => {
                let mut m = IndexMap::new();
                for (k, v) in map {
                    m.insert(k, Value::from_json(v));
                }
                Value::map(m)
            }
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) | Value::SafeStr(s) => Some(s.chars().count()),
            Value::Seq(items) => Some(items.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_to_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b))
            | (Value::SafeStr(a), Value::SafeStr(b))
            | (Value::Str(a), Value::SafeStr(b))
            | (Value::SafeStr(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b))
            | (Value::SafeStr(a), Value::SafeStr(b))
            | (Value::Str(a), Value::SafeStr(b))
            | (Value::SafeStr(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}
