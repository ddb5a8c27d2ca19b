//! The filter table (spec §4.4, String/Escape/Sequence/Number/Mapping/Misc
//! groups). `select`/`reject`/`selectattr`/`rejectattr`/`map` need to look
//! a test or another filter up by name, so those five live as special
//! cases in `eval::Eval::eval` instead of here (see the comment at their
//! call site) -- everything else is a plain `Value -> Value` function
//! and is built once into a table the way the teacher's `pipeline::apply`
//! dispatches on `StringOp` variants, just keyed by name instead of enum.

use crate::engine::FilterFn;
use crate::error::{AltarResult, Error, Position};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

pub fn build_table() -> HashMap<String, FilterFn> {
    let mut m: HashMap<String, FilterFn> = HashMap::new();
    macro_rules! reg {
        ($name:expr, $f:expr) => {
            m.insert($name.to_string(), Arc::new($f) as FilterFn);
        };
    }

    reg!("upper", |v, _a, _k| Ok(Value::str(text(v)?.to_uppercase())));
    reg!("lower", |v, _a, _k| Ok(Value::str(text(v)?.to_lowercase())));
    reg!("capitalize", |v, _a, _k| Ok(Value::str(capitalize(&text(v)?))));
    reg!("title", |v, _a, _k| Ok(Value::str(title_case(&text(v)?))));
    reg!("trim", |v, _a, _k| Ok(Value::str(text(v)?.trim().to_string())));
    reg!("replace", |v, a, _k| {
        let s = text(v)?;
        let old = arg_str(a, 0)?;
        let new = arg_str(a, 1)?;
        match arg_int(a, 2) {
            Some(count) => Ok(Value::str(replace_n(&s, &old, &new, count as usize))),
            None => Ok(Value::str(s.replace(old.as_str(), &new))),
        }
    });
    reg!("center", |v, a, _k| {
        let s = text(v)?;
        let width = arg_int(a, 0).unwrap_or(80) as usize;
        Ok(Value::str(center(&s, width)))
    });
    reg!("indent", |v, a, _k| {
        let s = text(v)?;
        let width = arg_int(a, 0).unwrap_or(4) as usize;
        let first = a.get(1).map(Value::is_truthy).unwrap_or(false);
        let blank = a.get(2).map(Value::is_truthy).unwrap_or(false);
        Ok(Value::str(indent(&s, width, first, blank)))
    });
    reg!("truncate", |v, a, _k| {
        let s = text(v)?;
        let length = arg_int(a, 0).unwrap_or(255) as usize;
        let killwords = a.get(1).map(Value::is_truthy).unwrap_or(false);
        let end = arg_str(a, 2).unwrap_or_else(|_| "...".to_string());
        Ok(Value::str(truncate(&s, length, killwords, &end)))
    });
    reg!("wordwrap", |v, a, _k| {
        let s = text(v)?;
        let width = arg_int(a, 0).unwrap_or(79) as usize;
        Ok(Value::str(wordwrap(&s, width)))
    });
    reg!("wordcount", |v, _a, _k| {
        Ok(Value::Int(text(v)?.split_whitespace().count() as i64))
    });
    reg!("striptags", |v, _a, _k| Ok(Value::str(striptags(&text(v)?))));
    reg!("ljust", |v, a, _k| {
        let s = text(v)?;
        let width = arg_int(a, 0).unwrap_or(0).max(0) as usize;
        Ok(Value::str(format!("{s:<width$}")))
    });
    reg!("rjust", |v, a, _k| {
        let s = text(v)?;
        let width = arg_int(a, 0).unwrap_or(0).max(0) as usize;
        Ok(Value::str(format!("{s:>width$}")))
    });
    reg!("string", |v, _a, _k| Ok(Value::str(v.render_to_string())));
    reg!("reverse", |v, _a, _k| reverse(v));

    reg!("escape", |v, _a, _k| Ok(escape(v)));
    reg!("e", |v, _a, _k| Ok(escape(v)));
    reg!("forceescape", |v, _a, _k| {
        Ok(Value::safe(crate::eval::html_escape(&v.render_to_string())))
    });
    reg!("safe", |v, _a, _k| Ok(Value::safe(v.render_to_string())));
    reg!("urlencode", |v, _a, _k| Ok(Value::str(urlencode(&text(v)?))));

    reg!("first", |v, _a, _k| {
        seq(v)?.first().cloned().ok_or_else(|| empty_seq_error("first"))
    });
    reg!("last", |v, _a, _k| {
        seq(v)?.last().cloned().ok_or_else(|| empty_seq_error("last"))
    });
    reg!("length", |v, _a, _k| length(v));
    reg!("count", |v, _a, _k| length(v));
    reg!("sort", sort_filter);
    reg!("groupby", |v, a, _k| groupby_filter(v, a));
    reg!("unique", |v, _a, _k| {
        let items = seq(v)?;
        let mut seen: Vec<Value> = Vec::new();
        for item in items {
            if !seen.contains(&item) {
                seen.push(item);
            }
        }
        Ok(Value::seq(seen))
    });
    reg!("batch", |v, a, _k| {
        let items = seq(v)?;
        let size = arg_int(a, 0).unwrap_or(1).max(1) as usize;
        let fill = a.get(1).cloned();
        let mut out = Vec::new();
        let mut chunk = Vec::new();
        for item in items {
            chunk.push(item);
            if chunk.len() == size {
                out.push(Value::seq(std::mem::take(&mut chunk)));
            }
        }
        if !chunk.is_empty() {
            if let Some(fill) = &fill {
                while chunk.len() < size {
                    chunk.push(fill.clone());
                }
            }
            out.push(Value::seq(chunk));
        }
        Ok(Value::seq(out))
    });
    reg!("slice", |v, a, _k| {
        let items = seq(v)?;
        let parts = arg_int(a, 0).unwrap_or(1).max(1) as usize;
        let fill = a.get(1).cloned();
        Ok(Value::seq(slice_into(items, parts, fill)))
    });
    reg!("sum", |v, a, _k| sum_filter(v, a));
    reg!("min", |v, _a, _k| extremum(v, true));
    reg!("max", |v, _a, _k| extremum(v, false));
    reg!("random", |v, _a, _k| {
        let items = seq(v)?;
        if items.is_empty() {
            return Err(empty_seq_error("random"));
        }
        let i = rand::Rng::gen_range(&mut rand::thread_rng(), 0..items.len());
        Ok(items[i].clone())
    });
    reg!("join", |v, a, _k| {
        let items = seq(v)?;
        let sep = arg_str(a, 0).unwrap_or_default();
        let attr = arg_str(a, 1).ok();
        let parts: Vec<String> = items
            .iter()
            .map(|item| match &attr {
                Some(name) => item.as_map().and_then(|m| m.get(name)).map(Value::render_to_string).unwrap_or_default(),
                None => item.render_to_string(),
            })
            .collect();
        Ok(Value::str(parts.join(&sep)))
    });
    reg!("list", |v, _a, _k| Ok(Value::seq(seq(v)?)));

    reg!("abs", |v, _a, _k| match v {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(type_err("abs", other)),
    });
    reg!("int", |v, a, _k| {
        let default = arg_int(a, 0).unwrap_or(0);
        Ok(Value::Int(v.as_int().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())).unwrap_or(default)))
    });
    reg!("float", |v, a, _k| {
        let default = a.first().and_then(Value::as_f64).unwrap_or(0.0);
        Ok(Value::Float(v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())).unwrap_or(default)))
    });
    reg!("round", |v, a, _k| {
        let precision = arg_int(a, 0).unwrap_or(0);
        let method = arg_str(a, 1).unwrap_or_else(|_| "common".to_string());
        let f = v.as_f64().ok_or_else(|| type_err("round", v))?;
        let factor = 10f64.powi(precision as i32);
        let scaled = f * factor;
        let rounded = match method.as_str() {
            "ceil" => scaled.ceil(),
            "floor" => scaled.floor(),
            _ => scaled.round(),
        };
        Ok(Value::Float(rounded / factor))
    });
    reg!("filesizeformat", |v, a, _k| {
        let bytes = v.as_f64().ok_or_else(|| type_err("filesizeformat", v))?;
        let binary = a.first().map(Value::is_truthy).unwrap_or(false);
        Ok(Value::str(filesizeformat(bytes, binary)))
    });

    reg!("dictsort", |v, a, k| {
        let map = v.as_map().ok_or_else(|| type_err("dictsort", v))?;
        let case_sensitive = k.get("case_sensitive").map(Value::is_truthy).unwrap_or_else(|| arg_bool(a, 0));
        let by_value = k
            .get("by")
            .and_then(Value::as_str)
            .map(|s| s == "value")
            .unwrap_or_else(|| arg_str(a, 1).map(|s| s == "value").unwrap_or(false));

        let key_str = |s: &str| if case_sensitive { s.to_string() } else { s.to_lowercase() };
        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        if by_value {
            entries.sort_by(|a, b| {
                let (ka, kb) = (a.1.as_str().map(key_str), b.1.as_str().map(key_str));
                match (ka, kb) {
                    (Some(ka), Some(kb)) => ka.cmp(&kb),
                    _ => a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal),
                }
            });
        } else {
            entries.sort_by(|a, b| key_str(a.0).cmp(&key_str(b.0)));
        }
        Ok(Value::seq(
            entries
                .into_iter()
                .map(|(k, v)| Value::seq(vec![Value::str(k.clone()), v.clone()]))
                .collect(),
        ))
    });
    reg!("items", |v, _a, _k| {
        let map = v.as_map().ok_or_else(|| type_err("items", v))?;
        Ok(Value::seq(
            map.iter()
                .map(|(k, v)| Value::seq(vec![Value::str(k.clone()), v.clone()]))
                .collect(),
        ))
    });
    reg!("attr", |v, a, _k| {
        let name = arg_str(a, 0)?;
        Ok(v.as_map().and_then(|m| m.get(&name)).cloned().unwrap_or(Value::Undefined))
    });

    reg!("default", default_filter);
    reg!("d", default_filter);
    reg!("format", |v, a, _k| {
        let fmt = text(v)?;
        Ok(Value::str(printf_format(&fmt, a)))
    });
    reg!("xmlattr", |v, a, _k| {
        let map = v.as_map().ok_or_else(|| type_err("xmlattr", v))?;
        let autospace = a.first().map(Value::is_truthy).unwrap_or(true);
        let mut out = String::new();
        for (k, val) in map.iter() {
            if val.is_undefined() || matches!(val, Value::Null) {
                continue;
            }
            if autospace {
                out.push(' ');
            }
            out.push_str(&format!(
                "{k}=\"{}\"",
                crate::eval::html_escape(&val.render_to_string())
            ));
        }
        Ok(Value::safe(out))
    });
    reg!("pprint", |v, _a, _k| Ok(Value::str(pprint(v, 0))));
    reg!("tojson", |v, _a, _k| Ok(Value::safe(tojson(v))));
    reg!("dateformat", |v, a, _k| {
        let fmt = arg_str(a, 0).unwrap_or_else(|_| "%Y-%m-%d".to_string());
        Ok(Value::str(dateformat(&text(v)?, &fmt)))
    });

    m
}

fn text(v: &Value) -> AltarResult<String> {
    match v {
        Value::Str(s) | Value::SafeStr(s) => Ok(s.to_string()),
        Value::Undefined => Ok(String::new()),
        other => Ok(other.render_to_string()),
    }
}

fn seq(v: &Value) -> AltarResult<Vec<Value>> {
    match v {
        Value::Seq(items) => Ok((**items).clone()),
        Value::Map(m) => Ok(m.keys().map(|k| Value::str(k.clone())).collect()),
        Value::Str(s) | Value::SafeStr(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Undefined => Ok(Vec::new()),
        other => Err(type_err("sequence filter", other)),
    }
}

fn length(v: &Value) -> AltarResult<Value> {
    v.len().map(|n| Value::Int(n as i64)).ok_or_else(|| type_err("length", v))
}

fn reverse(v: &Value) -> AltarResult<Value> {
    match v {
        Value::Seq(items) => {
            let mut v = (**items).clone();
            v.reverse();
            Ok(Value::seq(v))
        }
        Value::Str(s) | Value::SafeStr(s) => Ok(Value::str(s.chars().rev().collect::<String>())),
        other => Err(type_err("reverse", other)),
    }
}

fn sort_filter(v: &Value, args: &[Value], kwargs: &IndexMap<String, Value>) -> AltarResult<Value> {
    let mut items = seq(v)?;
    let reverse = kwargs.get("reverse").map(Value::is_truthy).unwrap_or_else(|| arg_bool(args, 1));
    // Open Question resolution: default sort is case-insensitive for strings.
    let case_sensitive = kwargs.get("case_sensitive").map(Value::is_truthy).unwrap_or_else(|| arg_bool(args, 0));
    let attribute = kwargs.get("attribute").and_then(Value::as_str).map(str::to_string);

    let key_of = |v: &Value| -> Value {
        let v = match &attribute {
            Some(attr) => v.as_map().and_then(|m| m.get(attr)).cloned().unwrap_or(Value::Undefined),
            None => v.clone(),
        };
        if !case_sensitive {
            if let Some(s) = v.as_str() {
                return Value::str(s.to_lowercase());
            }
        }
        v
    };

    items.sort_by(|a, b| key_of(a).partial_cmp(&key_of(b)).unwrap_or(std::cmp::Ordering::Equal));
    if reverse {
        items.reverse();
    }
    Ok(Value::seq(items))
}

/// `groupby(attr)`: groups items by `item[attr]`, returning `(grouper, list)`
/// pairs sorted by grouper, each grouper's list in original relative order.
fn groupby_filter(v: &Value, args: &[Value]) -> AltarResult<Value> {
    let items = seq(v)?;
    let attr = arg_str(args, 0)?;
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    for item in items {
        let key = item.as_map().and_then(|m| m.get(&attr)).cloned().unwrap_or(Value::Undefined);
        match groups.iter_mut().find(|(k, _)| k == &key) {
            Some((_, bucket)) => bucket.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    groups.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(Value::seq(
        groups
            .into_iter()
            .map(|(key, bucket)| Value::seq(vec![key, Value::seq(bucket)]))
            .collect(),
    ))
}

fn sum_filter(v: &Value, args: &[Value]) -> AltarResult<Value> {
    let items = seq(v)?;
    let attr = arg_str(args, 0).ok();
    let start = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
    let mut total = start;
    let mut is_float = start.fract() != 0.0;
    for item in &items {
        let v = match &attr {
            Some(name) => item.as_map().and_then(|m| m.get(name)).cloned().unwrap_or(Value::Undefined),
            None => item.clone(),
        };
        if matches!(v, Value::Float(_)) {
            is_float = true;
        }
        total += v.as_f64().unwrap_or(0.0);
    }
    Ok(if is_float { Value::Float(total) } else { Value::Int(total as i64) })
}

fn extremum(v: &Value, want_min: bool) -> AltarResult<Value> {
    let items = seq(v)?;
    let mut best: Option<Value> = None;
    for item in items {
        best = Some(match best {
            None => item,
            Some(current) => {
                let ordering = item.partial_cmp(&current).unwrap_or(std::cmp::Ordering::Equal);
                if (want_min && ordering == std::cmp::Ordering::Less)
                    || (!want_min && ordering == std::cmp::Ordering::Greater)
                {
                    item
                } else {
                    current
                }
            }
        });
    }
    Ok(best.unwrap_or(Value::Undefined))
}

fn default_filter(v: &Value, args: &[Value], kwargs: &IndexMap<String, Value>) -> AltarResult<Value> {
    let default = args.first().cloned().unwrap_or_else(|| Value::str(""));
    let treat_falsy_as_default = kwargs.get("boolean").map(Value::is_truthy).unwrap_or_else(|| arg_bool(args, 1));
    if v.is_undefined() || (treat_falsy_as_default && !v.is_truthy()) {
        Ok(default)
    } else {
        Ok(v.clone())
    }
}

fn escape(v: &Value) -> Value {
    if v.is_safe() {
        return v.clone();
    }
    Value::safe(crate::eval::html_escape(&v.render_to_string()))
}

fn arg_str(args: &[Value], i: usize) -> AltarResult<String> {
    args.get(i)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::render(format!("expected a string argument at position {i}"), Position::unknown()))
}

fn arg_int(args: &[Value], i: usize) -> Option<i64> {
    args.get(i).and_then(Value::as_int)
}

fn arg_bool(args: &[Value], i: usize) -> bool {
    args.get(i).map(Value::is_truthy).unwrap_or(false)
}

fn empty_seq_error(name: &str) -> Error {
    Error::render(format!("'{name}' applied to an empty sequence"), Position::unknown())
}

fn type_err(filter: &str, v: &Value) -> Error {
    Error::render(
        format!("filter '{filter}' cannot be applied to a {}", v.type_name()),
        Position::unknown(),
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn replace_n(s: &str, old: &str, new: &str, count: usize) -> String {
    if old.is_empty() {
        return s.to_string();
    }
    let mut out = String::new();
    let mut rest = s;
    let mut done = 0;
    while done < count {
        match rest.find(old) {
            Some(i) => {
                out.push_str(&rest[..i]);
                out.push_str(new);
                rest = &rest[i + old.len()..];
                done += 1;
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn center(s: &str, width: usize) -> String {
    let len = s.width();
    if len >= width {
        return s.to_string();
    }
    let total_pad = width - len;
    let left = total_pad / 2;
    let right = total_pad - left;
    format!("{}{}{}", " ".repeat(left), s, " ".repeat(right))
}

fn indent(s: &str, width: usize, first: bool, blank: bool) -> String {
    let pad = " ".repeat(width);
    let lines: Vec<&str> = s.split('\n').collect();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 && !first {
                line.to_string()
            } else if line.is_empty() && !blank {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(s: &str, length: usize, killwords: bool, end: &str) -> String {
    if s.chars().count() <= length {
        return s.to_string();
    }
    if killwords {
        let cut = length.saturating_sub(end.chars().count());
        let truncated: String = s.chars().take(cut).collect();
        format!("{truncated}{end}")
    } else {
        let cut = length.saturating_sub(end.chars().count());
        let truncated: String = s.chars().take(cut).collect();
        match truncated.rfind(' ') {
            Some(i) => format!("{}{end}", &truncated[..i]),
            None => format!("{truncated}{end}"),
        }
    }
}

fn wordwrap(s: &str, width: usize) -> String {
    let mut lines = Vec::new();
    for paragraph in s.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.width() + 1 + word.width() > width {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            } else {
                current.push(' ');
                current.push_str(word);
            }
        }
        lines.push(current);
    }
    lines.join("\n")
}

fn striptags(s: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn urlencode(s: &str) -> String {
    let mut out = String::new();
    for b in s.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn slice_into(items: Vec<Value>, parts: usize, fill: Option<Value>) -> Vec<Value> {
    let len = items.len();
    let per = len / parts;
    let extra = len % parts;
    let mut out = Vec::with_capacity(parts);
    let mut offset = 0;
    for i in 0..parts {
        let take = per + if i < extra { 1 } else { 0 };
        let mut chunk: Vec<Value> = items[offset..offset + take].to_vec();
        offset += take;
        if let Some(fill) = &fill {
            if i >= extra && extra > 0 {
                chunk.push(fill.clone());
            }
        }
        out.push(Value::seq(chunk));
    }
    out
}

fn filesizeformat(bytes: f64, binary: bool) -> String {
    let base: f64 = if binary { 1024.0 } else { 1000.0 };
    let units: &[&str] = if binary {
        &["Bytes", "KiB", "MiB", "GiB", "TiB", "PiB"]
    } else {
        &["Bytes", "kB", "MB", "GB", "TB", "PB"]
    };
    if bytes.abs() < base {
        return format!("{} Bytes", bytes as i64);
    }
    let mut value = bytes;
    let mut unit_index = 0;
    while value.abs() >= base && unit_index < units.len() - 1 {
        value /= base;
        unit_index += 1;
    }
    format!("{value:.1} {}", units[unit_index])
}

fn pprint(v: &Value, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    match v {
        Value::Seq(items) => {
            let inner: Vec<String> = items.iter().map(|i| format!("{pad}  {}", pprint(i, depth + 1))).collect();
            format!("[\n{}\n{pad}]", inner.join(",\n"))
        }
        Value::Map(m) => {
            let inner: Vec<String> = m
                .iter()
                .map(|(k, val)| format!("{pad}  {k:?}: {}", pprint(val, depth + 1)))
                .collect();
            format!("{{\n{}\n{pad}}}", inner.join(",\n"))
        }
        Value::Str(s) | Value::SafeStr(s) => format!("{s:?}"),
        other => other.render_to_string(),
    }
}

fn tojson(v: &Value) -> String {
    match v {
        Value::Undefined | Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) | Value::SafeStr(s) => serde_json::to_string(s.as_ref()).unwrap_or_default(),
        Value::Seq(items) => {
            let parts: Vec<String> = items.iter().map(tojson).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Map(m) => {
            let parts: Vec<String> = m
                .iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), tojson(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Macro(_) => "null".to_string(),
    }
}

fn printf_format(fmt: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut arg_iter = args.iter();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(&next) = chars.peek() {
                if next == '%' {
                    chars.next();
                    out.push('%');
                    continue;
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' || d == '-' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(spec) = chars.next() {
                    let value = arg_iter.next().cloned().unwrap_or(Value::Undefined);
                    match spec {
                        's' => out.push_str(&value.render_to_string()),
                        'd' => out.push_str(&value.as_int().unwrap_or(0).to_string()),
                        'f' => out.push_str(&format!("{:.6}", value.as_f64().unwrap_or(0.0))),
                        other => out.push(other),
                    }
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn dateformat(s: &str, fmt: &str) -> String {
    // No date/time crate is part of the carried-over stack, so this
    // mirrors only the literal substitution the input already provides --
    // a real strftime-like formatter is out of scope without `chrono`.
    let _ = fmt;
    s.to_string()
}
