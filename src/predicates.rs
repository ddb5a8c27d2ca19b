//! The test table (`is defined`, `is odd`, ...), spec §4.4's Tests list.
//! Same table-of-closures shape as `filters::build_table`, keyed by test
//! name and returning `bool` instead of `Value`.

use crate::engine::TestFn;
use crate::error::AltarResult;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub fn build_table() -> HashMap<String, TestFn> {
    let mut m: HashMap<String, TestFn> = HashMap::new();
    macro_rules! reg {
        ($name:expr, $f:expr) => {
            m.insert($name.to_string(), Arc::new($f) as TestFn);
        };
    }

    reg!("defined", |v: &Value, _a: &[Value]| Ok(!v.is_undefined()));
    reg!("undefined", |v: &Value, _a: &[Value]| Ok(v.is_undefined()));
    reg!("none", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Null)));
    reg!("boolean", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Bool(_))));
    reg!("true", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Bool(true))));
    reg!("false", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Bool(false))));
    reg!("number", |v: &Value, _a: &[Value]| {
        Ok(matches!(v, Value::Int(_) | Value::Float(_)))
    });
    reg!("integer", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Int(_))));
    reg!("float", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Float(_))));
    reg!("string", |v: &Value, _a: &[Value]| {
        Ok(matches!(v, Value::Str(_) | Value::SafeStr(_)))
    });
    reg!("sequence", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Seq(_))));
    reg!("mapping", |v: &Value, _a: &[Value]| Ok(matches!(v, Value::Map(_))));
    reg!("iterable", |v: &Value, _a: &[Value]| {
        Ok(matches!(
            v,
            Value::Seq(_) | Value::Map(_) | Value::Str(_) | Value::SafeStr(_)
        ))
    });
    reg!("lower", |v: &Value, _a: &[Value]| {
        Ok(v.as_str().map(|s| s == s.to_lowercase()).unwrap_or(false))
    });
    reg!("upper", |v: &Value, _a: &[Value]| {
        Ok(v.as_str().map(|s| s == s.to_uppercase()).unwrap_or(false))
    });
    reg!("odd", |v: &Value, _a: &[Value]| {
        Ok(v.as_int().map(|i| i % 2 != 0).unwrap_or(false))
    });
    reg!("even", |v: &Value, _a: &[Value]| {
        Ok(v.as_int().map(|i| i % 2 == 0).unwrap_or(false))
    });
    reg!("divisibleby", |v: &Value, a: &[Value]| {
        let divisor = a.first().and_then(Value::as_int).unwrap_or(1);
        Ok(divisor != 0 && v.as_int().map(|i| i % divisor == 0).unwrap_or(false))
    });
    reg!("eq", |v: &Value, a: &[Value]| Ok(a.first().map(|o| o == v).unwrap_or(false)));
    reg!("equalto", |v: &Value, a: &[Value]| Ok(a.first().map(|o| o == v).unwrap_or(false)));
    reg!("==", |v: &Value, a: &[Value]| Ok(a.first().map(|o| o == v).unwrap_or(false)));
    reg!("ne", |v: &Value, a: &[Value]| Ok(a.first().map(|o| o != v).unwrap_or(true)));
    reg!("lt", |v: &Value, a: &[Value]| {
        Ok(a.first().and_then(|o| v.partial_cmp(o)) == Some(std::cmp::Ordering::Less))
    });
    reg!("le", |v: &Value, a: &[Value]| {
        Ok(matches!(
            a.first().and_then(|o| v.partial_cmp(o)),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ))
    });
    reg!("gt", |v: &Value, a: &[Value]| {
        Ok(a.first().and_then(|o| v.partial_cmp(o)) == Some(std::cmp::Ordering::Greater))
    });
    reg!("ge", |v: &Value, a: &[Value]| {
        Ok(matches!(
            a.first().and_then(|o| v.partial_cmp(o)),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ))
    });
    reg!("in", |v: &Value, a: &[Value]| {
        Ok(match a.first() {
            Some(Value::Seq(items)) => items.contains(v),
            Some(Value::Map(m)) => v.as_str().is_some_and(|k| m.contains_key(k)),
            Some(Value::Str(s)) | Some(Value::SafeStr(s)) => v.as_str().is_some_and(|n| s.contains(n)),
            _ => false,
        })
    });
    reg!("sameas", |v: &Value, a: &[Value]| Ok(a.first().map(|o| same_identity(v, o)).unwrap_or(false)));
    reg!("escaped", |v: &Value, _a: &[Value]| Ok(v.is_safe()));

    m
}

fn same_identity(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Seq(x), Value::Seq(y)) => std::rc::Rc::ptr_eq(x, y),
        (Value::Map(x), Value::Map(y)) => std::rc::Rc::ptr_eq(x, y),
        _ => a == b,
    }
}

#[allow(unused)]
fn _assert_signature(_f: impl Fn(&Value, &[Value]) -> AltarResult<bool>) {}
