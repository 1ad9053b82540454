//! Value coercion & comparison rules.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::array::Array;
use crate::object::Identity;
use crate::value::Value;

/// ToBool: `false`, `null`, `0`, `0.0`, `""`, `"0"`, `[]`
/// give `false`; everything else `true`.
pub fn to_bool(v: &Value) -> bool {
    match v.deref_clone() {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Int(i) => i != 0,
        Value::Float(f) => f != 0.0,
        Value::Str(s) => !(s.is_empty() || &*s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) | Value::Callable(_) | Value::Generator(_) => true,
        Value::Reference(_) => unreachable!("deref_clone resolves references"),
    }
}

/// Parses a leading signed integer from a string; missing prefix gives
/// `0`.
pub fn str_to_int(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digit_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digit_start {
        return 0;
    }
    trimmed[..end].parse().unwrap_or(0)
}

/// Extends integer parsing to scientific notation floats.
pub fn str_to_float(s: &str) -> f64 {
    let trimmed = s.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    while end < bytes.len()
        && (bytes[end].is_ascii_digit()
            || matches!(bytes[end], b'+' | b'-' | b'.' | b'e' | b'E')
            || (end > 0 && matches!(bytes[end], b'e' | b'E')))
    {
        end += 1;
    }
    trimmed[..end].parse().unwrap_or(0.0)
}

/// Is this string "numeric" for the purposes of §4.1's string-numeric
/// comparison rules?
pub fn is_numeric_str(s: &str) -> bool {
    let t = s.trim();
    !t.is_empty() && (t.parse::<i64>().is_ok() || t.parse::<f64>().is_ok())
}

pub fn to_int(v: &Value) -> i64 {
    match v.deref_clone() {
        Value::Null => 0,
        Value::Bool(b) => b as i64,
        Value::Int(i) => i,
        Value::Float(f) => f as i64,
        Value::Str(s) => str_to_int(&s),
        Value::Array(a) => i64::from(!a.is_empty()),
        _ => 1,
    }
}

pub fn to_float(v: &Value) -> f64 {
    match v.deref_clone() {
        Value::Null => 0.0,
        Value::Bool(b) => b as i64 as f64,
        Value::Int(i) => i as f64,
        Value::Float(f) => f,
        Value::Str(s) => str_to_float(&s),
        Value::Array(a) => i64::from(!a.is_empty()) as f64,
        _ => 1.0,
    }
}

/// ToString for `.`-concatenation contexts; object coercion through
/// `__toString` happens one level up, in `eval::expr`, where the
/// interpreter is in scope to dispatch the magic method.
pub fn to_display_string(v: &Value) -> String {
    match v.deref_clone() {
        Value::Null => String::new(),
        Value::Bool(b) => if b { "1" } else { "" }.to_owned(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(f),
        Value::Str(s) => s.to_string(),
        Value::Array(_) => "Array".to_owned(),
        Value::Object(o) => format!("object({})", o.borrow().class_name()),
        Value::Callable(_) => "Closure".to_owned(),
        Value::Generator(_) => "Generator".to_owned(),
        Value::Reference(_) => unreachable!("deref_clone resolves references"),
    }
}

fn format_float(f: f64) -> String {
    if f == f.trunc() && f.is_finite() && f.abs() < 1e15 {
        format!("{f:.0}")
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_owned() } else { "-INF".to_owned() }
    } else if f.is_nan() {
        "NAN".to_owned()
    } else {
        format!("{f}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Numeric {
    Neither,
    Both,
}

fn both_numeric_strings(a: &str, b: &str) -> Numeric {
    if is_numeric_str(a) && is_numeric_str(b) { Numeric::Both } else { Numeric::Neither }
}

/// Loose equality (`==`), coercing operands toward a common type
/// before comparing.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    let a = a.deref_clone();
    let b = b.deref_clone();
    match (&a, &b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, Value::Bool(x)) | (Value::Bool(x), Value::Null) => !*x,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(_), _) | (_, Value::Bool(_)) => to_bool(&a) == to_bool(&b),
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => to_float(&a) == to_float(&b),
        (Value::Str(x), Value::Str(y)) => {
            if both_numeric_strings(x, y) == Numeric::Both { to_float(&a) == to_float(&b) } else { x == y }
        }
        (Value::Str(s), Value::Int(_) | Value::Float(_)) | (Value::Int(_) | Value::Float(_), Value::Str(s)) => {
            if is_numeric_str(s) { to_float(&a) == to_float(&b) } else { false }
        }
        (Value::Array(x), Value::Array(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.borrow().identity == y.borrow().identity,
        (Value::Null, Value::Array(arr)) | (Value::Array(arr), Value::Null) => arr.is_empty(),
        _ => false,
    }
}

/// Strict equality (`===`): identical type and value; objects require
/// identity.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    let a = a.deref_clone();
    let b = b.deref_clone();
    match (&a, &b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|((k1, v1), (k2, v2))| k1 == k2 && strict_eq(v1, v2))
        }
        (Value::Object(x), Value::Object(y)) => object_identity(x) == object_identity(y),
        _ => false,
    }
}

fn object_identity(o: &crate::object::ObjectHandle) -> Identity {
    o.borrow().identity
}

/// Ordering for `<`, `>`, `<=`, `>=`, and the spaceship operator,
/// applying the same coercion ladder as `loose_eq`.
pub fn loose_cmp(a: &Value, b: &Value) -> Ordering {
    let a = a.deref_clone();
    let b = b.deref_clone();
    match (&a, &b) {
        (Value::Str(x), Value::Str(y)) => {
            if both_numeric_strings(x, y) == Numeric::Both {
                to_float(&a).partial_cmp(&to_float(&b)).unwrap_or(Ordering::Equal)
            } else {
                x.as_bytes().cmp(y.as_bytes())
            }
        }
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()),
        _ => to_float(&a).partial_cmp(&to_float(&b)).unwrap_or(Ordering::Equal),
    }
}

/// Arithmetic numeric widening: int/int stays int
/// except uneven division; any float operand promotes to float.
#[derive(Debug, Clone, Copy)]
pub enum Num {
    Int(i64),
    Float(f64),
}

pub fn to_num(v: &Value) -> Num {
    match v.deref_clone() {
        Value::Int(i) => Num::Int(i),
        Value::Float(f) => Num::Float(f),
        Value::Str(s) => {
            if !is_numeric_str(&s) {
                Num::Int(0)
            } else if s.contains(['.', 'e', 'E']) {
                Num::Float(str_to_float(&s))
            } else {
                Num::Int(str_to_int(&s))
            }
        }
        other => Num::Int(to_int(&other)),
    }
}

pub fn array_from_pairs(pairs: Vec<(Value, Value)>) -> Array {
    pairs
        .into_iter()
        .map(|(k, v)| (crate::array::ArrayKey::from_value(&k), v))
        .collect()
}

pub fn concat(a: &Value, b: &Value) -> Rc<str> {
    let mut s = to_display_string(a);
    s.push_str(&to_display_string(b));
    Rc::from(s)
}
