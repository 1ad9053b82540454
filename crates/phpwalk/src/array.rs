//! `Array`: an insertion-ordered hybrid int/string map.
//!
//! An order-preserving map wrapping `indexmap::IndexMap`, adapted to
//! PHP-family arrays: keys are `int | string`, and a monotone
//! `next_int_key` tracks the next auto-assigned integer key.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(Rc<str>),
}

impl ArrayKey {
    pub fn from_value(v: &Value) -> ArrayKey {
        match v.deref_clone() {
            Value::Int(i) => ArrayKey::Int(i),
            Value::Str(s) => match s.parse::<i64>() {
                // a decimal-integer-looking string key is canonicalized to
                // an int key, matching PHP-family array key normalization.
                Ok(i) if i.to_string() == *s => ArrayKey::Int(i),
                _ => ArrayKey::Str(s),
            },
            Value::Bool(b) => ArrayKey::Int(b as i64),
            Value::Float(f) => ArrayKey::Int(f as i64),
            Value::Null => ArrayKey::Str(Rc::from("")),
            other => ArrayKey::Str(Rc::from(other.type_name())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::Int(*i),
            ArrayKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// An insertion-ordered map with `ArrayKey` keys. `keys` (the
/// iteration order) and `elements` (lookup) are kept in lock-step by
/// `IndexMap`'s own guarantee that removal and insertion order match
/// iteration order, so every key in `elements` appears exactly once in
/// `keys` without needing a second vector to enforce it.
#[derive(Debug, Clone, Default)]
pub struct Array {
    elements: IndexMap<ArrayKey, Value>,
    next_int_key: i64,
}

impl Array {
    pub fn new() -> Self {
        Array { elements: IndexMap::new(), next_int_key: 0 }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.elements.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.elements.iter()
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.elements.get(key)
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.elements.contains_key(key)
    }

    /// Inserts at an explicit key, overwriting the value but retaining
    /// the existing position in `keys` if already present.
    pub fn insert(&mut self, key: ArrayKey, value: Value) {
        if let ArrayKey::Int(i) = &key {
            if *i >= self.next_int_key {
                self.next_int_key = i.saturating_add(1);
            }
        }
        self.elements.insert(key, value);
    }

    /// Appends using the next auto-assigned integer key.
    pub fn push(&mut self, value: Value) {
        let key = ArrayKey::Int(self.next_int_key);
        self.next_int_key = self.next_int_key.saturating_add(1);
        self.elements.insert(key, value);
    }

    pub fn remove(&mut self, key: &ArrayKey) -> Option<Value> {
        self.elements.shift_remove(key)
    }

    pub fn next_int_key(&self) -> i64 {
        self.next_int_key
    }

    /// Renumbers integer keys starting at 0 while preserving string
    /// keys, used by `array_values`-style spread-into-literal
    /// semantics.
    pub fn renumbered(&self) -> Array {
        let mut out = Array::new();
        for (key, value) in &self.elements {
            match key {
                ArrayKey::Int(_) => out.push(value.clone()),
                ArrayKey::Str(s) => out.insert(ArrayKey::Str(s.clone()), value.clone()),
            }
        }
        out
    }
}

impl PartialEq for Array {
    /// Size-then-pairwise comparison: arrays compare loosely equal by
    /// size first, then by key/value pairwise.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.elements.iter().all(|(k, v)| other.get(k).is_some_and(|ov| crate::coercion::loose_eq(v, ov)))
    }
}

impl FromIterator<(ArrayKey, Value)> for Array {
    fn from_iter<T: IntoIterator<Item = (ArrayKey, Value)>>(iter: T) -> Self {
        let mut arr = Array::new();
        for (k, v) in iter {
            arr.insert(k, v);
        }
        arr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_monotone_keys_never_reused() {
        let mut arr = Array::new();
        arr.push(Value::Int(10));
        arr.insert(ArrayKey::Int(5), Value::Int(20));
        arr.push(Value::Int(30));
        assert_eq!(arr.next_int_key(), 6);
        let keys: Vec<_> = arr.keys().cloned().collect();
        assert_eq!(keys, vec![ArrayKey::Int(0), ArrayKey::Int(5), ArrayKey::Int(6)]);
    }

    #[test]
    fn overwrite_retains_position() {
        let mut arr = Array::new();
        arr.insert(ArrayKey::Str(Rc::from("a")), Value::Int(1));
        arr.insert(ArrayKey::Str(Rc::from("b")), Value::Int(2));
        arr.insert(ArrayKey::Str(Rc::from("a")), Value::Int(99));
        let keys: Vec<_> = arr.keys().cloned().collect();
        assert_eq!(keys, vec![ArrayKey::Str(Rc::from("a")), ArrayKey::Str(Rc::from("b"))]);
        assert!(matches!(arr.get(&ArrayKey::Str(Rc::from("a"))), Some(Value::Int(99))));
    }

    #[test]
    fn numeric_string_key_canonicalizes_to_int() {
        assert_eq!(ArrayKey::from_value(&Value::str("42")), ArrayKey::Int(42));
        assert_eq!(ArrayKey::from_value(&Value::str("042")), ArrayKey::Str(Rc::from("042")));
    }

    #[test]
    fn clone_is_a_deep_value_copy() {
        let mut a = Array::new();
        a.push(Value::Int(1));
        let mut b = a.clone();
        b.push(Value::Int(2));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
    }
}
