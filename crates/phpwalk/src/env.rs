//! Environment / scope chain.
//!
//! Each call installs a fresh top-level [`Scope`]; there is no dynamic
//! scoping. The only place an "enclosing" lexical relationship matters
//! is closure/arrow construction, and that is resolved once, at
//! construction time, by copying the named captures into the new
//! frame's own table (see [`crate::function::Closure`]) rather than by
//! a live parent pointer walked on every lookup — equivalent for a
//! single level, and for nested closures each level's captured
//! snapshot already contains whatever its own enclosing closure
//! needed, so the effect composes without an actual multi-hop chain.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::value::Value;

#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<AHashMap<Rc<str>, Value>>,
}

impl Scope {
    pub fn new() -> Rc<Scope> {
        Rc::new(Scope { vars: RefCell::new(AHashMap::new()) })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).map(|v| v.deref_clone())
    }

    /// Returns the raw stored value, which may be a `Value::Reference`
    /// cell — used when another binding needs to alias the same slot
    /// (by-ref parameters, `use (&$x)`, `foreach ($a as &$v)`).
    pub fn get_raw(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    /// Sets `name`, writing through an existing `Reference` cell if
    /// present so aliases observe the update, otherwise rebinding the
    /// slot directly.
    pub fn set(&self, name: Rc<str>, value: Value) {
        let mut vars = self.vars.borrow_mut();
        if let Some(Value::Reference(cell)) = vars.get(&name) {
            *cell.borrow_mut() = value;
        } else {
            vars.insert(name, value);
        }
    }

    /// Forces `name` to hold the given raw value (including
    /// `Value::Reference` cells themselves), bypassing the
    /// write-through-reference behavior of [`Self::set`]. Used to
    /// install a shared reference cell for by-ref bindings.
    pub fn bind_raw(&self, name: Rc<str>, value: Value) {
        self.vars.borrow_mut().insert(name, value);
    }

    pub fn unset(&self, name: &str) {
        self.vars.borrow_mut().remove(name);
    }

    /// Snapshots every raw binding (including `Reference` cells
    /// themselves), used to copy a closure's captured scope into a
    /// fresh call frame at invocation time.
    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.vars.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Promotes `name` to a shared `Reference` cell (creating it as
    /// `null` if unset) and returns the cell, for `use (&$x)` captures
    /// and `foreach ($a as &$v)` bindings.
    pub fn reference_cell(&self, name: &Rc<str>) -> Rc<RefCell<Value>> {
        let mut vars = self.vars.borrow_mut();
        if let Some(Value::Reference(cell)) = vars.get(name) {
            return cell.clone();
        }
        let current = vars.get(name).map(|v| v.deref_clone()).unwrap_or(Value::Null);
        let cell = Rc::new(RefCell::new(current));
        vars.insert(name.clone(), Value::Reference(cell.clone()));
        cell
    }
}
