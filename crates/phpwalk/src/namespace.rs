//! Process-global function/class/constant tables: "Three
//! sibling namespaces — functions, classes, constants — are
//! process-global and case-insensitive (function/class names) or
//! case-sensitive (constants)."

use std::cell::Cell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::class::ClassRegistry;
use crate::control::{Control, RunResult};
use crate::errors::ExcKind;
use crate::function::FunctionDef;
use crate::object::Identity;
use crate::registry::{BuiltinFn, HostClass};
use crate::value::Value;

/// The three process-global tables plus the host registries
/// (`registerBuiltin`/`registerHostClass`). Owned by one
/// [`crate::interpreter::Interpreter`] instance; separate interpreter
/// instances must be fully isolated from each other, which holds here
/// because nothing about `Globals` is a process-wide static — every
/// interpreter constructs its own.
pub struct Globals {
    pub functions: AHashMap<String, Rc<FunctionDef>>,
    pub classes: ClassRegistry,
    pub constants: AHashMap<String, Value>,
    pub builtins: AHashMap<String, BuiltinFn>,
    pub host_classes: AHashMap<String, Rc<dyn HostClass>>,
    next_identity: Cell<u64>,
}

impl Globals {
    pub fn new() -> Self {
        Globals {
            functions: AHashMap::new(),
            classes: ClassRegistry::new(),
            constants: AHashMap::new(),
            builtins: AHashMap::new(),
            host_classes: AHashMap::new(),
            next_identity: Cell::new(1),
        }
    }

    /// Allocates the next process-unique object identity.
    pub fn next_identity(&self) -> Identity {
        let id = self.next_identity.get();
        self.next_identity.set(id + 1);
        Identity(id)
    }

    pub fn define_function(&mut self, def: Rc<FunctionDef>) -> RunResult<()> {
        let key = def.name.to_ascii_lowercase();
        if self.functions.contains_key(&key) || self.builtins.contains_key(&key) {
            return Err(Control::fatal(ExcKind::Redeclaration, format!("function {} already declared", def.name)));
        }
        self.functions.insert(key, def);
        Ok(())
    }

    pub fn lookup_function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Constants "may be redefined only via specific API";
    /// `force` is that API (used by a host's `define()`-equivalent),
    /// normal program-level declarations go through `define_constant`.
    pub fn define_constant(&mut self, name: impl Into<String>, value: Value, force: bool) -> RunResult<()> {
        let name = name.into();
        if !force && self.constants.contains_key(&name) {
            return Err(Control::fatal(ExcKind::Redeclaration, format!("constant {name} already defined")));
        }
        self.constants.insert(name, value);
        Ok(())
    }

    pub fn lookup_constant(&self, name: &str) -> Option<Value> {
        self.constants.get(name).cloned()
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self::new()
    }
}
