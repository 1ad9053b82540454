//! Host extension points: `registerBuiltin` / `registerHostClass`.
//!
//! The engine never ships a standard library of its own — a host
//! embedding it supplies built-in functions and host-backed classes
//! (file handles, database cursors, anything needing native state)
//! through this surface and the evaluator treats them exactly like
//! script-defined functions and classes at call sites.

use std::rc::Rc;

use crate::control::{Control, RunResult};
use crate::errors::ExcKind;
use crate::interpreter::Interpreter;
use crate::value::Value;

pub type BuiltinFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> RunResult<Value>>;

/// A host-implemented class body. Host classes participate in
/// `instanceof`, construction, method dispatch, and property access,
/// owning their state outside the ordinary `Object::properties` map —
/// a `HostClass` impl is free to tag whatever receiver shape it
/// returns from `construct` with its own native state.
pub trait HostClass {
    fn class_name(&self) -> &str;

    /// Handles `new HostClass(...)`, returning the receiver value to
    /// bind (typically a host-tagged `Value::Object`). The default
    /// rejects construction for host classes that only expose static
    /// or free-function-style behavior through `call_method`.
    fn construct(&self, interp: &mut Interpreter, args: &[Value]) -> RunResult<Value> {
        let _ = (interp, args);
        Err(Control::fatal(ExcKind::FatalError, format!("cannot instantiate host class {}", self.class_name())))
    }

    fn call_method(&self, interp: &mut Interpreter, receiver: &Value, method: &str, args: &[Value]) -> RunResult<Value>;

    /// Reads a property off a host-backed receiver. `Ok(None)` means
    /// "no such property," letting the evaluator fall back to its
    /// ordinary missing-property behavior. Default: no host-backed
    /// properties.
    fn get_property(&self, interp: &mut Interpreter, receiver: &Value, name: &str) -> RunResult<Option<Value>> {
        let _ = (interp, receiver, name);
        Ok(None)
    }

    /// Writes a property onto a host-backed receiver. Default: host
    /// classes are read-only from script code unless overridden.
    fn set_property(&self, interp: &mut Interpreter, receiver: &Value, name: &str, value: Value) -> RunResult<()> {
        let _ = (interp, receiver, value);
        Err(Control::fatal(ExcKind::FatalError, format!("cannot write property {name} on host class {}", self.class_name())))
    }
}
