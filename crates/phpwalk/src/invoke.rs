//! Argument binding and call-frame bookkeeping.
//!
//! Binding proceeds in stages: collect, bind by name, fill by
//! position, apply defaults, and reject what's left over.
//! `$this`/`self::`/`static::`/`parent::` resolution is carried
//! alongside the bound arguments as a small `CallContext` rather than
//! smuggled through extra `Scope` entries, so method dispatch in
//! `eval::expr` can read it without string-keyed lookups.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::array::Array;
use crate::ast::{Expr, Param};
use crate::class::ClassId;
use crate::control::{Control, RunResult};
use crate::errors::ExcKind;
use crate::object::ObjectHandle;
use crate::value::Value;

pub struct EvaluatedArg {
    pub name: Option<Rc<str>>,
    pub value: Value,
}

/// `self::`/`static::`/`parent::`/`$this` resolution for one activation
///.
#[derive(Clone, Default)]
pub struct CallContext {
    pub this: Option<ObjectHandle>,
    /// The class whose body lexically contains the executing method;
    /// `self::` and `parent::` resolve against this.
    pub defining_class: Option<ClassId>,
    /// The class the call was originally dispatched on; `static::`
    /// resolves against this and is threaded unchanged through calls
    /// made via `parent::`/`self::` from inside it.
    pub static_class: Option<ClassId>,
}

/// Matches evaluated call-site arguments against a parameter list:
/// named arguments bind first, then remaining positional arguments fill
/// left-to-right, then defaults, then a trailing variadic parameter
/// absorbs whatever positional arguments are left. Too few non-default
/// arguments or leftover arguments with nowhere to go raise
/// `ArgumentCountError`.
pub fn bind_arguments(
    params: &[Param],
    args: Vec<EvaluatedArg>,
    mut eval_default: impl FnMut(&Expr) -> RunResult<Value>,
) -> RunResult<SmallVec<[(Rc<str>, Value); 4]>> {
    let mut named: AHashMap<Rc<str>, Value> = AHashMap::new();
    // Most calls pass a handful of arguments; `SmallVec` keeps that
    // common case off the heap entirely.
    let mut positional: SmallVec<[Value; 4]> = SmallVec::new();
    let mut seen_named = false;
    for arg in args {
        match arg.name {
            Some(n) => {
                seen_named = true;
                named.insert(n, arg.value);
            }
            None => {
                if seen_named {
                    return Err(Control::fatal(ExcKind::ArgumentCountError, "positional argument follows named argument"));
                }
                positional.push(arg.value);
            }
        }
    }

    let mut bound = SmallVec::with_capacity(params.len());
    let mut pos_iter = positional.into_iter();

    for param in params {
        if param.variadic {
            let mut arr = Array::new();
            for v in pos_iter.by_ref() {
                arr.push(v);
            }
            bound.push((param.name.clone(), Value::Array(arr)));
            break;
        }
        if let Some(v) = named.remove(&param.name) {
            bound.push((param.name.clone(), v));
            continue;
        }
        if let Some(v) = pos_iter.next() {
            bound.push((param.name.clone(), v));
            continue;
        }
        if let Some(default) = &param.default {
            bound.push((param.name.clone(), eval_default(default)?));
            continue;
        }
        return Err(Control::fatal(ExcKind::ArgumentCountError, format!("missing argument ${}", param.name)));
    }

    if !named.is_empty() {
        let extra: Vec<String> = named.keys().map(|k| k.to_string()).collect();
        return Err(Control::fatal(ExcKind::ArgumentCountError, format!("unknown named argument(s): {}", extra.join(", "))));
    }
    if pos_iter.next().is_some() && !params.iter().any(|p| p.variadic) {
        return Err(Control::fatal(ExcKind::ArgumentCountError, "too many arguments passed"));
    }

    Ok(bound)
}

const MAX_CALL_DEPTH: u32 = 4096;

thread_local! {
    static CALL_DEPTH: RefCell<u32> = const { RefCell::new(0) };
    static CALL_STACK: RefCell<Vec<CallContext>> = const { RefCell::new(Vec::new()) };
}

/// Reads the `self::`/`static::`/`$this` context of whichever
/// activation is currently running on this thread. Returns
/// the default (all-`None`) context at top level, where none of those
/// are meaningful.
pub fn current_call_context() -> CallContext {
    CALL_STACK.with(|s| s.borrow().last().cloned().unwrap_or_default())
}

/// Bumps the per-thread call depth counter and pushes `ctx` onto the
/// per-thread call-context stack for the lifetime of one activation,
/// restoring both on drop (including on unwind through `?`). Per-thread
/// rather than per-interpreter because each generator body runs on its
/// own dedicated OS thread (see [`crate::generator`]) and must not
/// share its caller's remaining depth budget or call context.
pub struct CallGuard(());

impl CallGuard {
    pub fn enter(ctx: CallContext) -> RunResult<CallGuard> {
        CALL_DEPTH.with(|d| {
            let mut d = d.borrow_mut();
            if *d >= MAX_CALL_DEPTH {
                return Err(Control::fatal(ExcKind::StackOverflow, "maximum call depth exceeded"));
            }
            *d += 1;
            Ok(())
        })?;
        CALL_STACK.with(|s| s.borrow_mut().push(ctx));
        Ok(CallGuard(()))
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|d| *d.borrow_mut() -= 1);
        CALL_STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder;

    fn param(name: &str, default: Option<Expr>, variadic: bool) -> Param {
        Param { name: builder::name(name), default, by_ref: false, variadic, promote: None }
    }

    #[test]
    fn positional_and_default_fill_left_to_right() {
        let params = vec![param("a", None, false), param("b", Some(builder::int(9)), false)];
        let args = vec![EvaluatedArg { name: None, value: Value::Int(1) }];
        let bound = bind_arguments(&params, args, |e| match e {
            Expr::Int(i, _) => Ok(Value::Int(*i)),
            _ => unreachable!(),
        })
        .unwrap();
        assert_eq!(bound.len(), 2);
        assert!(matches!(bound[1].1, Value::Int(9)));
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        let params = vec![param("a", None, false)];
        let err = bind_arguments(&params, vec![], |_| unreachable!()).unwrap_err();
        assert!(matches!(err, Control::Exception(_)));
    }

    #[test]
    fn variadic_absorbs_trailing_positional_args() {
        let params = vec![param("first", None, false), param("rest", None, true)];
        let args = vec![
            EvaluatedArg { name: None, value: Value::Int(1) },
            EvaluatedArg { name: None, value: Value::Int(2) },
            EvaluatedArg { name: None, value: Value::Int(3) },
        ];
        let bound = bind_arguments(&params, args, |_| unreachable!()).unwrap();
        match &bound[1].1 {
            Value::Array(arr) => assert_eq!(arr.len(), 2),
            _ => panic!("expected array"),
        }
    }
}
