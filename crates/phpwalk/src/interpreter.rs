//! The engine's embedding surface: `Interpreter`.
//!
//! A cheaply-`Clone`-able handle wrapping shared, interior-mutable
//! state (`Rc<RefCell<_>>`), an injectable output sink instead of
//! writing to real stdout, and a pluggable resource-limit hook
//! (`StepLimiter`) rather than a hardcoded timeout.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Program;
use crate::control::{Control, RunResult};
use crate::env::Scope;
use crate::errors::ExcKind;
use crate::namespace::Globals;
use crate::registry::{BuiltinFn, HostClass};
use crate::value::Value;

/// Hook for an embedder-supplied evaluation budget. `Interpreter::step` is called once per statement and once
/// per expression node by `eval::stmt`/`eval::expr`.
pub trait StepLimiter {
    fn step(&mut self) -> RunResult<()>;
}

pub struct NoLimit;

impl StepLimiter for NoLimit {
    fn step(&mut self) -> RunResult<()> {
        Ok(())
    }
}

/// A simple counting limiter good enough for embedders that just want
/// a hard ceiling on work done, without wiring up wall-clock checks.
pub struct CountingLimiter {
    remaining: u64,
}

impl CountingLimiter {
    pub fn new(budget: u64) -> Self {
        CountingLimiter { remaining: budget }
    }
}

impl StepLimiter for CountingLimiter {
    fn step(&mut self) -> RunResult<()> {
        if self.remaining == 0 {
            return Err(Control::fatal(ExcKind::StepLimitExceeded, "evaluation step limit exceeded"));
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// The top-level embedding handle. Cloning shares all state — globals, output
/// buffer, diagnostics, and the step limiter — which is what lets a
/// host keep a handle around across several `evaluate` calls against
/// the same class/function registry, the way a REPL or a request
/// pipeline would. Separate `Interpreter::new()` instances must stay
/// fully isolated from one another; nothing here is a process-wide
/// static, so that holds by construction.
#[derive(Clone)]
pub struct Interpreter {
    globals: Rc<RefCell<Globals>>,
    output: Rc<RefCell<String>>,
    diagnostics: Rc<RefCell<Vec<String>>>,
    limiter: Rc<RefCell<Box<dyn StepLimiter>>>,
    exit_code: Rc<RefCell<Option<i32>>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            globals: Rc::new(RefCell::new(Globals::new())),
            output: Rc::new(RefCell::new(String::new())),
            diagnostics: Rc::new(RefCell::new(Vec::new())),
            limiter: Rc::new(RefCell::new(Box::new(NoLimit))),
            exit_code: Rc::new(RefCell::new(None)),
        }
    }

    pub fn with_limits(mut self, limiter: impl StepLimiter + 'static) -> Self {
        self.limiter = Rc::new(RefCell::new(Box::new(limiter)));
        self
    }

    pub fn globals(&self) -> &Rc<RefCell<Globals>> {
        &self.globals
    }

    pub fn step(&self) -> RunResult<()> {
        self.limiter.borrow_mut().step()
    }

    pub fn print(&self, text: &str) {
        self.output.borrow_mut().push_str(text);
    }

    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    /// Records a category-4 notice/warning without unwinding.
    pub fn note(&self, message: impl Into<String>) {
        self.diagnostics.borrow_mut().push(message.into());
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.borrow().clone()
    }

    /// The code passed to `exit`/`die`, if the program (or the last
    /// `evaluate` call against this handle) ended that way. `None`
    /// means the program never called `exit`/`die`, not that it exited
    /// with code 0 — callers that care about the distinction should
    /// check this before inspecting `evaluate`'s return value.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.borrow()
    }

    pub fn register_builtin(&self, name: &str, f: impl Fn(&mut Interpreter, &[Value]) -> RunResult<Value> + 'static) {
        let f: BuiltinFn = Rc::new(f);
        self.globals.borrow_mut().builtins.insert(name.to_ascii_lowercase(), f);
    }

    pub fn register_host_class(&self, host: Rc<dyn HostClass>) {
        let key = host.class_name().to_ascii_lowercase();
        self.globals.borrow_mut().host_classes.insert(key, host);
    }

    /// Hoists function and class declarations, then executes the
    /// program's top-level statements in order. A top-level
    /// `return` ends execution early and its value is returned to the
    /// embedder; falling off the end yields `null`.
    pub fn evaluate(&mut self, program: &Program) -> RunResult<Value> {
        let scope = Scope::new();
        crate::eval::stmt::hoist_declarations(self, &program.stmts)?;
        match crate::eval::stmt::exec_block(self, &scope, &program.stmts) {
            Ok(()) => Ok(Value::Null),
            Err(Control::Return(v)) => Ok(v),
            Err(Control::Exit(code)) => {
                *self.exit_code.borrow_mut() = Some(code.unwrap_or(0));
                Ok(Value::Null)
            }
            Err(other) => Err(other),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
