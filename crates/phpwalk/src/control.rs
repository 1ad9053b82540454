//! Control-flow signals.
//!
//! `Break`/`Continue`/`Return`/`Exception`/`Exit` are dedicated sum
//! variants rather than exceptions of the host language — a normal
//! result channel. Rust already has exactly that channel:
//! `Result::Err`. `Control` is the error side of every
//! evaluation function's `RunResult<T>`, so "every value is either a
//! concrete value or exactly one control variant"
//! is a property the type system enforces rather than one the
//! evaluator has to maintain by convention.

use crate::errors::{ExcKind, ThrowPayload};
use crate::value::Value;

pub type RunResult<T> = Result<T, Control>;

#[derive(Debug, Clone)]
pub enum Control {
    Break(u32),
    Continue(u32),
    Return(Value),
    /// A thrown, catchable-or-fatal error. See [`ThrowPayload`] for why this isn't just `Value`.
    Exception(ThrowPayload),
    /// `exit`/`die`; unwinds unconditionally.
    Exit(Option<i32>),
}

impl Control {
    pub fn fatal(kind: ExcKind, message: impl Into<String>) -> Control {
        Control::Exception(kind.throw(message))
    }
}
