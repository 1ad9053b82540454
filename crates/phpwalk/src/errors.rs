//! Error taxonomy: a plain enum deriving `Display`/`EnumString` via
//! `strum` instead of a `thiserror` hierarchy. Errors are reported
//! with `eprintln!` at the embedder boundary, not logged through a
//! tracing subscriber.

use strum::{Display, EnumString};

use crate::value::Value;

/// One entry per fatal or catchable error condition, plus the handful
/// of notices that carry enough identity to be worth naming
/// (most notices are just pushed as free-form strings, see
/// `Interpreter::diagnostics`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ExcKind {
    // category 2: fatal, registration-time
    Redeclaration,
    AbstractInstantiation,
    AbstractNotImplemented,
    TraitConflict,
    FatalError,
    ArgumentCountError,
    StackOverflow,
    StepLimitExceeded,

    // category 3: throwable
    DivisionByZero,
    TypeError,
    ValueError,
    UnhandledMatchError,
    /// A plain user `throw new Exception(...)` with no more specific
    /// built-in kind.
    Exception,
}

impl ExcKind {
    /// Is this kind a category-2 fatal error (unwinds unconditionally,
    /// cannot be caught by a `catch` block) rather than a category-3
    /// throwable (catchable)?
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ExcKind::Redeclaration
                | ExcKind::AbstractInstantiation
                | ExcKind::AbstractNotImplemented
                | ExcKind::TraitConflict
                | ExcKind::FatalError
                | ExcKind::ArgumentCountError
                | ExcKind::StackOverflow
                | ExcKind::StepLimitExceeded
        )
    }

    /// The built-in exception class names a `catch` clause naming one
    /// of these ancestors should also match, root-most last. Mirrors a
    /// small slice of a real exception hierarchy (`Throwable` at the
    /// root, `Error`/`Exception` as the two main branches) — enough to
    /// make every error kind catchable without building out a full
    /// SPL-exception class tree, which is out of this crate's scope.
    pub fn ancestor_names(self) -> &'static [&'static str] {
        match self {
            ExcKind::DivisionByZero => &["DivisionByZero", "ArithmeticError", "Error", "Throwable"],
            ExcKind::TypeError => &["TypeError", "Error", "Throwable"],
            ExcKind::ValueError => &["ValueError", "Error", "Throwable"],
            ExcKind::UnhandledMatchError => &["UnhandledMatchError", "Error", "Throwable"],
            ExcKind::Exception => &["Exception", "Throwable"],
            _ => &["Error", "Throwable"],
        }
    }

    pub fn throw(self, message: impl Into<String>) -> ThrowPayload {
        ThrowPayload::Host { kind: self, message: message.into() }
    }
}

/// What is carried by a `Control::Exception`: either a real user value
/// (almost always a thrown object) or a host-originated error that has
/// no live class registry to construct an object from (e.g. a
/// registration-time abstract-method check).
#[derive(Debug, Clone)]
pub enum ThrowPayload {
    Host { kind: ExcKind, message: String },
    Value(Value),
}

impl ThrowPayload {
    pub fn message(&self) -> String {
        match self {
            ThrowPayload::Host { message, .. } => message.clone(),
            ThrowPayload::Value(v) => crate::coercion::to_display_string(v),
        }
    }
}
