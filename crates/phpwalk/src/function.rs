//! Function/method definition and closure capture.

use std::rc::Rc;

use crate::ast::{ClosureUse, Param, Stmt};
use crate::class::ClassId;
use crate::env::Scope;
use crate::object::ObjectHandle;
use crate::value::Value;

/// A top-level named function. Closures and arrow functions get their
/// own [`Closure`] type below since they additionally carry a captured
/// environment.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: Rc<str>,
    pub params: Vec<Param>,
    pub body: Rc<Vec<Stmt>>,
    /// Scanned once at registration: does the body textually contain
    /// `yield`/`yield from`? If so, calling this function
    /// constructs a suspended [`crate::generator::GeneratorHandle`]
    /// instead of executing the body inline.
    pub is_generator: bool,
}

/// A closure or arrow function value.
#[derive(Debug)]
pub struct Closure {
    pub params: Vec<Param>,
    pub body: Rc<Vec<Stmt>>,
    pub is_generator: bool,
    /// The lexical scope captured at closure-construction time, used
    /// only for variable lookups inside the closure body.
    pub captured: Rc<Scope>,
    /// `$this` bound at construction, for closures created inside a
    /// method body.
    pub bound_this: Option<ObjectHandle>,
    pub bound_class: Option<ClassId>,
    pub uses: Vec<ClosureUse>,
}

#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub receiver: ObjectHandle,
    pub class: ClassId,
    pub method_name: Rc<str>,
}

/// An arrow function value. Kept distinct from [`Closure`] rather than
/// shoehorned into the same struct: its body is a single expression
/// with an implicit return, it auto-captures its free variables instead
/// of requiring a `use` clause, and it can never be a generator.
#[derive(Debug)]
pub struct ArrowClosure {
    pub params: Vec<Param>,
    pub body: Rc<crate::ast::Expr>,
    pub captured: Rc<Scope>,
    pub bound_this: Option<ObjectHandle>,
    pub bound_class: Option<ClassId>,
}

/// Resolves which variables an arrow function's body references, for
/// the automatic-by-value capture rule. A plain free-name
/// walk over the expression tree; arrow bodies are a single expression
/// so this never needs to recurse into statements.
pub fn arrow_free_vars(body: &crate::ast::Expr, params: &[Param], out: &mut Vec<Rc<str>>) {
    use crate::ast::Expr;
    let is_param = |name: &str| params.iter().any(|p| &*p.name == name);
    let mut push = |name: &Rc<str>| {
        if !is_param(name) && !out.iter().any(|n| n == name) {
            out.push(name.clone());
        }
    };
    match body {
        Expr::Variable(name, _) => push(name),
        Expr::Binary { lhs, rhs, .. } => {
            arrow_free_vars(lhs, params, out);
            arrow_free_vars(rhs, params, out);
        }
        Expr::Unary { operand, .. } => arrow_free_vars(operand, params, out),
        Expr::Assign { target, value, .. } | Expr::CompoundAssign { target, value, .. } | Expr::AssignRef { target, value, .. } => {
            arrow_free_vars(target, params, out);
            arrow_free_vars(value, params, out);
        }
        Expr::Ternary { cond, then_expr, else_expr, .. } => {
            arrow_free_vars(cond, params, out);
            arrow_free_vars(then_expr, params, out);
            arrow_free_vars(else_expr, params, out);
        }
        Expr::Elvis { cond, else_expr, .. } => {
            arrow_free_vars(cond, params, out);
            arrow_free_vars(else_expr, params, out);
        }
        Expr::NullCoalesce { lhs, rhs, .. } => {
            arrow_free_vars(lhs, params, out);
            arrow_free_vars(rhs, params, out);
        }
        Expr::Subscript { base, index, .. } => {
            arrow_free_vars(base, params, out);
            if let Some(i) = index {
                arrow_free_vars(i, params, out);
            }
        }
        Expr::PropertyAccess { base, .. } => arrow_free_vars(base, params, out),
        Expr::MethodCall { base, args, .. } => {
            arrow_free_vars(base, params, out);
            for a in args {
                arrow_free_vars(&a.value, params, out);
            }
        }
        Expr::Call { callee, args, .. } => {
            arrow_free_vars(callee, params, out);
            for a in args {
                arrow_free_vars(&a.value, params, out);
            }
        }
        Expr::New { args, .. } | Expr::StaticCall { args, .. } => {
            for a in args {
                arrow_free_vars(&a.value, params, out);
            }
        }
        Expr::ArrayLit(items, _) => {
            for item in items {
                if let Some(k) = &item.key {
                    arrow_free_vars(k, params, out);
                }
                arrow_free_vars(&item.value, params, out);
            }
        }
        Expr::InstanceOf { expr, .. } => arrow_free_vars(expr, params, out),
        Expr::Spread(inner, _) | Expr::Empty(inner, _) => arrow_free_vars(inner, params, out),
        _ => {}
    }
}

/// Does this body textually contain `yield`/`yield from` anywhere not
/// itself inside a nested closure/arrow/function body (those get their
/// own independent generator-or-not classification)? Used both at
/// top-level function registration and at method-call time, since
/// `MethodDef` has no room of its own to cache the answer.
pub fn stmts_contain_yield(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_contains_yield)
}

fn stmt_contains_yield(stmt: &Stmt) -> bool {
    use crate::ast::Stmt::*;
    match stmt {
        Expr(e) | Throw(e, _) => expr_contains_yield(e),
        Echo(es, _) => es.iter().any(expr_contains_yield),
        Block(body) => stmts_contain_yield(body),
        If { cond, then_branch, elseifs, else_branch } => {
            expr_contains_yield(cond)
                || stmt_contains_yield(then_branch)
                || elseifs.iter().any(|(c, s)| expr_contains_yield(c) || stmt_contains_yield(s))
                || else_branch.as_deref().is_some_and(stmt_contains_yield)
        }
        While { cond, body } => expr_contains_yield(cond) || stmt_contains_yield(body),
        DoWhile { body, cond } => expr_contains_yield(cond) || stmt_contains_yield(body),
        For { init, cond, step, body } => {
            init.iter().chain(cond).chain(step).any(expr_contains_yield) || stmt_contains_yield(body)
        }
        Foreach { subject, body, .. } => expr_contains_yield(subject) || stmt_contains_yield(body),
        Switch { scrutinee, cases } => {
            expr_contains_yield(scrutinee)
                || cases.iter().any(|c| c.test.as_ref().is_some_and(expr_contains_yield) || stmts_contain_yield(&c.body))
        }
        Return(Some(e), _) => expr_contains_yield(e),
        Try { body, catches, finally } => {
            stmts_contain_yield(body)
                || catches.iter().any(|c| stmts_contain_yield(&c.body))
                || finally.as_deref().is_some_and(stmts_contain_yield)
        }
        _ => false,
    }
}

fn expr_contains_yield(expr: &crate::ast::Expr) -> bool {
    use crate::ast::Expr::*;
    match expr {
        Yield { .. } | YieldFrom { .. } => true,
        Binary { lhs, rhs, .. } => expr_contains_yield(lhs) || expr_contains_yield(rhs),
        Unary { operand, .. } | Spread(operand, _) | Empty(operand, _) => expr_contains_yield(operand),
        Assign { target, value, .. } | CompoundAssign { target, value, .. } | AssignRef { target, value, .. } => {
            expr_contains_yield(target) || expr_contains_yield(value)
        }
        Ternary { cond, then_expr, else_expr, .. } => {
            expr_contains_yield(cond) || expr_contains_yield(then_expr) || expr_contains_yield(else_expr)
        }
        Elvis { cond, else_expr, .. } => expr_contains_yield(cond) || expr_contains_yield(else_expr),
        NullCoalesce { lhs, rhs, .. } => expr_contains_yield(lhs) || expr_contains_yield(rhs),
        Subscript { base, index, .. } => expr_contains_yield(base) || index.as_deref().is_some_and(expr_contains_yield),
        PropertyAccess { base, .. } => expr_contains_yield(base),
        MethodCall { base, args, .. } => expr_contains_yield(base) || args.iter().any(|a| expr_contains_yield(&a.value)),
        Call { callee, args, .. } => expr_contains_yield(callee) || args.iter().any(|a| expr_contains_yield(&a.value)),
        New { args, .. } | StaticCall { args, .. } => args.iter().any(|a| expr_contains_yield(&a.value)),
        ArrayLit(items, _) => items.iter().any(|i| i.key.as_ref().is_some_and(expr_contains_yield) || expr_contains_yield(&i.value)),
        InstanceOf { expr, .. } => expr_contains_yield(expr),
        Match { scrutinee, arms, .. } => {
            expr_contains_yield(scrutinee)
                || arms.iter().any(|a| a.conditions.iter().flatten().any(expr_contains_yield) || expr_contains_yield(&a.body))
        }
        Isset(es, _) | Unset(es, _) => es.iter().any(expr_contains_yield),
        // closures/arrow fns/function decls classify themselves independently.
        Closure { .. } | ArrowFn { .. } => false,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder;

    #[test]
    fn arrow_free_vars_excludes_params() {
        let params = vec![Param { name: builder::name("x"), default: None, by_ref: false, variadic: false, promote: None }];
        let body = builder::bin(crate::ast::BinOp::Add, builder::var("x"), builder::var("y"));
        let mut out = Vec::new();
        arrow_free_vars(&body, &params, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(&*out[0], "y");
    }
}
