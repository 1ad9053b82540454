//! Statement execution and declaration hoisting.

use std::rc::Rc;

use ahash::AHashMap;

use crate::ast::{ClassDecl, ForeachTarget, FunctionDecl, Stmt, SwitchCase};
use crate::control::{Control, RunResult};
use crate::env::Scope;
use crate::errors::ExcKind;
use crate::eval::expr::{self, assign_destructure};
use crate::function::FunctionDef;
use crate::interpreter::Interpreter;
use crate::value::Value;

/// Walks the whole statement tree up front and registers every function
/// and class declaration found, wherever it is nested, before any
/// statement actually runs. Real PHP only hoists *unconditional*
/// top-level declarations and registers conditional ones when control
/// flow reaches them; this engine hoists everything uniformly instead
/// (see DESIGN.md) — simpler, and indistinguishable from the precise
/// behavior for any program that does not declare two same-named
/// classes/functions in mutually exclusive branches.
pub fn hoist_declarations(interp: &mut Interpreter, stmts: &[Stmt]) -> RunResult<()> {
    let mut funcs = Vec::new();
    let mut classes = Vec::new();
    collect_decls(stmts, &mut funcs, &mut classes);

    for f in &funcs {
        declare_function(interp, f)?;
    }

    let mut pending: Vec<&Rc<ClassDecl>> = classes;
    loop {
        let mut made_progress = false;
        let mut still_pending = Vec::new();
        for decl in pending {
            match try_declare_class(interp, decl)? {
                Some(()) => made_progress = true,
                None => still_pending.push(decl),
            }
        }
        if still_pending.is_empty() {
            break;
        }
        if !made_progress {
            let names: Vec<String> = still_pending.iter().map(|d| d.name.to_string()).collect();
            return Err(Control::fatal(
                ExcKind::FatalError,
                format!("cannot resolve base class/interface/trait for: {}", names.join(", ")),
            ));
        }
        pending = still_pending;
    }
    Ok(())
}

fn collect_decls<'a>(stmts: &'a [Stmt], funcs: &mut Vec<&'a Rc<FunctionDecl>>, classes: &mut Vec<&'a Rc<ClassDecl>>) {
    for stmt in stmts {
        match stmt {
            Stmt::FunctionDecl(f) => funcs.push(f),
            Stmt::ClassDecl(c) => classes.push(c),
            Stmt::Block(body) => collect_decls(body, funcs, classes),
            Stmt::If { then_branch, elseifs, else_branch, .. } => {
                collect_decls(std::slice::from_ref(then_branch), funcs, classes);
                for (_, s) in elseifs {
                    collect_decls(std::slice::from_ref(s), funcs, classes);
                }
                if let Some(e) = else_branch {
                    collect_decls(std::slice::from_ref(e), funcs, classes);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::For { body, .. } | Stmt::Foreach { body, .. } => {
                collect_decls(std::slice::from_ref(body), funcs, classes);
            }
            Stmt::Switch { cases, .. } => {
                for case in cases {
                    collect_decls(&case.body, funcs, classes);
                }
            }
            Stmt::Try { body, catches, finally } => {
                collect_decls(body, funcs, classes);
                for c in catches {
                    collect_decls(&c.body, funcs, classes);
                }
                if let Some(f) = finally {
                    collect_decls(f, funcs, classes);
                }
            }
            _ => {}
        }
    }
}

fn declare_function(interp: &mut Interpreter, decl: &Rc<FunctionDecl>) -> RunResult<()> {
    let is_generator = crate::function::stmts_contain_yield(&decl.body);
    let def = Rc::new(FunctionDef {
        name: decl.name.clone(),
        params: decl.params.clone(),
        body: Rc::new(decl.body.clone()),
        is_generator,
    });
    interp.globals().borrow_mut().define_function(def)
}

/// Attempts to register one class, returning `Ok(None)` (not an error)
/// if its parent/interfaces/traits aren't registered yet so the caller
/// can retry after the rest of the worklist has had a turn.
fn try_declare_class(interp: &mut Interpreter, decl: &ClassDecl) -> RunResult<Option<()>> {
    let classes_ready = {
        let globals = interp.globals().borrow();
        let parent_ready = decl.parent.as_deref().map_or(true, |p| globals.classes.is_registered(p));
        let ifaces_ready = decl.interfaces.iter().all(|i| globals.classes.is_registered(i));
        let traits_ready = decl.traits.iter().all(|t| globals.classes.is_registered(t));
        parent_ready && ifaces_ready && traits_ready
    };
    if !classes_ready {
        return Ok(None);
    }

    let (parent, interfaces, traits) = {
        let globals = interp.globals().borrow();
        let parent = decl.parent.as_deref().map(|p| globals.classes.lookup(p).unwrap());
        let interfaces = decl.interfaces.iter().map(|i| globals.classes.lookup(i).unwrap()).collect::<Vec<_>>();
        let traits = decl.traits.iter().map(|t| globals.classes.lookup(t).unwrap()).collect::<Vec<_>>();
        (parent, interfaces, traits)
    };

    let mut own_instance_properties = Vec::new();
    let mut own_static_defaults = Vec::new();
    for prop in &decl.properties {
        if prop.is_static {
            let scope = Scope::new();
            let value = match &prop.default {
                Some(e) => expr::eval_expr(interp, &scope, e)?,
                None => Value::Null,
            };
            own_static_defaults.push((prop.name.clone(), value));
        } else {
            own_instance_properties.push(prop.clone());
        }
    }

    let mut own_consts = AHashMap::new();
    for c in &decl.consts {
        let scope = Scope::new();
        own_consts.insert(c.name.clone(), expr::eval_expr(interp, &scope, &c.value)?);
    }

    interp.globals().borrow_mut().classes.register(
        decl.name.clone(),
        parent,
        interfaces,
        traits,
        decl.is_abstract,
        decl.is_final,
        decl.is_interface,
        decl.is_trait,
        own_instance_properties,
        own_static_defaults,
        decl.methods.clone(),
        own_consts,
    )?;
    Ok(Some(()))
}

/// Executes a statement list in its own control-flow scope. Declaration
/// statements are no-ops here: every function/class in the program was
/// already registered by [`hoist_declarations`] before execution began.
pub fn exec_block(interp: &mut Interpreter, scope: &Rc<Scope>, stmts: &[Stmt]) -> RunResult<()> {
    for stmt in stmts {
        exec_stmt(interp, scope, stmt)?;
    }
    Ok(())
}

pub fn exec_stmt(interp: &mut Interpreter, scope: &Rc<Scope>, stmt: &Stmt) -> RunResult<()> {
    interp.step()?;
    match stmt {
        Stmt::Expr(e) => {
            expr::eval_expr(interp, scope, e)?;
            Ok(())
        }
        Stmt::Echo(exprs, _) => {
            for e in exprs {
                let v = expr::eval_expr(interp, scope, e)?;
                let text = expr::to_printable_string(interp, &v)?;
                interp.print(&text);
            }
            Ok(())
        }
        Stmt::Block(body) => exec_block(interp, scope, body),
        Stmt::If { cond, then_branch, elseifs, else_branch } => {
            if crate::coercion::to_bool(&expr::eval_expr(interp, scope, cond)?) {
                return exec_stmt(interp, scope, then_branch);
            }
            for (c, s) in elseifs {
                if crate::coercion::to_bool(&expr::eval_expr(interp, scope, c)?) {
                    return exec_stmt(interp, scope, s);
                }
            }
            if let Some(e) = else_branch {
                return exec_stmt(interp, scope, e);
            }
            Ok(())
        }
        Stmt::While { cond, body } => {
            while crate::coercion::to_bool(&expr::eval_expr(interp, scope, cond)?) {
                match exec_stmt(interp, scope, body) {
                    Ok(()) => {}
                    Err(Control::Break(0)) => break,
                    Err(Control::Break(n)) => return Err(Control::Break(n - 1)),
                    Err(Control::Continue(0)) => continue,
                    Err(Control::Continue(n)) => return Err(Control::Continue(n - 1)),
                    Err(other) => return Err(other),
                }
            }
            Ok(())
        }
        Stmt::DoWhile { body, cond } => {
            loop {
                match exec_stmt(interp, scope, body) {
                    Ok(()) => {}
                    Err(Control::Break(0)) => break,
                    Err(Control::Break(n)) => return Err(Control::Break(n - 1)),
                    Err(Control::Continue(0)) => {}
                    Err(Control::Continue(n)) => return Err(Control::Continue(n - 1)),
                    Err(other) => return Err(other),
                }
                if !crate::coercion::to_bool(&expr::eval_expr(interp, scope, cond)?) {
                    break;
                }
            }
            Ok(())
        }
        Stmt::For { init, cond, step, body } => {
            for e in init {
                expr::eval_expr(interp, scope, e)?;
            }
            loop {
                let mut keep_going = true;
                for c in cond {
                    keep_going = crate::coercion::to_bool(&expr::eval_expr(interp, scope, c)?);
                }
                if !keep_going {
                    break;
                }
                match exec_stmt(interp, scope, body) {
                    Ok(()) => {}
                    Err(Control::Break(0)) => break,
                    Err(Control::Break(n)) => return Err(Control::Break(n - 1)),
                    Err(Control::Continue(0)) => {}
                    Err(Control::Continue(n)) => return Err(Control::Continue(n - 1)),
                    Err(other) => return Err(other),
                }
                for e in step {
                    expr::eval_expr(interp, scope, e)?;
                }
            }
            Ok(())
        }
        Stmt::Foreach { subject, key_var, value_var, body } => exec_foreach(interp, scope, subject, key_var.as_deref(), value_var, body),
        Stmt::Switch { scrutinee, cases } => exec_switch(interp, scope, scrutinee, cases),
        Stmt::Break(n, _) => Err(Control::Break(n.saturating_sub(1))),
        Stmt::Continue(n, _) => Err(Control::Continue(n.saturating_sub(1))),
        Stmt::Return(value, _) => {
            let v = match value {
                Some(e) => expr::eval_expr(interp, scope, e)?,
                None => Value::Null,
            };
            Err(Control::Return(v))
        }
        Stmt::Throw(e, _) => {
            let v = expr::eval_expr(interp, scope, e)?;
            Err(Control::Exception(crate::errors::ThrowPayload::Value(v)))
        }
        Stmt::Try { body, catches, finally } => exec_try(interp, scope, body, catches, finally),
        Stmt::FunctionDecl(_) | Stmt::ClassDecl(_) => Ok(()),
        Stmt::Exit { arg, is_die, .. } => {
            let mut code = None;
            if let Some(e) = arg {
                let v = expr::eval_expr(interp, scope, e)?;
                match v.deref_clone() {
                    Value::Int(i) => code = Some(i as i32),
                    other if *is_die => {
                        let text = expr::to_printable_string(interp, &other)?;
                        interp.print(&text);
                    }
                    _ => {}
                }
            }
            Err(Control::Exit(code))
        }
    }
}

fn exec_switch(interp: &mut Interpreter, scope: &Rc<Scope>, scrutinee: &crate::ast::Expr, cases: &[SwitchCase]) -> RunResult<()> {
    let subject = expr::eval_expr(interp, scope, scrutinee)?;
    let mut matched = false;
    for case in cases {
        if !matched {
            matched = match &case.test {
                Some(t) => crate::coercion::loose_eq(&subject, &expr::eval_expr(interp, scope, t)?),
                None => true,
            };
        }
        if matched {
            match exec_block(interp, scope, &case.body) {
                Ok(()) => {}
                Err(Control::Break(0)) => return Ok(()),
                Err(Control::Break(n)) => return Err(Control::Break(n - 1)),
                Err(other) => return Err(other),
            }
        }
    }
    Ok(())
}

fn exec_foreach(
    interp: &mut Interpreter,
    scope: &Rc<Scope>,
    subject: &crate::ast::Expr,
    key_var: Option<&str>,
    value_var: &ForeachTarget,
    body: &Stmt,
) -> RunResult<()> {
    let subject_value = expr::eval_expr(interp, scope, subject)?;
    match subject_value.deref_clone() {
        Value::Array(arr) => {
            // Copy-on-start snapshot: mutations the loop
            // body makes to the original variable do not affect which
            // entries this iteration visits.
            let snapshot: Vec<(crate::array::ArrayKey, Value)> = arr.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            for (key, value) in snapshot {
                if let Some(kv) = key_var {
                    scope.set(Rc::from(kv), key.to_value());
                }
                bind_foreach_value(scope, value_var, value)?;
                match exec_stmt(interp, scope, body) {
                    Ok(()) => {}
                    Err(Control::Break(0)) => break,
                    Err(Control::Break(n)) => return Err(Control::Break(n - 1)),
                    Err(Control::Continue(0)) => continue,
                    Err(Control::Continue(n)) => return Err(Control::Continue(n - 1)),
                    Err(other) => return Err(other),
                }
            }
            Ok(())
        }
        Value::Generator(handle) => {
            while crate::generator::valid(&handle)? {
                let key = crate::generator::current_key(&handle)?;
                let value = crate::generator::current(&handle)?;
                if let Some(kv) = key_var {
                    scope.set(Rc::from(kv), key);
                }
                bind_foreach_value(scope, value_var, value)?;
                match exec_stmt(interp, scope, body) {
                    Ok(()) => {}
                    Err(Control::Break(0)) => break,
                    Err(Control::Break(n)) => return Err(Control::Break(n - 1)),
                    Err(Control::Continue(0)) => {}
                    Err(Control::Continue(n)) => return Err(Control::Continue(n - 1)),
                    Err(other) => return Err(other),
                }
                crate::generator::advance(&handle)?;
            }
            Ok(())
        }
        Value::Object(obj) => expr::foreach_host_iterator(interp, scope, obj, key_var, value_var, body),
        other => Err(Control::fatal(ExcKind::TypeError, format!("cannot iterate over {}", other.type_name()))),
    }
}

fn bind_foreach_value(scope: &Rc<Scope>, target: &ForeachTarget, value: Value) -> RunResult<()> {
    match target {
        ForeachTarget::Variable(name) => scope.set(name.clone(), value),
        ForeachTarget::ByRef(name) => scope.bind_raw(name.clone(), value),
        ForeachTarget::Destructure(pattern) => assign_destructure(scope, pattern, value)?,
    }
    Ok(())
}

fn exec_try(
    interp: &mut Interpreter,
    scope: &Rc<Scope>,
    body: &[Stmt],
    catches: &[crate::ast::CatchClause],
    finally: &Option<Vec<Stmt>>,
) -> RunResult<()> {
    let result = exec_block(interp, scope, body);
    let after_catch = match result {
        Err(Control::Exception(payload)) => try_catches(interp, scope, payload, catches),
        other => other,
    };
    // `finally` runs unconditionally and, if it itself unwinds,
    // supersedes whatever the try/catch produced.
    if let Some(f) = finally {
        match exec_block(interp, scope, f) {
            Ok(()) => after_catch,
            finally_result => finally_result,
        }
    } else {
        after_catch
    }
}

fn try_catches(
    interp: &mut Interpreter,
    scope: &Rc<Scope>,
    payload: crate::errors::ThrowPayload,
    catches: &[crate::ast::CatchClause],
) -> RunResult<()> {
    // Category-2 fatal kinds unwind unconditionally and are never
    // catchable, regardless of which class a `catch` clause names.
    if let crate::errors::ThrowPayload::Host { kind, .. } = &payload {
        if kind.is_fatal() {
            return Err(Control::Exception(payload));
        }
    }
    for clause in catches {
        if payload_matches(interp, &payload, &clause.classes) {
            if let Some(var) = &clause.var {
                let value = match &payload {
                    crate::errors::ThrowPayload::Value(v) => v.clone(),
                    crate::errors::ThrowPayload::Host { message, .. } => Value::str(message.clone()),
                };
                scope.set(var.clone(), value);
            }
            return exec_block(interp, scope, &clause.body);
        }
    }
    Err(Control::Exception(payload))
}

fn payload_matches(interp: &Interpreter, payload: &crate::errors::ThrowPayload, classes: &[Rc<str>]) -> bool {
    match payload {
        crate::errors::ThrowPayload::Host { kind, .. } => {
            let ancestors = kind.ancestor_names();
            classes.iter().any(|c| ancestors.iter().any(|a| a.eq_ignore_ascii_case(c)))
        }
        crate::errors::ThrowPayload::Value(v) => match v.deref_clone() {
            Value::Object(obj) => {
                let globals = interp.globals().borrow();
                classes.iter().any(|c| {
                    globals
                        .classes
                        .lookup(c)
                        .is_some_and(|target| globals.classes.is_instance_of(obj.borrow().class, target))
                })
            }
            _ => false,
        },
    }
}
