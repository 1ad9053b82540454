//! Expression evaluation: literals, operators, calls, and object/class
//! access.

use std::rc::Rc;

use crate::array::{Array, ArrayKey};
use crate::ast::{Argument, ClassRef, DestructurePattern, Expr, ForeachTarget, MatchArm, PropName, Stmt};
use crate::class::{ClassId, MethodDef};
use crate::coercion;
use crate::control::{Control, RunResult};
use crate::env::Scope;
use crate::errors::{ExcKind, ThrowPayload};
use crate::function::{self, ArrowClosure, Closure, FunctionDef};
use crate::generator;
use crate::interpreter::Interpreter;
use crate::invoke::{self, CallContext, EvaluatedArg};
use crate::object::{Object, ObjectHandle};
use crate::value::{Callable, Value};

pub fn eval_expr(interp: &mut Interpreter, scope: &Rc<Scope>, expr: &Expr) -> RunResult<Value> {
    interp.step()?;
    match expr {
        Expr::Null(_) => Ok(Value::Null),
        Expr::Bool(b, _) => Ok(Value::Bool(*b)),
        Expr::Int(i, _) => Ok(Value::Int(*i)),
        Expr::Float(f, _) => Ok(Value::Float(*f)),
        Expr::Str(s, _) => Ok(Value::Str(s.clone())),
        Expr::Variable(name, _) => match scope.get(name) {
            Some(v) => Ok(v),
            None => {
                interp.note(format!("undefined variable ${name}"));
                Ok(Value::Null)
            }
        },

        Expr::ArrayLit(items, _) => {
            let mut arr = Array::new();
            for item in items {
                if item.spread {
                    let v = eval_expr(interp, scope, &item.value)?;
                    if let Value::Array(sub) = v.deref_clone() {
                        for (k, val) in sub.iter() {
                            match k {
                                ArrayKey::Int(_) => arr.push(val.clone()),
                                ArrayKey::Str(s) => arr.insert(ArrayKey::Str(s.clone()), val.clone()),
                            }
                        }
                    }
                    continue;
                }
                let value = eval_expr(interp, scope, &item.value)?;
                match &item.key {
                    Some(k) => {
                        let key_val = eval_expr(interp, scope, k)?;
                        arr.insert(ArrayKey::from_value(&key_val), value);
                    }
                    None => arr.push(value),
                }
            }
            Ok(Value::Array(arr))
        }

        Expr::Assign { target, value, .. } => {
            let v = eval_expr(interp, scope, value)?;
            assign_to(interp, scope, target, v.clone())?;
            Ok(v)
        }

        Expr::CompoundAssign { target, op, value, .. } => {
            let current = eval_expr(interp, scope, target)?;
            let rhs = eval_expr(interp, scope, value)?;
            let result = apply_binary(*op, &current, &rhs)?;
            assign_to(interp, scope, target, result.clone())?;
            Ok(result)
        }

        Expr::AssignRef { target, value, .. } => {
            let cell = reference_cell_of(interp, scope, value)?;
            bind_reference(scope, target, cell.clone())?;
            Ok(Value::Reference(cell))
        }

        Expr::Binary { op, lhs, rhs, .. } => {
            if matches!(op, crate::ast::BinOp::And) {
                let l = eval_expr(interp, scope, lhs)?;
                if !coercion::to_bool(&l) {
                    return Ok(Value::Bool(false));
                }
                let r = eval_expr(interp, scope, rhs)?;
                return Ok(Value::Bool(coercion::to_bool(&r)));
            }
            if matches!(op, crate::ast::BinOp::Or) {
                let l = eval_expr(interp, scope, lhs)?;
                if coercion::to_bool(&l) {
                    return Ok(Value::Bool(true));
                }
                let r = eval_expr(interp, scope, rhs)?;
                return Ok(Value::Bool(coercion::to_bool(&r)));
            }
            let l = eval_expr(interp, scope, lhs)?;
            let r = eval_expr(interp, scope, rhs)?;
            apply_binary(*op, &l, &r)
        }

        Expr::Unary { op, operand, .. } => apply_unary(interp, scope, *op, operand),

        Expr::Ternary { cond, then_expr, else_expr, .. } => {
            if coercion::to_bool(&eval_expr(interp, scope, cond)?) {
                eval_expr(interp, scope, then_expr)
            } else {
                eval_expr(interp, scope, else_expr)
            }
        }

        Expr::Elvis { cond, else_expr, .. } => {
            let v = eval_expr(interp, scope, cond)?;
            if coercion::to_bool(&v) {
                Ok(v)
            } else {
                eval_expr(interp, scope, else_expr)
            }
        }

        Expr::NullCoalesce { lhs, rhs, .. } => {
            let v = eval_nullable(interp, scope, lhs)?;
            match v {
                Some(v) if !v.is_null() => Ok(v),
                _ => eval_expr(interp, scope, rhs),
            }
        }

        Expr::Subscript { base, index, .. } => {
            let base_val = eval_expr(interp, scope, base)?;
            let index_val = match index {
                Some(i) => Some(eval_expr(interp, scope, i)?),
                None => None,
            };
            match base_val.deref_clone() {
                Value::Array(arr) => {
                    let key = ArrayKey::from_value(&index_val.ok_or_else(|| {
                        Control::fatal(ExcKind::TypeError, "cannot read an array without a key")
                    })?);
                    Ok(arr.get(&key).cloned().unwrap_or(Value::Null))
                }
                Value::Str(s) => {
                    let idx = coercion::to_int(&index_val.unwrap_or(Value::Int(0)));
                    Ok(s.chars().nth(idx.max(0) as usize).map(|c| Value::str(c.to_string())).unwrap_or(Value::str("")))
                }
                Value::Null => Ok(Value::Null),
                other => Err(Control::fatal(ExcKind::TypeError, format!("cannot subscript {}", other.type_name()))),
            }
        }

        Expr::PropertyAccess { base, name, null_safe, .. } => {
            let base_val = eval_expr(interp, scope, base)?;
            if base_val.is_null() && *null_safe {
                return Ok(Value::Null);
            }
            get_property(interp, base_val, name, scope)
        }

        Expr::StaticPropertyAccess { class, name, .. } => {
            let class_id = resolve_class_ref(interp, scope, class)?;
            let owner = interp.globals().borrow().classes.resolve_static_prop_owner(class_id, name);
            match owner {
                Some(owner_id) => {
                    let globals = interp.globals().borrow();
                    let class_ref = globals.classes.get(owner_id);
                    Ok(class_ref.static_props.borrow().get(name).cloned().unwrap_or(Value::Null))
                }
                None => Err(Control::fatal(ExcKind::FatalError, format!("undefined static property ${name}"))),
            }
        }

        Expr::MethodCall { base, name, args, null_safe, .. } => {
            let base_val = eval_expr(interp, scope, base)?;
            if base_val.is_null() && *null_safe {
                return Ok(Value::Null);
            }
            let method_name = prop_name(interp, scope, name)?;
            let evaluated = eval_args(interp, scope, args)?;
            dispatch_method(interp, base_val, &method_name, evaluated)
        }

        Expr::StaticCall { class, name, args, .. } => {
            let class_ref_is_relative = matches!(class, ClassRef::SelfKw | ClassRef::ParentKw | ClassRef::StaticKw);
            let class_id = resolve_class_ref(interp, scope, class)?;
            let evaluated = eval_args(interp, scope, args)?;
            let method = interp
                .globals()
                .borrow()
                .classes
                .resolve_method(class_id, name)
                .ok_or_else(|| Control::fatal(ExcKind::FatalError, format!("call to undefined method {name}()")))?;
            let ctx = invoke::current_call_context();
            let (this, static_class) = if class_ref_is_relative && ctx.this.is_some() {
                (ctx.this.clone(), ctx.static_class.unwrap_or(class_id))
            } else {
                (None, class_id)
            };
            invoke_method_generic(interp, this, static_class, &method, evaluated)
        }

        Expr::Call { callee, args, .. } => {
            let evaluated = eval_args(interp, scope, args)?;
            if let Expr::ConstFetch(name, _) = callee.as_ref() {
                return call_named(interp, name, evaluated);
            }
            let callee_val = eval_expr(interp, scope, callee)?;
            call_value(interp, callee_val, evaluated)
        }

        Expr::New { class, args, .. } => {
            if let Some(name) = new_target_name(interp, scope, class)? {
                let host = interp.globals().borrow().host_classes.get(&name.to_ascii_lowercase()).cloned();
                if let Some(host) = host {
                    let evaluated = eval_args(interp, scope, args)?;
                    let values: Vec<Value> = evaluated.into_iter().map(|a| a.value).collect();
                    return host.construct(interp, &values);
                }
            }
            let class_id = resolve_class_ref(interp, scope, class)?;
            let evaluated = eval_args(interp, scope, args)?;
            construct(interp, class_id, evaluated)
        }

        Expr::InstanceOf { expr: inner, class, .. } => {
            let v = eval_expr(interp, scope, inner)?;
            let class_id = resolve_class_ref(interp, scope, class)?;
            match v.deref_clone() {
                Value::Object(o) => {
                    let cls = o.borrow().class;
                    Ok(Value::Bool(interp.globals().borrow().classes.is_instance_of(cls, class_id)))
                }
                _ => Ok(Value::Bool(false)),
            }
        }

        Expr::Match { scrutinee, arms, .. } => eval_match(interp, scope, scrutinee, arms),

        Expr::Closure { params, uses, body, is_static, .. } => {
            let captured = Scope::new();
            for u in uses {
                if u.by_ref {
                    let cell = scope.reference_cell(&u.name);
                    captured.bind_raw(u.name.clone(), Value::Reference(cell));
                } else {
                    let v = scope.get(&u.name).unwrap_or(Value::Null);
                    captured.bind_raw(u.name.clone(), v);
                }
            }
            let ctx = invoke::current_call_context();
            let bound_this = if *is_static { None } else { ctx.this };
            let bound_class = ctx.defining_class;
            let is_generator = function::stmts_contain_yield(body);
            let closure = Closure {
                params: params.clone(),
                body: body.clone(),
                is_generator,
                captured,
                bound_this,
                bound_class,
                uses: uses.clone(),
            };
            Ok(Value::Callable(Callable::Closure(Rc::new(closure))))
        }

        Expr::ArrowFn { params, body, .. } => {
            let mut free = Vec::new();
            function::arrow_free_vars(body, params, &mut free);
            let captured = Scope::new();
            for name in free {
                let v = scope.get(&name).unwrap_or(Value::Null);
                captured.bind_raw(name, v);
            }
            let ctx = invoke::current_call_context();
            let arrow = ArrowClosure { params: params.clone(), body: body.clone(), captured, bound_this: ctx.this, bound_class: ctx.defining_class };
            Ok(Value::Callable(Callable::ArrowFn(Rc::new(arrow))))
        }

        Expr::ConstFetch(name, _) => {
            let found = interp.globals().borrow().lookup_constant(name);
            match found {
                Some(v) => Ok(v),
                None => {
                    interp.note(format!("use of undefined constant {name}"));
                    Ok(Value::str(name.clone()))
                }
            }
        }

        Expr::ClassConstFetch { class, name, .. } => {
            let class_id = resolve_class_ref(interp, scope, class)?;
            if &**name == "class" {
                return Ok(Value::str(interp.globals().borrow().classes.get(class_id).name.clone()));
            }
            interp
                .globals()
                .borrow()
                .classes
                .get(class_id)
                .consts
                .get(name)
                .cloned()
                .ok_or_else(|| Control::fatal(ExcKind::FatalError, format!("undefined class constant {name}")))
        }

        Expr::Yield { key, value, .. } => {
            let key_val = match key {
                Some(k) => Some(eval_expr(interp, scope, k)?),
                None => None,
            };
            let value_val = match value {
                Some(v) => eval_expr(interp, scope, v)?,
                None => Value::Null,
            };
            generator::yield_value(key_val, value_val)
        }

        Expr::YieldFrom { iterable, .. } => {
            let v = eval_expr(interp, scope, iterable)?;
            match v.deref_clone() {
                Value::Array(arr) => {
                    for (k, val) in arr.iter() {
                        generator::yield_value(Some(k.to_value()), val.clone())?;
                    }
                    Ok(Value::Null)
                }
                Value::Generator(sub) => {
                    while generator::valid(&sub)? {
                        let k = generator::current_key(&sub)?;
                        let v = generator::current(&sub)?;
                        generator::yield_value(Some(k), v)?;
                        generator::advance(&sub)?;
                    }
                    Ok(generator::get_return(&sub))
                }
                other => Err(Control::fatal(ExcKind::TypeError, format!("cannot yield from {}", other.type_name()))),
            }
        }

        Expr::Spread(inner, _) => eval_expr(interp, scope, inner),

        Expr::ListDestructure(pattern, _) => {
            // Only meaningful as an assignment target; evaluated bare,
            // it has no value of its own.
            let _ = pattern;
            Ok(Value::Null)
        }

        Expr::Isset(exprs, _) => {
            for e in exprs {
                match eval_nullable(interp, scope, e)? {
                    Some(v) if !v.is_null() => continue,
                    _ => return Ok(Value::Bool(false)),
                }
            }
            Ok(Value::Bool(true))
        }

        Expr::Empty(inner, _) => {
            let v = eval_nullable(interp, scope, inner)?.unwrap_or(Value::Null);
            Ok(Value::Bool(!coercion::to_bool(&v)))
        }

        Expr::Unset(exprs, _) => {
            for e in exprs {
                unset_target(interp, scope, e)?;
            }
            Ok(Value::Null)
        }
    }
}

/// Evaluates `expr` the way `isset`/`??`/`empty` need: a missing
/// variable, array key, or property reads as `None` instead of raising
/// an error, while everything else evaluates normally.
fn eval_nullable(interp: &mut Interpreter, scope: &Rc<Scope>, expr: &Expr) -> RunResult<Option<Value>> {
    match expr {
        Expr::Variable(name, _) => Ok(scope.get(name)),
        Expr::Subscript { base, index, .. } => {
            let Some(base_val) = eval_nullable(interp, scope, base)? else { return Ok(None) };
            match base_val.deref_clone() {
                Value::Array(arr) => {
                    let Some(idx) = index else { return Ok(None) };
                    let key_val = eval_expr(interp, scope, idx)?;
                    Ok(arr.get(&ArrayKey::from_value(&key_val)).cloned())
                }
                _ => Ok(Some(eval_expr(interp, scope, expr)?)),
            }
        }
        Expr::PropertyAccess { base, name, .. } => {
            let Some(base_val) = eval_nullable(interp, scope, base)? else { return Ok(None) };
            if base_val.is_null() {
                return Ok(None);
            }
            let Value::Object(obj) = base_val.deref_clone() else { return Ok(None) };
            let pname = prop_name(interp, scope, name)?;
            Ok(obj.borrow().properties.get(&pname).cloned())
        }
        _ => Ok(Some(eval_expr(interp, scope, expr)?)),
    }
}

fn prop_name(interp: &mut Interpreter, scope: &Rc<Scope>, name: &PropName) -> RunResult<Rc<str>> {
    match name {
        PropName::Literal(n) => Ok(n.clone()),
        PropName::Dynamic(e) => {
            let v = eval_expr(interp, scope, e)?;
            Ok(Rc::from(coercion::to_display_string(&v)))
        }
    }
}

fn get_property(interp: &mut Interpreter, base_val: Value, name: &PropName, scope: &Rc<Scope>) -> RunResult<Value> {
    let obj = match base_val.deref_clone() {
        Value::Object(o) => o,
        Value::Null => return Err(Control::fatal(ExcKind::FatalError, "attempt to read property on null")),
        other => return Err(Control::fatal(ExcKind::TypeError, format!("attempt to read property on {}", other.type_name()))),
    };
    let pname = prop_name(interp, scope, name)?;
    let class_id = obj.borrow().class;

    let host = interp.globals().borrow().host_classes.get(&obj.borrow().class_name.to_ascii_lowercase()).cloned();
    if let Some(host) = &host {
        if let Some(v) = host.get_property(interp, &Value::Object(obj.clone()), &pname)? {
            return Ok(v);
        }
    }

    if let Some(v) = obj.borrow().properties.get(&pname).cloned() {
        let prop_def = interp.globals().borrow().classes.resolve_property(class_id, &pname);
        if let Some(def) = prop_def {
            let caller = invoke::current_call_context().defining_class;
            let visible = {
                let globals = interp.globals().borrow();
                crate::class::check_visibility(&globals.classes, def.visibility, def.declaring_class, caller)
            };
            if !visible {
                return Err(Control::fatal(ExcKind::TypeError, format!("cannot access {:?} property ${pname}", def.visibility)));
            }
        }
        return Ok(v);
    }
    let getter = interp.globals().borrow().classes.resolve_method(class_id, "__get");
    if let Some(getter) = getter {
        if obj.borrow().try_enter_magic("__get") {
            let args = vec![EvaluatedArg { name: None, value: Value::str(pname) }];
            let result = invoke_method_generic(interp, Some(obj.clone()), class_id, &getter, args);
            obj.borrow().leave_magic("__get");
            return result;
        }
    }
    Ok(Value::Null)
}

fn unset_target(interp: &mut Interpreter, scope: &Rc<Scope>, target: &Expr) -> RunResult<()> {
    match target {
        Expr::Variable(name, _) => {
            scope.unset(name);
            Ok(())
        }
        Expr::Subscript { base, index: Some(index), .. } => {
            let base_val = eval_expr(interp, scope, base)?;
            if let Value::Array(_) = base_val.deref_clone() {
                let key_val = eval_expr(interp, scope, index)?;
                let key = ArrayKey::from_value(&key_val);
                mutate_array_at(scope, base, |arr| {
                    arr.remove(&key);
                })?;
            }
            Ok(())
        }
        Expr::PropertyAccess { base, name, .. } => {
            let base_val = eval_expr(interp, scope, base)?;
            if let Value::Object(obj) = base_val.deref_clone() {
                let pname = prop_name(interp, scope, name)?;
                obj.borrow_mut().properties.remove(&pname);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Applies `f` to the `Array` reachable by re-resolving `base` as an
/// lvalue (the same "walk the lvalue chain again" approach
/// `assign_to`/`CompoundAssign` use; see that function's docs for the
/// accepted double-evaluation tradeoff).
fn mutate_array_at(scope: &Rc<Scope>, base: &Expr, f: impl FnOnce(&mut Array)) -> RunResult<()> {
    if let Expr::Variable(name, _) = base {
        let mut current = scope.get(name).unwrap_or(Value::Array(Array::new()));
        if let Value::Array(arr) = &mut current {
            f(arr);
        }
        scope.set(name.clone(), current);
    }
    Ok(())
}

/// Resolves `target` as an assignable place and writes `value` into it.
/// Container lvalues (`$a[$i]`, `$obj->prop`) are re-read, mutated, and
/// written back rather than addressed through a persistent lvalue
/// handle, so an index/base expression with side effects is evaluated
/// twice across a read-modify-write pair (documented simplification,
/// harmless for the side-effect-free index expressions ordinary code
/// uses).
pub fn assign_to(interp: &mut Interpreter, scope: &Rc<Scope>, target: &Expr, value: Value) -> RunResult<()> {
    match target {
        Expr::Variable(name, _) => {
            scope.set(name.clone(), value);
            Ok(())
        }
        Expr::Subscript { base, index, .. } => {
            assign_into_container(interp, scope, base, index.as_deref(), value)
        }
        Expr::PropertyAccess { base, name, .. } => {
            let base_val = eval_expr(interp, scope, base)?;
            let obj = match base_val.deref_clone() {
                Value::Object(o) => o,
                other => return Err(Control::fatal(ExcKind::TypeError, format!("attempt to assign property on {}", other.type_name()))),
            };
            let pname = prop_name(interp, scope, name)?;
            let class_id = obj.borrow().class;

            let host = interp.globals().borrow().host_classes.get(&obj.borrow().class_name.to_ascii_lowercase()).cloned();
            if let Some(host) = host {
                host.set_property(interp, &Value::Object(obj.clone()), &pname, value)?;
                return Ok(());
            }

            let already_declared = obj.borrow().properties.contains_key(&pname);
            if !already_declared {
                let setter = interp.globals().borrow().classes.resolve_method(class_id, "__set");
                if let Some(setter) = setter {
                    if obj.borrow().try_enter_magic("__set") {
                        let args = vec![EvaluatedArg { name: None, value: Value::str(pname) }, EvaluatedArg { name: None, value: value.clone() }];
                        let result = invoke_method_generic(interp, Some(obj.clone()), class_id, &setter, args);
                        obj.borrow().leave_magic("__set");
                        result?;
                        return Ok(());
                    }
                }
            } else {
                let prop_def = interp.globals().borrow().classes.resolve_property(class_id, &pname);
                if let Some(def) = prop_def {
                    let caller = invoke::current_call_context().defining_class;
                    let visible = {
                        let globals = interp.globals().borrow();
                        crate::class::check_visibility(&globals.classes, def.visibility, def.declaring_class, caller)
                    };
                    if !visible {
                        return Err(Control::fatal(ExcKind::TypeError, format!("cannot access {:?} property ${pname}", def.visibility)));
                    }
                }
            }
            obj.borrow_mut().properties.insert(pname, value);
            Ok(())
        }
        Expr::StaticPropertyAccess { class, name, .. } => {
            let class_id = resolve_class_ref(interp, scope, class)?;
            let owner = interp
                .globals()
                .borrow()
                .classes
                .resolve_static_prop_owner(class_id, name)
                .unwrap_or(class_id);
            let globals = interp.globals().borrow();
            globals.classes.get(owner).static_props.borrow_mut().insert(name.clone(), value);
            Ok(())
        }
        Expr::ArrayLit(items, _) => assign_array_literal_destructure(interp, scope, items, value),
        Expr::ListDestructure(pattern, _) => assign_destructure(scope, pattern, value),
        _ => Err(Control::fatal(ExcKind::FatalError, "invalid assignment target")),
    }
}

fn assign_into_container(interp: &mut Interpreter, scope: &Rc<Scope>, base: &Expr, index: Option<&Expr>, value: Value) -> RunResult<()> {
    match base {
        Expr::Variable(name, _) => {
            let mut current = scope.get_raw(name).map(|v| v.deref_clone()).unwrap_or(Value::Array(Array::new()));
            match &mut current {
                Value::Array(arr) => {
                    match index {
                        Some(idx) => {
                            let key_val = eval_expr(interp, scope, idx)?;
                            arr.insert(ArrayKey::from_value(&key_val), value);
                        }
                        None => arr.push(value),
                    }
                    scope.set(name.clone(), current);
                    Ok(())
                }
                Value::Null => {
                    let mut arr = Array::new();
                    match index {
                        Some(idx) => {
                            let key_val = eval_expr(interp, scope, idx)?;
                            arr.insert(ArrayKey::from_value(&key_val), value);
                        }
                        None => arr.push(value),
                    }
                    scope.set(name.clone(), Value::Array(arr));
                    Ok(())
                }
                other => Err(Control::fatal(ExcKind::TypeError, format!("cannot use {} as an array", other.type_name()))),
            }
        }
        Expr::PropertyAccess { .. } | Expr::Subscript { .. } => {
            let current = eval_expr(interp, scope, base)?;
            let mut arr = match current.deref_clone() {
                Value::Array(a) => a,
                Value::Null => Array::new(),
                other => return Err(Control::fatal(ExcKind::TypeError, format!("cannot use {} as an array", other.type_name()))),
            };
            match index {
                Some(idx) => {
                    let key_val = eval_expr(interp, scope, idx)?;
                    arr.insert(ArrayKey::from_value(&key_val), value);
                }
                None => arr.push(value),
            }
            assign_to(interp, scope, base, Value::Array(arr))
        }
        _ => Err(Control::fatal(ExcKind::FatalError, "invalid array-assignment target")),
    }
}

fn assign_array_literal_destructure(interp: &mut Interpreter, scope: &Rc<Scope>, items: &[crate::ast::ArrayItem], value: Value) -> RunResult<()> {
    let arr = match value.deref_clone() {
        Value::Array(a) => a,
        _ => return Err(Control::fatal(ExcKind::TypeError, "cannot destructure a non-array value")),
    };
    let mut next_index = 0i64;
    for item in items {
        let key = match &item.key {
            Some(k) => ArrayKey::from_value(&eval_expr(interp, scope, k)?),
            None => {
                let k = ArrayKey::Int(next_index);
                next_index += 1;
                k
            }
        };
        let v = arr.get(&key).cloned().unwrap_or(Value::Null);
        assign_to(interp, scope, &item.value, v)?;
    }
    Ok(())
}

pub fn assign_destructure(scope: &Rc<Scope>, pattern: &DestructurePattern, value: Value) -> RunResult<()> {
    let arr = match value.deref_clone() {
        Value::Array(a) => a,
        _ => return Err(Control::fatal(ExcKind::TypeError, "cannot destructure a non-array value")),
    };
    let mut next_index = 0i64;
    for element in &pattern.elements {
        let Some(element) = element else {
            next_index += 1;
            continue;
        };
        let key = match &element.key {
            Some(_) => ArrayKey::Int(next_index),
            None => {
                let k = ArrayKey::Int(next_index);
                next_index += 1;
                k
            }
        };
        let v = arr.get(&key).cloned().unwrap_or(Value::Null);
        match &*element.target {
            Expr::Variable(name, _) => scope.set(name.clone(), v),
            _ => {
                // nested destructuring pattern expressed as a plain
                // `Expr::ArrayLit`/`ListDestructure` target.
                if let Expr::ListDestructure(inner, _) = &*element.target {
                    assign_destructure(scope, inner, v)?;
                }
            }
        }
    }
    Ok(())
}

fn reference_cell_of(interp: &mut Interpreter, scope: &Rc<Scope>, expr: &Expr) -> RunResult<Rc<std::cell::RefCell<Value>>> {
    match expr {
        Expr::Variable(name, _) => Ok(scope.reference_cell(name)),
        _ => {
            let v = eval_expr(interp, scope, expr)?;
            Ok(Rc::new(std::cell::RefCell::new(v)))
        }
    }
}

fn bind_reference(scope: &Rc<Scope>, target: &Expr, cell: Rc<std::cell::RefCell<Value>>) -> RunResult<()> {
    match target {
        Expr::Variable(name, _) => {
            scope.bind_raw(name.clone(), Value::Reference(cell));
            Ok(())
        }
        _ => Err(Control::fatal(ExcKind::FatalError, "invalid reference-assignment target")),
    }
}

fn apply_unary(interp: &mut Interpreter, scope: &Rc<Scope>, op: crate::ast::UnOp, operand: &Expr) -> RunResult<Value> {
    use crate::ast::UnOp::*;
    match op {
        Neg => {
            let v = eval_expr(interp, scope, operand)?;
            Ok(match coercion::to_num(&v) {
                coercion::Num::Int(i) => Value::Int(-i),
                coercion::Num::Float(f) => Value::Float(-f),
            })
        }
        Plus => {
            let v = eval_expr(interp, scope, operand)?;
            Ok(match coercion::to_num(&v) {
                coercion::Num::Int(i) => Value::Int(i),
                coercion::Num::Float(f) => Value::Float(f),
            })
        }
        Not => {
            let v = eval_expr(interp, scope, operand)?;
            Ok(Value::Bool(!coercion::to_bool(&v)))
        }
        BitNot => {
            let v = eval_expr(interp, scope, operand)?;
            Ok(Value::Int(!coercion::to_int(&v)))
        }
        PreInc | PreDec | PostInc | PostDec => {
            let current = eval_expr(interp, scope, operand)?;
            let delta: i64 = if matches!(op, PreInc | PostInc) { 1 } else { -1 };
            let updated = match coercion::to_num(&current) {
                coercion::Num::Int(i) => Value::Int(i + delta),
                coercion::Num::Float(f) => Value::Float(f + delta as f64),
            };
            assign_to(interp, scope, operand, updated.clone())?;
            Ok(if matches!(op, PreInc | PreDec) { updated } else { current })
        }
    }
}

fn apply_binary(op: crate::ast::BinOp, l: &Value, r: &Value) -> RunResult<Value> {
    use crate::ast::BinOp::*;
    Ok(match op {
        Add => numeric_binop(l, r, |a, b| a.checked_add(b), |a, b| a + b)?,
        Sub => numeric_binop(l, r, |a, b| a.checked_sub(b), |a, b| a - b)?,
        Mul => numeric_binop(l, r, |a, b| a.checked_mul(b), |a, b| a * b)?,
        Div => {
            let (lnum, rnum) = (coercion::to_num(l), coercion::to_num(r));
            match (lnum, rnum) {
                (coercion::Num::Int(_), coercion::Num::Int(0)) => {
                    return Err(Control::fatal(ExcKind::DivisionByZero, "division by zero"));
                }
                (coercion::Num::Int(a), coercion::Num::Int(b)) if a % b == 0 => Value::Int(a / b),
                _ => {
                    let lv = coercion::to_float(l);
                    let rv = coercion::to_float(r);
                    Value::Float(lv / rv)
                }
            }
        }
        Mod => {
            let rv = coercion::to_int(r);
            if rv == 0 {
                return Err(Control::fatal(ExcKind::DivisionByZero, "modulo by zero"));
            }
            Value::Int(coercion::to_int(l) % rv)
        }
        Pow => {
            let lv = coercion::to_float(l);
            let rv = coercion::to_float(r);
            let result = lv.powf(rv);
            if matches!((coercion::to_num(l), coercion::to_num(r)), (coercion::Num::Int(_), coercion::Num::Int(_))) && rv >= 0.0 {
                Value::Int(result as i64)
            } else {
                Value::Float(result)
            }
        }
        Concat => Value::Str(coercion::concat(l, r)),
        Eq => Value::Bool(coercion::loose_eq(l, r)),
        NotEq => Value::Bool(!coercion::loose_eq(l, r)),
        Identical => Value::Bool(coercion::strict_eq(l, r)),
        NotIdentical => Value::Bool(!coercion::strict_eq(l, r)),
        Lt => Value::Bool(coercion::loose_cmp(l, r).is_lt()),
        Gt => Value::Bool(coercion::loose_cmp(l, r).is_gt()),
        Le => Value::Bool(coercion::loose_cmp(l, r).is_le()),
        Ge => Value::Bool(coercion::loose_cmp(l, r).is_ge()),
        Spaceship => Value::Int(coercion::loose_cmp(l, r) as i64),
        And => Value::Bool(coercion::to_bool(l) && coercion::to_bool(r)),
        Or => Value::Bool(coercion::to_bool(l) || coercion::to_bool(r)),
        BitAnd => Value::Int(coercion::to_int(l) & coercion::to_int(r)),
        BitOr => Value::Int(coercion::to_int(l) | coercion::to_int(r)),
        BitXor => Value::Int(coercion::to_int(l) ^ coercion::to_int(r)),
        Shl => Value::Int(coercion::to_int(l) << (coercion::to_int(r) & 63)),
        Shr => Value::Int(coercion::to_int(l) >> (coercion::to_int(r) & 63)),
    })
}

fn numeric_binop(l: &Value, r: &Value, int_op: impl Fn(i64, i64) -> Option<i64>, float_op: impl Fn(f64, f64) -> f64) -> RunResult<Value> {
    match (coercion::to_num(l), coercion::to_num(r)) {
        (coercion::Num::Int(a), coercion::Num::Int(b)) => match int_op(a, b) {
            Some(v) => Ok(Value::Int(v)),
            None => Ok(Value::Float(float_op(a as f64, b as f64))),
        },
        (a, b) => {
            let af = match a {
                coercion::Num::Int(i) => i as f64,
                coercion::Num::Float(f) => f,
            };
            let bf = match b {
                coercion::Num::Int(i) => i as f64,
                coercion::Num::Float(f) => f,
            };
            Ok(Value::Float(float_op(af, bf)))
        }
    }
}

fn eval_match(interp: &mut Interpreter, scope: &Rc<Scope>, scrutinee: &Expr, arms: &[MatchArm]) -> RunResult<Value> {
    let subject = eval_expr(interp, scope, scrutinee)?;
    for arm in arms {
        match &arm.conditions {
            None => return eval_expr(interp, scope, &arm.body),
            Some(conds) => {
                for c in conds {
                    let v = eval_expr(interp, scope, c)?;
                    if coercion::strict_eq(&subject, &v) {
                        return eval_expr(interp, scope, &arm.body);
                    }
                }
            }
        }
    }
    Err(Control::fatal(ExcKind::UnhandledMatchError, "unhandled match case"))
}

fn eval_args(interp: &mut Interpreter, scope: &Rc<Scope>, args: &[Argument]) -> RunResult<Vec<EvaluatedArg>> {
    let mut out = Vec::new();
    for a in args {
        if a.spread {
            let v = eval_expr(interp, scope, &a.value)?;
            if let Value::Array(arr) = v.deref_clone() {
                for (k, val) in arr.iter() {
                    let name = match k {
                        ArrayKey::Str(s) => Some(s.clone()),
                        ArrayKey::Int(_) => None,
                    };
                    out.push(EvaluatedArg { name, value: val.clone() });
                }
            }
        } else {
            let v = eval_expr(interp, scope, &a.value)?;
            out.push(EvaluatedArg { name: a.name.clone(), value: v });
        }
    }
    Ok(out)
}

fn resolve_class_ref(interp: &mut Interpreter, scope: &Rc<Scope>, class_ref: &ClassRef) -> RunResult<ClassId> {
    let ctx = invoke::current_call_context();
    match class_ref {
        ClassRef::Name(name) => lookup_class(interp, name),
        ClassRef::SelfKw => ctx.defining_class.ok_or_else(|| Control::fatal(ExcKind::FatalError, "self:: used outside class context")),
        ClassRef::StaticKw => ctx
            .static_class
            .or(ctx.defining_class)
            .ok_or_else(|| Control::fatal(ExcKind::FatalError, "static:: used outside class context")),
        ClassRef::ParentKw => {
            let defining = ctx.defining_class.ok_or_else(|| Control::fatal(ExcKind::FatalError, "parent:: used outside class context"))?;
            interp
                .globals()
                .borrow()
                .classes
                .get(defining)
                .parent
                .ok_or_else(|| Control::fatal(ExcKind::FatalError, "parent:: used without a parent class"))
        }
        ClassRef::Expr(e) => {
            let v = eval_expr(interp, scope, e)?;
            match v.deref_clone() {
                Value::Str(s) => lookup_class(interp, &s),
                Value::Object(o) => Ok(o.borrow().class),
                other => Err(Control::fatal(ExcKind::TypeError, format!("{} does not name a class", other.type_name()))),
            }
        }
    }
}

/// Extracts the literal class name a `new` expression targets, without
/// erroring when no such class exists — used to probe `host_classes`
/// before falling back to `resolve_class_ref`'s registry-only lookup.
fn new_target_name(interp: &mut Interpreter, scope: &Rc<Scope>, class_ref: &ClassRef) -> RunResult<Option<Rc<str>>> {
    match class_ref {
        ClassRef::Name(name) => Ok(Some(name.clone())),
        ClassRef::Expr(e) => {
            let v = eval_expr(interp, scope, e)?;
            match v.deref_clone() {
                Value::Str(s) => Ok(Some(s)),
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

fn lookup_class(interp: &Interpreter, name: &str) -> RunResult<ClassId> {
    interp.globals().borrow().classes.lookup(name).ok_or_else(|| Control::fatal(ExcKind::FatalError, format!("class {name} not found")))
}

/// Builds a new object of `class_id`, assigns every ancestry property's
/// default value root-first, then runs `__construct` if declared,
/// binding promoted parameters straight onto the object.
fn construct(interp: &mut Interpreter, class_id: ClassId, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    {
        let globals = interp.globals().borrow();
        let class = globals.classes.get(class_id);
        if class.is_abstract {
            return Err(Control::fatal(ExcKind::AbstractInstantiation, format!("cannot instantiate abstract class {}", class.name)));
        }
        if class.is_interface || class.is_trait {
            return Err(Control::fatal(ExcKind::AbstractInstantiation, format!("cannot instantiate {}", class.name)));
        }
    }
    let identity = interp.globals().borrow().next_identity();
    let class_name = interp.globals().borrow().classes.get(class_id).name.clone();
    let obj = Object::new(class_id, class_name, identity);

    let defaults: Vec<(Rc<str>, Option<crate::ast::Expr>)> = {
        let globals = interp.globals().borrow();
        globals.classes.get(class_id).properties.values().map(|p| (p.name.clone(), p.default.clone())).collect()
    };
    for (name, default) in defaults {
        let scope = Scope::new();
        let value = match &default {
            Some(e) => eval_expr(interp, &scope, e)?,
            None => Value::Null,
        };
        obj.borrow_mut().properties.insert(name, value);
    }

    let ctor = interp.globals().borrow().classes.resolve_method(class_id, "__construct");
    if let Some(ctor) = ctor {
        invoke_method_generic(interp, Some(obj.clone()), class_id, &ctor, args)?;
    }
    Ok(Value::Object(obj))
}

fn dispatch_method(interp: &mut Interpreter, receiver: Value, method: &str, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    let obj = match receiver.deref_clone() {
        Value::Object(o) => o,
        Value::Null => return Err(Control::fatal(ExcKind::FatalError, format!("call to method {method}() on null"))),
        other => return Err(Control::fatal(ExcKind::TypeError, format!("call to method {method}() on {}", other.type_name()))),
    };
    let class_id = obj.borrow().class;

    let host = interp.globals().borrow().host_classes.get(&obj.borrow().class_name.to_ascii_lowercase()).cloned();
    if let Some(host) = host {
        let values: Vec<Value> = args.into_iter().map(|a| a.value).collect();
        return host.call_method(interp, &Value::Object(obj.clone()), method, &values);
    }

    if let Some(m) = interp.globals().borrow().classes.resolve_method(class_id, method) {
        let caller = invoke::current_call_context().defining_class;
        let visible = {
            let globals = interp.globals().borrow();
            crate::class::check_visibility(&globals.classes, m.visibility, m.declaring_class, caller)
        };
        if !visible {
            return Err(Control::fatal(ExcKind::TypeError, format!("call to {:?} method {method}()", m.visibility)));
        }
        return invoke_method_generic(interp, Some(obj), class_id, &m, args);
    }

    if let Some(m) = interp.globals().borrow().classes.resolve_method(class_id, "__call") {
        if obj.borrow().try_enter_magic("__call") {
            let mut arr = Array::new();
            for a in args {
                arr.push(a.value);
            }
            let fallback_args = vec![EvaluatedArg { name: None, value: Value::str(method) }, EvaluatedArg { name: None, value: Value::Array(arr) }];
            let result = invoke_method_generic(interp, Some(obj.clone()), class_id, &m, fallback_args);
            obj.borrow().leave_magic("__call");
            return result;
        }
    }

    Err(Control::fatal(ExcKind::FatalError, format!("call to undefined method {}::{method}()", obj.borrow().class_name)))
}

fn invoke_method_generic(interp: &mut Interpreter, this: Option<ObjectHandle>, static_class: ClassId, method: &Rc<MethodDef>, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    let body = method
        .body
        .clone()
        .ok_or_else(|| Control::fatal(ExcKind::FatalError, format!("cannot call abstract method {}", method.name)))?;
    let bound = invoke::bind_arguments(&method.params, args, |e| eval_expr(interp, &Scope::new(), e))?;
    let call_scope = Scope::new();
    if let Some(obj) = &this {
        call_scope.bind_raw(Rc::from("this"), Value::Object(obj.clone()));
    }
    for (name, value) in bound {
        if let Some(obj) = &this {
            if method.params.iter().any(|p| p.name == name && p.promote.is_some()) {
                obj.borrow_mut().properties.insert(name.clone(), value.clone());
            }
        }
        call_scope.bind_raw(name, value);
    }
    let ctx = CallContext { this, defining_class: Some(method.declaring_class), static_class: Some(static_class) };
    run_body(interp, call_scope, body, ctx)
}

fn run_body(interp: &mut Interpreter, call_scope: Rc<Scope>, body: Rc<Vec<Stmt>>, ctx: CallContext) -> RunResult<Value> {
    if function::stmts_contain_yield(&body) {
        let mut interp2 = interp.clone();
        let handle = generator::spawn(move || {
            let _guard = invoke::CallGuard::enter(ctx)?;
            match crate::eval::stmt::exec_block(&mut interp2, &call_scope, &body) {
                Ok(()) => Ok(Value::Null),
                Err(Control::Return(v)) => Ok(v),
                Err(other) => Err(other),
            }
        });
        return Ok(Value::Generator(handle));
    }
    let _guard = invoke::CallGuard::enter(ctx)?;
    match crate::eval::stmt::exec_block(interp, &call_scope, &body) {
        Ok(()) => Ok(Value::Null),
        Err(Control::Return(v)) => Ok(v),
        Err(other) => Err(other),
    }
}

pub fn call_named(interp: &mut Interpreter, name: &str, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    if let Some(def) = interp.globals().borrow().lookup_function(name) {
        return call_user_function(interp, &def, args);
    }
    if interp.globals().borrow().builtins.contains_key(&name.to_ascii_lowercase()) {
        return call_builtin(interp, name, args);
    }
    Err(Control::fatal(ExcKind::FatalError, format!("call to undefined function {name}()")))
}

fn call_user_function(interp: &mut Interpreter, def: &Rc<FunctionDef>, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    let bound = invoke::bind_arguments(&def.params, args, |e| eval_expr(interp, &Scope::new(), e))?;
    let call_scope = Scope::new();
    for (name, value) in bound {
        call_scope.bind_raw(name, value);
    }
    run_body(interp, call_scope, def.body.clone(), CallContext::default())
}

fn call_builtin(interp: &mut Interpreter, name: &str, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    let f = interp
        .globals()
        .borrow()
        .builtins
        .get(&name.to_ascii_lowercase())
        .cloned()
        .ok_or_else(|| Control::fatal(ExcKind::FatalError, format!("call to undefined function {name}()")))?;
    let values: Vec<Value> = args.into_iter().map(|a| a.value).collect();
    f(interp, &values)
}

fn call_closure(interp: &mut Interpreter, closure: &Rc<Closure>, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    let bound = invoke::bind_arguments(&closure.params, args, |e| eval_expr(interp, &Scope::new(), e))?;
    let call_scope = Scope::new();
    for (name, value) in closure.captured.entries() {
        call_scope.bind_raw(name, value);
    }
    if let Some(this) = &closure.bound_this {
        call_scope.bind_raw(Rc::from("this"), Value::Object(this.clone()));
    }
    for (name, value) in bound {
        call_scope.bind_raw(name, value);
    }
    let ctx = CallContext { this: closure.bound_this.clone(), defining_class: closure.bound_class, static_class: closure.bound_class };
    run_body(interp, call_scope, closure.body.clone(), ctx)
}

fn call_arrow(interp: &mut Interpreter, arrow: &Rc<ArrowClosure>, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    let bound = invoke::bind_arguments(&arrow.params, args, |e| eval_expr(interp, &Scope::new(), e))?;
    let call_scope = Scope::new();
    for (name, value) in arrow.captured.entries() {
        call_scope.bind_raw(name, value);
    }
    if let Some(this) = &arrow.bound_this {
        call_scope.bind_raw(Rc::from("this"), Value::Object(this.clone()));
    }
    for (name, value) in bound {
        call_scope.bind_raw(name, value);
    }
    let ctx = CallContext { this: arrow.bound_this.clone(), defining_class: arrow.bound_class, static_class: arrow.bound_class };
    let _guard = invoke::CallGuard::enter(ctx)?;
    eval_expr(interp, &call_scope, &arrow.body)
}

pub fn call_value(interp: &mut Interpreter, callee: Value, args: Vec<EvaluatedArg>) -> RunResult<Value> {
    match callee.deref_clone() {
        Value::Callable(Callable::Function(def)) => call_user_function(interp, &def, args),
        Value::Callable(Callable::Closure(c)) => call_closure(interp, &c, args),
        Value::Callable(Callable::ArrowFn(a)) => call_arrow(interp, &a, args),
        Value::Callable(Callable::BoundMethod(bm)) => dispatch_method(interp, Value::Object(bm.receiver), &bm.method_name, args),
        Value::Callable(Callable::Builtin(name)) => call_builtin(interp, &name, args),
        Value::Str(s) => {
            if let Some((cls, m)) = s.split_once("::") {
                let class_id = lookup_class(interp, cls)?;
                let method = interp
                    .globals()
                    .borrow()
                    .classes
                    .resolve_method(class_id, m)
                    .ok_or_else(|| Control::fatal(ExcKind::FatalError, format!("call to undefined method {s}")))?;
                invoke_method_generic(interp, None, class_id, &method, args)
            } else {
                call_named(interp, &s, args)
            }
        }
        Value::Object(o) => dispatch_method(interp, Value::Object(o), "__invoke", args),
        other => Err(Control::fatal(ExcKind::TypeError, format!("value of type {} is not callable", other.type_name()))),
    }
}

/// `echo`/string-context coercion: defers to `__toString` for objects
/// instead of the raw `object(ClassName)` placeholder
/// `coercion::to_display_string` falls back to.
pub fn to_printable_string(interp: &mut Interpreter, value: &Value) -> RunResult<String> {
    if let Value::Object(obj) = value.deref_clone() {
        let class_id = obj.borrow().class;
        if let Some(m) = interp.globals().borrow().classes.resolve_method(class_id, "__toString") {
            let result = invoke_method_generic(interp, Some(obj), class_id, &m, vec![])?;
            return Ok(coercion::to_display_string(&result));
        }
    }
    Ok(coercion::to_display_string(value))
}

/// `foreach` over a user object implementing the host iterator protocol
/// (`rewind`/`valid`/`current`/`key`/`next`).
pub fn foreach_host_iterator(
    interp: &mut Interpreter,
    scope: &Rc<Scope>,
    obj: ObjectHandle,
    key_var: Option<&str>,
    value_var: &ForeachTarget,
    body: &Stmt,
) -> RunResult<()> {
    let receiver = Value::Object(obj);
    dispatch_method(interp, receiver.clone(), "rewind", vec![])?;
    loop {
        let valid = coercion::to_bool(&dispatch_method(interp, receiver.clone(), "valid", vec![])?);
        if !valid {
            break;
        }
        let value = dispatch_method(interp, receiver.clone(), "current", vec![])?;
        if let Some(kv) = key_var {
            let key = dispatch_method(interp, receiver.clone(), "key", vec![])?;
            scope.set(Rc::from(kv), key);
        }
        match value_var {
            ForeachTarget::Variable(name) => scope.set(name.clone(), value),
            ForeachTarget::ByRef(name) => scope.bind_raw(name.clone(), value),
            ForeachTarget::Destructure(pattern) => assign_destructure(scope, pattern, value)?,
        }
        match crate::eval::stmt::exec_stmt(interp, scope, body) {
            Ok(()) => {}
            Err(Control::Break(0)) => break,
            Err(Control::Break(n)) => return Err(Control::Break(n - 1)),
            Err(Control::Continue(0)) => {}
            Err(Control::Continue(n)) => return Err(Control::Continue(n - 1)),
            Err(other) => return Err(other),
        }
        dispatch_method(interp, receiver.clone(), "next", vec![])?;
    }
    Ok(())
}
