//! End-to-end evaluator tests built directly against hand-authored
//! ASTs (there is no lexer/parser in this workspace).

use std::rc::Rc;

use phpwalk::ast::{
    ArrayItem, Argument, BinOp, CatchClause, ClassDecl, ClassRef, Expr, ForeachTarget, FunctionDecl, MatchArm, MethodDecl, Param,
    PropName, PropertyDecl, Span, Stmt, UnOp, Visibility,
};
use phpwalk::class::ClassId;
use phpwalk::registry::HostClass;
use phpwalk::{Control, ExcKind, Interpreter, Object, RunResult, ThrowPayload};
use phpwalk::Value;

fn name(s: &str) -> Rc<str> {
    Rc::from(s)
}

fn var(s: &str) -> Expr {
    Expr::Variable(name(s), Span::synthetic())
}

fn int(v: i64) -> Expr {
    Expr::Int(v, Span::synthetic())
}

fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args: args.into_iter().map(|value| Argument { name: None, value, spread: false }).collect(),
        span: Span::synthetic(),
    }
}

fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: Span::synthetic() }
}

fn run(stmts: Vec<Stmt>) -> (Value, Interpreter) {
    let program = phpwalk::ast::builder::program(stmts);
    let mut interp = Interpreter::new();
    let value = interp.evaluate(&program).expect("program should evaluate without error");
    (value, interp)
}

/// Like `run`, but for tests asserting on an error or a notice rather
/// than a successful return value.
fn try_run(stmts: Vec<Stmt>) -> (RunResult<Value>, Interpreter) {
    let program = phpwalk::ast::builder::program(stmts);
    let mut interp = Interpreter::new();
    let result = interp.evaluate(&program);
    (result, interp)
}

#[test]
fn recursive_function_computes_fibonacci() {
    // function fib($n) { if ($n < 2) { return $n; } return fib($n - 1) + fib($n - 2); }
    let n = name("n");
    let body = vec![
        Stmt::If {
            cond: bin(BinOp::Lt, var("n"), int(2)),
            then_branch: Box::new(Stmt::Return(Some(var("n")), Span::synthetic())),
            elseifs: vec![],
            else_branch: None,
        },
        Stmt::Return(
            Some(bin(
                BinOp::Add,
                call(Expr::ConstFetch(name("fib"), Span::synthetic()), vec![bin(BinOp::Sub, var("n"), int(1))]),
                call(Expr::ConstFetch(name("fib"), Span::synthetic()), vec![bin(BinOp::Sub, var("n"), int(2))]),
            )),
            Span::synthetic(),
        ),
    ];
    let fib_decl = Rc::new(FunctionDecl {
        name: name("fib"),
        params: vec![Param { name: n, default: None, by_ref: false, variadic: false, promote: None }],
        body,
        span: Span::synthetic(),
    });

    let call_fib = call(Expr::ConstFetch(name("fib"), Span::synthetic()), vec![int(10)]);
    let (value, _) = run(vec![Stmt::FunctionDecl(fib_decl), Stmt::Return(Some(call_fib), Span::synthetic())]);

    assert!(matches!(value, Value::Int(55)), "expected fib(10) == 55, got {value:?}");
}

#[test]
fn promoted_constructor_params_become_readable_properties() {
    // class Point { public function __construct(public int $x, public int $y) {} }
    let ctor = Rc::new(MethodDecl {
        name: name("__construct"),
        visibility: Visibility::Public,
        is_static: false,
        is_abstract: false,
        is_final: false,
        params: vec![
            Param { name: name("x"), default: None, by_ref: false, variadic: false, promote: Some(Visibility::Public) },
            Param { name: name("y"), default: None, by_ref: false, variadic: false, promote: Some(Visibility::Public) },
        ],
        body: Some(Rc::new(vec![])),
        span: Span::synthetic(),
    });
    let point = Rc::new(ClassDecl {
        name: name("Point"),
        parent: None,
        interfaces: vec![],
        traits: vec![],
        is_abstract: false,
        is_final: false,
        is_interface: false,
        is_trait: false,
        properties: vec![],
        methods: vec![ctor],
        consts: vec![],
        span: Span::synthetic(),
    });

    let new_point = Expr::New {
        class: ClassRef::Name(name("Point")),
        args: vec![
            Argument { name: None, value: int(3), spread: false },
            Argument { name: None, value: int(4), spread: false },
        ],
        span: Span::synthetic(),
    };
    let read_x = Expr::PropertyAccess {
        base: Box::new(var("p")),
        name: PropName::Literal(name("x")),
        null_safe: false,
        span: Span::synthetic(),
    };
    let read_y = Expr::PropertyAccess {
        base: Box::new(var("p")),
        name: PropName::Literal(name("y")),
        null_safe: false,
        span: Span::synthetic(),
    };

    let (value, _) = run(vec![
        Stmt::ClassDecl(point),
        Stmt::Expr(Expr::Assign { target: Box::new(var("p")), value: Box::new(new_point), span: Span::synthetic() }),
        Stmt::Return(Some(bin(BinOp::Add, read_x, read_y)), Span::synthetic()),
    ]);

    assert!(matches!(value, Value::Int(7)), "expected 3 + 4 == 7, got {value:?}");
}

#[test]
fn generator_yields_values_in_order() {
    // function counter() { yield 1; yield 2; yield 3; }
    // foreach (counter() as $v) { $total = $total + $v; }
    let body = vec![
        Stmt::Expr(Expr::Yield { key: None, value: Some(Box::new(int(1))), span: Span::synthetic() }),
        Stmt::Expr(Expr::Yield { key: None, value: Some(Box::new(int(2))), span: Span::synthetic() }),
        Stmt::Expr(Expr::Yield { key: None, value: Some(Box::new(int(3))), span: Span::synthetic() }),
    ];
    let counter_decl = Rc::new(FunctionDecl { name: name("counter"), params: vec![], body, span: Span::synthetic() });

    let init_total = Stmt::Expr(Expr::Assign { target: Box::new(var("total")), value: Box::new(int(0)), span: Span::synthetic() });
    let loop_body = Stmt::Expr(Expr::Assign {
        target: Box::new(var("total")),
        value: Box::new(bin(BinOp::Add, var("total"), var("v"))),
        span: Span::synthetic(),
    });
    let foreach = Stmt::Foreach {
        subject: call(Expr::ConstFetch(name("counter"), Span::synthetic()), vec![]),
        key_var: None,
        value_var: ForeachTarget::Variable(name("v")),
        body: Box::new(loop_body),
    };

    let (value, _) = run(vec![
        Stmt::FunctionDecl(counter_decl),
        init_total,
        foreach,
        Stmt::Return(Some(var("total")), Span::synthetic()),
    ]);

    assert!(matches!(value, Value::Int(6)), "expected 1 + 2 + 3 == 6, got {value:?}");
}

#[test]
fn try_catch_recovers_from_a_thrown_division_by_zero() {
    // try { $r = 1 / 0; } catch (DivisionByZeroError $e) { $r = -1; }
    let try_body = vec![Stmt::Expr(Expr::Assign {
        target: Box::new(var("r")),
        value: Box::new(bin(BinOp::Div, int(1), int(0))),
        span: Span::synthetic(),
    })];
    let catch_body = vec![Stmt::Expr(Expr::Assign { target: Box::new(var("r")), value: Box::new(int(-1)), span: Span::synthetic() })];
    let try_stmt = Stmt::Try {
        body: try_body,
        catches: vec![CatchClause { classes: vec![name("DivisionByZero")], var: Some(name("e")), body: catch_body }],
        finally: None,
    };

    let (value, _) = run(vec![try_stmt, Stmt::Return(Some(var("r")), Span::synthetic())]);
    assert!(matches!(value, Value::Int(-1)), "expected the catch clause to run, got {value:?}");
}

#[test]
fn match_picks_the_first_matching_arm_with_strict_comparison() {
    // match (2) { 1 => 'one', 2 => 'two', default => 'other' };
    let m = Expr::Match {
        scrutinee: Box::new(int(2)),
        arms: vec![
            MatchArm { conditions: Some(vec![int(1)]), body: Expr::Str(Rc::from("one"), Span::synthetic()) },
            MatchArm { conditions: Some(vec![int(2)]), body: Expr::Str(Rc::from("two"), Span::synthetic()) },
            MatchArm { conditions: None, body: Expr::Str(Rc::from("other"), Span::synthetic()) },
        ],
        span: Span::synthetic(),
    };

    let (value, _) = run(vec![Stmt::Return(Some(m), Span::synthetic())]);
    match value {
        Value::Str(s) => assert_eq!(&*s, "two"),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn null_safe_chain_short_circuits_on_null() {
    // $p = null; return $p?->x;
    let assign_null = Stmt::Expr(Expr::Assign { target: Box::new(var("p")), value: Box::new(Expr::Null(Span::synthetic())), span: Span::synthetic() });
    let read = Expr::PropertyAccess {
        base: Box::new(var("p")),
        name: PropName::Literal(name("x")),
        null_safe: true,
        span: Span::synthetic(),
    };

    let (value, _) = run(vec![assign_null, Stmt::Return(Some(read), Span::synthetic())]);
    assert!(matches!(value, Value::Null));
}

#[test]
fn array_literal_with_spread_flattens_elements() {
    // return [1, ...[2, 3], 4];
    let inner = Expr::ArrayLit(
        vec![
            ArrayItem { key: None, value: int(2), spread: false, by_ref: false },
            ArrayItem { key: None, value: int(3), spread: false, by_ref: false },
        ],
        Span::synthetic(),
    );
    let outer = Expr::ArrayLit(
        vec![
            ArrayItem { key: None, value: int(1), spread: false, by_ref: false },
            ArrayItem { key: None, value: inner, spread: true, by_ref: false },
            ArrayItem { key: None, value: int(4), spread: false, by_ref: false },
        ],
        Span::synthetic(),
    );

    let (value, _) = run(vec![Stmt::Return(Some(outer), Span::synthetic())]);
    match value {
        Value::Array(arr) => {
            let values: Vec<i64> = arr
                .iter()
                .map(|(_, v)| match v {
                    Value::Int(i) => *i,
                    _ => panic!("expected int"),
                })
                .collect();
            assert_eq!(values, vec![1, 2, 3, 4]);
        }
        other => panic!("expected an array, got {other:?}"),
    }
}

#[test]
fn instanceof_is_transitive_through_inheritance() {
    // class Animal {} class Dog extends Animal {}
    // $d = new Dog(); return $d instanceof Animal;
    let animal = Rc::new(ClassDecl {
        name: name("Animal"),
        parent: None,
        interfaces: vec![],
        traits: vec![],
        is_abstract: false,
        is_final: false,
        is_interface: false,
        is_trait: false,
        properties: vec![],
        methods: vec![],
        consts: vec![],
        span: Span::synthetic(),
    });
    let dog = Rc::new(ClassDecl {
        name: name("Dog"),
        parent: Some(name("Animal")),
        interfaces: vec![],
        traits: vec![],
        is_abstract: false,
        is_final: false,
        is_interface: false,
        is_trait: false,
        properties: vec![],
        methods: vec![],
        consts: vec![],
        span: Span::synthetic(),
    });

    let new_dog = Expr::New { class: ClassRef::Name(name("Dog")), args: vec![], span: Span::synthetic() };
    let check = Expr::InstanceOf { expr: Box::new(var("d")), class: ClassRef::Name(name("Animal")), span: Span::synthetic() };

    let (value, _) = run(vec![
        Stmt::ClassDecl(animal),
        Stmt::ClassDecl(dog),
        Stmt::Expr(Expr::Assign { target: Box::new(var("d")), value: Box::new(new_dog), span: Span::synthetic() }),
        Stmt::Return(Some(check), Span::synthetic()),
    ]);

    assert!(matches!(value, Value::Bool(true)));
}

#[test]
fn prefix_and_postfix_increment_differ_in_returned_value() {
    // $x = 5; return [$x++, $x, ++$x, $x];
    let setup = Stmt::Expr(Expr::Assign { target: Box::new(var("x")), value: Box::new(int(5)), span: Span::synthetic() });
    let post = Expr::Unary { op: UnOp::PostInc, operand: Box::new(var("x")), span: Span::synthetic() };
    let pre = Expr::Unary { op: UnOp::PreInc, operand: Box::new(var("x")), span: Span::synthetic() };
    let out = Expr::ArrayLit(
        vec![
            ArrayItem { key: None, value: post, spread: false, by_ref: false },
            ArrayItem { key: None, value: var("x"), spread: false, by_ref: false },
            ArrayItem { key: None, value: pre, spread: false, by_ref: false },
            ArrayItem { key: None, value: var("x"), spread: false, by_ref: false },
        ],
        Span::synthetic(),
    );

    let (value, _) = run(vec![setup, Stmt::Return(Some(out), Span::synthetic())]);
    match value {
        Value::Array(arr) => {
            let values: Vec<i64> = arr
                .iter()
                .map(|(_, v)| match v {
                    Value::Int(i) => *i,
                    _ => panic!("expected int"),
                })
                .collect();
            assert_eq!(values, vec![5, 6, 7, 7]);
        }
        other => panic!("expected an array, got {other:?}"),
    }
}

#[test]
fn division_by_zero_with_a_float_operand_yields_infinity() {
    // return 1.0 / 0;
    let div = Expr::Binary { op: BinOp::Div, lhs: Box::new(Expr::Float(1.0, Span::synthetic())), rhs: Box::new(int(0)), span: Span::synthetic() };
    let (value, _) = run(vec![Stmt::Return(Some(div), Span::synthetic())]);
    match value {
        Value::Float(f) => assert!(f.is_infinite() && f.is_sign_positive(), "expected +INF, got {f}"),
        other => panic!("expected a float, got {other:?}"),
    }
}

#[test]
fn division_by_zero_with_two_ints_still_throws() {
    // return 1 / 0;
    let div = bin(BinOp::Div, int(1), int(0));
    let (result, _) = try_run(vec![Stmt::Return(Some(div), Span::synthetic())]);
    match result {
        Err(Control::Exception(ThrowPayload::Host { kind: ExcKind::DivisionByZero, .. })) => {}
        other => panic!("expected a DivisionByZero throw, got {other:?}"),
    }
}

#[test]
fn undefined_constant_evaluates_to_its_own_name_with_a_notice() {
    // return SOME_UNDEFINED_CONSTANT;
    let fetch = Expr::ConstFetch(name("SOME_UNDEFINED_CONSTANT"), Span::synthetic());
    let (value, interp) = run(vec![Stmt::Return(Some(fetch), Span::synthetic())]);
    match value {
        Value::Str(s) => assert_eq!(&*s, "SOME_UNDEFINED_CONSTANT"),
        other => panic!("expected a string, got {other:?}"),
    }
    assert!(interp.diagnostics().iter().any(|d| d.contains("SOME_UNDEFINED_CONSTANT")), "expected a notice about the undefined constant");
}

#[test]
fn undefined_variable_reads_as_null_with_a_notice() {
    // return $never_assigned;
    let (value, interp) = run(vec![Stmt::Return(Some(var("never_assigned")), Span::synthetic())]);
    assert!(matches!(value, Value::Null));
    assert!(interp.diagnostics().iter().any(|d| d.contains("never_assigned")), "expected a notice about the undefined variable");
}

#[test]
fn fatal_errors_are_not_caught_by_a_broad_catch_clause() {
    // abstract class Shape {}
    // try { new Shape(); } catch (Throwable $e) { $r = -1; }
    // return $r;
    let shape = Rc::new(ClassDecl {
        name: name("Shape"),
        parent: None,
        interfaces: vec![],
        traits: vec![],
        is_abstract: true,
        is_final: false,
        is_interface: false,
        is_trait: false,
        properties: vec![],
        methods: vec![],
        consts: vec![],
        span: Span::synthetic(),
    });
    let try_body = vec![Stmt::Expr(Expr::New { class: ClassRef::Name(name("Shape")), args: vec![], span: Span::synthetic() })];
    let catch_body = vec![Stmt::Expr(Expr::Assign { target: Box::new(var("r")), value: Box::new(int(-1)), span: Span::synthetic() })];
    let try_stmt = Stmt::Try {
        body: try_body,
        catches: vec![CatchClause { classes: vec![name("Throwable")], var: Some(name("e")), body: catch_body }],
        finally: None,
    };

    let (result, _) = try_run(vec![Stmt::ClassDecl(shape), try_stmt, Stmt::Return(Some(var("r")), Span::synthetic())]);
    match result {
        Err(Control::Exception(ThrowPayload::Host { kind: ExcKind::AbstractInstantiation, .. })) => {}
        other => panic!("expected the abstract-instantiation fatal to escape the catch(Throwable), got {other:?}"),
    }
}

fn private_property_class(name_str: &str, reveal_body: Vec<Stmt>) -> Rc<ClassDecl> {
    let prop = PropertyDecl { name: name("secret"), visibility: Visibility::Private, is_static: false, is_readonly: false, default: Some(int(1)) };
    let reveal = Rc::new(MethodDecl {
        name: name("reveal"),
        visibility: Visibility::Public,
        is_static: false,
        is_abstract: false,
        is_final: false,
        params: vec![],
        body: Some(Rc::new(reveal_body)),
        span: Span::synthetic(),
    });
    Rc::new(ClassDecl {
        name: name(name_str),
        parent: None,
        interfaces: vec![],
        traits: vec![],
        is_abstract: false,
        is_final: false,
        is_interface: false,
        is_trait: false,
        properties: vec![prop],
        methods: vec![reveal],
        consts: vec![],
        span: Span::synthetic(),
    })
}

#[test]
fn private_property_is_unreadable_from_outside_its_class() {
    // class Box { private $secret = 1; function reveal() { return $this->secret; } }
    // $b = new Box(); return $b->secret;
    let class = private_property_class("Box", vec![Stmt::Return(
        Some(Expr::PropertyAccess { base: Box::new(var("this")), name: PropName::Literal(name("secret")), null_safe: false, span: Span::synthetic() }),
        Span::synthetic(),
    )]);
    let new_box = Expr::New { class: ClassRef::Name(name("Box")), args: vec![], span: Span::synthetic() };
    let read = Expr::PropertyAccess { base: Box::new(var("b")), name: PropName::Literal(name("secret")), null_safe: false, span: Span::synthetic() };

    let (result, _) = try_run(vec![
        Stmt::ClassDecl(class),
        Stmt::Expr(Expr::Assign { target: Box::new(var("b")), value: Box::new(new_box), span: Span::synthetic() }),
        Stmt::Return(Some(read), Span::synthetic()),
    ]);
    match result {
        Err(Control::Exception(ThrowPayload::Host { kind: ExcKind::TypeError, .. })) => {}
        other => panic!("expected a visibility violation, got {other:?}"),
    }
}

#[test]
fn private_property_is_readable_from_its_own_method() {
    // class Box { private $secret = 1; function reveal() { return $this->secret; } }
    // $b = new Box(); return $b->reveal();
    let class = private_property_class("Box", vec![Stmt::Return(
        Some(Expr::PropertyAccess { base: Box::new(var("this")), name: PropName::Literal(name("secret")), null_safe: false, span: Span::synthetic() }),
        Span::synthetic(),
    )]);
    let new_box = Expr::New { class: ClassRef::Name(name("Box")), args: vec![], span: Span::synthetic() };
    let call_reveal =
        Expr::MethodCall { base: Box::new(var("b")), name: PropName::Literal(name("reveal")), args: vec![], null_safe: false, span: Span::synthetic() };

    let (value, _) = run(vec![
        Stmt::ClassDecl(class),
        Stmt::Expr(Expr::Assign { target: Box::new(var("b")), value: Box::new(new_box), span: Span::synthetic() }),
        Stmt::Return(Some(call_reveal), Span::synthetic()),
    ]);
    assert!(matches!(value, Value::Int(1)), "expected reveal() to read its own private property, got {value:?}");
}

#[test]
fn a_positional_argument_after_a_named_one_is_rejected() {
    // function f($a, $b) { return $a + $b; }
    // f(b: 2, 3);
    let f = Rc::new(FunctionDecl {
        name: name("f"),
        params: vec![
            Param { name: name("a"), default: None, by_ref: false, variadic: false, promote: None },
            Param { name: name("b"), default: None, by_ref: false, variadic: false, promote: None },
        ],
        body: vec![Stmt::Return(Some(bin(BinOp::Add, var("a"), var("b"))), Span::synthetic())],
        span: Span::synthetic(),
    });
    let call_f = Expr::Call {
        callee: Box::new(Expr::ConstFetch(name("f"), Span::synthetic())),
        args: vec![
            Argument { name: Some(name("b")), value: int(2), spread: false },
            Argument { name: None, value: int(3), spread: false },
        ],
        span: Span::synthetic(),
    };

    let (result, _) = try_run(vec![Stmt::FunctionDecl(f), Stmt::Return(Some(call_f), Span::synthetic())]);
    match result {
        Err(Control::Exception(ThrowPayload::Host { kind: ExcKind::ArgumentCountError, .. })) => {}
        other => panic!("expected an ArgumentCountError, got {other:?}"),
    }
}

#[test]
fn exit_sets_the_interpreters_exit_code_instead_of_being_indistinguishable_from_a_plain_return() {
    // exit(7);
    let exit_stmt = Stmt::Exit { arg: Some(int(7)), is_die: false, span: Span::synthetic() };
    let (result, interp) = try_run(vec![exit_stmt]);
    assert!(result.is_ok(), "exit should not surface as an evaluation error");
    assert_eq!(interp.exit_code(), Some(7));
}

struct Counter;

impl HostClass for Counter {
    fn class_name(&self) -> &str {
        "Counter"
    }

    fn construct(&self, interp: &mut Interpreter, _args: &[Value]) -> RunResult<Value> {
        let class_id: ClassId = interp.globals().borrow().classes.lookup("Counter").expect("Counter registered as a placeholder class");
        let identity = interp.globals().borrow().next_identity();
        let obj = Object::new(class_id, Rc::from("Counter"), identity);
        obj.borrow_mut().properties.insert(Rc::from("count"), Value::Int(0));
        Ok(Value::Object(obj))
    }

    fn call_method(&self, _interp: &mut Interpreter, receiver: &Value, method: &str, _args: &[Value]) -> RunResult<Value> {
        match (receiver, method) {
            (Value::Object(obj), "increment") => {
                let next = match obj.borrow().properties.get("count") {
                    Some(Value::Int(i)) => i + 1,
                    _ => 1,
                };
                obj.borrow_mut().properties.insert(Rc::from("count"), Value::Int(next));
                Ok(Value::Int(next))
            }
            _ => Ok(Value::Null),
        }
    }

    fn get_property(&self, _interp: &mut Interpreter, receiver: &Value, name: &str) -> RunResult<Option<Value>> {
        match receiver {
            Value::Object(obj) => Ok(obj.borrow().properties.get(name).cloned()),
            _ => Ok(None),
        }
    }
}

#[test]
fn host_class_construct_method_and_property_hooks_are_dispatched() {
    // class Counter {} (placeholder so `new Counter()` resolves a ClassId)
    // $c = new Counter(); $c->increment(); $c->increment(); return $c->count;
    let placeholder = Rc::new(ClassDecl {
        name: name("Counter"),
        parent: None,
        interfaces: vec![],
        traits: vec![],
        is_abstract: false,
        is_final: false,
        is_interface: false,
        is_trait: false,
        properties: vec![],
        methods: vec![],
        consts: vec![],
        span: Span::synthetic(),
    });

    let program = phpwalk::ast::builder::program(vec![
        Stmt::ClassDecl(placeholder),
        Stmt::Expr(Expr::Assign {
            target: Box::new(var("c")),
            value: Box::new(Expr::New { class: ClassRef::Name(name("Counter")), args: vec![], span: Span::synthetic() }),
            span: Span::synthetic(),
        }),
        Stmt::Expr(Expr::MethodCall {
            base: Box::new(var("c")),
            name: PropName::Literal(name("increment")),
            args: vec![],
            null_safe: false,
            span: Span::synthetic(),
        }),
        Stmt::Expr(Expr::MethodCall {
            base: Box::new(var("c")),
            name: PropName::Literal(name("increment")),
            args: vec![],
            null_safe: false,
            span: Span::synthetic(),
        }),
        Stmt::Return(
            Some(Expr::PropertyAccess { base: Box::new(var("c")), name: PropName::Literal(name("count")), null_safe: false, span: Span::synthetic() }),
            Span::synthetic(),
        ),
    ]);

    let mut interp = Interpreter::new();
    interp.register_host_class(Rc::new(Counter));
    let value = interp.evaluate(&program).expect("program should evaluate without error");
    assert!(matches!(value, Value::Int(2)), "expected two increments to leave count at 2, got {value:?}");
}
