use std::{process::ExitCode, time::Instant};

use phpwalk::ast::{self, builder, BinOp, Stmt};
use phpwalk::Interpreter;

/// There is no lexer/parser in this workspace — the CLI exists to
/// exercise the engine end to end, so it builds one fixed demo
/// program with [`ast::builder`] instead of reading a script off disk.
fn main() -> ExitCode {
    let program = demo_program();

    let mut interp = Interpreter::new();
    let start = Instant::now();
    let result = interp.evaluate(&program);
    let elapsed = start.elapsed();

    print!("{}", interp.output());
    for note in interp.diagnostics() {
        eprintln!("notice: {note}");
    }

    if let Some(code) = interp.exit_code() {
        eprintln!("exited after: {elapsed:?} with code {code}");
        return ExitCode::from(code.rem_euclid(256) as u8);
    }

    match result {
        Ok(value) => {
            eprintln!("success after: {elapsed:?}\n{value:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error after: {elapsed:?}\n{err:?}");
            ExitCode::FAILURE
        }
    }
}

/// `$x = 6; echo $x + 7;` — enough to prove the evaluator, printer, and
/// diagnostics plumbing are wired together correctly.
fn demo_program() -> ast::Program {
    let assign = Stmt::Expr(builder::assign(builder::var("x"), builder::int(6)));
    let echo = Stmt::Echo(vec![builder::bin(BinOp::Add, builder::var("x"), builder::int(7))], ast::Span::synthetic());
    builder::program(vec![assign, echo])
}
