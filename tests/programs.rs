//! End-to-end programs through the public API

use boxscheme::trace::TraceSink;
use boxscheme::value::{sym, val};
use boxscheme::{Error, Interpreter, Value, eval_program, eval_source};

fn run(source: &str) -> Result<Value, Error> {
    Interpreter::new()
        .with_trace_sink(TraceSink::buffer())
        .run_source(source)
}

#[test]
fn square_and_mutation_examples() {
    assert_eq!(
        run("(define sq (lambda (x) (* x x))) (sq 5)"),
        Ok(val(25))
    );
    assert_eq!(run("(let ((x 1)) (set! x 2) x)"), Ok(val(2)));
}

#[test]
fn literals_evaluate_to_themselves() {
    assert_eq!(eval_source("7"), Ok(val(7)));
    assert_eq!(eval_source("#f"), Ok(val(false)));
    assert_eq!(eval_source("\"text\""), Ok(val("text")));
    assert_eq!(eval_source("'(a 1)"), Ok(val(vec![sym("a"), val(1)])));
}

#[test]
fn if_evaluates_one_branch_only() {
    let source = "
        (define loop (lambda () (loop)))
        (if #f (loop) 'done)";
    assert_eq!(run(source), Ok(sym("done")));
    assert_eq!(run("(if #t 'done (loop))"), Ok(sym("done")));
}

#[test]
fn let_initializers_do_not_see_each_other() {
    assert_eq!(
        run("(let ((x 1) (y x)) y)"),
        Err(Error::UnboundVariable("x".into()))
    );
}

#[test]
fn letrec_mutual_recursion() {
    let source = "
        (letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                 (odd? (lambda (n) (if (= n 0) #f (even? (- n 1))))))
          (list (even? 4) (odd? 4) (even? 3)))";
    assert_eq!(run(source), Ok(val([true, false, false])));
}

#[test]
fn counter_closure_accumulates() {
    let source = "
        (define counter
          (let ((count 0))
            (lambda () (set! count (+ count 1)) count)))
        (counter)
        (counter)";
    assert_eq!(run(source), Ok(val(2)));
}

#[test]
fn forward_reference_between_defines() {
    let defined_later = "
        (define first (lambda (n) (second n)))
        (define second (lambda (n) (* n 10)))
        (first 4)";
    assert_eq!(run(defined_later), Ok(val(40)));

    let called_too_early = "
        (define first (lambda (n) (second n)))
        (first 4)
        (define second (lambda (n) (* n 10)))";
    assert_eq!(
        run(called_too_early),
        Err(Error::UnboundVariable("second".into()))
    );
}

#[test]
fn operands_are_evaluated_left_to_right() {
    let source = "
        (define seen '())
        (define mark (lambda (x) (set! seen (cons x seen)) x))
        ((lambda (a b c) seen) (mark 1) (mark 2) (mark 3))";
    assert_eq!(run(source), Ok(val([3, 2, 1])));
}

#[test]
fn errors_are_reported_by_kind() {
    assert_eq!(
        run("((lambda (a b) a) 1)"),
        Err(Error::arity_mismatch(2, 1))
    );
    assert_eq!(
        run("(set! ghost 1)"),
        Err(Error::UnboundVariable("ghost".into()))
    );
    assert_eq!(run("(#t 1)"), Err(Error::NotAProcedure("#t".into())));
    assert!(matches!(run("(car 1)"), Err(Error::PrimitiveError(_))));
    assert!(matches!(run("(let ((x 1)"), Err(Error::ParseError(_))));
    assert_eq!(run(""), Err(Error::EmptyProgram));
}

#[test]
fn first_error_stops_the_program() {
    let mut interpreter = Interpreter::new();
    let result = interpreter.run_source("(define a 1) (car '()) (define b 2)");
    assert!(result.is_err());
    let names: Vec<String> = interpreter
        .global_bindings()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, ["a"]);
}

#[test]
fn traced_recursion_is_nested_and_value_preserving() {
    let fib = "(define fib (lambda (n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))";

    let plain = run(&format!("{fib} (fib 3)"));

    let mut interpreter = Interpreter::new().with_trace_sink(TraceSink::buffer());
    let traced = interpreter.run_source(&format!("{fib} (trace fib) (fib 3)"));
    assert_eq!(traced, plain);
    assert_eq!(traced, Ok(val(2)));
    assert_eq!(
        interpreter.trace_output(),
        [
            "> (fib 3)",
            "> > (fib 2)",
            "> > > (fib 1)",
            "< < < 1",
            "> > > (fib 0)",
            "< < < 0",
            "< < 1",
            "> > (fib 1)",
            "< < 1",
            "< 2",
        ]
    );
}

#[test]
fn tracing_through_an_alias_uses_the_traced_name() {
    let mut interpreter = Interpreter::new().with_trace_sink(TraceSink::buffer());
    let source = "
        (define inc (lambda (x) (+ x 1)))
        (trace inc)
        (define also-inc inc)
        (also-inc 1)";
    assert_eq!(interpreter.run_source(source), Ok(val(2)));
    assert_eq!(interpreter.trace_output(), ["> (inc 1)", "< 2"]);
}

#[test]
fn free_functions_start_fresh_runs() {
    let program = boxscheme::scheme::read_program("(define x 1) x").expect("valid program");
    assert_eq!(eval_program(&program), Ok(val(1)));
    assert_eq!(eval_source("x"), Err(Error::UnboundVariable("x".into())));
}

#[test]
fn session_keeps_definitions_between_inputs() {
    let mut interpreter = Interpreter::new();
    assert!(matches!(
        interpreter.eval_source("(define total 0)"),
        Ok(Value::Void)
    ));
    assert!(matches!(
        interpreter.eval_source("(set! total (+ total 5))"),
        Ok(Value::Void)
    ));
    assert_eq!(interpreter.eval_source("total"), Ok(val(5)));
}
