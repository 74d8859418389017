use boxscheme::Interpreter;
use boxscheme::primitives::primitives;
use boxscheme::value::Value;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    env_logger::init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("BoxScheme - lexically scoped Scheme with set!, letrec and tracing");
    println!("Enter expressions like: (define sq (lambda (x) (* x x)))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut interpreter = Interpreter::new();

    loop {
        match rl.readline("boxscheme> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(line);

                // Handle special commands
                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&interpreter);
                        continue;
                    }
                    ":trace" => {
                        print_traced(&interpreter);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                // Every line is a program: several forms may be entered at once
                match interpreter.run_source(line) {
                    // Forms evaluated for effect print nothing
                    Ok(Value::Void) => {}
                    Ok(result) => println!("{result}"),
                    Err(boxscheme::Error::EmptyProgram) => {}
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("BoxScheme Interpreter:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show global bindings");
    println!("  :trace     - Show traced procedures and their call depth");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  (define name expr)             top level only");
    println!("  (lambda (params...) body...)");
    println!("  (let ((name expr)...) body...)");
    println!("  (letrec ((name expr)...) body...)");
    println!("  (set! name expr)");
    println!("  (if test then else)");
    println!("  (quote datum) or 'datum");
    println!("  (trace name)");
    println!();

    println!("Primitives:");
    let mut col = 0;
    for op in primitives() {
        print!("  {:<10}", op.name);
        col += 1;
        if col % 6 == 0 {
            println!();
        }
    }
    if col % 6 != 0 {
        println!();
    }
    println!();
    println!("Examples:");
    println!("  (define fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))");
    println!("  (trace fact)");
    println!("  (fact 3)");
    println!();
}

fn print_environment(interpreter: &Interpreter) {
    let bindings = interpreter.global_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Global bindings ({} total):", bindings.len());
    for (name, value) in bindings {
        println!("  {name} = {value}");
    }
}

fn print_traced(interpreter: &Interpreter) {
    let registry = interpreter.tracer().registry();
    let names = registry.names();

    if names.is_empty() {
        println!("No procedures are traced.");
        return;
    }

    for name in names {
        let depth = registry.depth(&name).unwrap_or(0);
        println!("  {name} (depth {depth})");
    }
}
