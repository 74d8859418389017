//! Procedure call tracing.
//!
//! `(trace name)` registers `name` with a call-depth counter of zero. From then on, looking
//! up `name` yields a traced closure, and applying a traced closure goes through
//! [`Tracer::enter`] and [`Tracer::exit`]:
//!
//! ```text
//! > (fact 3)
//! > > (fact 2)
//! > > > (fact 1)
//! < < < 1
//! < < 2
//! < 6
//! ```
//!
//! The call line is indented by the counter before the call, the counter is incremented
//! for the duration of the call, and the return line is indented by the counter after it
//! is decremented again. No return line is printed for a failing call.

use crate::TraceDepthOnError;
use crate::value::{Value, render_value};
use log::debug;
use std::collections::HashMap;

/// Traced procedure names and their live call depth
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceRegistry {
    depths: HashMap<String, usize>,
}

impl TraceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for tracing, (re)starting its counter at zero
    pub fn insert(&mut self, name: &str) {
        self.depths.insert(name.to_owned(), 0);
    }

    pub fn is_traced(&self, name: &str) -> bool {
        self.depths.contains_key(name)
    }

    /// Current counter for `name`, `None` if it is not traced
    pub fn depth(&self, name: &str) -> Option<usize> {
        self.depths.get(name).copied()
    }

    fn depth_mut(&mut self, name: &str) -> &mut usize {
        self.depths.entry(name.to_owned()).or_insert(0)
    }

    /// Traced names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.depths.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Where call and return lines go
#[derive(Debug, Clone, PartialEq)]
pub enum TraceSink {
    /// Print each line to standard output
    Stdout,
    /// Collect lines in memory
    Buffer(Vec<String>),
}

impl TraceSink {
    /// An empty in-memory sink
    pub fn buffer() -> Self {
        TraceSink::Buffer(Vec::new())
    }

    fn emit(&mut self, line: String) {
        match self {
            TraceSink::Stdout => println!("{line}"),
            TraceSink::Buffer(lines) => lines.push(line),
        }
    }

    /// Lines collected so far (always empty for `Stdout`)
    pub fn lines(&self) -> &[String] {
        match self {
            TraceSink::Stdout => &[],
            TraceSink::Buffer(lines) => lines,
        }
    }
}

/// Line printed when a traced procedure is entered
pub fn call_line(name: &str, args: &[Value], depth: usize) -> String {
    let mut line = format!(">{} ({name}", " >".repeat(depth));
    for arg in args {
        line.push(' ');
        line.push_str(&render_value(arg));
    }
    line.push(')');
    line
}

/// Line printed when a traced procedure returns
pub fn return_line(value: &Value, depth: usize) -> String {
    format!("<{} {}", " <".repeat(depth), render_value(value))
}

/// Tracing state of one run: registry, output and failure policy
#[derive(Debug, Clone, PartialEq)]
pub struct Tracer {
    registry: TraceRegistry,
    sink: TraceSink,
    on_error: TraceDepthOnError,
}

impl Tracer {
    pub fn new(sink: TraceSink, on_error: TraceDepthOnError) -> Self {
        Tracer {
            registry: TraceRegistry::new(),
            sink,
            on_error,
        }
    }

    /// Handle a `(trace name)` declaration
    pub fn declare(&mut self, name: &str) {
        debug!("tracing enabled for '{name}'");
        self.registry.insert(name);
    }

    pub fn is_traced(&self, name: &str) -> bool {
        self.registry.is_traced(name)
    }

    pub fn registry(&self) -> &TraceRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &TraceSink {
        &self.sink
    }

    pub fn set_sink(&mut self, sink: TraceSink) {
        self.sink = sink;
    }

    /// Print the call line and bump the counter
    pub fn enter(&mut self, name: &str, args: &[Value]) {
        let depth = self.registry.depth_mut(name);
        let line = call_line(name, args, *depth);
        *depth += 1;
        self.sink.emit(line);
    }

    /// Drop the counter back and print the return line of a successful call
    pub fn exit<E>(&mut self, name: &str, result: &Result<Value, E>) {
        match result {
            Ok(value) => {
                let depth = self.registry.depth_mut(name);
                *depth = depth.saturating_sub(1);
                let line = return_line(value, *depth);
                self.sink.emit(line);
            }
            Err(_) => {
                if self.on_error == TraceDepthOnError::Restore {
                    let depth = self.registry.depth_mut(name);
                    *depth = depth.saturating_sub(1);
                }
            }
        }
    }
}
