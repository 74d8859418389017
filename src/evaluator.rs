//! The evaluator and its run context.
//!
//! [`Interpreter`] owns everything one evaluation run needs: the global frame, the trace
//! registry with its output sink, and the [`EvalConfig`]. Every evaluation step receives
//! the interpreter by `&mut self`, so tracing state is threaded explicitly instead of living
//! in a global.

use crate::ast::{CExp, Exp, LetExp, Program};
use crate::env::{Env, WeakEnv};
use crate::primitives::apply_primitive;
use crate::trace::{TraceSink, Tracer};
use crate::value::{Closure, TracedClosure, Value, render_value};
use crate::{EvalConfig, Error};
use log::{debug, trace};
use std::rc::Rc;

/// Remaining stack below which evaluation switches to a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each stack segment allocated on demand
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// One evaluation run: global frame, tracing state and limits
#[derive(Debug)]
pub struct Interpreter {
    global: Env,
    tracer: Tracer,
    config: EvalConfig,
    /// `letrec` frames of this run; their closures capture the frame itself
    recursive_frames: Vec<WeakEnv>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Fresh run context with the default configuration; trace lines go to stdout
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Interpreter {
            global: Env::global(),
            tracer: Tracer::new(TraceSink::Stdout, config.trace_depth_on_error),
            config,
            recursive_frames: Vec::new(),
        }
    }

    /// Replace the trace output sink
    pub fn with_trace_sink(mut self, sink: TraceSink) -> Self {
        self.tracer.set_sink(sink);
        self
    }

    /// The global frame of this run
    pub fn global_env(&self) -> &Env {
        &self.global
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Trace lines captured so far (empty unless the sink is a buffer)
    pub fn trace_output(&self) -> &[String] {
        self.tracer.sink().lines()
    }

    /// All global bindings, sorted by name
    pub fn global_bindings(&self) -> Vec<(String, Value)> {
        self.global.get_all_bindings()
    }

    /// Evaluate a program in this run's global frame and return the last value.
    ///
    /// Definitions persist in the interpreter after the call, so successive programs see
    /// each other's `define`s. A program ending in a `define` evaluates to [`Value::Void`].
    pub fn eval_program(&mut self, program: &Program) -> Result<Value, Error> {
        debug!("evaluating program of {} expressions", program.exps.len());
        let Some((last, init)) = program.exps.split_last() else {
            return Err(Error::EmptyProgram);
        };
        for exp in init {
            self.eval_top_level(exp)?;
        }
        self.eval_top_level(last)
    }

    /// Read one expression (possibly a `define`) and evaluate it
    #[cfg(feature = "scheme")]
    pub fn eval_source(&mut self, input: &str) -> Result<Value, Error> {
        let exp = crate::scheme::read_exp(input)?;
        self.eval_program(&Program::new(vec![exp]))
    }

    /// Read a whole program text and evaluate it
    #[cfg(feature = "scheme")]
    pub fn run_source(&mut self, input: &str) -> Result<Value, Error> {
        let program = crate::scheme::read_program(input)?;
        self.eval_program(&program)
    }

    fn eval_top_level(&mut self, exp: &Exp) -> Result<Value, Error> {
        let global = self.global.clone();
        match exp {
            Exp::Define(define) => {
                let value = self.eval(&define.val, &global)?;
                debug!("define {}", define.var);
                global.define(&define.var, value);
                Ok(Value::Void)
            }
            Exp::CExp(cexp) => self.eval(cexp, &global),
        }
    }

    /// Evaluate an expression in `env`
    pub fn eval(&mut self, exp: &CExp, env: &Env) -> Result<Value, Error> {
        self.eval_with_depth(exp, env, 0)
    }

    /// Evaluate with depth tracking; the host stack grows on demand up to the depth limit
    fn eval_with_depth(&mut self, exp: &CExp, env: &Env, depth: usize) -> Result<Value, Error> {
        if depth >= self.config.max_eval_depth {
            return Err(Error::DepthLimitExceeded(self.config.max_eval_depth));
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_inner(exp, env, depth + 1)
        })
    }

    fn eval_inner(&mut self, exp: &CExp, env: &Env, depth: usize) -> Result<Value, Error> {
        match exp {
            CExp::Num(n) => Ok(Value::Number(*n)),
            CExp::Bool(b) => Ok(Value::Bool(*b)),
            CExp::Str(s) => Ok(Value::String(s.clone())),
            CExp::Lit(datum) => Ok(datum.clone()),
            CExp::PrimOp(op) => Ok(Value::Primitive(*op)),

            CExp::VarRef(name) => self.eval_var_ref(name, env),

            CExp::If(if_exp) => {
                let test = self.eval_with_depth(&if_exp.test, env, depth)?;
                if test.is_true() {
                    self.eval_with_depth(&if_exp.then, env, depth)
                } else {
                    self.eval_with_depth(&if_exp.alt, env, depth)
                }
            }

            // The current frame is captured by reference, never copied
            CExp::Proc(proc_exp) => Ok(Value::Closure(Rc::new(Closure::new(
                Rc::clone(&proc_exp.params),
                Rc::clone(&proc_exp.body),
                env.clone(),
            )))),

            CExp::Let(let_exp) => self.eval_let(let_exp, env, depth),
            CExp::Letrec(letrec_exp) => self.eval_letrec(letrec_exp, env, depth),

            CExp::Set(set_exp) => {
                let value = self.eval_with_depth(&set_exp.val, env, depth)?;
                env.set(&set_exp.var, value)?;
                Ok(Value::Void)
            }

            CExp::App(app) => {
                let rator = self.eval_with_depth(&app.rator, env, depth)?;
                let rands = app
                    .rands
                    .iter()
                    .map(|rand| self.eval_with_depth(rand, env, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply_with_depth(rator, rands, depth)
            }

            CExp::Trace(name) => {
                self.tracer.declare(name);
                Ok(Value::Void)
            }
        }
    }

    /// Variable lookup; closures reached through a traced name come back wrapped
    fn eval_var_ref(&self, name: &str, env: &Env) -> Result<Value, Error> {
        let value = env.lookup(name)?;
        if !self.tracer.is_traced(name) {
            return Ok(value);
        }

        let closure = match value {
            Value::Closure(closure) => closure,
            Value::TracedClosure(traced) => Rc::clone(&traced.closure),
            _ => return Err(Error::TraceOnNonProcedure(name.to_owned())),
        };
        Ok(Value::TracedClosure(Rc::new(TracedClosure {
            name: name.to_owned(),
            closure,
        })))
    }

    /// Initializers run in the outer environment, then one frame binds all names at once
    fn eval_let(&mut self, let_exp: &LetExp, env: &Env, depth: usize) -> Result<Value, Error> {
        let values = let_exp
            .bindings
            .iter()
            .map(|binding| self.eval_with_depth(&binding.val, env, depth))
            .collect::<Result<Vec<_>, _>>()?;
        let frame = env.extend(&binding_names(let_exp), values)?;
        self.eval_sequence(&let_exp.body, &frame, depth)
    }

    /// The frame exists before any initializer runs; cells are filled once all succeed
    fn eval_letrec(&mut self, letrec_exp: &LetExp, env: &Env, depth: usize) -> Result<Value, Error> {
        let names = binding_names(letrec_exp);
        let frame = env.extend(&names, vec![Value::Undefined; names.len()])?;
        self.track_recursive_frame(&frame);

        let values = letrec_exp
            .bindings
            .iter()
            .map(|binding| self.eval_with_depth(&binding.val, &frame, depth))
            .collect::<Result<Vec<_>, _>>()?;
        for (cell, value) in frame.frame_cells().into_iter().zip(values) {
            *cell.borrow_mut() = value;
        }

        self.eval_sequence(&letrec_exp.body, &frame, depth)
    }

    fn track_recursive_frame(&mut self, frame: &Env) {
        if self.recursive_frames.len() % 64 == 63 {
            self.recursive_frames.retain(WeakEnv::is_alive);
        }
        self.recursive_frames.push(frame.downgrade());
    }

    /// Evaluate a body in order, returning the last value
    fn eval_sequence(&mut self, body: &[CExp], env: &Env, depth: usize) -> Result<Value, Error> {
        let Some((last, init)) = body.split_last() else {
            return Err(Error::EmptyProgram);
        };
        for exp in init {
            self.eval_with_depth(exp, env, depth)?;
        }
        self.eval_with_depth(last, env, depth)
    }

    /// Apply a procedure value to already evaluated arguments
    pub fn apply(&mut self, procedure: Value, args: Vec<Value>) -> Result<Value, Error> {
        self.apply_with_depth(procedure, args, 0)
    }

    fn apply_with_depth(
        &mut self,
        procedure: Value,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, Error> {
        match procedure {
            Value::Primitive(op) => apply_primitive(op, &args),
            Value::Closure(closure) => self.apply_closure(&closure, args, depth),
            Value::TracedClosure(traced) => {
                self.tracer.enter(&traced.name, &args);
                let result = self.apply_closure(&traced.closure, args, depth);
                self.tracer.exit(&traced.name, &result);
                result
            }
            other => Err(Error::NotAProcedure(render_value(&other))),
        }
    }

    fn apply_closure(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, Error> {
        if closure.params.len() != args.len() {
            return Err(Error::arity_mismatch(closure.params.len(), args.len()));
        }
        trace!(
            "applying (lambda ({}) ...) to {} arguments",
            closure.params.join(" "),
            args.len()
        );
        let frame = closure.env.extend(&closure.params, args)?;
        self.eval_sequence(&closure.body, &frame, depth)
    }
}

// Frames of a finished run are emptied so closures stored in them stop keeping them alive
impl Drop for Interpreter {
    fn drop(&mut self) {
        for frame in self.recursive_frames.drain(..).filter_map(|f| f.upgrade()) {
            frame.clear_frame();
        }
        self.global.clear_global();
    }
}

fn binding_names(let_exp: &LetExp) -> Vec<String> {
    let_exp
        .bindings
        .iter()
        .map(|binding| binding.var.clone())
        .collect()
}
