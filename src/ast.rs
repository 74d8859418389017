//! Expression tree consumed by the evaluator.
//!
//! A [`Program`] is a sequence of [`Exp`]s; an `Exp` is either a top-level `define` or a
//! [`CExp`], the closed set of expression forms that may appear anywhere else. Keeping
//! `define` out of `CExp` means procedure and `let` bodies cannot contain definitions by
//! construction.
//!
//! [`parse_exp`] and [`parse_program`] convert S-expression data (as produced by the
//! `scheme` reader, or built by hand with the helpers in [`crate::value`]) into this tree.
//! Symbols naming a primitive operation become [`CExp::PrimOp`]; special-form keywords are
//! reserved and cannot be used as variable names.

use crate::ParseError;
use crate::primitives::{PrimitiveOp, find_primitive};
use crate::value::{NumberType, Value};
use std::rc::Rc;

/// Keywords introducing special forms
pub const SPECIAL_FORMS: &[&str] = &[
    "define", "lambda", "let", "letrec", "set!", "if", "quote", "trace",
];

/// Whether `name` is reserved for a special form
pub fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name)
}

/// A top-level program
#[derive(Debug, Clone)]
pub struct Program {
    pub exps: Vec<Exp>,
}

impl Program {
    pub fn new(exps: Vec<Exp>) -> Self {
        Program { exps }
    }
}

/// A top-level program element
#[derive(Debug, Clone)]
pub enum Exp {
    Define(DefineExp),
    CExp(CExp),
}

/// `(define var val)`
#[derive(Debug, Clone)]
pub struct DefineExp {
    pub var: String,
    pub val: CExp,
}

/// Name and initializer in a `let`/`letrec` binding list
#[derive(Debug, Clone)]
pub struct Binding {
    pub var: String,
    pub val: CExp,
}

/// `(lambda (params...) body...)`
#[derive(Debug, Clone)]
pub struct ProcExp {
    pub params: Rc<[String]>,
    pub body: Rc<[CExp]>,
}

/// `(if test then alt)`
#[derive(Debug, Clone)]
pub struct IfExp {
    pub test: CExp,
    pub then: CExp,
    pub alt: CExp,
}

/// `let` and `letrec` share one shape
#[derive(Debug, Clone)]
pub struct LetExp {
    pub bindings: Vec<Binding>,
    pub body: Vec<CExp>,
}

/// `(set! var val)`
#[derive(Debug, Clone)]
pub struct SetExp {
    pub var: String,
    pub val: CExp,
}

/// `(rator rands...)`
#[derive(Debug, Clone)]
pub struct AppExp {
    pub rator: CExp,
    pub rands: Vec<CExp>,
}

/// Expression forms allowed in any position
#[derive(Debug, Clone)]
pub enum CExp {
    Num(NumberType),
    Bool(bool),
    Str(String),
    PrimOp(&'static PrimitiveOp),
    VarRef(String),
    /// Quoted datum
    Lit(Value),
    If(Box<IfExp>),
    Proc(ProcExp),
    Let(LetExp),
    Letrec(LetExp),
    Set(Box<SetExp>),
    App(Box<AppExp>),
    Trace(String),
}

// Constructors for building trees in code

impl CExp {
    pub fn num(n: NumberType) -> Self {
        CExp::Num(n)
    }

    pub fn var(name: &str) -> Self {
        CExp::VarRef(name.to_owned())
    }

    /// Reference to a primitive operation; `None` if no primitive has that name
    pub fn prim(name: &str) -> Option<Self> {
        find_primitive(name).map(CExp::PrimOp)
    }

    pub fn if_(test: CExp, then: CExp, alt: CExp) -> Self {
        CExp::If(Box::new(IfExp { test, then, alt }))
    }

    pub fn proc(params: &[&str], body: Vec<CExp>) -> Self {
        CExp::Proc(ProcExp {
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            body: body.into(),
        })
    }

    pub fn let_(bindings: Vec<Binding>, body: Vec<CExp>) -> Self {
        CExp::Let(LetExp { bindings, body })
    }

    pub fn letrec(bindings: Vec<Binding>, body: Vec<CExp>) -> Self {
        CExp::Letrec(LetExp { bindings, body })
    }

    pub fn set(var: &str, val: CExp) -> Self {
        CExp::Set(Box::new(SetExp {
            var: var.to_owned(),
            val,
        }))
    }

    pub fn app(rator: CExp, rands: Vec<CExp>) -> Self {
        CExp::App(Box::new(AppExp { rator, rands }))
    }
}

impl Binding {
    pub fn new(var: &str, val: CExp) -> Self {
        Binding {
            var: var.to_owned(),
            val,
        }
    }
}

impl Exp {
    pub fn define(var: &str, val: CExp) -> Self {
        Exp::Define(DefineExp {
            var: var.to_owned(),
            val,
        })
    }
}

impl From<CExp> for Exp {
    fn from(exp: CExp) -> Self {
        Exp::CExp(exp)
    }
}

//
// Datum to expression conversion
//

/// Convert a sequence of top-level data into a program
pub fn parse_program(data: &[Value]) -> Result<Program, ParseError> {
    data.iter()
        .map(parse_exp)
        .collect::<Result<Vec<_>, _>>()
        .map(Program::new)
}

/// Convert one top-level datum; `define` is accepted here and nowhere else
pub fn parse_exp(datum: &Value) -> Result<Exp, ParseError> {
    if let Some((keyword, args)) = split_form(datum)?
        && keyword == "define"
    {
        return match args.as_slice() {
            [Value::Symbol(var), val] => Ok(Exp::Define(DefineExp {
                var: parse_var_name(var, datum)?,
                val: parse_cexp(val)?,
            })),
            _ => Err(ParseError::invalid_syntax(
                "define expects a variable name and one expression",
                datum,
            )),
        };
    }
    parse_cexp(datum).map(Exp::CExp)
}

/// Convert a datum in expression position
pub fn parse_cexp(datum: &Value) -> Result<CExp, ParseError> {
    match datum {
        Value::Number(n) => Ok(CExp::Num(*n)),
        Value::Bool(b) => Ok(CExp::Bool(*b)),
        Value::String(s) => Ok(CExp::Str(s.clone())),
        Value::Symbol(name) => parse_atom_symbol(name, datum),
        Value::Pair(_) => parse_compound(datum),
        Value::Nil => Err(ParseError::invalid_syntax(
            "empty combination, quote it as '() for the empty list",
            datum,
        )),
        // Already-evaluated values spliced into data evaluate to themselves
        other => Ok(CExp::Lit(other.clone())),
    }
}

fn parse_atom_symbol(name: &str, datum: &Value) -> Result<CExp, ParseError> {
    if let Some(op) = find_primitive(name) {
        Ok(CExp::PrimOp(op))
    } else if is_special_form(name) {
        Err(ParseError::invalid_syntax(
            format!("'{name}' is a reserved keyword, not a variable"),
            datum,
        ))
    } else {
        Ok(CExp::VarRef(name.to_owned()))
    }
}

/// Split a proper list into its keyword (when headed by a special-form symbol) and arguments
fn split_form(datum: &Value) -> Result<Option<(&str, Vec<Value>)>, ParseError> {
    let Value::Pair(pair) = datum else {
        return Ok(None);
    };
    let Value::Symbol(head) = &pair.0 else {
        return Ok(None);
    };
    if !is_special_form(head) {
        return Ok(None);
    }
    let args = pair
        .1
        .list_items()
        .ok_or_else(|| ParseError::invalid_syntax("improper list in special form", datum))?;
    Ok(Some((head.as_str(), args)))
}

fn parse_compound(datum: &Value) -> Result<CExp, ParseError> {
    if let Some((keyword, args)) = split_form(datum)? {
        return match keyword {
            "define" => Err(ParseError::invalid_syntax(
                "define is only allowed at top level",
                datum,
            )),
            "lambda" => parse_lambda(&args, datum),
            "let" => {
                let (bindings, body) = parse_let_parts(&args, datum)?;
                Ok(CExp::Let(LetExp { bindings, body }))
            }
            "letrec" => {
                let (bindings, body) = parse_let_parts(&args, datum)?;
                Ok(CExp::Letrec(LetExp { bindings, body }))
            }
            "set!" => match args.as_slice() {
                [Value::Symbol(var), val] => Ok(CExp::Set(Box::new(SetExp {
                    var: parse_var_name(var, datum)?,
                    val: parse_cexp(val)?,
                }))),
                _ => Err(ParseError::invalid_syntax(
                    "set! expects a variable name and one expression",
                    datum,
                )),
            },
            "if" => match args.as_slice() {
                [test, then, alt] => Ok(CExp::If(Box::new(IfExp {
                    test: parse_cexp(test)?,
                    then: parse_cexp(then)?,
                    alt: parse_cexp(alt)?,
                }))),
                _ => Err(ParseError::invalid_syntax(
                    "if expects exactly a test, a consequent and an alternative",
                    datum,
                )),
            },
            "quote" => match args.as_slice() {
                [content] => Ok(CExp::Lit(content.clone())),
                _ => Err(ParseError::invalid_syntax(
                    "quote expects exactly one datum",
                    datum,
                )),
            },
            "trace" => match args.as_slice() {
                [Value::Symbol(var)] => Ok(CExp::Trace(parse_var_name(var, datum)?)),
                _ => Err(ParseError::invalid_syntax(
                    "trace expects one procedure name",
                    datum,
                )),
            },
            _ => unreachable!("split_form only returns special-form keywords"),
        };
    }

    let items = datum
        .list_items()
        .ok_or_else(|| ParseError::invalid_syntax("improper list in application", datum))?;
    let (rator, rands) = items
        .split_first()
        .ok_or_else(|| ParseError::invalid_syntax("empty application", datum))?;
    Ok(CExp::App(Box::new(AppExp {
        rator: parse_cexp(rator)?,
        rands: rands.iter().map(parse_cexp).collect::<Result<_, _>>()?,
    })))
}

/// Variable names must not shadow special forms or primitive operations
fn parse_var_name(name: &str, datum: &Value) -> Result<String, ParseError> {
    if is_special_form(name) || find_primitive(name).is_some() {
        return Err(ParseError::invalid_syntax(
            format!("'{name}' cannot be used as a variable name"),
            datum,
        ));
    }
    Ok(name.to_owned())
}

fn parse_body(body: &[Value], datum: &Value) -> Result<Vec<CExp>, ParseError> {
    if body.is_empty() {
        return Err(ParseError::invalid_syntax("empty body", datum));
    }
    body.iter().map(parse_cexp).collect()
}

fn check_distinct(names: &[String], datum: &Value) -> Result<(), ParseError> {
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(ParseError::invalid_syntax(
                format!("duplicate name in one scope: {name}"),
                datum,
            ));
        }
    }
    Ok(())
}

fn parse_lambda(args: &[Value], datum: &Value) -> Result<CExp, ParseError> {
    let [params, body @ ..] = args else {
        return Err(ParseError::invalid_syntax(
            "lambda expects a parameter list and a body",
            datum,
        ));
    };
    let params = params
        .list_items()
        .ok_or_else(|| ParseError::invalid_syntax("lambda parameters must be a list", datum))?;

    // Only fixed-arity parameter lists: no rest parameters
    let params = params
        .iter()
        .map(|param| match param {
            Value::Symbol(name) => parse_var_name(name, datum),
            _ => Err(ParseError::invalid_syntax(
                "lambda parameters must be symbols",
                datum,
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    check_distinct(&params, datum)?;

    Ok(CExp::Proc(ProcExp {
        params: params.into(),
        body: parse_body(body, datum)?.into(),
    }))
}

fn parse_let_parts(args: &[Value], datum: &Value) -> Result<(Vec<Binding>, Vec<CExp>), ParseError> {
    let [bindings, body @ ..] = args else {
        return Err(ParseError::invalid_syntax(
            "expected a binding list and a body",
            datum,
        ));
    };
    let bindings = bindings
        .list_items()
        .ok_or_else(|| ParseError::invalid_syntax("bindings must be a list", datum))?
        .iter()
        .map(|binding| match binding.list_items().as_deref() {
            Some([Value::Symbol(var), val]) => Ok(Binding {
                var: parse_var_name(var, datum)?,
                val: parse_cexp(val)?,
            }),
            _ => Err(ParseError::invalid_syntax(
                "each binding must be (name expression)",
                binding,
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let names: Vec<String> = bindings.iter().map(|b| b.var.clone()).collect();
    check_distinct(&names, datum)?;

    Ok((bindings, parse_body(body, datum)?))
}
