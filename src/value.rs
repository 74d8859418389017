//! Runtime values produced by the evaluator.
//!
//! The main enum, [`Value`], covers atoms (numbers, booleans, strings, symbols), structured
//! data built from pairs (the empty list and cons cells), first-class primitive operations,
//! closures and traced closures, plus two marker values: [`Value::Void`] for forms evaluated
//! only for effect and [`Value::Undefined`] for `letrec` cells that have not been initialized
//! yet. Closures carry a reference to the environment they were created in; the environment
//! is shared, never copied, so mutation through `set!` is observed by every closure that
//! captured the same frame.
//!
//! Conversion traits from common Rust types and the [`val`], [`sym`] and [`nil`] helpers make
//! it easy to build data in code and tests.

use crate::Error;
use crate::ast::CExp;
use crate::env::Env;
use crate::primitives::PrimitiveOp;
use std::fmt;
use std::rc::Rc;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// A user procedure: parameter names, body sequence and the defining environment.
pub struct Closure {
    pub params: Rc<[String]>,
    pub body: Rc<[CExp]>,
    pub env: Env,
}

impl Closure {
    pub fn new(params: Rc<[String]>, body: Rc<[CExp]>, env: Env) -> Self {
        Closure { params, body, env }
    }
}

/// A closure looked up through a traced name.
///
/// Calling it behaves exactly like calling `closure`; the wrapper only exists so that
/// application can print call and return lines under `name`.
pub struct TracedClosure {
    pub name: String,
    pub closure: Rc<Closure>,
}

/// Core runtime value type
#[derive(Clone)]
pub enum Value {
    /// Numbers (integers only)
    Number(NumberType),
    /// Boolean values
    Bool(bool),
    /// String values
    String(String),
    /// Symbols, only produced by quoted data
    Symbol(String),
    /// The empty list
    Nil,
    /// A cons cell
    Pair(Rc<(Value, Value)>),
    /// Primitive operation tag, first class so it can be passed around
    Primitive(&'static PrimitiveOp),
    /// User-defined procedure
    Closure(Rc<Closure>),
    /// User-defined procedure reached through a traced name
    TracedClosure(Rc<TracedClosure>),
    /// Result of forms evaluated for effect (`set!`, `trace`, `define`)
    /// Never equals anything, itself included
    Void,
    /// Placeholder held by `letrec` cells until their initializers have run
    Undefined,
}

impl Value {
    /// Build a cons cell
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new((car, cdr)))
    }

    /// Build a proper list from its elements
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        Self::list_with_tail(items, Value::Nil)
    }

    /// Build a list whose final cdr is `tail` (an improper list unless `tail` is a list)
    pub fn list_with_tail<I>(items: I, tail: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    /// Collect the elements of a proper list, or `None` for anything else
    pub fn list_items(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::Nil => return Some(items),
                Value::Pair(pair) => {
                    items.push(pair.0.clone());
                    current = &pair.1;
                }
                _ => return None,
            }
        }
    }

    /// Whether this value is a proper list (`()` included)
    pub fn is_list(&self) -> bool {
        let mut current = self;
        loop {
            match current {
                Value::Nil => return true,
                Value::Pair(pair) => current = &pair.1,
                _ => return false,
            }
        }
    }

    /// Every value except the boolean `#f` counts as true
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Whether this value can be applied
    pub fn is_procedure(&self) -> bool {
        matches!(
            self,
            Value::Primitive(_) | Value::Closure(_) | Value::TracedClosure(_)
        )
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Nil => "empty list",
            Value::Pair(_) => "pair",
            Value::Primitive(_) | Value::Closure(_) | Value::TracedClosure(_) => "procedure",
            Value::Void => "void",
            Value::Undefined => "undefined",
        }
    }
}

/// Render a value the way the tracer and the REPL show it
pub fn render_value(value: &Value) -> String {
    value.to_string()
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Nil => write!(f, "Nil"),
            Value::Pair(pair) => write!(f, "Pair({:?}, {:?})", pair.0, pair.1),
            Value::Primitive(op) => write!(f, "Primitive({})", op.name),
            // The environment is left out: frames can reach back to the closure itself
            Value::Closure(closure) => write!(f, "Closure(params={:?})", closure.params),
            Value::TracedClosure(traced) => write!(
                f,
                "TracedClosure({}, params={:?})",
                traced.name, traced.closure.params
            ),
            Value::Void => write!(f, "Void"),
            Value::Undefined => write!(f, "Undefined"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Nil => write!(f, "()"),
            Value::Pair(pair) => {
                write!(f, "({}", pair.0)?;
                let mut rest = &pair.1;
                loop {
                    match rest {
                        Value::Nil => break,
                        Value::Pair(next) => {
                            write!(f, " {}", next.0)?;
                            rest = &next.1;
                        }
                        tail => {
                            write!(f, " . {tail}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Primitive(op) => write!(f, "#<primitive:{}>", op.name),
            Value::Closure(closure) => {
                write!(f, "#<procedure ({})>", closure.params.join(" "))
            }
            Value::TracedClosure(traced) => write!(f, "#<traced-procedure {}>", traced.name),
            Value::Void => write!(f, "#<void>"),
            Value::Undefined => write!(f, "#<undefined>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a), Value::Pair(b)) => a.0 == b.0 && a.1 == b.1,
            // Compare primitives by name, not function pointer
            (Value::Primitive(a), Value::Primitive(b)) => a.name == b.name,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::TracedClosure(a), Value::TracedClosure(b)) => {
                a.name == b.name && Rc::ptr_eq(&a.closure, &b.closure)
            }
            (Value::Undefined, Value::Undefined) => true,
            (Value::Void, _) | (_, Value::Void) => false,
            _ => false,
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into))
    }
}

// Fallible conversions from `Value` back into primitive Rust types.

impl TryFrom<&Value> for NumberType {
    type Error = Error;

    fn try_from(value: &Value) -> Result<NumberType, Error> {
        if let Value::Number(n) = value {
            Ok(*n)
        } else {
            Err(Error::primitive(format!("expected number, got {value}")))
        }
    }
}

impl TryFrom<&Value> for bool {
    type Error = Error;

    fn try_from(value: &Value) -> Result<bool, Error> {
        if let Value::Bool(b) = value {
            Ok(*b)
        } else {
            Err(Error::primitive(format!("expected boolean, got {value}")))
        }
    }
}

/// Helper function for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
pub fn nil() -> Value {
    Value::Nil
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Number(42)),
            (val(-17), Value::Number(-17)),
            (val(255u8), Value::Number(255)),
            (val(NumberType::MIN), Value::Number(NumberType::MIN)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::String("hello".to_owned())),
            (sym("foo-bar?"), Value::Symbol("foo-bar?".to_owned())),
            (nil(), Value::Nil),
            (
                val([1, 2]),
                Value::cons(val(1), Value::cons(val(2), Value::Nil)),
            ),
            (
                val(vec![sym("op"), val(42)]),
                Value::list([sym("op"), val(42)]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_display() {
        let cases = vec![
            (val(-5), "-5"),
            (val(true), "#t"),
            (val(false), "#f"),
            (val("a\"b\n"), "\"a\\\"b\\n\""),
            (sym("x"), "x"),
            (nil(), "()"),
            (val([1, 2, 3]), "(1 2 3)"),
            (Value::cons(val(1), val(2)), "(1 . 2)"),
            (Value::list_with_tail([val(1), val(2)], val(3)), "(1 2 . 3)"),
            (val(vec![val([1]), nil()]), "((1) ())"),
            (Value::Void, "#<void>"),
            (Value::Undefined, "#<undefined>"),
        ];
        for (value, expected) in cases {
            assert_eq!(render_value(&value), expected);
        }
    }

    #[test]
    fn test_list_items_and_predicates() {
        assert_eq!(val([1, 2]).list_items(), Some(vec![val(1), val(2)]));
        assert_eq!(nil().list_items(), Some(vec![]));
        assert_eq!(Value::cons(val(1), val(2)).list_items(), None);
        assert!(nil().is_list());
        assert!(!Value::cons(val(1), val(2)).is_list());
        assert!(!val(false).is_true());
        assert!(val(0).is_true());
        assert!(nil().is_true());
        assert!(!val(1).is_procedure());
    }

    #[test]
    fn test_void_values() {
        // Void never equals anything, including itself
        assert_ne!(Value::Void, Value::Void);
        assert_ne!(Value::Void, val(42));
    }

    #[test]
    fn test_try_from_reports_primitive_error() {
        assert_eq!(NumberType::try_from(&val(3)), Ok(3));
        assert!(matches!(
            NumberType::try_from(&val("3")),
            Err(Error::PrimitiveError(_))
        ));
        assert_eq!(bool::try_from(&val(false)), Ok(false));
    }
}
