//! Primitive operations registry.
//!
//! Primitive operations are recognized by name when source is converted into an expression
//! tree: a symbol such as `+` or `car` becomes a primitive reference rather than a variable
//! reference. Evaluating the reference yields a first-class [`Value::Primitive`] tag, and
//! applying that tag dispatches here through [`apply_primitive`].
//!
//! ## Typing
//!
//! - **No coercion**: numbers don't become strings, `and`/`or` require booleans
//! - **Overflow detection**: arithmetic uses checked `i64` operations
//! - **Arity checking**: every operation declares an [`Arity`] validated before it runs
//!
//! Failures other than arity are reported as [`Error::PrimitiveError`].
//!
//! ## Adding New Operations
//!
//! 1. Implement the function following the signature `fn(&[Value]) -> Result<Value, Error>`
//! 2. Add it to `PRIMITIVES` with its name and arity
//! 3. Add tests covering edge cases and error conditions

use crate::Error;
use crate::value::{NumberType, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Accepted argument counts for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    /// Check if the given number of arguments is valid
    pub fn validate(self, arg_count: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if arg_count != n => Err(Error::arity_mismatch(n, arg_count)),
            Arity::AtLeast(n) if arg_count < n => Err(Error::arity_mismatch(n, arg_count)),
            _ => Ok(()),
        }
    }
}

/// Canonical primitive function signature
pub type PrimitiveFn = fn(&[Value]) -> Result<Value, Error>;

/// Definition of a primitive operation
pub struct PrimitiveOp {
    /// The identifier the operation is referenced by in source
    pub name: &'static str,
    /// Expected number of arguments
    pub arity: Arity,
    func: PrimitiveFn,
}

impl fmt::Debug for PrimitiveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveOp")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl PartialEq for PrimitiveOp {
    fn eq(&self, other: &Self) -> bool {
        // Names uniquely identify operations
        self.name == other.name
    }
}

/// Apply a primitive operation to already evaluated arguments
pub fn apply_primitive(op: &PrimitiveOp, args: &[Value]) -> Result<Value, Error> {
    op.arity.validate(args.len())?;
    (op.func)(args)
}

//
// Primitive Function Implementations
//

fn numbers(op: &str, args: &[Value]) -> Result<Vec<NumberType>, Error> {
    args.iter()
        .map(|arg| match arg {
            Value::Number(n) => Ok(*n),
            other => Err(Error::primitive(format!(
                "{op} expects numbers, got {}: {other}",
                other.type_name()
            ))),
        })
        .collect()
}

fn overflow(op: &str) -> Error {
    Error::primitive(format!("integer overflow in {op}"))
}

fn prim_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: NumberType = 0;
    for n in numbers("+", args)? {
        sum = sum.checked_add(n).ok_or_else(|| overflow("+"))?;
    }
    Ok(Value::Number(sum))
}

fn prim_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product: NumberType = 1;
    for n in numbers("*", args)? {
        product = product.checked_mul(n).ok_or_else(|| overflow("*"))?;
    }
    Ok(Value::Number(product))
}

fn prim_sub(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers("-", args)?;
    let (first, rest) = nums.split_first().ok_or_else(|| Error::arity_mismatch(1, 0))?;
    if rest.is_empty() {
        return first.checked_neg().map(Value::Number).ok_or_else(|| overflow("-"));
    }
    let mut result = *first;
    for n in rest {
        result = result.checked_sub(*n).ok_or_else(|| overflow("-"))?;
    }
    Ok(Value::Number(result))
}

fn prim_div(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers("/", args)?;
    let (first, rest) = nums.split_first().ok_or_else(|| Error::arity_mismatch(1, 0))?;
    if rest.is_empty() {
        return match *first {
            0 => Err(Error::primitive("division by zero")),
            n => Ok(Value::Number(1 / n)),
        };
    }
    let mut result = *first;
    for n in rest {
        if *n == 0 {
            return Err(Error::primitive("division by zero"));
        }
        result = result.checked_div(*n).ok_or_else(|| overflow("/"))?;
    }
    Ok(Value::Number(result))
}

// Chained comparisons: all adjacent pairs must satisfy the comparison
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let nums = numbers($op_str, args)?;
            Ok(Value::Bool(nums.windows(2).all(|w| w[0] $op w[1])))
        }
    };
}

numeric_comparison!(prim_num_eq, ==, "=");
numeric_comparison!(prim_lt, <, "<");
numeric_comparison!(prim_gt, >, ">");
numeric_comparison!(prim_le, <=, "<=");
numeric_comparison!(prim_ge, >=, ">=");

fn prim_not(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!args[0].is_true()))
}

fn booleans(op: &str, args: &[Value]) -> Result<Vec<bool>, Error> {
    args.iter()
        .map(|arg| {
            bool::try_from(arg).map_err(|_| {
                Error::primitive(format!("{op} expects booleans (no truthiness), got {arg}"))
            })
        })
        .collect()
}

fn prim_and(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(booleans("and", args)?.into_iter().all(|b| b)))
}

fn prim_or(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(booleans("or", args)?.into_iter().any(|b| b)))
}

/// Identity for pairs and procedures, value equality for atoms
pub fn is_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Pair(x), Value::Pair(y)) => std::rc::Rc::ptr_eq(x, y),
        (Value::Void, Value::Void) => true,
        _ => a == b,
    }
}

fn prim_eq(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(is_eq(&args[0], &args[1])))
}

fn prim_string_eq(args: &[Value]) -> Result<Value, Error> {
    match (&args[0], &args[1]) {
        (Value::String(a), Value::String(b)) => Ok(Value::Bool(a == b)),
        (a, b) => Err(Error::primitive(format!(
            "string=? expects strings, got {a} and {b}"
        ))),
    }
}

fn prim_cons(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn prim_car(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(pair) => Ok(pair.0.clone()),
        other => Err(Error::primitive(format!("car expects a pair, got {other}"))),
    }
}

fn prim_cdr(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(pair) => Ok(pair.1.clone()),
        other => Err(Error::primitive(format!("cdr expects a pair, got {other}"))),
    }
}

fn prim_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::list(args.iter().cloned()))
}

macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            Ok(Value::Bool(matches!(&args[0], $pattern)))
        }
    };
}

type_predicate!(prim_pair_p, Value::Pair(_));
type_predicate!(prim_null_p, Value::Nil);
type_predicate!(prim_number_p, Value::Number(_));
type_predicate!(prim_boolean_p, Value::Bool(_));
type_predicate!(prim_symbol_p, Value::Symbol(_));
type_predicate!(prim_string_p, Value::String(_));

fn prim_procedure_p(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_procedure()))
}

fn prim_list_p(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_list()))
}

/// Registry of all primitive operations.
static PRIMITIVES: &[PrimitiveOp] = &[
    // Arithmetic operations
    PrimitiveOp {
        name: "+",
        arity: Arity::Any,
        func: prim_add,
    },
    PrimitiveOp {
        name: "-",
        arity: Arity::AtLeast(1),
        func: prim_sub,
    },
    PrimitiveOp {
        name: "*",
        arity: Arity::Any,
        func: prim_mul,
    },
    PrimitiveOp {
        name: "/",
        arity: Arity::AtLeast(1),
        func: prim_div,
    },
    // Comparison operations
    PrimitiveOp {
        name: "=",
        arity: Arity::AtLeast(2),
        func: prim_num_eq,
    },
    PrimitiveOp {
        name: "<",
        arity: Arity::AtLeast(2),
        func: prim_lt,
    },
    PrimitiveOp {
        name: ">",
        arity: Arity::AtLeast(2),
        func: prim_gt,
    },
    PrimitiveOp {
        name: "<=",
        arity: Arity::AtLeast(2),
        func: prim_le,
    },
    PrimitiveOp {
        name: ">=",
        arity: Arity::AtLeast(2),
        func: prim_ge,
    },
    // Logical operations
    PrimitiveOp {
        name: "not",
        arity: Arity::Exact(1),
        func: prim_not,
    },
    PrimitiveOp {
        name: "and",
        arity: Arity::Any,
        func: prim_and,
    },
    PrimitiveOp {
        name: "or",
        arity: Arity::Any,
        func: prim_or,
    },
    // Equality
    PrimitiveOp {
        name: "eq?",
        arity: Arity::Exact(2),
        func: prim_eq,
    },
    PrimitiveOp {
        name: "string=?",
        arity: Arity::Exact(2),
        func: prim_string_eq,
    },
    // Pair operations
    PrimitiveOp {
        name: "cons",
        arity: Arity::Exact(2),
        func: prim_cons,
    },
    PrimitiveOp {
        name: "car",
        arity: Arity::Exact(1),
        func: prim_car,
    },
    PrimitiveOp {
        name: "cdr",
        arity: Arity::Exact(1),
        func: prim_cdr,
    },
    PrimitiveOp {
        name: "list",
        arity: Arity::Any,
        func: prim_list,
    },
    // Type predicates
    PrimitiveOp {
        name: "pair?",
        arity: Arity::Exact(1),
        func: prim_pair_p,
    },
    PrimitiveOp {
        name: "list?",
        arity: Arity::Exact(1),
        func: prim_list_p,
    },
    PrimitiveOp {
        name: "null?",
        arity: Arity::Exact(1),
        func: prim_null_p,
    },
    PrimitiveOp {
        name: "number?",
        arity: Arity::Exact(1),
        func: prim_number_p,
    },
    PrimitiveOp {
        name: "boolean?",
        arity: Arity::Exact(1),
        func: prim_boolean_p,
    },
    PrimitiveOp {
        name: "symbol?",
        arity: Arity::Exact(1),
        func: prim_symbol_p,
    },
    PrimitiveOp {
        name: "string?",
        arity: Arity::Exact(1),
        func: prim_string_p,
    },
    PrimitiveOp {
        name: "procedure?",
        arity: Arity::Exact(1),
        func: prim_procedure_p,
    },
];

static PRIMITIVES_BY_NAME: LazyLock<HashMap<&'static str, &'static PrimitiveOp>> =
    LazyLock::new(|| PRIMITIVES.iter().map(|op| (op.name, op)).collect());

/// Get all primitive operations
pub fn primitives() -> &'static [PrimitiveOp] {
    PRIMITIVES
}

/// Find a primitive operation by name
pub fn find_primitive(name: &str) -> Option<&'static PrimitiveOp> {
    PRIMITIVES_BY_NAME.get(name).copied()
}
