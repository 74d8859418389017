//! S-expression reader.
//!
//! Turns source text into data ([`Value`]s built from atoms and pairs) with nom, then hands
//! the data to [`crate::ast`] to build expressions. [`parse_scheme`] reads exactly one
//! datum; [`parse_scheme_program`] reads any number of them, with `;` comments.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{eof, opt, peek, recognize, value},
    error::ErrorKind,
    sequence::pair,
};

use crate::ast::{self, Exp, Program};
use crate::value::{NumberType, Value};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Allowed non-alphanumeric characters in symbol names
/// Most represent mathematical symbols or predicates ("?"), "$" supported for JavaScript identifiers
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParseConfig {
    /// Treat `;` up to the end of the line as whitespace
    pub handle_comments: bool,
}

/// Convert nom parsing errors to user-friendly errors
fn parse_error_from_nom(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let (kind, message) = match e.code {
                ErrorKind::TooLarge => (
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                ),
                ErrorKind::Digit | ErrorKind::HexDigit => (
                    ParseErrorKind::ImplementationLimit,
                    format!("Number out of range at position {position}"),
                ),
                _ if position >= input.len() => (
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input".to_owned(),
                ),
                ErrorKind::Char => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Expected character at position {position}"),
                ),
                ErrorKind::Tag => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Unexpected token at position {position}"),
                ),
                _ => {
                    let remaining_chars: String = input.chars().skip(position).take(10).collect();
                    (
                        ParseErrorKind::InvalidSyntax,
                        format!("Invalid syntax near '{remaining_chars}'"),
                    )
                }
            };
            ParseError::with_context(kind, message, input, position)
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Skip whitespace and, when enabled, `;` comments
fn skip_ws(input: &str, config: ParseConfig) -> IResult<&str, ()> {
    let (mut input, _) = multispace0.parse(input)?;
    while config.handle_comments && input.starts_with(';') {
        let (rest, _) = take_till(|c: char| c == '\n').parse(input)?;
        let (rest, _) = multispace0.parse(rest)?;
        input = rest;
    }
    Ok((input, ()))
}

/// Atoms must be followed by a delimiter, so `123abc` is not read as two data
fn delimiter(input: &str) -> IResult<&str, ()> {
    value(
        (),
        peek(alt((multispace1, tag("("), tag(")"), tag(";"), tag("\""), eof))),
    )
    .parse(input)
}

/// Parse a number (integer only, supports decimal and hexadecimal)
fn parse_number(input: &str) -> IResult<&str, Value> {
    alt((parse_hexadecimal, parse_decimal)).parse(input)
}

/// Parse a decimal number
fn parse_decimal(input: &str) -> IResult<&str, Value> {
    let (rest, number_str) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((rest, Value::Number(n))),
        // Overflow: symbol parsing rejects leading digits, so report it here
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse a hexadecimal number (#x or #X prefix)
fn parse_hexadecimal(input: &str) -> IResult<&str, Value> {
    let (rest, _) = char('#').parse(input)?;
    let (rest, _) = alt((char('x'), char('X'))).parse(rest)?;
    let (rest, hex_digits) = take_while1(|c: char| c.is_ascii_hexdigit()).parse(rest)?;

    match NumberType::from_str_radix(hex_digits, 16) {
        Ok(n) => Ok((rest, Value::Number(n))),
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::HexDigit,
        ))),
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Bool(true), tag("#t")),
        value(Value::Bool(false), tag("#f")),
    ))
    .parse(input)
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let mut symbol_chars =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c));

    let (remaining, candidate) = symbol_chars.parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, Value::Symbol(candidate.into())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Parse an atom that must end at a delimiter
fn parse_atom(input: &str) -> IResult<&str, Value> {
    let (input, atom) = alt((parse_number, parse_bool, parse_symbol)).parse(input)?;
    let (input, _) = delimiter(input)?;
    Ok((input, atom))
}

/// Parse a string literal
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                return Ok((char_iter.as_str(), Value::String(chars)));
            }
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    // Unknown or incomplete escape sequence
                    _ => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// Parse a list, possibly dotted: `(a b)`, `(a . b)`
fn parse_list(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    let (mut input, _) = char('(').parse(input)?;
    let mut elements = Vec::new();

    loop {
        let (rest, _) = skip_ws(input, config)?;
        if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>(')').parse(rest) {
            return Ok((rest, Value::list(elements)));
        }

        // Dotted tail: a lone '.' after at least one element
        if !elements.is_empty()
            && let Ok((after_dot, _)) = (char('.'), delimiter).parse(rest)
        {
            let (after_tail, tail) = parse_sexpr(after_dot, config, depth + 1)?;
            let (after_tail, _) = skip_ws(after_tail, config)?;
            let (after_tail, _) = char(')').parse(after_tail)?;
            return Ok((after_tail, Value::list_with_tail(elements, tail)));
        }

        let (rest, element) = parse_sexpr(rest, config, depth + 1)?;
        elements.push(element);
        input = rest;
    }
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = parse_sexpr(input, config, depth + 1)?;
    Ok((input, Value::list([Value::Symbol("quote".into()), expr])))
}

/// Parse one S-expression after optional leading whitespace
fn parse_sexpr(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    let (input, _) = skip_ws(input, config)?;
    alt((
        |input| parse_quote(input, config, depth),
        |input| parse_list(input, config, depth),
        parse_string,
        parse_atom,
    ))
    .parse(input)
}

/// Parse a complete S-expression from input.
pub fn parse_scheme(input: &str) -> Result<Value, Error> {
    parse_scheme_with_config(input, ParseConfig::default())
}

/// Parse exactly one S-expression, with reader options
pub fn parse_scheme_with_config(input: &str, config: ParseConfig) -> Result<Value, Error> {
    let (rest, datum) =
        parse_sexpr(input, config, 0).map_err(|e| parse_error_from_nom(input, e))?;
    let (rest, _) = skip_ws(rest, config).map_err(|e| parse_error_from_nom(input, e))?;
    if !rest.is_empty() {
        return Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input: '{rest}'"),
            input,
            input.len() - rest.len(),
        )
        .into());
    }
    Ok(datum)
}

/// Parse every S-expression in `input`; comments are always enabled
pub fn parse_scheme_program(input: &str) -> Result<Vec<Value>, Error> {
    let config = ParseConfig {
        handle_comments: true,
    };
    let mut data = Vec::new();
    let (mut rest, _) = skip_ws(input, config).map_err(|e| parse_error_from_nom(input, e))?;
    while !rest.is_empty() {
        let (after, datum) =
            parse_sexpr(rest, config, 0).map_err(|e| parse_error_from_nom(input, e))?;
        let (after, _) = skip_ws(after, config).map_err(|e| parse_error_from_nom(input, e))?;
        data.push(datum);
        rest = after;
    }
    Ok(data)
}

/// Read one expression (a `define` included) from text
pub fn read_exp(input: &str) -> Result<Exp, Error> {
    let config = ParseConfig {
        handle_comments: true,
    };
    let datum = parse_scheme_with_config(input, config)?;
    Ok(ast::parse_exp(&datum)?)
}

/// Read a whole program from text
pub fn read_program(input: &str) -> Result<Program, Error> {
    let data = parse_scheme_program(input)?;
    Ok(ast::parse_program(&data)?)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::Error;
    use crate::value::{nil, sym, val};

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),              // Parsing should succeed with this value
        SpecificError(&'static str), // Parsing should fail with error containing this string
        Error,                       // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    /// Run parse tests with round-trip validation of the printed form
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} ({input:?})", i + 1);
            match (parse_scheme(input), expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    let displayed = format!("{actual}");
                    let reparsed = parse_scheme(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(
                        displayed,
                        format!("{reparsed}"),
                        "{test_id}: round-trip display mismatch"
                    );
                }
                (Err(_), Error) => {}
                (Err(err), SpecificError(expected_text)) => {
                    let error_msg = format!("{err}");
                    assert!(
                        error_msg.contains(expected_text),
                        "{test_id}: error should contain '{expected_text}', got {error_msg}"
                    );
                }
                (Ok(actual), _) => panic!("{test_id}: expected error, got {actual:?}"),
                (Err(err), Success(_)) => panic!("{test_id}: expected success, got {err:?}"),
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // ===== NUMBERS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("#x1A", success(26)),
            ("#X1a", success(26)),
            ("9223372036854775807", success(i64::MAX)),
            ("-9223372036854775808", success(i64::MIN)),
            ("3.14", Error),
            ("#xG", Error),
            ("123abc", Error),
            ("99999999999999999999", SpecificError("out of range")),
            // ===== SYMBOLS =====
            ("foo", success(sym("foo"))),
            ("+", success(sym("+"))),
            ("set!", success(sym("set!"))),
            ("even?", success(sym("even?"))),
            ("-abc", success(sym("-abc"))),
            ("-42name", Error),
            ("test@home", Error),
            // ===== BOOLEANS =====
            ("#t", success(true)),
            ("#f", success(false)),
            ("#true", Error),
            // ===== STRINGS =====
            ("\"hello world\"", success("hello world")),
            (r#""tab\there""#, success("tab\there")),
            (r#""quote\"test""#, success("quote\"test")),
            (r#""other\xchar""#, Error),
            (r#""unterminated"#, Error),
            ("\"\"", success("")),
            // ===== LISTS =====
            ("()", success(nil())),
            ("(   )", success(nil())),
            ("(1 2 3)", success([1, 2, 3])),
            ("( 1   2\t\n3 )", success([1, 2, 3])),
            ("((1 2) (3 4))", success([[1, 2], [3, 4]])),
            ("(f(g))", success(vec![sym("f"), val(vec![sym("g")])])),
            ("(1 . 2)", success(Value::cons(val(1), val(2)))),
            (
                "(1 2 . 3)",
                success(Value::list_with_tail([val(1), val(2)], val(3))),
            ),
            ("(. 2)", Error),
            ("(1 . 2 3)", Error),
            // ===== QUOTE =====
            ("'foo", success(vec![sym("quote"), sym("foo")])),
            ("'()", success(vec![sym("quote"), nil()])),
            ("'(1 2)", success(vec![sym("quote"), val([1, 2])])),
            // ===== ERRORS =====
            ("(1 2 3", SpecificError("end of input")),
            ("(1 2))", SpecificError("remaining input")),
            ("", Error),
            ("   ", Error),
            (")", Error),
            ("1 2", SpecificError("remaining input")),
            ("; comment only", Error),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_parser_depth_limits() {
        let under = format!(
            "{}x{}",
            "(".repeat(MAX_PARSE_DEPTH - 1),
            ")".repeat(MAX_PARSE_DEPTH - 1)
        );
        let at_limit = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );
        assert!(parse_scheme(&under).is_ok());
        match parse_scheme(&at_limit) {
            Err(Error::ParseError(e)) => assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested),
            other => panic!("expected depth error, got {other:?}"),
        }
    }

    #[test]
    fn test_comments_and_programs() {
        let config = ParseConfig {
            handle_comments: true,
        };
        assert_eq!(
            parse_scheme_with_config("; leading\n(1 ; inner\n 2) ; trailing", config).unwrap(),
            val([1, 2])
        );

        let data = parse_scheme_program(
            "(define x 1) ; one\n\n; two\n(+ x 1)\n'sym",
        )
        .unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[2], val(vec![sym("quote"), sym("sym")]));

        assert!(parse_scheme_program("").unwrap().is_empty());
        assert!(parse_scheme_program("(1 2").is_err());
    }

    #[test]
    fn test_read_exp_and_program() {
        assert!(matches!(read_exp("(define x 1)").unwrap(), Exp::Define(_)));
        assert!(read_exp("(lambda (x) (define y 1))").is_err());
        let program = read_program("(define x 1)\n(set! x 2)\nx").unwrap();
        assert_eq!(program.exps.len(), 3);
    }
}
