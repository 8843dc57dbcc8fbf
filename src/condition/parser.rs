//! nom grammar for JUEL-style gateway conditions.

use crate::ast::{Expression, Value};
use crate::error::ConditionParseError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{anychar, char, digit1, multispace0, none_of, satisfy},
    combinator::{cut, map, map_res, not, opt, recognize, value, verify},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{fold_many0, many0},
    sequence::{delimited, pair, preceded, terminated},
    Finish, IResult,
};

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;
type Binary = fn(Box<Expression>, Box<Expression>) -> Expression;

/// Deepest allowed nesting of parentheses and prefix operators.
pub const MAX_NESTING: usize = 64;

const RESERVED: [&str; 12] = [
    "true", "false", "null", "and", "or", "not", "eq", "ne", "gt", "ge", "lt", "le",
];

/// Strips an optional `${ ... }` or `#{ ... }` wrapper around a condition.
fn unwrap_expression(source: &str) -> (&str, usize) {
    let trimmed = source.trim();
    let offset = source.len() - source.trim_start().len();
    for prefix in ["${", "#{"] {
        if let Some(inner) = trimmed
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix('}'))
        {
            return (inner, offset + prefix.len());
        }
    }
    (trimmed, offset)
}

fn error(position: usize, message: impl Into<String>) -> ConditionParseError {
    ConditionParseError {
        position,
        message: message.into(),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> ParseResult<'a, O>
where
    F: FnMut(&'a str) -> ParseResult<'a, O>,
{
    preceded(multispace0, inner)
}

/// A word operator or literal that must not run into an identifier (`or` but not `order`).
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

fn number(input: &str) -> ParseResult<'_, f64> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        str::parse::<f64>,
    )(input)
}

/// A quoted string; a backslash takes the next character literally.
fn quoted<'a>(quote: char, stop: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, String> {
    delimited(
        char(quote),
        fold_many0(
            alt((preceded(char('\\'), anychar), none_of(stop))),
            String::new,
            |mut text, c| {
                text.push(c);
                text
            },
        ),
        context("unterminated string literal", cut(char(quote))),
    )
}

fn literal(input: &str) -> ParseResult<'_, Value> {
    alt((
        value(Value::Bool(true), keyword("true")),
        value(Value::Bool(false), keyword("false")),
        value(Value::Null, keyword("null")),
        map(number, Value::Number),
        map(quoted('\'', "\\'"), Value::Text),
        map(quoted('"', "\\\""), Value::Text),
    ))(input)
}

fn identifier(input: &str) -> ParseResult<'_, &str> {
    verify(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        |word: &str| !RESERVED.contains(&word),
    )(input)
}

fn primary(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    context(
        "expected a value",
        ws(alt((
            map(literal, Expression::Literal),
            map(identifier, |name: &str| Expression::Variable(name.to_string())),
            delimited(
                char('('),
                |i| or_expr(i, depth + 1),
                context("expected ')'", cut(ws(char(')')))),
            ),
        ))),
    )(input)
}

fn unary(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context("condition nested too deeply"))],
        }));
    }
    let not_operator = alt((terminated(tag("!"), not(char('='))), keyword("not")));
    alt((
        map(preceded(ws(not_operator), |i| unary(i, depth + 1)), |e: Expression| {
            Expression::Not(Box::new(e))
        }),
        map(preceded(ws(char('-')), |i| unary(i, depth + 1)), |e: Expression| {
            Expression::Negate(Box::new(e))
        }),
        |i| primary(i, depth),
    ))(input)
}

/// One left-associative precedence level: `operand (operator operand)*`.
fn fold_level<'a>(
    input: &'a str,
    depth: usize,
    operator: fn(&'a str) -> ParseResult<'a, Binary>,
    operand: fn(&'a str, usize) -> ParseResult<'a, Expression>,
) -> ParseResult<'a, Expression> {
    let (input, first) = operand(input, depth)?;
    let (input, rest) = many0(pair(ws(operator), cut(|i| operand(i, depth))))(input)?;
    let folded = rest
        .into_iter()
        .fold(first, |left, (build, right)| build(Box::new(left), Box::new(right)));
    Ok((input, folded))
}

fn or_operator(input: &str) -> ParseResult<'_, Binary> {
    value(Expression::Or as Binary, alt((tag("||"), keyword("or"))))(input)
}

fn and_operator(input: &str) -> ParseResult<'_, Binary> {
    value(Expression::And as Binary, alt((tag("&&"), keyword("and"))))(input)
}

fn equality_operator(input: &str) -> ParseResult<'_, Binary> {
    alt((
        value(Expression::Equal as Binary, alt((tag("=="), keyword("eq")))),
        value(Expression::NotEqual as Binary, alt((tag("!="), keyword("ne")))),
    ))(input)
}

fn relational_operator(input: &str) -> ParseResult<'_, Binary> {
    alt((
        value(Expression::GreaterThanOrEqual as Binary, alt((tag(">="), keyword("ge")))),
        value(Expression::SmallerThanOrEqual as Binary, alt((tag("<="), keyword("le")))),
        value(Expression::GreaterThan as Binary, alt((tag(">"), keyword("gt")))),
        value(Expression::SmallerThan as Binary, alt((tag("<"), keyword("lt")))),
    ))(input)
}

fn additive_operator(input: &str) -> ParseResult<'_, Binary> {
    alt((
        value(Expression::Sum as Binary, char('+')),
        value(Expression::Subtract as Binary, char('-')),
    ))(input)
}

fn multiplicative_operator(input: &str) -> ParseResult<'_, Binary> {
    alt((
        value(Expression::Multiply as Binary, char('*')),
        value(Expression::Divide as Binary, char('/')),
    ))(input)
}

fn or_expr(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    fold_level(input, depth, or_operator, and_expr)
}

fn and_expr(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    fold_level(input, depth, and_operator, equality_expr)
}

fn equality_expr(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    fold_level(input, depth, equality_operator, relational_expr)
}

fn relational_expr(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    fold_level(input, depth, relational_operator, additive_expr)
}

fn additive_expr(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    fold_level(input, depth, additive_operator, multiplicative_expr)
}

fn multiplicative_expr(input: &str, depth: usize) -> ParseResult<'_, Expression> {
    fold_level(input, depth, multiplicative_operator, unary)
}

/// Picks the innermost labelled failure; its remaining input gives the offset.
fn describe(err: VerboseError<&str>, offset_of: impl Fn(&str) -> usize) -> ConditionParseError {
    let position = err
        .errors
        .first()
        .map(|(rest, _)| offset_of(rest))
        .unwrap_or_default();
    let message = err
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(label) => Some(label.to_string()),
            _ => None,
        })
        .or_else(|| {
            err.errors.iter().find_map(|(_, kind)| match kind {
                VerboseErrorKind::Char(c) => Some(format!("expected '{}'", c)),
                _ => None,
            })
        })
        .unwrap_or_else(|| "unexpected input".to_string());
    error(position, message)
}

/// Parses a condition such as `${amount > 100 && approved}` into an `Expression`.
pub fn parse_condition(source: &str) -> Result<Expression, ConditionParseError> {
    let (inner, base) = unwrap_expression(source);
    if inner.trim().is_empty() {
        return Err(error(base, "empty condition"));
    }

    let offset_of = |rest: &str| base + inner.len() - rest.len();
    let (rest, expression) = terminated(|i| or_expr(i, 0), multispace0)(inner)
        .finish()
        .map_err(|e| describe(e, &offset_of))?;
    if !rest.is_empty() {
        return Err(error(offset_of(rest), "unexpected trailing input"));
    }
    Ok(expression)
}
