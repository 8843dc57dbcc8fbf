use super::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The Abstract Syntax Tree of a sequence-flow condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    // Arithmetic
    Sum(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Negate(Box<Expression>),

    // Logical
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),

    // Comparison
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    SmallerThan(Box<Expression>, Box<Expression>),
    SmallerThanOrEqual(Box<Expression>, Box<Expression>),

    // Leaf nodes
    Literal(Value),
    Variable(String),
}

impl Expression {
    /// Collects the names of every process variable the expression reads.
    pub fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Variable(name) => {
                names.insert(name.clone());
            }
            Expression::Sum(l, r)
            | Expression::Subtract(l, r)
            | Expression::Multiply(l, r)
            | Expression::Divide(l, r)
            | Expression::And(l, r)
            | Expression::Or(l, r)
            | Expression::Equal(l, r)
            | Expression::NotEqual(l, r)
            | Expression::GreaterThan(l, r)
            | Expression::GreaterThanOrEqual(l, r)
            | Expression::SmallerThan(l, r)
            | Expression::SmallerThanOrEqual(l, r) => {
                l.collect_variables(names);
                r.collect_variables(names);
            }
            Expression::Negate(v) | Expression::Not(v) => v.collect_variables(names),
            Expression::Literal(_) => {}
        }
    }

    fn binary_parts(&self) -> Option<(&'static str, u8, &Expression, &Expression)> {
        match self {
            Expression::Or(l, r) => Some(("||", 1, l, r)),
            Expression::And(l, r) => Some(("&&", 2, l, r)),
            Expression::Equal(l, r) => Some(("==", 3, l, r)),
            Expression::NotEqual(l, r) => Some(("!=", 3, l, r)),
            Expression::GreaterThan(l, r) => Some((">", 4, l, r)),
            Expression::GreaterThanOrEqual(l, r) => Some((">=", 4, l, r)),
            Expression::SmallerThan(l, r) => Some(("<", 4, l, r)),
            Expression::SmallerThanOrEqual(l, r) => Some(("<=", 4, l, r)),
            Expression::Sum(l, r) => Some(("+", 5, l, r)),
            Expression::Subtract(l, r) => Some(("-", 5, l, r)),
            Expression::Multiply(l, r) => Some(("*", 6, l, r)),
            Expression::Divide(l, r) => Some(("/", 6, l, r)),
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self.binary_parts() {
            Some((_, p, _, _)) => p,
            None => 7,
        }
    }

    fn fmt_with_parent(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        let own = self.precedence();
        let parens = own < parent;
        if parens {
            write!(f, "(")?;
        }
        match self {
            Expression::Literal(v) => write!(f, "{}", v)?,
            Expression::Variable(name) => write!(f, "{}", name)?,
            Expression::Not(v) => {
                write!(f, "!")?;
                v.fmt_with_parent(f, 7)?;
            }
            Expression::Negate(v) => {
                write!(f, "-")?;
                v.fmt_with_parent(f, 7)?;
            }
            other => {
                if let Some((symbol, p, l, r)) = other.binary_parts() {
                    l.fmt_with_parent(f, p)?;
                    write!(f, " {} ", symbol)?;
                    // Right operand binds tighter so `a - (b - c)` keeps its parentheses.
                    r.fmt_with_parent(f, p + 1)?;
                }
            }
        }
        if parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Renders the expression back in infix form with minimal parentheses.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_parent(f, 0)
    }
}
