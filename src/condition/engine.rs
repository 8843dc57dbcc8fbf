use super::Variables;
use crate::ast::{EvaluationTrace, Expression, Value};
use crate::error::EvaluationError;
use std::cmp::Ordering;

// This macro generates a match arm for a binary operation.
macro_rules! eval_op {
    ($self:ident, $l:ident, $r:ident, $op_str:expr, $op_fn:expr, number) => {
        $self.eval_binary($l, $r, $op_str, $op_fn)
    };
    ($self:ident, $l:ident, $r:ident, $op_str:expr, $op_fn:expr, ordering) => {
        $self.eval_comparison($l, $r, $op_str, $op_fn)
    };
}

/// The recursive engine that evaluates one condition against process variables.
pub(super) struct ConditionEngine<'a> {
    expression: &'a Expression,
    variables: &'a Variables,
}

impl<'a> ConditionEngine<'a> {
    pub(super) fn new(expression: &'a Expression, variables: &'a Variables) -> Self {
        Self {
            expression,
            variables,
        }
    }

    /// Evaluates the AST and returns a trace of the execution.
    pub(super) fn evaluate(&self) -> Result<EvaluationTrace, EvaluationError> {
        self.evaluate_recursive(self.expression)
    }

    fn evaluate_recursive(&self, expr: &Expression) -> Result<EvaluationTrace, EvaluationError> {
        match expr {
            // --- Arithmetic Operations ---
            Expression::Sum(l, r) => eval_op!(self, l, r, "+", |a, b| a + b, number),
            Expression::Subtract(l, r) => eval_op!(self, l, r, "-", |a, b| a - b, number),
            Expression::Multiply(l, r) => eval_op!(self, l, r, "*", |a, b| a * b, number),
            Expression::Divide(l, r) => eval_op!(self, l, r, "/", |a, b| a / b, number),
            Expression::Negate(v) => {
                let child_trace = self.evaluate_recursive(v)?;
                let outcome = match child_trace.get_outcome() {
                    Value::Number(val) => Value::Number(-val),
                    val => return Err(self.type_mismatch("NEG", "Number", val)),
                };
                Ok(EvaluationTrace::UnaryOp {
                    op_symbol: "-",
                    child: Box::new(child_trace),
                    outcome,
                })
            }

            // --- Comparison Operations ---
            Expression::GreaterThan(l, r) => {
                eval_op!(self, l, r, ">", |o| o == Ordering::Greater, ordering)
            }
            Expression::SmallerThan(l, r) => {
                eval_op!(self, l, r, "<", |o| o == Ordering::Less, ordering)
            }
            Expression::GreaterThanOrEqual(l, r) => {
                eval_op!(self, l, r, ">=", |o| o != Ordering::Less, ordering)
            }
            Expression::SmallerThanOrEqual(l, r) => {
                eval_op!(self, l, r, "<=", |o| o != Ordering::Greater, ordering)
            }

            // --- Equality ---
            Expression::Equal(l, r) => self.eval_equality(l, r, "==", true),
            Expression::NotEqual(l, r) => self.eval_equality(l, r, "!=", false),

            // --- Logical Operations ---
            Expression::And(l, r) => self.eval_logical(l, r, "AND", false),
            Expression::Or(l, r) => self.eval_logical(l, r, "OR", true),
            Expression::Not(v) => {
                let child_trace = self.evaluate_recursive(v)?;
                let outcome = match child_trace.get_outcome() {
                    Value::Bool(val) => Value::Bool(!val),
                    val => return Err(self.type_mismatch("NOT", "Bool", val)),
                };
                Ok(EvaluationTrace::UnaryOp {
                    op_symbol: "NOT",
                    child: Box::new(child_trace),
                    outcome,
                })
            }

            // --- Leaves ---
            Expression::Literal(val) => Ok(EvaluationTrace::Leaf {
                source: val.to_string(),
                value: val.clone(),
            }),
            Expression::Variable(name) => {
                let value = self
                    .variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvaluationError::VariableNotFound(name.clone()))?;
                Ok(EvaluationTrace::Leaf {
                    source: format!("${}", name),
                    value,
                })
            }
        }
    }

    /// `&&` and `||`. The right side is skipped once the left equals `decisive`.
    fn eval_logical(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        decisive: bool,
    ) -> Result<EvaluationTrace, EvaluationError> {
        let left_trace = self.evaluate_recursive(l)?;
        let left = match left_trace.get_outcome() {
            Value::Bool(b) => b,
            other => return Err(self.type_mismatch(op, "Bool", other)),
        };
        if left == decisive {
            return Ok(EvaluationTrace::BinaryOp {
                op_symbol: op,
                left: Box::new(left_trace),
                right: Box::new(EvaluationTrace::NotEvaluated),
                outcome: Value::Bool(decisive),
            });
        }
        let right_trace = self.evaluate_recursive(r)?;
        let outcome = match right_trace.get_outcome() {
            Value::Bool(b) => Value::Bool(b),
            other => return Err(self.type_mismatch(op, "Bool", other)),
        };
        Ok(EvaluationTrace::BinaryOp {
            op_symbol: op,
            left: Box::new(left_trace),
            right: Box::new(right_trace),
            outcome,
        })
    }

    fn eval_binary<F>(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        f: F,
    ) -> Result<EvaluationTrace, EvaluationError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let left_trace = self.evaluate_recursive(l)?;
        let right_trace = self.evaluate_recursive(r)?;
        let outcome = match (left_trace.get_outcome(), right_trace.get_outcome()) {
            (Value::Number(lv), Value::Number(rv)) => Value::Number(f(lv, rv)),
            (Value::Number(_), r_val) => return Err(self.type_mismatch(op, "Number", r_val)),
            (l_val, _) => return Err(self.type_mismatch(op, "Number", l_val)),
        };
        Ok(EvaluationTrace::BinaryOp {
            op_symbol: op,
            left: Box::new(left_trace),
            right: Box::new(right_trace),
            outcome,
        })
    }

    /// Numbers compare numerically and text compares lexically.
    fn eval_comparison<F>(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        f: F,
    ) -> Result<EvaluationTrace, EvaluationError>
    where
        F: Fn(Ordering) -> bool,
    {
        let left_trace = self.evaluate_recursive(l)?;
        let right_trace = self.evaluate_recursive(r)?;
        let ordering = match (left_trace.get_outcome(), right_trace.get_outcome()) {
            (Value::Number(lv), Value::Number(rv)) => lv.partial_cmp(&rv),
            (Value::Text(lv), Value::Text(rv)) => Some(lv.cmp(&rv)),
            (Value::Number(_), r_val) => return Err(self.type_mismatch(op, "Number", r_val)),
            (Value::Text(_), r_val) => return Err(self.type_mismatch(op, "Text", r_val)),
            (l_val, _) => return Err(self.type_mismatch(op, "Number", l_val)),
        };
        // NaN is never ordered, so every comparison with it is false.
        let outcome = Value::Bool(ordering.is_some_and(f));
        Ok(EvaluationTrace::BinaryOp {
            op_symbol: op,
            left: Box::new(left_trace),
            right: Box::new(right_trace),
            outcome,
        })
    }

    fn eval_equality(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        equal: bool,
    ) -> Result<EvaluationTrace, EvaluationError> {
        let left_trace = self.evaluate_recursive(l)?;
        let right_trace = self.evaluate_recursive(r)?;
        let same = left_trace.get_outcome() == right_trace.get_outcome();
        Ok(EvaluationTrace::BinaryOp {
            op_symbol: op,
            left: Box::new(left_trace),
            right: Box::new(right_trace),
            outcome: Value::Bool(same == equal),
        })
    }

    fn type_mismatch(&self, op: &str, expected: &str, found: Value) -> EvaluationError {
        EvaluationError::TypeMismatch {
            operation: op.to_string(),
            expected: expected.to_string(),
            found,
        }
    }
}
