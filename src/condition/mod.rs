//! Gateway condition expressions: parsing, evaluation and explanation.

use crate::ast::{EvaluationTrace, Expression, Value};
use crate::error::{ConditionParseError, EvaluationError};
use crate::trace::TraceFormatter;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

mod engine;
mod parser;

use engine::ConditionEngine;
pub use parser::parse_condition;

/// Process variables visible to a condition, keyed by variable name.
pub type Variables = AHashMap<String, Value>;

/// A parsed sequence-flow condition, keeping its source text for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub source: String,
    pub expression: Expression,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionParseError> {
        Ok(Self {
            source: source.to_string(),
            expression: parse_condition(source)?,
        })
    }

    /// Evaluates the condition and returns the full evaluation trace.
    pub fn evaluate(&self, variables: &Variables) -> Result<EvaluationTrace, EvaluationError> {
        ConditionEngine::new(&self.expression, variables).evaluate()
    }

    /// Evaluates the condition as a branch guard.
    ///
    /// A guard only passes on boolean `true`. Evaluation failures close the
    /// branch and are logged, so a missing variable never opens a path.
    pub fn is_satisfied(&self, variables: &Variables) -> bool {
        match self.evaluate(variables) {
            Ok(trace) => {
                let satisfied = trace.is_true();
                tracing::debug!(
                    condition = %self.source,
                    satisfied,
                    reason = %TraceFormatter::format_trace(&trace),
                    "condition evaluated"
                );
                satisfied
            }
            Err(e) => {
                tracing::warn!(condition = %self.source, error = %e, "condition evaluation failed");
                false
            }
        }
    }
}
