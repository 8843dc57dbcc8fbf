//! Condition syntax tree, runtime values and evaluation traces.

mod expression;
mod trace;
mod value;

pub use expression::Expression;
pub use trace::EvaluationTrace;
pub use value::Value;
