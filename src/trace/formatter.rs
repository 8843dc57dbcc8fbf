use crate::ast::EvaluationTrace;

/// Renders a condition trace as the part of the expression that decided it.
///
/// Variables are shown with the value they held (`$amount (was 120)`), and a
/// short-circuited right operand is left out entirely.
pub struct TraceFormatter;

impl TraceFormatter {
    pub fn format_trace(trace: &EvaluationTrace) -> String {
        let mut out = String::new();
        Self::write_node(trace, 0, &mut out);
        out
    }

    fn write_node(trace: &EvaluationTrace, parent_precedence: u8, out: &mut String) {
        let precedence = trace.precedence();
        let parenthesize = precedence < parent_precedence;
        if parenthesize {
            out.push('(');
        }

        match trace {
            EvaluationTrace::BinaryOp {
                op_symbol,
                left,
                right,
                ..
            } => {
                Self::write_node(left, precedence, out);
                if !matches!(**right, EvaluationTrace::NotEvaluated) {
                    out.push(' ');
                    out.push_str(op_symbol);
                    out.push(' ');
                    // Left-associative: an equal-precedence right operand needs its parentheses.
                    Self::write_node(right, precedence + 1, out);
                }
            }
            EvaluationTrace::UnaryOp {
                op_symbol, child, ..
            } => {
                out.push_str(op_symbol);
                out.push(' ');
                Self::write_node(child, precedence, out);
            }
            EvaluationTrace::Leaf { source, value } if source.starts_with('$') => {
                out.push_str(&format!("{} (was {})", source, value));
            }
            EvaluationTrace::Leaf { source, .. } => out.push_str(source),
            EvaluationTrace::NotEvaluated => {}
        }

        if parenthesize {
            out.push(')');
        }
    }
}
