//! Tests for gateway condition parsing and evaluation.
use modoshi::ast::Expression;
use modoshi::condition::parse_condition;
use modoshi::error::EvaluationError;
use modoshi::prelude::*;

fn vars(entries: &[(&str, Value)]) -> Variables {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn var(name: &str) -> Box<Expression> {
    Box::new(Expression::Variable(name.to_string()))
}

#[test]
fn test_and_binds_tighter_than_or() {
    let parsed = parse_condition("a || b && c").unwrap();
    let expected = Expression::Or(var("a"), Box::new(Expression::And(var("b"), var("c"))));
    assert_eq!(parsed, expected);
}

#[test]
fn test_wrapper_is_optional() {
    let wrapped = parse_condition("${amount > 100}").unwrap();
    let bare = parse_condition("amount > 100").unwrap();
    assert_eq!(wrapped, bare);
    assert_eq!(wrapped.to_string(), "amount > 100");
}

#[test]
fn test_parentheses_survive_display() {
    let parsed = parse_condition("${(a || b) && !c}").unwrap();
    assert_eq!(parsed.to_string(), "(a || b) && !c");
}

#[test]
fn test_string_equality() {
    let condition = Condition::parse("${outcome == 'approved'}").unwrap();
    let approved = vars(&[("outcome", Value::from("approved"))]);
    let rejected = vars(&[("outcome", Value::from("rejected"))]);
    assert!(condition.is_satisfied(&approved));
    assert!(!condition.is_satisfied(&rejected));
}

#[test]
fn test_dotted_identifiers_and_arithmetic() {
    let condition = Condition::parse("${order.total * 2 >= limit - 10}").unwrap();
    let variables = vars(&[
        ("order.total", Value::Number(50.0)),
        ("limit", Value::Number(110.0)),
    ]);
    assert!(condition.is_satisfied(&variables));
}

#[test]
fn test_missing_variable_closes_branch() {
    let condition = Condition::parse("${approved}").unwrap();
    let err = condition.evaluate(&Variables::new()).unwrap_err();
    assert!(matches!(err, EvaluationError::VariableNotFound(ref name) if name == "approved"));
    assert!(!condition.is_satisfied(&Variables::new()));
}

#[test]
fn test_type_mismatch_is_reported() {
    let condition = Condition::parse("${name > 3}").unwrap();
    let variables = vars(&[("name", Value::from("bob"))]);
    assert!(matches!(
        condition.evaluate(&variables),
        Err(EvaluationError::TypeMismatch { .. })
    ));
    assert!(!condition.is_satisfied(&variables));
}

#[test]
fn test_short_circuit_skips_missing_variable() {
    let condition = Condition::parse("${ready or missing}").unwrap();
    let variables = vars(&[("ready", Value::Bool(true))]);
    let trace = condition.evaluate(&variables).unwrap();
    assert!(trace.is_true());
    assert_eq!(TraceFormatter::format_trace(&trace), "$ready (was true)");
}

#[test]
fn test_non_boolean_result_does_not_satisfy() {
    let condition = Condition::parse("${count + 1}").unwrap();
    let variables = vars(&[("count", Value::Number(1.0))]);
    assert!(!condition.is_satisfied(&variables));
}

#[test]
fn test_parse_errors_carry_offsets() {
    let err = parse_condition("${a &&}").unwrap_err();
    assert_eq!(err.position, 6);
    assert!(parse_condition("'open").is_err());
    assert!(parse_condition("${}").is_err());
}

#[test]
fn test_deep_nesting_is_a_parse_error() {
    let parens = format!("{}a{}", "(".repeat(10_000), ")".repeat(10_000));
    let err = parse_condition(&parens).unwrap_err();
    assert_eq!(err.message, "condition nested too deeply");

    let negations = format!("{}ready", "!".repeat(10_000));
    assert!(parse_condition(&negations).is_err());

    let shallow = format!("{}a > 1{}", "(".repeat(20), ")".repeat(20));
    assert!(parse_condition(&shallow).is_ok());
}

#[test]
fn test_trace_keeps_right_hand_grouping() {
    let variables = vars(&[
        ("a", Value::Number(10.0)),
        ("b", Value::Number(4.0)),
        ("c", Value::Number(1.0)),
    ]);
    let grouped = Condition::parse("${a - (b - c) > 0}").unwrap();
    assert_eq!(
        TraceFormatter::format_trace(&grouped.evaluate(&variables).unwrap()),
        "$a (was 10) - ($b (was 4) - $c (was 1)) > 0"
    );

    let flat = Condition::parse("${a - b - c == 5}").unwrap();
    assert_eq!(
        TraceFormatter::format_trace(&flat.evaluate(&variables).unwrap()),
        "$a (was 10) - $b (was 4) - $c (was 1) == 5"
    );

    let mixed = Condition::parse("${(a > b or c > a) and not (b == c)}").unwrap();
    assert_eq!(
        TraceFormatter::format_trace(&mixed.evaluate(&variables).unwrap()),
        "($a (was 10) > $b (was 4)) AND NOT ($b (was 4) == $c (was 1))"
    );
}
