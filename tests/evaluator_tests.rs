// tests/evaluator_tests.rs

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use tally_lang::{Precision, ResultGroups, Template, Value};

fn run(source: &str, precision: Precision) -> ResultGroups {
    let mut template = Template::new(source);
    template.set_precision(precision);
    template
        .execute_json(serde_json::Value::Null)
        .unwrap_or_else(|e| panic!("{} failed: {}", source, e))
}

fn eval(source: &str) -> Value {
    run(source, Precision::Exact)["res"]["res1"].clone()
}

fn eval_float(source: &str) -> Value {
    run(source, Precision::Float)["res"]["res1"].clone()
}

fn dec(s: &str) -> Value {
    Value::Decimal(Decimal::from_str(s).unwrap())
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_golden_arithmetic() {
    let source = "1 + 2 * 6 / 4 + (456 - 8 * 9.2) - (2 + 4 ^ 5)";
    assert!(eval(source).equal_to(&dec("-639.6")));
    assert!((eval_float(source).as_float() - -639.6).abs() < 1e-9);
}

#[test]
fn test_exact_mode_has_no_float_drift() {
    assert_eq!(eval("0.1 + 0.2"), dec("0.3"));
    assert!(eval("0.1 + 0.2 == 0.3").is_truthy());
}

#[test]
fn test_exact_matches_float_within_epsilon() {
    for literal in ["0", "1", "-7", "3.25", "1e3", "0x1F", ".5", "123456.789"] {
        let exact = eval(literal).as_float();
        let float = eval_float(literal).as_float();
        assert!((exact - float).abs() < 1e-9, "literal {}", literal);
    }
}

#[test]
fn test_modulo_and_power() {
    assert_eq!(eval("17 % 5"), dec("2"));
    assert_eq!(eval("2 ^ 10"), dec("1024"));
    assert!((eval_float("2 ^ 0.5").as_float() - 2f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_negative_base_fractional_power_is_nan() {
    for source in ["(-8) ^ 0.5", "(-2) ^ 0.5"] {
        assert!(eval(source).as_float().is_nan(), "{}", source);
        assert!(eval_float(source).as_float().is_nan(), "{}", source);
    }
    assert_eq!(eval("(-2) ^ 3"), dec("-8"));
}

#[test]
fn test_float_literals_beyond_decimal_range() {
    assert!((eval_float("1e100 * 2").as_float() - 2e100).abs() < 1e85);
    assert!(eval_float("99999999999999999999999999999999 > 1").is_truthy());

    let mut template = Template::new("1 + 1e100");
    let err = template.execute_json(json!({})).unwrap_err();
    assert_eq!(err.error().code(), -527);
    assert_eq!(err.to_string(), "line: 1, col: 5, numeric overflow in '1e100'");
}

#[test]
fn test_divide_by_zero_in_both_modes() {
    for precision in [Precision::Exact, Precision::Float] {
        for source in ["5 / 0", "5 % 0", "-3 / (1 - 1)"] {
            let mut template = Template::new(source);
            template.set_precision(precision);
            let err = template.execute_json(json!({})).unwrap_err();
            assert_eq!(err.error().code(), -522, "{} in {:?}", source, precision);
            assert!(err.to_string().ends_with("divide zero"));
        }
    }
}

#[test]
fn test_unary_minus() {
    assert_eq!(eval("-(2 + 3)"), dec("-5"));
    assert_eq!(eval("2 - -3"), dec("5"));
}

// ============================================================================
// Strings and Comparison
// ============================================================================

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("\"a\" + 1"), Value::from("a1"));
    assert_eq!(eval("1 + \"a\""), Value::from("1a"));
    assert_eq!(eval_float("\"a\" + 1"), Value::from("a1"));
    assert_eq!(eval("'x' + true"), Value::from("xTrue"));
}

#[test]
fn test_relational_operators() {
    assert_eq!(eval("3 > 2"), Value::Bool(true));
    assert_eq!(eval("3 <= 2"), Value::Bool(false));
    assert_eq!(eval("2 == 2.0"), Value::Bool(true));
    assert_eq!(eval("2 != 2"), Value::Bool(false));
    assert_eq!(eval("\"a\" == \"a\""), Value::Bool(true));
    assert_eq!(eval("nil == nil"), Value::Bool(true));
    assert_eq!(eval_float("1.5 < 2"), Value::Bool(true));
}

#[test]
fn test_relational_needs_numbers() {
    let mut template = Template::new("\"a\" < 1");
    let err = template.execute_json(json!({})).unwrap_err();
    assert_eq!(err.error().code(), -526);
}

#[test]
fn test_time_comparison() {
    assert_eq!(
        eval("date(\"2024-01-01T00:00:00Z\") < date(\"2024-06-01T00:00:00Z\")"),
        Value::Bool(true)
    );
}

#[test]
fn test_in_operator() {
    assert_eq!(eval("2 in [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval("\"ell\" in \"hello\""), Value::Bool(true));
    assert_eq!(eval("5 in [1, 2]"), Value::Bool(false));
}

// ============================================================================
// Logical Operators
// ============================================================================

#[test]
fn test_logical_operators_use_truthiness() {
    assert_eq!(eval("1 and \"x\""), Value::Bool(true));
    assert_eq!(eval("0 or \"\""), Value::Bool(false));
    assert_eq!(eval("!nil"), Value::Bool(true));
    assert_eq!(eval("[] || [1]"), Value::Bool(true));
}

#[test]
fn test_short_circuit_skips_right_side() {
    assert_eq!(eval("false and 1 / 0"), Value::Bool(false));
    assert_eq!(eval("true or undefined_name"), Value::Bool(true));
}

// ============================================================================
// Builtins
// ============================================================================

#[test]
fn test_builtin_functions() {
    assert_eq!(eval("sum(1, 2, [3, 4])"), dec("10"));
    assert_eq!(eval("max(3, 9, 1)"), dec("9"));
    assert_eq!(eval("min([4, 2], 8)"), dec("2"));
    assert_eq!(eval("avg(1, 2, 3, 4)"), dec("2.5"));
    assert_eq!(eval("round(2.675, 2)"), dec("2.68"));
    assert_eq!(eval("floor(-1.5)"), dec("-2"));
    assert_eq!(eval("ceil(1.2)"), dec("2"));
    assert_eq!(eval("abs(-4)"), dec("4"));
    assert_eq!(eval("len(\"héllo\")"), Value::Integer(5));
    assert_eq!(eval("matches(\"ab12\", \"^[a-z]+[0-9]+$\")"), Value::Bool(true));
    assert!((eval("sin(pi / 2)").as_float() - 1.0).abs() < 1e-9);
    assert!((eval_float("sqrt(16)").as_float() - 4.0).abs() < 1e-12);
}

#[test]
fn test_round_with_extreme_places() {
    for (places, expected) in [(i64::MIN, "0"), (i64::MAX, "1.5")] {
        let mut template = Template::new("round(1.5, p)");
        let results = template.execute([("p", Value::Integer(places))]).unwrap();
        assert!(results["res"]["res1"].equal_to(&dec(expected)), "places {}", places);
    }
}

#[test]
fn test_aggregate_error_points_at_argument() {
    let mut template = Template::new("sum(1,\n  \"x\")");
    let err = template.execute_json(json!({})).unwrap_err();
    assert_eq!(err.error().code(), -502);
    assert_eq!(err.to_string(), "line: 2, col: 3, sum: argument 'x' not number");
}
