//! Expression evaluation.
//!
//! Operands are evaluated left before right. Arithmetic and relational
//! operators require numbers and branch on the context's [`Precision`]:
//! exact mode works on [`Decimal`], float mode on `f64`.

use std::cmp::Ordering;

use rust_decimal::{Decimal, MathematicalOps, prelude::ToPrimitive};

use crate::{
    ast::{BinOp, Expr, UnaryOp},
    context::{EvalContext, Precision},
    error::{Error, ErrorKind},
    resolve,
    value::Value,
};

impl Expr {
    /// Evaluates the expression against `ctx`.
    pub fn evaluate(&self, ctx: &EvalContext) -> Result<Value, Error> {
        match self {
            Expr::Number { value, pos } => match ctx.precision() {
                Precision::Exact => value.decimal.map(Value::Decimal).ok_or_else(|| {
                    Error::from(ErrorKind::NumericOverflow(value.text.clone())).at(*pos)
                }),
                Precision::Float => Ok(Value::Float(value.float)),
            },
            Expr::String { value, .. } => Ok(Value::String(value.clone())),
            Expr::Boolean { value, .. } => Ok(Value::Bool(*value)),
            Expr::Nil(_) => Ok(Value::Nil),
            Expr::Array { elements, .. } => elements
                .iter()
                .map(|e| e.evaluate(ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Variable(path) => resolve::resolve(path, ctx),
            Expr::Unary { op, operand, pos } => {
                let value = operand.evaluate(ctx)?.follow();
                apply_unary(*op, value, ctx.precision()).map_err(|e| e.or_at(*pos))
            }
            Expr::Binary {
                op,
                left,
                right,
                pos,
            } => eval_binary(*op, left, right, ctx).map_err(|e| e.or_at(*pos)),
        }
    }
}

fn eval_binary(op: BinOp, left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<Value, Error> {
    // `and`/`or` only look at the right side when they have to
    match op {
        BinOp::And => {
            if !left.evaluate(ctx)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(right.evaluate(ctx)?.is_truthy()));
        }
        BinOp::Or => {
            if left.evaluate(ctx)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(right.evaluate(ctx)?.is_truthy()));
        }
        _ => {}
    }

    let left = left.evaluate(ctx)?.follow();
    let right = right.evaluate(ctx)?.follow();
    apply_binop(op, &left, &right, ctx.precision())
}

fn not_number(op: impl ToString, left: &Value, right: &Value) -> Error {
    ErrorKind::OperandNotNumber {
        operator: op.to_string(),
        left: left.type_name(),
        right: right.type_name(),
    }
    .into()
}

fn overflow(op: BinOp) -> Error {
    ErrorKind::NumericOverflow(op.symbol().to_string()).into()
}

fn apply_unary(op: UnaryOp, value: Value, precision: Precision) -> Result<Value, Error> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Negate => {
            if !value.is_number() {
                return Err(not_number(op, &Value::Nil, &value));
            }
            Ok(match (precision, value) {
                (Precision::Float, v) => Value::Float(-v.as_float()),
                (Precision::Exact, v) => Value::Decimal(-v.as_decimal()),
            })
        }
    }
}

/// Applies a non-logical binary operator to evaluated operands.
pub fn apply_binop(op: BinOp, left: &Value, right: &Value, precision: Precision) -> Result<Value, Error> {
    match op {
        BinOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        BinOp::In => Ok(Value::Bool(right.contains(left))),
        BinOp::Equal => Ok(Value::Bool(values_equal(left, right, precision))),
        BinOp::NotEqual => Ok(Value::Bool(!values_equal(left, right, precision))),
        BinOp::LessThan | BinOp::LessEqual | BinOp::GreaterThan | BinOp::GreaterEqual => {
            let ordering = compare(op, left, right, precision)?;
            Ok(Value::Bool(match op {
                BinOp::LessThan => ordering == Ordering::Less,
                BinOp::LessEqual => ordering != Ordering::Greater,
                BinOp::GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinOp::Add if left.is_string() || right.is_string() => {
            Ok(Value::String(left.as_string() + &right.as_string()))
        }
        BinOp::Add
        | BinOp::Subtract
        | BinOp::Multiply
        | BinOp::Divide
        | BinOp::Modulo
        | BinOp::Power => {
            if !left.is_number() || !right.is_number() {
                return Err(not_number(op, left, right));
            }
            match precision {
                Precision::Exact => decimal_arith(op, left.as_decimal(), right.as_decimal()),
                Precision::Float => float_arith(op, left.as_float(), right.as_float()),
            }
        }
    }
}

fn decimal_arith(op: BinOp, a: Decimal, b: Decimal) -> Result<Value, Error> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide | BinOp::Modulo if b.is_zero() => {
            return Err(ErrorKind::DivideByZero.into());
        }
        BinOp::Divide => a.checked_div(b),
        BinOp::Modulo => a.checked_rem(b),
        BinOp::Power => match b.to_i64() {
            Some(exp) if b.fract().is_zero() => a.checked_powi(exp),
            // No real root: same NaN as float mode.
            _ if a.is_sign_negative() && !a.is_zero() => {
                return float_arith(op, a.to_f64().unwrap_or(f64::NAN), b.to_f64().unwrap_or(f64::NAN));
            }
            _ => a.checked_powd(b),
        },
        _ => return Err(ErrorKind::UnknownOperator(op.to_string()).into()),
    };
    result.map(Value::Decimal).ok_or_else(|| overflow(op))
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Result<Value, Error> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide | BinOp::Modulo if b == 0.0 => {
            return Err(ErrorKind::DivideByZero.into());
        }
        BinOp::Divide => a / b,
        BinOp::Modulo => a % b,
        BinOp::Power => a.powf(b),
        _ => return Err(ErrorKind::UnknownOperator(op.to_string()).into()),
    };
    Ok(Value::Float(result))
}

fn values_equal(left: &Value, right: &Value, precision: Precision) -> bool {
    if precision == Precision::Exact && left.is_number() && right.is_number() {
        return left.as_decimal() == right.as_decimal();
    }
    left.equal_to(right)
}

fn compare(op: BinOp, left: &Value, right: &Value, precision: Precision) -> Result<Ordering, Error> {
    if let (Value::Time(a), Value::Time(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    if !left.is_number() || !right.is_number() {
        return Err(not_number(op, left, right));
    }

    let float_typed = |v: &Value| matches!(v, Value::Float(_) | Value::Decimal(_));
    Ok(match precision {
        Precision::Exact => left.as_decimal().cmp(&right.as_decimal()),
        Precision::Float if float_typed(left) || float_typed(right) => left
            .as_float()
            .partial_cmp(&right.as_float())
            .unwrap_or(Ordering::Equal),
        Precision::Float => left.as_integer().cmp(&right.as_integer()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Value {
        Value::Decimal(s.parse().unwrap())
    }

    #[test]
    fn test_divide_by_zero_both_modes() {
        for precision in [Precision::Exact, Precision::Float] {
            for op in [BinOp::Divide, BinOp::Modulo] {
                let err = apply_binop(op, &Value::from(5), &Value::from(0), precision).unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::DivideByZero);
            }
        }
    }

    #[test]
    fn test_decimal_power() {
        let v = apply_binop(BinOp::Power, &dec("4"), &dec("5"), Precision::Exact).unwrap();
        assert_eq!(v, dec("1024"));
        let v = apply_binop(BinOp::Power, &dec("2"), &dec("-1"), Precision::Exact).unwrap();
        assert!(v.equal_to(&dec("0.5")));
    }

    #[test]
    fn test_negative_base_fractional_exponent() {
        for base in ["-8", "-2"] {
            let v = apply_binop(BinOp::Power, &dec(base), &dec("0.5"), Precision::Exact).unwrap();
            assert!(matches!(v, Value::Float(f) if f.is_nan()));
        }
        let v = apply_binop(BinOp::Power, &dec("-2"), &dec("3"), Precision::Exact).unwrap();
        assert_eq!(v, dec("-8"));
    }

    #[test]
    fn test_string_concatenation() {
        let v = apply_binop(BinOp::Add, &Value::from("a"), &dec("1"), Precision::Exact).unwrap();
        assert_eq!(v, Value::from("a1"));
        let v = apply_binop(BinOp::Add, &Value::from(1.0), &Value::from("a"), Precision::Float).unwrap();
        assert_eq!(v, Value::from("1a"));
    }

    #[test]
    fn test_arithmetic_needs_numbers() {
        let err = apply_binop(BinOp::Multiply, &Value::from("a"), &dec("2"), Precision::Exact).unwrap_err();
        assert_eq!(err.code(), -526);
    }

    #[test]
    fn test_float_mode_integer_comparison() {
        let v = apply_binop(BinOp::LessThan, &Value::from(2), &Value::from(10), Precision::Float).unwrap();
        assert_eq!(v, Value::Bool(true));
    }
}
