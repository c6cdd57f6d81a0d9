//! Default constants and functions installed into every template.

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

use crate::{
    context::{EvalContext, Precision},
    error::{Error, ErrorKind},
    function::{Args, Function, ParamType, Signature},
    value::Value,
};

/// Installs `e`, `pi` and the default functions.
pub fn install(ctx: &mut EvalContext) -> Result<(), Error> {
    ctx.add_constant("e", Decimal::E)?;
    ctx.add_constant("pi", Decimal::PI)?;
    for function in functions() {
        ctx.add_function(function)?;
    }
    Ok(())
}

/// All default functions.
pub fn functions() -> Vec<Function> {
    let mut all = vec![
        aggregate("sum", sum),
        aggregate("avg", avg),
        aggregate("max", |_, values| extreme(values, std::cmp::Ordering::Greater)),
        aggregate("min", |_, values| extreme(values, std::cmp::Ordering::Less)),
        Function::new("round", Signature::new([ParamType::Number, ParamType::Number]), round),
        Function::new("floor", Signature::new([ParamType::Number]), |args| {
            exact_or_float(&args, Decimal::floor, f64::floor)
        }),
        Function::new("ceil", Signature::new([ParamType::Number]), |args| {
            exact_or_float(&args, Decimal::ceil, f64::ceil)
        }),
        Function::new("abs", Signature::new([ParamType::Number]), |args| {
            exact_or_float(&args, Decimal::abs, f64::abs)
        }),
        Function::new("sqrt", Signature::new([ParamType::Number]), |args| match args.precision {
            Precision::Exact => args
                .get(0)
                .as_decimal()
                .sqrt()
                .map(Value::Decimal)
                .unwrap_or_else(|| Value::Float(f64::NAN)),
            Precision::Float => Value::Float(args.get(0).as_float().sqrt()),
        }),
        Function::new("atan2", Signature::new([ParamType::Number, ParamType::Number]), |args| {
            args.number(args.get(0).as_float().atan2(args.get(1).as_float()))
        }),
        Function::new("len", Signature::any(1), |args| {
            Value::Integer(args.get(0).len() as i64)
        }),
        Function::fallible("matches", Signature::new([ParamType::String, ParamType::String]), matches),
        Function::new("now", Signature::default(), |_| Value::Time(Utc::now())),
        Function::fallible("date", Signature::new([ParamType::String]), date),
    ];

    let unary: [(&str, fn(f64) -> f64); 12] = [
        ("cbrt", f64::cbrt),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("asinh", f64::asinh),
        ("exp", f64::exp),
    ];
    for (name, f) in unary {
        all.push(Function::new(name, Signature::new([ParamType::Number]), move |args| {
            args.number(f(args.get(0).as_float()))
        }));
    }
    all
}

fn exact_or_float(args: &Args<'_>, exact: fn(&Decimal) -> Decimal, float: fn(f64) -> f64) -> Value {
    match args.precision {
        Precision::Exact => Value::Decimal(exact(&args.get(0).as_decimal())),
        Precision::Float => Value::Float(float(args.get(0).as_float())),
    }
}

type Aggregate = fn(Precision, &[Value]) -> Value;

/// A variadic numeric function. Array arguments are flattened; any other
/// non-number fails on that argument.
fn aggregate(name: &'static str, f: Aggregate) -> Function {
    Function::fallible(name, Signature::default().variadic(ParamType::Any), move |args| {
        let mut values = Vec::with_capacity(args.len());
        for (index, arg) in args.values.iter().enumerate() {
            flatten(name, arg, index, &mut values)?;
        }
        Ok(f(args.precision, &values))
    })
}

fn flatten(name: &str, value: &Value, index: usize, out: &mut Vec<Value>) -> Result<(), Error> {
    match value.clone().follow() {
        Value::Array(items) => {
            for item in &items {
                flatten(name, item, index, out)?;
            }
            Ok(())
        }
        v if v.is_number() => {
            out.push(v);
            Ok(())
        }
        v => Err(Error::from(ErrorKind::ArgumentNotNumber {
            function: name.to_string(),
            value: v.as_string(),
        })
        .at_argument(index)),
    }
}

fn sum(precision: Precision, values: &[Value]) -> Value {
    match precision {
        Precision::Exact => Value::Decimal(values.iter().map(Value::as_decimal).sum()),
        Precision::Float => Value::Float(values.iter().map(Value::as_float).sum()),
    }
}

fn avg(precision: Precision, values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Nil;
    }
    match (precision, sum(precision, values)) {
        (Precision::Exact, total) => total
            .as_decimal()
            .checked_div(Decimal::from(values.len()))
            .map(Value::Decimal)
            .unwrap_or(Value::Nil),
        (_, total) => Value::Float(total.as_float() / values.len() as f64),
    }
}

fn extreme(values: &[Value], wanted: std::cmp::Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for v in values {
        let replace = match best {
            None => true,
            Some(b) => v.as_decimal().cmp(&b.as_decimal()) == wanted,
        };
        if replace {
            best = Some(v);
        }
    }
    best.cloned().unwrap_or(Value::Nil)
}

/// `round(x, places)`: half away from zero. Negative places round to tens,
/// hundreds and so on.
fn round(args: Args<'_>) -> Value {
    let places = args.get(1).as_integer();
    match args.precision {
        Precision::Exact => {
            let x = args.get(0).as_decimal();
            let places = places.clamp(-28, 28);
            if places >= 0 {
                let dp = u32::try_from(places).unwrap_or_default();
                return Value::Decimal(x.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero));
            }
            let factor = Decimal::TEN.checked_powi(-places);
            match factor.and_then(|f| x.checked_div(f)) {
                Some(scaled) => {
                    let rounded = scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
                    factor
                        .and_then(|f| rounded.checked_mul(f))
                        .map(Value::Decimal)
                        .unwrap_or(Value::Decimal(Decimal::ZERO))
                }
                None => Value::Decimal(Decimal::ZERO),
            }
        }
        Precision::Float => {
            let factor = 10f64.powi(places.clamp(-308, 308) as i32);
            Value::Float((args.get(0).as_float() * factor).round() / factor)
        }
    }
}

fn matches(args: Args<'_>) -> Result<Value, Error> {
    let pattern = args.get(1).as_string();
    let re = Regex::new(&pattern).map_err(|e| {
        Error::from(ErrorKind::ArgumentInvalid {
            function: "matches".to_string(),
            index: 1,
        })
        .with_detail(e.to_string())
        .at_argument(1)
    })?;
    Ok(Value::Bool(re.is_match(&args.get(0).as_string())))
}

fn date(args: Args<'_>) -> Result<Value, Error> {
    let text = args.get(0).as_string();
    DateTime::parse_from_rfc3339(&text)
        .map(|t| Value::Time(t.with_timezone(&Utc)))
        .map_err(|e| {
            Error::from(ErrorKind::ArgumentInvalid {
                function: "date".to_string(),
                index: 0,
            })
            .with_detail(e.to_string())
            .at_argument(0)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, precision: Precision, values: Vec<Value>) -> Result<Value, Error> {
        let mut ctx = EvalContext::new();
        ctx.set_precision(precision);
        let function = functions()
            .into_iter()
            .find(|f| f.name() == name)
            .unwrap();
        function.call(&ctx, values)
    }

    fn dec(s: &str) -> Value {
        Value::Decimal(s.parse().unwrap())
    }

    #[test]
    fn test_aggregates_flatten_arrays() {
        let v = call(
            "sum",
            Precision::Exact,
            vec![dec("1.5"), Value::Array(vec![Value::from(2), dec("3")])],
        )
        .unwrap();
        assert_eq!(v, dec("6.5"));

        let v = call("max", Precision::Exact, vec![Value::from(3), dec("7.25"), Value::from(-1)]).unwrap();
        assert_eq!(v, dec("7.25"));

        let v = call("avg", Precision::Float, vec![Value::from(1.0), Value::from(2.0)]).unwrap();
        assert_eq!(v, Value::Float(1.5));
    }

    #[test]
    fn test_aggregate_rejects_non_number() {
        let err = call("min", Precision::Exact, vec![Value::from(1), Value::from("x")]).unwrap_err();
        assert_eq!(err.code(), -502);
        assert_eq!(err.argument(), Some(1));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(call("round", Precision::Exact, vec![dec("2.345"), dec("2")]).unwrap(), dec("2.35"));
        assert_eq!(call("round", Precision::Exact, vec![dec("-2.5"), dec("0")]).unwrap(), dec("-3"));
        assert!(
            call("round", Precision::Exact, vec![dec("1250"), dec("-2")])
                .unwrap()
                .equal_to(&dec("1300"))
        );
    }

    #[test]
    fn test_matches_invalid_pattern() {
        let err = call("matches", Precision::Exact, vec![Value::from("a"), Value::from("(")]).unwrap_err();
        assert_eq!(err.code(), -506);
    }
}
