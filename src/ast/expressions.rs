use std::str::FromStr;

use rust_decimal::{Decimal, prelude::FromPrimitive};

use crate::{
    ast::{BinOp, UnaryOp, VariablePath},
    error::Position,
};

/// A numeric literal, kept in both precisions so the evaluator can pick one
/// per execution without re-parsing.
///
/// `decimal` is `None` when the value is out of `Decimal` range; only exact
/// evaluation of such a literal fails.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub text: String,
    pub decimal: Option<Decimal>,
    pub float: f64,
}

impl NumberLiteral {
    /// Parses the text of a number token (optional sign, decimal, hex or
    /// exponent form).
    pub fn parse(text: &str) -> Option<Self> {
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (decimal, float) =
            if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                let n = u128::from_str_radix(hex, 16).ok()?;
                (Decimal::from_u128(n), n as f64)
            } else {
                let digits = if digits.starts_with('.') {
                    format!("0{}", digits)
                } else {
                    digits.to_string()
                };
                let float: f64 = digits.parse().ok()?;
                if !float.is_finite() {
                    return None;
                }
                let exact = if digits.contains(['e', 'E']) {
                    Decimal::from_scientific(&digits).ok()
                } else {
                    Decimal::from_str(&digits).ok()
                };
                (exact.or_else(|| Decimal::from_f64(float)), float)
            };

        Some(if negative {
            NumberLiteral {
                text: text.to_string(),
                decimal: decimal.map(|d| -d),
                float: -float,
            }
        } else {
            NumberLiteral {
                text: text.to_string(),
                decimal,
                float,
            }
        })
    }
}

/// Expression node.
///
/// Every node carries the position of the token it started at, used to
/// anchor evaluation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    ///
    /// # Example
    /// ```text
    /// 42
    /// -9.2
    /// ```
    Number { value: NumberLiteral, pos: Position },

    /// String or character literal
    ///
    /// # Example
    /// ```text
    /// "hello"
    /// 'x'
    /// ```
    String { value: String, pos: Position },

    /// Boolean literal
    Boolean { value: bool, pos: Position },

    /// `nil`
    Nil(Position),

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [1, 2, a.b]
    /// ```
    Array { elements: Vec<Expr>, pos: Position },

    /// Variable path, possibly with subscripts and calls
    ///
    /// # Example
    /// ```text
    /// order.items[0].price
    /// max(a, b)
    /// ```
    Variable(VariablePath),

    /// Prefix operation
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Position,
    },

    /// Binary operation (logical, relational, arithmetic)
    ///
    /// `pos` is the operator's position.
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Position,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr, pos: Position) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            pos,
        }
    }

    /// Source position of the node, for binary nodes that of the left operand.
    pub fn position(&self) -> Position {
        match self {
            Expr::Number { pos, .. }
            | Expr::String { pos, .. }
            | Expr::Boolean { pos, .. }
            | Expr::Nil(pos)
            | Expr::Array { pos, .. }
            | Expr::Unary { pos, .. } => *pos,
            Expr::Variable(path) => path.position(),
            Expr::Binary { left, .. } => left.position(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_literal_forms() {
        let n = NumberLiteral::parse("-9.2").unwrap();
        assert_eq!(n.decimal, Decimal::from_str("-9.2").ok());
        assert_eq!(n.float, -9.2);

        let hex = NumberLiteral::parse("0x1F").unwrap();
        assert_eq!(hex.decimal, Some(Decimal::from(31)));

        let sci = NumberLiteral::parse("1e3").unwrap();
        assert_eq!(sci.decimal, Some(Decimal::from(1000)));
        assert_eq!(sci.float, 1000.0);

        let frac = NumberLiteral::parse(".5").unwrap();
        assert_eq!(frac.float, 0.5);

        assert!(NumberLiteral::parse("0x").is_none());
    }

    #[test]
    fn test_literal_beyond_decimal_range() {
        let big = NumberLiteral::parse("1e100").unwrap();
        assert_eq!(big.decimal, None);
        assert_eq!(big.float, 1e100);

        let wide = NumberLiteral::parse("99999999999999999999999999999999").unwrap();
        assert_eq!(wide.decimal, None);
        assert!(wide.float > 9.9e31);

        assert!(NumberLiteral::parse("1e400").is_none());
    }
}
