//! Numeric functions: unary, rounding and binary.

use super::functions::REGISTRY;
use super::type_check::{assert_integer, assert_number};
use crate::ast::{BinaryNumericOp, RoundingOp, UnaryNumericOp};
use crate::error::{EvalError, EvalResult};
use crate::model::numeric::{floored_mod, round_half_up, truncate};
use crate::model::{ResolvableExpression, Span, Value, ValueType};

pub(super) fn unary(
    op: UnaryNumericOp,
    operand: ResolvableExpression,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    if op == UnaryNumericOp::Ceil {
        return REGISTRY.call("ceil", vec![operand], span);
    }
    let operand = assert_number(operand)?;
    let result_type = match op {
        UnaryNumericOp::Floor => ValueType::Int64,
        _ => ValueType::Float64,
    };
    Ok(ResolvableExpression::new(result_type, span, move |bindings| {
        let value = operand.evaluate(bindings)?;
        if let (UnaryNumericOp::Floor, Value::Int64(i)) = (op, &value) {
            return Ok(Value::Int64(*i));
        }
        let x = match value.as_f64() {
            Some(x) => x,
            None => return Ok(Value::Null),
        };
        Ok(match op {
            UnaryNumericOp::Floor => Value::Int64(to_long(x.floor(), span)?),
            UnaryNumericOp::Ceil => Value::Float64(x.ceil()),
            UnaryNumericOp::Abs => Value::Float64(x.abs()),
            UnaryNumericOp::Exp => Value::Float64(x.exp()),
            UnaryNumericOp::Ln => Value::Float64(x.ln()),
            UnaryNumericOp::Sqrt => {
                if x < 0.0 {
                    return Err(EvalError::invalid_argument(
                        "Sqrt operand has to be 0 or positive",
                        span,
                    ));
                }
                Value::Float64(x.sqrt())
            }
        })
    }))
}

/// Integral double to Long; NaN, infinities and out-of-range values fail.
fn to_long(x: f64, span: Span) -> EvalResult<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(x as i64)
    } else {
        Err(EvalError::invalid_argument(format!("{} is out of the Long range", x), span))
    }
}

/// `round(x, d)` / `trunc(x, d)`; `d` defaults to 0.
pub(super) fn rounding(
    op: RoundingOp,
    operand: ResolvableExpression,
    digits: Option<ResolvableExpression>,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    let operand = assert_number(operand)?;
    let digits = digits.map(assert_integer).transpose()?;
    Ok(ResolvableExpression::new(ValueType::Float64, span, move |bindings| {
        let x = match operand.evaluate(bindings)?.as_f64() {
            Some(x) => x,
            None => return Ok(Value::Null),
        };
        let scale = match &digits {
            Some(d) => match d.evaluate(bindings)? {
                Value::Int64(d) => i32::try_from(d).map_err(|_| {
                    EvalError::invalid_argument(format!("{} digits out of range", d), span)
                })?,
                _ => return Ok(Value::Null),
            },
            None => 0,
        };
        Ok(Value::Float64(match op {
            RoundingOp::Round => round_half_up(x, scale),
            RoundingOp::Trunc => truncate(x, scale),
        }))
    }))
}

pub(super) fn binary(
    op: BinaryNumericOp,
    left: ResolvableExpression,
    right: ResolvableExpression,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    let left = assert_number(left)?;
    let right = assert_number(right)?;
    Ok(ResolvableExpression::new(ValueType::Float64, span, move |bindings| {
        let (a, b) = match (
            left.evaluate(bindings)?.as_f64(),
            right.evaluate(bindings)?.as_f64(),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(Value::Null),
        };
        let result = match op {
            BinaryNumericOp::Mod => floored_mod(a, b),
            BinaryNumericOp::Power => a.powf(b),
            BinaryNumericOp::Log => {
                if a <= 0.0 {
                    return Err(EvalError::invalid_argument(
                        "Log operand has to be positive",
                        span,
                    ));
                }
                if b < 1.0 {
                    return Err(EvalError::invalid_argument(
                        "Log base has to be greater or equal than 1",
                        span,
                    ));
                }
                a.ln() / b.ln()
            }
        };
        Ok(Value::Float64(result))
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, type_of};
    use crate::ast::{BinaryNumericOp, Expr, ExprKind, RoundingOp, UnaryNumericOp};
    use crate::error::EvalError;
    use crate::model::{Value, ValueType};

    fn unary(op: UnaryNumericOp, operand: Expr) -> Expr {
        Expr::new(ExprKind::UnaryNumeric {
            op,
            operand: Box::new(operand),
        })
    }

    fn rounding(op: RoundingOp, operand: Expr, digits: Option<Expr>) -> Expr {
        Expr::new(ExprKind::Rounding {
            op,
            operand: Box::new(operand),
            digits: digits.map(Box::new),
        })
    }

    fn binary(op: BinaryNumericOp, l: Expr, r: Expr) -> Expr {
        Expr::new(ExprKind::BinaryNumeric {
            op,
            left: Box::new(l),
            right: Box::new(r),
        })
    }

    #[test]
    fn test_floor_stays_in_long_range() {
        assert_eq!(eval(&unary(UnaryNumericOp::Floor, Expr::constant(-2.5))).unwrap(), Value::Int64(-3));
        assert_eq!(
            eval(&unary(UnaryNumericOp::Floor, Expr::constant(i64::MAX))).unwrap(),
            Value::Int64(i64::MAX)
        );
        for x in [1e300, -1e300, f64::INFINITY, f64::NAN] {
            let err = eval(&unary(UnaryNumericOp::Floor, Expr::constant(x))).unwrap_err();
            assert!(matches!(err, EvalError::InvalidArgument { .. }), "{}", x);
        }
    }

    #[test]
    fn test_unary_functions() {
        assert_eq!(eval(&unary(UnaryNumericOp::Ceil, Expr::constant(3.2))).unwrap(), Value::Float64(4.0));
        assert_eq!(eval(&unary(UnaryNumericOp::Floor, Expr::constant(-3.2))).unwrap(), Value::Int64(-4));
        assert_eq!(type_of(&unary(UnaryNumericOp::Floor, Expr::constant(3i64))).unwrap(), ValueType::Int64);
        assert_eq!(eval(&unary(UnaryNumericOp::Abs, Expr::constant(-2i64))).unwrap(), Value::Float64(2.0));
        assert_eq!(eval(&unary(UnaryNumericOp::Exp, Expr::constant(0i64))).unwrap(), Value::Float64(1.0));
        assert_eq!(eval(&unary(UnaryNumericOp::Ln, Expr::constant(1i64))).unwrap(), Value::Float64(0.0));
        assert_eq!(eval(&unary(UnaryNumericOp::Sqrt, Expr::constant(16i64))).unwrap(), Value::Float64(4.0));
    }

    #[test]
    fn test_sqrt_domain() {
        let err = eval(&unary(UnaryNumericOp::Sqrt, Expr::constant(-1i64))).unwrap_err();
        assert_eq!(err.to_string(), "Sqrt operand has to be 0 or positive");
        assert_eq!(eval(&unary(UnaryNumericOp::Sqrt, Expr::null())).unwrap(), Value::Null);
    }

    #[test]
    fn test_ceil_of_string_not_found() {
        let err = eval(&unary(UnaryNumericOp::Ceil, Expr::constant("a"))).unwrap_err();
        assert_eq!(err.to_string(), "function 'ceil(String)' not found");
    }

    #[test]
    fn test_round_and_trunc() {
        let two = || Some(Expr::constant(2i64));
        assert_eq!(eval(&rounding(RoundingOp::Round, Expr::constant(2.345), two())).unwrap(), Value::Float64(2.35));
        assert_eq!(eval(&rounding(RoundingOp::Trunc, Expr::constant(2.345), two())).unwrap(), Value::Float64(2.34));
        assert_eq!(eval(&rounding(RoundingOp::Round, Expr::constant(7i64), None)).unwrap(), Value::Float64(7.0));
        assert_eq!(eval(&rounding(RoundingOp::Round, Expr::null(), two())).unwrap(), Value::Null);

        let err = eval(&rounding(RoundingOp::Round, Expr::constant(2.5), Some(Expr::constant(1.5)))).unwrap_err();
        assert!(matches!(err, EvalError::InvalidType { .. }));
    }

    #[test]
    fn test_mod() {
        assert_eq!(eval(&binary(BinaryNumericOp::Mod, Expr::constant(5i64), Expr::constant(3i64))).unwrap(), Value::Float64(2.0));
        assert_eq!(eval(&binary(BinaryNumericOp::Mod, Expr::constant(-5i64), Expr::constant(3i64))).unwrap(), Value::Float64(1.0));
        assert_eq!(eval(&binary(BinaryNumericOp::Mod, Expr::constant(5i64), Expr::constant(-3i64))).unwrap(), Value::Float64(-1.0));
        // A zero divisor returns the dividend rather than failing.
        assert_eq!(eval(&binary(BinaryNumericOp::Mod, Expr::constant(5i64), Expr::constant(0i64))).unwrap(), Value::Float64(5.0));
    }

    #[test]
    fn test_power_and_log() {
        assert_eq!(eval(&binary(BinaryNumericOp::Power, Expr::constant(2i64), Expr::constant(10i64))).unwrap(), Value::Float64(1024.0));
        assert_eq!(eval(&binary(BinaryNumericOp::Log, Expr::constant(100i64), Expr::constant(10i64))).unwrap(), Value::Float64(2.0));

        let err = eval(&binary(BinaryNumericOp::Log, Expr::constant(0i64), Expr::constant(2i64))).unwrap_err();
        assert_eq!(err.to_string(), "Log operand has to be positive");
        let err = eval(&binary(BinaryNumericOp::Log, Expr::constant(8i64), Expr::constant(0.5))).unwrap_err();
        assert_eq!(err.to_string(), "Log base has to be greater or equal than 1");
    }
}
