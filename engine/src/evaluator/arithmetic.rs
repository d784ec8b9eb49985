//! Arithmetic, concatenation and unary operators.

use super::type_check::{assert_boolean, assert_number, assert_string};
use crate::ast::{ArithmeticOp, UnaryOp};
use crate::error::{EvalError, EvalResult};
use crate::model::types::kleene_not;
use crate::model::{ResolvableExpression, Span, Value, ValueType};

/// Result type of `left op right`. Division always widens.
fn promote(op: ArithmeticOp, left: &ValueType, right: &ValueType) -> ValueType {
    let integral = |t: &ValueType| matches!(t, ValueType::Int64 | ValueType::Null);
    if op != ArithmeticOp::Div && integral(left) && integral(right) {
        ValueType::Int64
    } else {
        ValueType::Float64
    }
}

pub(super) fn arithmetic(
    op: ArithmeticOp,
    left: ResolvableExpression,
    right: ResolvableExpression,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    let (left, right) = match op {
        ArithmeticOp::Plus | ArithmeticOp::Minus => (assert_number(left)?, assert_number(right)?),
        ArithmeticOp::Mul | ArithmeticOp::Div => {
            let numeric = |e: &ResolvableExpression| {
                e.value_type().is_numeric() || e.value_type().is_null()
            };
            if !numeric(&left) || !numeric(&right) {
                return Err(EvalError::internal(
                    format!(
                        "unsupported operand types for {}: {} and {}",
                        op,
                        left.value_type(),
                        right.value_type()
                    ),
                    span,
                ));
            }
            (left, right)
        }
    };
    let result_type = promote(op, left.value_type(), right.value_type());

    Ok(ResolvableExpression::new(result_type.clone(), span, move |bindings| {
        let l = left.evaluate(bindings)?;
        let r = right.evaluate(bindings)?;
        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }
        match (&result_type, &l, &r) {
            (ValueType::Int64, Value::Int64(a), Value::Int64(b)) => integer_op(op, *a, *b, span),
            _ => match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float64(float_op(op, a, b))),
                _ => Err(EvalError::internal(
                    format!("non-numeric operands {} and {}", l, r),
                    span,
                )),
            },
        }
    }))
}

fn integer_op(op: ArithmeticOp, a: i64, b: i64, span: Span) -> EvalResult<Value> {
    let result = match op {
        ArithmeticOp::Plus => a.checked_add(b),
        ArithmeticOp::Minus => a.checked_sub(b),
        ArithmeticOp::Mul => a.checked_mul(b),
        ArithmeticOp::Div => return Ok(Value::Float64(a as f64 / b as f64)),
    };
    result
        .map(Value::Int64)
        .ok_or_else(|| EvalError::invalid_argument(format!("integer overflow in {} {} {}", a, op, b), span))
}

fn float_op(op: ArithmeticOp, a: f64, b: f64) -> f64 {
    match op {
        ArithmeticOp::Plus => a + b,
        ArithmeticOp::Minus => a - b,
        ArithmeticOp::Mul => a * b,
        ArithmeticOp::Div => a / b,
    }
}

/// `left || right`; both sides must be strings.
pub(super) fn concat(
    left: ResolvableExpression,
    right: ResolvableExpression,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    let left = assert_string(left)?;
    let right = assert_string(right)?;
    Ok(ResolvableExpression::new(ValueType::String, span, move |bindings| {
        match (left.evaluate(bindings)?, right.evaluate(bindings)?) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            _ => Ok(Value::Null),
        }
    }))
}

pub(super) fn unary(
    op: UnaryOp,
    operand: ResolvableExpression,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    match op {
        UnaryOp::Plus => Ok(assert_number(operand)?),
        UnaryOp::Minus => {
            let operand = assert_number(operand)?;
            let result_type = match operand.value_type() {
                ValueType::Float64 => ValueType::Float64,
                _ => ValueType::Int64,
            };
            Ok(ResolvableExpression::new(result_type, span, move |bindings| {
                match operand.evaluate(bindings)? {
                    Value::Int64(i) => i.checked_neg().map(Value::Int64).ok_or_else(|| {
                        EvalError::invalid_argument(format!("integer overflow in -{}", i), span)
                    }),
                    Value::Float64(f) => Ok(Value::Float64(-f)),
                    _ => Ok(Value::Null),
                }
            }))
        }
        UnaryOp::Not => {
            let operand = assert_boolean(operand)?;
            Ok(ResolvableExpression::new(ValueType::Boolean, span, move |bindings| {
                Ok(kleene_not(operand.evaluate(bindings)?.as_bool()).into())
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, type_of};
    use crate::ast::{ArithmeticOp, Expr, ExprKind, UnaryOp};
    use crate::error::EvalError;
    use crate::model::{Value, ValueType};

    fn op(op: ArithmeticOp, l: Expr, r: Expr) -> Expr {
        Expr::arithmetic(op, l, r)
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        let expr = op(ArithmeticOp::Mul, Expr::constant(6i64), Expr::constant(3i64));
        assert_eq!(type_of(&expr).unwrap(), ValueType::Int64);
        assert_eq!(eval(&expr).unwrap(), Value::Int64(18));

        let expr = op(ArithmeticOp::Minus, Expr::constant(2i64), Expr::constant(3i64));
        assert_eq!(eval(&expr).unwrap(), Value::Int64(-1));
    }

    #[test]
    fn test_division_always_widens() {
        let expr = op(ArithmeticOp::Div, Expr::constant(6i64), Expr::constant(3i64));
        assert_eq!(type_of(&expr).unwrap(), ValueType::Float64);
        assert_eq!(eval(&expr).unwrap(), Value::Float64(2.0));
    }

    #[test]
    fn test_mixed_arithmetic_widens() {
        let expr = op(ArithmeticOp::Plus, Expr::constant(1i64), Expr::constant(0.5));
        assert_eq!(eval(&expr).unwrap(), Value::Float64(1.5));
    }

    #[test]
    fn test_null_propagates() {
        let expr = op(ArithmeticOp::Plus, Expr::constant(1i64), Expr::null());
        assert_eq!(type_of(&expr).unwrap(), ValueType::Int64);
        assert_eq!(eval(&expr).unwrap(), Value::Null);
    }

    #[test]
    fn test_plus_rejects_strings() {
        let expr = op(ArithmeticOp::Plus, Expr::constant(1i64), Expr::constant("a"));
        let err = eval(&expr).unwrap_err();
        assert_eq!(err.to_string(), "invalid type String, expected Number");
    }

    #[test]
    fn test_multiply_strings_is_internal() {
        let expr = op(ArithmeticOp::Mul, Expr::constant("a"), Expr::constant(2i64));
        assert!(eval(&expr).unwrap_err().is_internal());
    }

    #[test]
    fn test_overflow_is_reported() {
        let expr = op(ArithmeticOp::Plus, Expr::constant(i64::MAX), Expr::constant(1i64));
        assert!(matches!(eval(&expr), Err(EvalError::InvalidArgument { .. })));
    }

    #[test]
    fn test_concat() {
        let expr = Expr::new(ExprKind::Concat {
            left: Box::new(Expr::constant("ab")),
            right: Box::new(Expr::constant("cd")),
        });
        assert_eq!(eval(&expr).unwrap(), Value::from("abcd"));

        let expr = Expr::new(ExprKind::Concat {
            left: Box::new(Expr::constant("ab")),
            right: Box::new(Expr::constant(1i64)),
        });
        assert_eq!(
            eval(&expr).unwrap_err().to_string(),
            "invalid type Long, expected String"
        );
    }

    #[test]
    fn test_unary() {
        let neg = Expr::new(ExprKind::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(Expr::constant(1.5)),
        });
        assert_eq!(eval(&neg).unwrap(), Value::Float64(-1.5));

        let not = Expr::new(ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(Expr::null()),
        });
        assert_eq!(eval(&not).unwrap(), Value::Null);
    }
}
