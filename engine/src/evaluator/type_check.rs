//! Static operand checks shared by the operator families.
//!
//! Every check accepts the bare `null` literal: its type is decided by the
//! context it appears in.

use crate::error::{EvalError, EvalResult};
use crate::model::{ResolvableExpression, ValueType};

pub(crate) fn assert_number(expr: ResolvableExpression) -> EvalResult<ResolvableExpression> {
    let value_type = expr.value_type();
    if value_type.is_numeric() || value_type.is_null() {
        Ok(expr)
    } else {
        Err(EvalError::invalid_type(value_type, "Number", expr.span()))
    }
}

pub(crate) fn assert_type(
    expr: ResolvableExpression,
    expected: &ValueType,
) -> EvalResult<ResolvableExpression> {
    let value_type = expr.value_type();
    if value_type == expected || value_type.is_null() {
        Ok(expr)
    } else {
        Err(EvalError::invalid_type(value_type, expected, expr.span()))
    }
}

pub(crate) fn assert_boolean(expr: ResolvableExpression) -> EvalResult<ResolvableExpression> {
    assert_type(expr, &ValueType::Boolean)
}

pub(crate) fn assert_string(expr: ResolvableExpression) -> EvalResult<ResolvableExpression> {
    assert_type(expr, &ValueType::String)
}

pub(crate) fn assert_integer(expr: ResolvableExpression) -> EvalResult<ResolvableExpression> {
    assert_type(expr, &ValueType::Int64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Span, Value};

    fn constant(value: Value) -> ResolvableExpression {
        let t = value.value_type();
        ResolvableExpression::constant(value, t, Span::new(2, 5))
    }

    #[test]
    fn test_number_check() {
        assert!(assert_number(constant(Value::Int64(1))).is_ok());
        assert!(assert_number(constant(Value::Null)).is_ok());
        let err = assert_number(constant("a".into())).unwrap_err();
        assert_eq!(err.to_string(), "invalid type String, expected Number");
        assert_eq!(err.span(), Span::new(2, 5));
    }

    #[test]
    fn test_exact_check() {
        let err = assert_integer(constant(Value::Float64(1.0))).unwrap_err();
        assert_eq!(err.to_string(), "invalid type Double, expected Long");
        assert!(assert_boolean(constant(Value::Boolean(true))).is_ok());
    }
}
