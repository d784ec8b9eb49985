//! Explicit type conversion.

use crate::error::{EvalError, EvalResult};
use crate::model::{ResolvableExpression, Span, Value, ValueType};

/// `cast(operand, target)`.
///
/// Allowed: null to any scalar type, identity, Long ↔ Double, any scalar to
/// String, String to Long/Double/Boolean. Doubles cast to Long must be whole.
pub(super) fn cast(
    operand: ResolvableExpression,
    target: &ValueType,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    if !target.is_scalar() || target.is_null() {
        return Err(EvalError::invalid_argument(
            format!("cannot cast to {}", target),
            span,
        ));
    }
    let source = operand.value_type().clone();
    if source.is_null() || &source == target {
        return Ok(operand.retyped(target.clone()));
    }
    let allowed = matches!(
        (&source, target),
        (ValueType::Int64, ValueType::Float64)
            | (ValueType::Float64, ValueType::Int64)
            | (_, ValueType::String)
            | (ValueType::String, ValueType::Int64 | ValueType::Float64 | ValueType::Boolean)
    );
    if !allowed || !source.is_scalar() {
        return Err(EvalError::invalid_type(&source, target, operand.span()));
    }
    let target = target.clone();
    Ok(ResolvableExpression::new(target.clone(), span, move |bindings| {
        let value = operand.evaluate(bindings)?;
        convert(value, &target).map_err(|message| EvalError::invalid_argument(message, span))
    }))
}

fn convert(value: Value, target: &ValueType) -> Result<Value, String> {
    Ok(match (value, target) {
        (Value::Null, _) => Value::Null,
        (Value::Int64(i), ValueType::Float64) => Value::Float64(i as f64),
        (Value::Float64(f), ValueType::Int64) => {
            if f.fract() != 0.0 || !f.is_finite() {
                return Err(format!("{} is not a whole number", f));
            }
            Value::Int64(f as i64)
        }
        (Value::String(s), ValueType::String) => Value::String(s),
        (Value::Float64(f), ValueType::String) => Value::String(f.to_string()),
        (other, ValueType::String) => Value::String(other.to_string()),
        (Value::String(s), ValueType::Int64) => Value::Int64(
            s.trim()
                .parse()
                .map_err(|_| format!("cannot cast \"{}\" to Long", s))?,
        ),
        (Value::String(s), ValueType::Float64) => Value::Float64(
            s.trim()
                .parse()
                .map_err(|_| format!("cannot cast \"{}\" to Double", s))?,
        ),
        (Value::String(s), ValueType::Boolean) => match s.trim().to_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => return Err(format!("cannot cast \"{}\" to Boolean", s)),
        },
        (other, target) => return Err(format!("cannot cast {} to {}", other, target)),
    })
}
