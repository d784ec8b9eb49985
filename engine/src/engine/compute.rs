//! Aggregate accumulators shared by grouping and window functions.

use crate::error::{EvalError, EvalResult};
use crate::model::{AggregateFunction, Span, Value, ValueType};

/// Aggregate `values` (nulls skipped) of operand type `operand_type`.
///
/// Empty inputs give null, except `Count` which gives 0. An integer sum
/// that leaves the Long range is an error.
pub(crate) fn aggregate(
    function: AggregateFunction,
    values: &[Value],
    operand_type: &ValueType,
    span: Span,
) -> EvalResult<Value> {
    let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    if function == AggregateFunction::Count {
        return Ok(Value::Int64(present.len() as i64));
    }
    if present.is_empty() {
        return Ok(Value::Null);
    }
    if function == AggregateFunction::Sum && operand_type == &ValueType::Int64 {
        return present
            .iter()
            .filter_map(|v| v.as_i64())
            .try_fold(0i64, |total, x| total.checked_add(x))
            .map(Value::Int64)
            .ok_or_else(|| EvalError::invalid_argument("integer overflow in sum", span));
    }
    Ok(match function {
        AggregateFunction::Count => Value::Int64(present.len() as i64),
        AggregateFunction::Sum => Value::Float64(numbers(&present).iter().sum()),
        AggregateFunction::Avg => {
            let xs = numbers(&present);
            Value::Float64(xs.iter().sum::<f64>() / xs.len() as f64)
        }
        AggregateFunction::Min => extreme(&present, std::cmp::Ordering::Less),
        AggregateFunction::Max => extreme(&present, std::cmp::Ordering::Greater),
        AggregateFunction::Median => {
            let mut sorted = present.clone();
            sorted.sort_by(|a, b| a.sort_cmp(b));
            // Lower middle element: stays a member of the input.
            sorted[(sorted.len() - 1) / 2].clone()
        }
        AggregateFunction::VarPop => variance(&numbers(&present), 0).map_or(Value::Null, Value::Float64),
        AggregateFunction::VarSamp => variance(&numbers(&present), 1).map_or(Value::Null, Value::Float64),
        AggregateFunction::StddevPop => variance(&numbers(&present), 0)
            .map_or(Value::Null, |v| Value::Float64(v.sqrt())),
        AggregateFunction::StddevSamp => variance(&numbers(&present), 1)
            .map_or(Value::Null, |v| Value::Float64(v.sqrt())),
    })
}

fn numbers(values: &[&Value]) -> Vec<f64> {
    values.iter().filter_map(|v| v.as_f64()).collect()
}

fn extreme(values: &[&Value], wanted: std::cmp::Ordering) -> Value {
    let mut best = values[0];
    for value in &values[1..] {
        if value.sort_cmp(best) == wanted {
            best = *value;
        }
    }
    best.clone()
}

/// Sum of squared deviations over `n - ddof`; `None` when that is not positive.
fn variance(xs: &[f64], ddof: usize) -> Option<f64> {
    if xs.len() <= ddof {
        return None;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    let squares: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
    Some(squares / (xs.len() - ddof) as f64)
}
