//! Aggregation descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::expression::{ResolvableExpression, Span};
use super::types::ValueType;
use crate::error::{EvalError, EvalResult};

/// Aggregate function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Median,
    StddevPop,
    StddevSamp,
    VarPop,
    VarSamp,
}

impl AggregateFunction {
    /// Result type given the operand type.
    pub fn result_type(&self, operand: &ValueType) -> ValueType {
        match self {
            AggregateFunction::Count => ValueType::Int64,
            AggregateFunction::Sum
            | AggregateFunction::Min
            | AggregateFunction::Max
            | AggregateFunction::Median => operand.clone(),
            AggregateFunction::Avg
            | AggregateFunction::StddevPop
            | AggregateFunction::StddevSamp
            | AggregateFunction::VarPop
            | AggregateFunction::VarSamp => ValueType::Float64,
        }
    }

    /// Whether the operand must be numeric.
    pub fn requires_number(&self) -> bool {
        !matches!(self, AggregateFunction::Count)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Median => "median",
            AggregateFunction::StddevPop => "stddev_pop",
            AggregateFunction::StddevSamp => "stddev_samp",
            AggregateFunction::VarPop => "var_pop",
            AggregateFunction::VarSamp => "var_samp",
        };
        write!(f, "{}", name)
    }
}

/// One aggregation over a group: the function and, except for `Count`, the
/// per-row operand it consumes.
#[derive(Debug, Clone)]
pub enum AggregationExpression {
    Sum(ResolvableExpression),
    Avg(ResolvableExpression),
    Count,
    Min(ResolvableExpression),
    Max(ResolvableExpression),
    Median(ResolvableExpression),
    StddevPop(ResolvableExpression),
    StddevSamp(ResolvableExpression),
    VarPop(ResolvableExpression),
    VarSamp(ResolvableExpression),
}

impl AggregationExpression {
    /// Build and type-check an aggregation. A missing operand yields `Count`.
    pub fn new(
        function: AggregateFunction,
        operand: Option<ResolvableExpression>,
        span: Span,
    ) -> EvalResult<Self> {
        let operand = match (function, operand) {
            (AggregateFunction::Count, _) | (_, None) => return Ok(AggregationExpression::Count),
            (_, Some(operand)) => operand,
        };
        let operand_type = operand.value_type();
        if function.requires_number() && !(operand_type.is_numeric() || operand_type.is_null()) {
            return Err(EvalError::invalid_type(operand_type, "Number", span));
        }
        if !operand_type.is_scalar() {
            return Err(EvalError::invalid_type(operand_type, "a scalar", span));
        }
        Ok(match function {
            AggregateFunction::Sum => AggregationExpression::Sum(operand),
            AggregateFunction::Avg => AggregationExpression::Avg(operand),
            AggregateFunction::Min => AggregationExpression::Min(operand),
            AggregateFunction::Max => AggregationExpression::Max(operand),
            AggregateFunction::Median => AggregationExpression::Median(operand),
            AggregateFunction::StddevPop => AggregationExpression::StddevPop(operand),
            AggregateFunction::StddevSamp => AggregationExpression::StddevSamp(operand),
            AggregateFunction::VarPop => AggregationExpression::VarPop(operand),
            AggregateFunction::VarSamp => AggregationExpression::VarSamp(operand),
            AggregateFunction::Count => AggregationExpression::Count,
        })
    }

    pub fn function(&self) -> AggregateFunction {
        match self {
            AggregationExpression::Sum(_) => AggregateFunction::Sum,
            AggregationExpression::Avg(_) => AggregateFunction::Avg,
            AggregationExpression::Count => AggregateFunction::Count,
            AggregationExpression::Min(_) => AggregateFunction::Min,
            AggregationExpression::Max(_) => AggregateFunction::Max,
            AggregationExpression::Median(_) => AggregateFunction::Median,
            AggregationExpression::StddevPop(_) => AggregateFunction::StddevPop,
            AggregationExpression::StddevSamp(_) => AggregateFunction::StddevSamp,
            AggregationExpression::VarPop(_) => AggregateFunction::VarPop,
            AggregationExpression::VarSamp(_) => AggregateFunction::VarSamp,
        }
    }

    pub fn operand(&self) -> Option<&ResolvableExpression> {
        match self {
            AggregationExpression::Count => None,
            AggregationExpression::Sum(e)
            | AggregationExpression::Avg(e)
            | AggregationExpression::Min(e)
            | AggregationExpression::Max(e)
            | AggregationExpression::Median(e)
            | AggregationExpression::StddevPop(e)
            | AggregationExpression::StddevSamp(e)
            | AggregationExpression::VarPop(e)
            | AggregationExpression::VarSamp(e) => Some(e),
        }
    }

    pub fn value_type(&self) -> ValueType {
        let operand = self
            .operand()
            .map(|e| e.value_type().clone())
            .unwrap_or(ValueType::Int64);
        self.function().result_type(&operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(t: ValueType) -> ResolvableExpression {
        ResolvableExpression::column("c", t, Span::default())
    }

    #[test]
    fn test_result_types() {
        let sum = AggregationExpression::new(AggregateFunction::Sum, Some(column(ValueType::Int64)), Span::default()).unwrap();
        assert_eq!(sum.value_type(), ValueType::Int64);
        let avg = AggregationExpression::new(AggregateFunction::Avg, Some(column(ValueType::Int64)), Span::default()).unwrap();
        assert_eq!(avg.value_type(), ValueType::Float64);
        let median = AggregationExpression::new(AggregateFunction::Median, Some(column(ValueType::Int64)), Span::default()).unwrap();
        assert_eq!(median.value_type(), ValueType::Int64);
    }

    #[test]
    fn test_missing_operand_is_count() {
        let agg = AggregationExpression::new(AggregateFunction::Sum, None, Span::default()).unwrap();
        assert!(matches!(agg, AggregationExpression::Count));
        assert_eq!(agg.value_type(), ValueType::Int64);
    }

    #[test]
    fn test_sum_of_strings_rejected() {
        let err = AggregationExpression::new(AggregateFunction::Sum, Some(column(ValueType::String)), Span::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid type String, expected Number");
        for function in [AggregateFunction::Min, AggregateFunction::Max] {
            assert!(AggregationExpression::new(function, Some(column(ValueType::String)), Span::default()).is_err());
        }
        assert!(AggregationExpression::new(AggregateFunction::Max, Some(column(ValueType::Int64)), Span::default()).is_ok());
    }
}
