//! Window-function items of a `calc` clause.

use crate::ast::{CalcItem, ExprKind};
use crate::engine::ProcessingEngine;
use crate::error::{EvalError, EvalResult};
use crate::model::{
    AnalyticKind, AnalyticSpec, DataStructure, DatasetExpression, Span, Window, WindowFrame,
};

/// Compute one analytic calc item on `dataset` into `target`.
pub(super) fn apply(
    engine: &dyn ProcessingEngine,
    dataset: &DatasetExpression,
    label: &str,
    item: &CalcItem,
    target: &str,
) -> EvalResult<DatasetExpression> {
    let span = item.expr.span;
    let spec = describe(&item.expr.kind, span)?;
    check(&spec, dataset.structure(), label, span)?;

    let source = spec.source.as_deref().unwrap_or(target);
    let window = &spec.window;
    match spec.function.kind() {
        AnalyticKind::Simple => {
            engine.execute_simple_analytic(dataset, target, spec.function, source, window)
        }
        AnalyticKind::Offset => engine.execute_lead_or_lag(
            dataset,
            target,
            spec.function,
            source,
            spec.offset,
            &window.partition_by,
            &window.order_by,
        ),
        AnalyticKind::Rank => {
            engine.execute_rank(dataset, target, &window.partition_by, &window.order_by)
        }
        AnalyticKind::RatioToReport => {
            engine.execute_ratio_to_report(dataset, target, source, &window.partition_by)
        }
    }
}

fn describe(kind: &ExprKind, span: Span) -> EvalResult<AnalyticSpec> {
    let ExprKind::Analytic {
        function,
        operand,
        offset,
        partition_by,
        order_by,
        frame,
    } = kind
    else {
        return Err(EvalError::internal("not an analytic expression", span));
    };
    let window = Window {
        partition_by: partition_by.clone(),
        order_by: order_by
            .iter()
            .map(|item| (item.column.clone(), item.order))
            .collect(),
        frame: *frame,
    };
    let invalid = |message: String| -> EvalResult<AnalyticSpec> {
        Err(EvalError::invalid_argument(message, span))
    };

    match function.kind() {
        AnalyticKind::Rank => {
            if operand.is_some() {
                return invalid("rank takes no operand".to_string());
            }
            if window.order_by.is_empty() {
                return invalid("rank requires an order by".to_string());
            }
        }
        AnalyticKind::Offset => {
            if window.frame.is_some() {
                return invalid(format!("{} does not accept a window frame", function));
            }
            if window.order_by.is_empty() {
                return invalid(format!("{} requires an order by", function));
            }
        }
        AnalyticKind::RatioToReport => {
            if !window.order_by.is_empty() || window.frame.is_some() {
                return invalid("ratio_to_report only accepts a partition".to_string());
            }
        }
        AnalyticKind::Simple => {
            if window.frame.is_some() && window.order_by.is_empty() {
                return invalid(format!("{} with a window frame requires an order by", function));
            }
        }
    }
    if function.kind() != AnalyticKind::Rank && operand.is_none() {
        return invalid(format!("{} requires an operand", function));
    }
    let offset = offset.unwrap_or(1);
    if offset < 0 {
        return invalid(format!("{} offset must not be negative", function));
    }

    Ok(AnalyticSpec {
        function: *function,
        source: operand.clone(),
        offset,
        window,
    })
}

/// Columns exist and have the types the function needs.
fn check(spec: &AnalyticSpec, structure: &DataStructure, label: &str, span: Span) -> EvalResult<()> {
    for column in spec.window.partition_by.iter().chain(spec.window.order_by.keys()) {
        structure.require(column, label, span)?;
    }
    if let Some(source) = &spec.source {
        let source_type = &structure.require(source, label, span)?.value_type;
        let needs_number = match spec.function.kind() {
            AnalyticKind::RatioToReport => true,
            AnalyticKind::Simple => spec
                .function
                .aggregate()
                .map(|agg| agg.requires_number())
                .unwrap_or(false),
            _ => false,
        };
        if needs_number && !source_type.is_numeric() {
            return Err(EvalError::invalid_type(source_type, "Number", span));
        }
    }
    if let Some(WindowFrame::Range { .. }) = spec.window.frame {
        let mut order = spec.window.order_by.keys();
        let numeric = match (order.next(), order.next()) {
            (Some(column), None) => structure
                .get(column)
                .map(|c| c.value_type.is_numeric())
                .unwrap_or(false),
            _ => false,
        };
        if !numeric {
            return Err(EvalError::invalid_argument(
                "a range frame requires exactly one numeric order by column",
                span,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, OrderItem};
    use crate::engine::{InMemoryEngine, RecordingEngine};
    use crate::fixtures;
    use crate::model::{AnalyticFunction, FrameBound, Order, Value, ValueType};
    use std::sync::Arc;

    fn analytic(
        function: AnalyticFunction,
        operand: Option<&str>,
        order_by: &[(&str, Order)],
        frame: Option<WindowFrame>,
    ) -> CalcItem {
        CalcItem {
            name: "target".to_string(),
            role: None,
            expr: Expr::new(ExprKind::Analytic {
                function,
                operand: operand.map(str::to_string),
                offset: None,
                partition_by: vec![],
                order_by: order_by
                    .iter()
                    .map(|(c, o)| OrderItem {
                        column: c.to_string(),
                        order: *o,
                    })
                    .collect(),
                frame,
            }),
            source: None,
        }
    }

    fn run(item: &CalcItem) -> EvalResult<DatasetExpression> {
        let engine = InMemoryEngine::new();
        let ds = DatasetExpression::of(Arc::new(fixtures::ds1()), Span::default());
        apply(&engine, &ds, "ds1", item, "target")
    }

    #[test]
    fn test_lag_defaults_to_offset_one() {
        let engine = RecordingEngine::new(InMemoryEngine::new());
        let ds = DatasetExpression::of(Arc::new(fixtures::ds1()), Span::default());
        let item = analytic(AnalyticFunction::Lag, Some("long1"), &[("long1", Order::Asc)], None);
        let out = apply(&engine, &ds, "ds1", &item, "target").unwrap().resolve().unwrap();
        assert_eq!(engine.calls(), vec!["analytic target := lag(long1, 1)".to_string()]);
        // Ascending 10, 20, 30, 100: Toto (30) follows Nico (20).
        assert_eq!(out.get(0, "target"), Some(&Value::Int64(20)));
    }

    #[test]
    fn test_lead_rejects_frame() {
        let frame = WindowFrame::Rows {
            lower: FrameBound::Preceding(1),
            upper: FrameBound::CurrentRow,
        };
        let item = analytic(AnalyticFunction::Lead, Some("long1"), &[("long1", Order::Asc)], Some(frame));
        assert!(matches!(run(&item), Err(EvalError::InvalidArgument { .. })));
    }

    #[test]
    fn test_rank_needs_order() {
        let item = analytic(AnalyticFunction::Rank, None, &[], None);
        assert!(matches!(run(&item), Err(EvalError::InvalidArgument { .. })));

        let item = analytic(AnalyticFunction::Rank, None, &[("long1", Order::Desc)], None);
        let out = run(&item).unwrap();
        assert_eq!(out.structure().get("target").unwrap().value_type, ValueType::Int64);
    }

    #[test]
    fn test_sum_of_string_rejected() {
        let item = analytic(AnalyticFunction::Sum, Some("string1"), &[], None);
        assert_eq!(
            run(&item).unwrap_err().to_string(),
            "invalid type String, expected Number"
        );
    }

    #[test]
    fn test_range_frame_needs_numeric_order() {
        let frame = WindowFrame::Range {
            lower: FrameBound::Preceding(5),
            upper: FrameBound::CurrentRow,
        };
        let item = analytic(AnalyticFunction::Sum, Some("long1"), &[("id", Order::Asc)], Some(frame));
        assert!(matches!(run(&item), Err(EvalError::InvalidArgument { .. })));

        let item = analytic(AnalyticFunction::Sum, Some("long1"), &[("long1", Order::Asc)], Some(frame));
        let out = run(&item).unwrap().resolve().unwrap();
        // Hadrien (10) has no neighbour within 5; Nico (20) has none either.
        assert_eq!(out.get(1, "target"), Some(&Value::Int64(10)));
        assert_eq!(out.get(2, "target"), Some(&Value::Int64(20)));
    }
}
