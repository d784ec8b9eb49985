//! Comparison operators, list literals and `in` / `not in`.

use std::cmp::Ordering;

use crate::ast::ComparisonOp;
use crate::error::{EvalError, EvalResult};
use crate::model::{EmptyBindings, ResolvableExpression, Span, Value, ValueType};

fn holds(op: ComparisonOp, ordering: Ordering) -> bool {
    match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Le => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Ge => ordering != Ordering::Less,
    }
}

pub(super) fn comparison(
    op: ComparisonOp,
    left: ResolvableExpression,
    right: ResolvableExpression,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    if left.is_null_literal() || right.is_null_literal() {
        return Ok(ResolvableExpression::null(ValueType::Boolean, span));
    }
    if !left.value_type().is_comparable_with(right.value_type()) {
        return Err(EvalError::invalid_type(
            right.value_type(),
            left.value_type(),
            right.span(),
        ));
    }
    Ok(ResolvableExpression::new(ValueType::Boolean, span, move |bindings| {
        let l = left.evaluate(bindings)?;
        let r = right.evaluate(bindings)?;
        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }
        // NaN compares as unknown.
        Ok(l.compare(&r).map(|o| holds(op, o)).into())
    }))
}

/// A typed list literal. Elements are constants and are evaluated here.
pub(super) struct ListLiteral {
    pub element_type: ValueType,
    pub values: Vec<Value>,
}

pub(super) fn list(elements: Vec<ResolvableExpression>, span: Span) -> EvalResult<ListLiteral> {
    let mut types: Vec<ValueType> = Vec::new();
    for element in &elements {
        if !types.contains(element.value_type()) {
            types.push(element.value_type().clone());
        }
    }
    let element_type = match types.len() {
        0 => return Err(EvalError::invalid_argument("empty list", span)),
        1 => types.remove(0),
        _ => {
            return Err(EvalError::ConflictingTypes {
                types: types.iter().map(ToString::to_string).collect(),
                span,
            })
        }
    };
    let values = elements
        .iter()
        .map(|e| e.evaluate(&EmptyBindings))
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(ListLiteral {
        element_type,
        values,
    })
}

pub(super) fn membership(
    operand: ResolvableExpression,
    list: ListLiteral,
    negated: bool,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    if operand.is_null_literal() {
        return Ok(ResolvableExpression::null(ValueType::Boolean, span));
    }
    if operand.value_type() != &list.element_type {
        return Err(EvalError::invalid_type(
            operand.value_type(),
            &list.element_type,
            operand.span(),
        ));
    }
    let values = list.values;
    Ok(ResolvableExpression::new(ValueType::Boolean, span, move |bindings| {
        let value = operand.evaluate(bindings)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        let found = values
            .iter()
            .any(|candidate| value.compare(candidate) == Some(Ordering::Equal));
        Ok(Value::Boolean(found != negated))
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, type_of};
    use crate::ast::{ComparisonOp, Expr, ExprKind};
    use crate::error::EvalError;
    use crate::model::{Value, ValueType};

    const OPS: [ComparisonOp; 6] = [
        ComparisonOp::Eq,
        ComparisonOp::Ne,
        ComparisonOp::Lt,
        ComparisonOp::Le,
        ComparisonOp::Gt,
        ComparisonOp::Ge,
    ];

    fn in_list(operand: Expr, list: Vec<Expr>, negated: bool) -> Expr {
        Expr::new(ExprKind::In {
            operand: Box::new(operand),
            list,
            negated,
        })
    }

    #[test]
    fn test_comparisons() {
        let cmp = |op, l: Expr, r: Expr| eval(&Expr::comparison(op, l, r)).unwrap();
        assert_eq!(cmp(ComparisonOp::Eq, Expr::constant(3i64), Expr::constant(3.0)), Value::Boolean(true));
        assert_eq!(cmp(ComparisonOp::Lt, Expr::constant(2i64), Expr::constant(2.5)), Value::Boolean(true));
        assert_eq!(cmp(ComparisonOp::Ge, Expr::constant("b"), Expr::constant("a")), Value::Boolean(true));
        assert_eq!(cmp(ComparisonOp::Ne, Expr::constant(true), Expr::constant(true)), Value::Boolean(false));
    }

    #[test]
    fn test_null_comparisons_are_null() {
        for op in OPS {
            for (l, r) in [(Expr::constant(1i64), Expr::null()), (Expr::null(), Expr::constant(1.5))] {
                let expr = Expr::comparison(op, l, r);
                assert_eq!(type_of(&expr).unwrap(), ValueType::Boolean);
                assert_eq!(eval(&expr).unwrap(), Value::Null);
            }
        }
    }

    #[test]
    fn test_mismatched_types() {
        let err = eval(&Expr::comparison(ComparisonOp::Eq, Expr::constant(1i64), Expr::constant("1")))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid type String, expected Long");
    }

    #[test]
    fn test_in_list() {
        let ints = || vec![Expr::constant(1i64), Expr::constant(2i64), Expr::constant(3i64)];
        assert_eq!(eval(&in_list(Expr::constant(3i64), ints(), false)).unwrap(), Value::Boolean(true));
        assert_eq!(eval(&in_list(Expr::constant(4i64), ints(), true)).unwrap(), Value::Boolean(true));
        assert_eq!(eval(&in_list(Expr::null(), ints(), false)).unwrap(), Value::Null);

        let err = eval(&in_list(Expr::constant("x"), ints(), false)).unwrap_err();
        assert!(matches!(err, EvalError::InvalidType { .. }));
    }

    #[test]
    fn test_conflicting_list() {
        let err = eval(&in_list(
            Expr::constant(1i64),
            vec![Expr::constant(1i64), Expr::constant("a")],
            false,
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "conflicting types: Long, String");
    }
}
