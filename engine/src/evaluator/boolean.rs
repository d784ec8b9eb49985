//! Boolean connectives under three-valued logic.

use super::type_check::assert_boolean;
use crate::ast::BooleanOp;
use crate::error::EvalResult;
use crate::model::types::{kleene_and, kleene_or, kleene_xor};
use crate::model::{ResolvableExpression, Span, ValueType};

pub(super) fn boolean(
    op: BooleanOp,
    left: ResolvableExpression,
    right: ResolvableExpression,
    span: Span,
) -> EvalResult<ResolvableExpression> {
    let left = assert_boolean(left)?;
    let right = assert_boolean(right)?;
    let combine = match op {
        BooleanOp::And => kleene_and,
        BooleanOp::Or => kleene_or,
        BooleanOp::Xor => kleene_xor,
    };
    Ok(ResolvableExpression::new(ValueType::Boolean, span, move |bindings| {
        let l = left.evaluate(bindings)?.as_bool();
        // false and _ / true or _ are decided without the right side.
        match (op, l) {
            (BooleanOp::And, Some(false)) => return Ok(false.into()),
            (BooleanOp::Or, Some(true)) => return Ok(true.into()),
            _ => {}
        }
        let r = right.evaluate(bindings)?.as_bool();
        Ok(combine(l, r).into())
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::eval;
    use crate::ast::{BooleanOp, Expr};
    use crate::model::Value;

    fn b(v: Option<bool>) -> Expr {
        match v {
            Some(v) => Expr::constant(v),
            None => Expr::null(),
        }
    }

    #[test]
    fn test_truth_tables() {
        let cases = [
            (BooleanOp::And, Some(true), None, Value::Null),
            (BooleanOp::And, Some(false), None, Value::Boolean(false)),
            (BooleanOp::And, None, Some(false), Value::Boolean(false)),
            (BooleanOp::Or, None, Some(true), Value::Boolean(true)),
            (BooleanOp::Or, Some(false), None, Value::Null),
            (BooleanOp::Xor, Some(true), Some(true), Value::Boolean(false)),
            (BooleanOp::Xor, Some(true), None, Value::Null),
        ];
        for (op, l, r, expected) in cases {
            let expr = Expr::boolean(op, b(l), b(r));
            assert_eq!(eval(&expr).unwrap(), expected, "{:?} {:?} {:?}", op, l, r);
        }
    }

    #[test]
    fn test_operands_must_be_boolean() {
        let expr = Expr::boolean(BooleanOp::And, Expr::constant(true), Expr::constant(1i64));
        assert_eq!(
            eval(&expr).unwrap_err().to_string(),
            "invalid type Long, expected Boolean"
        );
    }
}
