//! Expression Evaluator.
//!
//! Turns parse-tree nodes into typed, lazily-resolvable expressions:
//!
//! ```text
//!                      ┌──────────────┐
//!   ast::Expr ───────▶ │  Evaluator   │ ── scalar ops ──▶ ResolvableExpression
//!                      │  (dispatch)  │
//!                      └──────┬───────┘
//!                             │ dataset ops
//!                             ▼
//!          ┌──────────────────────────────────────┐
//!          │ planner (clauses, joins, analytics)  │ ──▶ ProcessingEngine ──▶ DatasetExpression
//!          │ validation (rulesets, check)         │
//!          └──────────────────────────────────────┘
//! ```
//!
//! An evaluator works in one of two scopes. The host scope resolves names
//! against the session's variable table (scalars, datasets, rulesets). The
//! structure scope resolves names against the columns of a dataset and is
//! used for the bodies of `calc`, `filter` and aggregate items, where each
//! expression is later evaluated once per row.

mod arithmetic;
mod boolean;
mod cast;
mod comparison;
mod dataset;
pub mod functions;
mod numeric;
pub(crate) mod type_check;

use indexmap::IndexMap;
use std::sync::Arc;

use crate::ast::{Expr, ExprKind};
use crate::engine::ProcessingEngine;
use crate::error::{EvalError, EvalResult};
use crate::model::{
    DataPointRuleset, DataStructure, Dataset, DatasetExpression, Expression,
    ResolvableExpression, Span, ValidationOutput, Value, ValueType,
};

pub use functions::{FunctionRegistry, FunctionSignature, REGISTRY};

// =============================================================================
// Host environment
// =============================================================================

/// A value bound to a name in the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Scalar { value: Value, value_type: ValueType },
    Dataset(Arc<Dataset>),
    Ruleset(Arc<DataPointRuleset>),
}

impl Binding {
    pub fn scalar(value: Value) -> Self {
        let value_type = value.value_type();
        Binding::Scalar { value, value_type }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Scalar { .. } => "scalar",
            Binding::Dataset(_) => "dataset",
            Binding::Ruleset(_) => "ruleset",
        }
    }
}

/// Name lookup owned by the host.
pub trait Environment {
    fn binding(&self, name: &str) -> Option<&Binding>;
}

impl Environment for IndexMap<String, Binding> {
    fn binding(&self, name: &str) -> Option<&Binding> {
        self.get(name)
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Where names are resolved.
#[derive(Clone, Copy)]
pub enum Scope<'a> {
    Host(&'a dyn Environment),
    Structure {
        structure: &'a DataStructure,
        /// Dataset label used in error messages.
        dataset: &'a str,
    },
}

/// Compiles parse-tree expressions against a scope and a processing engine.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    engine: &'a dyn ProcessingEngine,
    scope: Scope<'a>,
    /// Output of `check_datapoint` when the script does not say.
    validation_output: ValidationOutput,
}

impl<'a> Evaluator<'a> {
    /// Evaluator resolving names in the host environment.
    pub fn new(engine: &'a dyn ProcessingEngine, environment: &'a dyn Environment) -> Self {
        Self {
            engine,
            scope: Scope::Host(environment),
            validation_output: ValidationOutput::Invalid,
        }
    }

    /// Evaluator resolving names as columns of `structure`.
    pub fn for_structure(
        engine: &'a dyn ProcessingEngine,
        structure: &'a DataStructure,
        dataset: &'a str,
    ) -> Self {
        Self {
            engine,
            scope: Scope::Structure { structure, dataset },
            validation_output: ValidationOutput::Invalid,
        }
    }

    pub fn with_validation_output(mut self, output: ValidationOutput) -> Self {
        self.validation_output = output;
        self
    }

    pub fn engine(&self) -> &'a dyn ProcessingEngine {
        self.engine
    }

    /// Compile any expression.
    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Expression> {
        let span = expr.span;
        let scalar = match &expr.kind {
            ExprKind::Constant { value } => constant(value, span)?,
            ExprKind::Variable { name } => return self.variable(name, span),
            ExprKind::Arithmetic { op, left, right } => {
                arithmetic::arithmetic(*op, self.scalar(left)?, self.scalar(right)?, span)?
            }
            ExprKind::Concat { left, right } => {
                arithmetic::concat(self.scalar(left)?, self.scalar(right)?, span)?
            }
            ExprKind::Unary { op, operand } => arithmetic::unary(*op, self.scalar(operand)?, span)?,
            ExprKind::Boolean { op, left, right } => {
                boolean::boolean(*op, self.scalar(left)?, self.scalar(right)?, span)?
            }
            ExprKind::Comparison { op, left, right } => {
                comparison::comparison(*op, self.scalar(left)?, self.scalar(right)?, span)?
            }
            ExprKind::In {
                operand,
                list,
                negated,
            } => {
                let elements = list
                    .iter()
                    .map(|e| self.scalar(e))
                    .collect::<EvalResult<Vec<_>>>()?;
                let list = comparison::list(elements, span)?;
                comparison::membership(self.scalar(operand)?, list, *negated, span)?
            }
            ExprKind::UnaryNumeric { op, operand } => {
                numeric::unary(*op, self.scalar(operand)?, span)?
            }
            ExprKind::Rounding {
                op,
                operand,
                digits,
            } => {
                let digits = digits.as_ref().map(|d| self.scalar(d)).transpose()?;
                numeric::rounding(*op, self.scalar(operand)?, digits, span)?
            }
            ExprKind::BinaryNumeric { op, left, right } => {
                numeric::binary(*op, self.scalar(left)?, self.scalar(right)?, span)?
            }
            ExprKind::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.scalar(a))
                    .collect::<EvalResult<Vec<_>>>()?;
                REGISTRY.call(name, args, span)?
            }
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => REGISTRY.call(
                "ifThenElse",
                vec![self.scalar(condition)?, self.scalar(then)?, self.scalar(otherwise)?],
                span,
            )?,
            ExprKind::Nvl { operand, default } => REGISTRY.call(
                "nvl",
                vec![self.scalar(operand)?, self.scalar(default)?],
                span,
            )?,
            ExprKind::Cast { operand, target } => {
                cast::cast(self.scalar(operand)?, target, span)?
            }
            ExprKind::Membership { dataset, component } => {
                return self.membership(dataset, component, span).map(Expression::Dataset)
            }
            ExprKind::Clause { dataset, clause } => {
                return self.clause(dataset, clause, span).map(Expression::Dataset)
            }
            ExprKind::Join {
                kind,
                operands,
                using,
            } => {
                return self
                    .join(*kind, operands, using.as_deref(), span)
                    .map(Expression::Dataset)
            }
            ExprKind::Union { operands } => {
                return self.union(operands, span).map(Expression::Dataset)
            }
            ExprKind::Analytic { function, .. } => {
                return Err(EvalError::invalid_argument(
                    format!("analytic function {} is only allowed in calc", function),
                    span,
                ))
            }
            ExprKind::CheckDatapoint {
                dataset,
                ruleset,
                output,
            } => {
                return self
                    .check_datapoint(dataset, ruleset, *output, span)
                    .map(Expression::Dataset)
            }
            ExprKind::Check {
                operand,
                error_code,
                error_level,
                imbalance,
                output,
            } => {
                return self
                    .check(
                        operand,
                        error_code.as_deref(),
                        error_level.as_deref(),
                        imbalance.as_deref(),
                        *output,
                        span,
                    )
                    .map(Expression::Dataset)
            }
        };
        Ok(Expression::Scalar(scalar))
    }

    /// Compile an expression that must be scalar.
    pub fn scalar(&self, expr: &Expr) -> EvalResult<ResolvableExpression> {
        self.evaluate(expr)?.into_scalar()
    }

    /// Compile an expression that must be a dataset.
    pub fn dataset(&self, expr: &Expr) -> EvalResult<DatasetExpression> {
        self.evaluate(expr)?.into_dataset()
    }

    fn variable(&self, name: &str, span: Span) -> EvalResult<Expression> {
        match self.scope {
            Scope::Host(environment) => match environment.binding(name) {
                Some(Binding::Scalar { value, value_type }) => Ok(Expression::Scalar(
                    ResolvableExpression::constant(value.clone(), value_type.clone(), span),
                )),
                Some(Binding::Dataset(dataset)) => Ok(Expression::Dataset(DatasetExpression::of(
                    dataset.clone(),
                    span,
                ))),
                Some(Binding::Ruleset(_)) => Err(EvalError::invalid_type(
                    "Ruleset",
                    "a scalar or a dataset",
                    span,
                )),
                None => Err(EvalError::UndefinedVariable {
                    name: name.to_string(),
                    span,
                }),
            },
            Scope::Structure { structure, dataset } => {
                let component = structure.require(name, dataset, span)?;
                Ok(Expression::Scalar(ResolvableExpression::column(
                    name,
                    component.value_type.clone(),
                    span,
                )))
            }
        }
    }

    fn environment(&self, span: Span) -> EvalResult<&'a dyn Environment> {
        match self.scope {
            Scope::Host(environment) => Ok(environment),
            Scope::Structure { .. } => Err(EvalError::invalid_argument(
                "dataset operations are not allowed inside a clause",
                span,
            )),
        }
    }
}

fn constant(value: &Value, span: Span) -> EvalResult<ResolvableExpression> {
    if let Value::List(_) = value {
        return Err(EvalError::invalid_argument(
            "list constants are only allowed after in",
            span,
        ));
    }
    Ok(ResolvableExpression::constant(
        value.clone(),
        value.value_type(),
        span,
    ))
}

/// Label of a dataset operand for error messages.
pub(crate) fn dataset_label(expr: &Expr) -> String {
    expr.as_variable()
        .map(str::to_string)
        .unwrap_or_else(|| "dataset".to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::engine::InMemoryEngine;
    use crate::model::EmptyBindings;

    /// Compile and evaluate a scalar expression against `environment`.
    pub fn eval_in(environment: &IndexMap<String, Binding>, expr: &Expr) -> EvalResult<Value> {
        let engine = InMemoryEngine::new();
        let evaluator = Evaluator::new(&engine, environment);
        evaluator.scalar(expr)?.evaluate(&EmptyBindings)
    }

    pub fn eval(expr: &Expr) -> EvalResult<Value> {
        eval_in(&IndexMap::new(), expr)
    }

    /// Static type of a scalar expression in an empty environment.
    pub fn type_of(expr: &Expr) -> EvalResult<ValueType> {
        let engine = InMemoryEngine::new();
        let environment: IndexMap<String, Binding> = IndexMap::new();
        let evaluator = Evaluator::new(&engine, &environment);
        Ok(evaluator.scalar(expr)?.value_type().clone())
    }
}
