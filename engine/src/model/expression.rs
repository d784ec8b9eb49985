//! Lazily-resolvable typed expressions.
//!
//! ```text
//! ┌──────────────┐  evaluator   ┌──────────────────────┐  evaluate(bindings)  ┌───────┐
//! │ ast::Expr    │ ───────────▶ │ ResolvableExpression │ ───────────────────▶ │ Value │
//! └──────────────┘              │ DatasetExpression    │ ───────────────────▶ │ Arc<Dataset>
//!                               └──────────────────────┘                      └───────┘
//! ```
//!
//! Compilation resolves types once; evaluation is a pure function of the
//! supplied bindings, so an expression may be evaluated once per row (calc,
//! filter) or once against the host environment.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::dataset::Dataset;
use super::structure::DataStructure;
use super::types::{Value, ValueType};
use crate::error::{EvalError, EvalResult};

// =============================================================================
// Spans and bindings
// =============================================================================

/// Start/end offsets into the script text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Name → value lookup an expression is evaluated against.
pub trait Bindings {
    fn get(&self, name: &str) -> Option<&Value>;
}

impl Bindings for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<&Value> {
        HashMap::get(self, name)
    }
}

impl Bindings for IndexMap<String, Value> {
    fn get(&self, name: &str) -> Option<&Value> {
        IndexMap::get(self, name)
    }
}

/// Bindings with no names, for constant expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBindings;

impl Bindings for EmptyBindings {
    fn get(&self, _name: &str) -> Option<&Value> {
        None
    }
}

// =============================================================================
// Scalar expressions
// =============================================================================

type Resolver = Arc<dyn Fn(&dyn Bindings) -> EvalResult<Value> + Send + Sync>;

/// A statically typed scalar formula.
#[derive(Clone)]
pub struct ResolvableExpression {
    value_type: ValueType,
    span: Span,
    resolver: Resolver,
}

impl ResolvableExpression {
    pub fn new<F>(value_type: ValueType, span: Span, resolver: F) -> Self
    where
        F: Fn(&dyn Bindings) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Self {
            value_type,
            span,
            resolver: Arc::new(resolver),
        }
    }

    /// Expression returning `value` regardless of bindings.
    pub fn constant(value: Value, value_type: ValueType, span: Span) -> Self {
        Self::new(value_type, span, move |_| Ok(value.clone()))
    }

    /// Typed `null` (e.g. comparisons against the null literal).
    pub fn null(value_type: ValueType, span: Span) -> Self {
        Self::constant(Value::Null, value_type, span)
    }

    /// Reads `name` from the bindings; an unbound name reads as null.
    pub fn column(name: impl Into<String>, value_type: ValueType, span: Span) -> Self {
        let name = name.into();
        Self::new(value_type, span, move |bindings| {
            Ok(bindings.get(&name).cloned().unwrap_or(Value::Null))
        })
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Expression built from the bare `null` literal.
    pub fn is_null_literal(&self) -> bool {
        self.value_type.is_null()
    }

    pub fn evaluate(&self, bindings: &dyn Bindings) -> EvalResult<Value> {
        (self.resolver)(bindings)
    }

    /// Same computation under a different static type (used by casts of null).
    pub fn retyped(&self, value_type: ValueType) -> Self {
        Self {
            value_type,
            span: self.span,
            resolver: self.resolver.clone(),
        }
    }
}

impl fmt::Debug for ResolvableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvableExpression")
            .field("value_type", &self.value_type)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Dataset expressions
// =============================================================================

type DatasetResolver = Arc<dyn Fn(&dyn Bindings) -> EvalResult<Arc<Dataset>> + Send + Sync>;

/// A dataset-valued formula whose structure is known before execution.
#[derive(Clone)]
pub struct DatasetExpression {
    structure: DataStructure,
    span: Span,
    resolver: DatasetResolver,
}

impl DatasetExpression {
    pub fn new<F>(structure: DataStructure, span: Span, resolver: F) -> Self
    where
        F: Fn(&dyn Bindings) -> EvalResult<Arc<Dataset>> + Send + Sync + 'static,
    {
        Self {
            structure,
            span,
            resolver: Arc::new(resolver),
        }
    }

    /// Wrap an already materialized dataset.
    pub fn of(dataset: Arc<Dataset>, span: Span) -> Self {
        let structure = dataset.structure().clone();
        Self::new(structure, span, move |_| Ok(dataset.clone()))
    }

    pub fn structure(&self) -> &DataStructure {
        &self.structure
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn evaluate(&self, bindings: &dyn Bindings) -> EvalResult<Arc<Dataset>> {
        let dataset = (self.resolver)(bindings)?;
        if dataset.structure() != &self.structure {
            return Err(EvalError::internal(
                "resolved dataset does not match its declared structure",
                self.span,
            ));
        }
        Ok(dataset)
    }

    /// Evaluate with no bindings. Dataset expressions built from host
    /// variables capture everything they need.
    pub fn resolve(&self) -> EvalResult<Arc<Dataset>> {
        self.evaluate(&EmptyBindings)
    }

    /// Same dataset, reported at a different span.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Debug for DatasetExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetExpression")
            .field("structure", &self.structure)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Evaluator output
// =============================================================================

/// Result of compiling any expression.
#[derive(Debug, Clone)]
pub enum Expression {
    Scalar(ResolvableExpression),
    Dataset(DatasetExpression),
}

impl Expression {
    pub fn value_type(&self) -> ValueType {
        match self {
            Expression::Scalar(expr) => expr.value_type().clone(),
            Expression::Dataset(_) => ValueType::Dataset,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expression::Scalar(expr) => expr.span(),
            Expression::Dataset(expr) => expr.span(),
        }
    }

    pub fn into_scalar(self) -> EvalResult<ResolvableExpression> {
        match self {
            Expression::Scalar(expr) => Ok(expr),
            Expression::Dataset(expr) => Err(EvalError::invalid_type(
                ValueType::Dataset,
                "a scalar",
                expr.span(),
            )),
        }
    }

    pub fn into_dataset(self) -> EvalResult<DatasetExpression> {
        match self {
            Expression::Dataset(expr) => Ok(expr),
            Expression::Scalar(expr) => Err(EvalError::invalid_type(
                expr.value_type(),
                ValueType::Dataset,
                expr.span(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_reads_bindings() {
        let expr = ResolvableExpression::column("a", ValueType::Int64, Span::default());
        let mut row = HashMap::new();
        row.insert("a".to_string(), Value::Int64(4));
        assert_eq!(expr.evaluate(&row).unwrap(), Value::Int64(4));
        assert_eq!(expr.evaluate(&EmptyBindings).unwrap(), Value::Null);
    }

    #[test]
    fn test_null_literal_detection() {
        let null = ResolvableExpression::null(ValueType::Null, Span::default());
        assert!(null.is_null_literal());
        assert!(!null.retyped(ValueType::String).is_null_literal());
    }

    #[test]
    fn test_scalar_is_not_a_dataset() {
        let expr = Expression::Scalar(ResolvableExpression::constant(
            Value::Int64(1),
            ValueType::Int64,
            Span::new(0, 1),
        ));
        let err = expr.into_dataset().unwrap_err();
        assert_eq!(err.to_string(), "invalid type Long, expected Dataset");
    }

    #[test]
    fn test_span_merge() {
        assert_eq!(Span::new(4, 6).merge(Span::new(1, 5)), Span::new(1, 6));
    }
}
