//! Core data model: value types, structures, datasets, typed expressions and
//! the descriptors handed to processing engines.

pub mod aggregation;
pub mod analytics;
pub mod dataset;
pub mod expression;
pub mod numeric;
pub mod ruleset;
pub mod structure;
pub mod types;

pub use aggregation::{AggregateFunction, AggregationExpression};
pub use analytics::{AnalyticFunction, AnalyticKind, AnalyticSpec, FrameBound, Order, Window, WindowFrame};
pub use dataset::{Dataset, Row, RowBindings};
pub use expression::{Bindings, DatasetExpression, EmptyBindings, Expression, ResolvableExpression, Span};
pub use ruleset::{CompiledRule, CompiledRuleset, DataPointRuleset, Rule, ValidationOutput};
pub use structure::{Component, DataStructure, Role};
pub use types::{Value, ValueKey, ValueType};
