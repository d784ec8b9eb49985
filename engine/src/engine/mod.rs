//! Processing-engine contract and backends.
//!
//! The clause planner and the validation engine never touch rows: they hand
//! type-checked descriptors to a [`ProcessingEngine`], which returns new lazy
//! [`DatasetExpression`]s.
//!
//! ```text
//!   planner / validation
//!            │  execute_calc, execute_filter, execute_aggr, ...
//!            ▼
//!   ┌───────────────────┐        ┌─────────────────────┐
//!   │ RecordingEngine   │ ─────▶ │ InMemoryEngine      │
//!   │ (logs + records)  │        │ (row-at-a-time)     │
//!   └───────────────────┘        └─────────────────────┘
//! ```
//!
//! Every backend must agree on semantics: same output structures, same
//! null handling, same de-duplication and window rules.

mod compute;
mod join;
mod memory;
mod recording;
mod window;

use indexmap::IndexMap;

use crate::error::EvalResult;
use crate::model::{
    AggregationExpression, AnalyticFunction, CompiledRuleset, DatasetExpression, Order,
    ResolvableExpression, Role, ValidationOutput, Window,
};
use crate::validation;

pub use memory::InMemoryEngine;
pub use recording::RecordingEngine;

/// Names accepted by [`create_engine`].
pub const ENGINE_NAMES: &[&str] = &["memory", "recording"];

/// Backend executing structural dataset operations.
///
/// Every method receives already type-checked descriptors and returns a new
/// dataset expression; inputs are never mutated.
pub trait ProcessingEngine: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Keep `columns`, in the given order.
    fn execute_project(
        &self,
        dataset: &DatasetExpression,
        columns: &[String],
    ) -> EvalResult<DatasetExpression>;

    /// Add or overwrite columns. All expressions see the input row.
    ///
    /// `sources` holds the script text of each expression for backends that
    /// push expressions down; it may be ignored.
    fn execute_calc(
        &self,
        dataset: &DatasetExpression,
        expressions: &IndexMap<String, ResolvableExpression>,
        roles: &IndexMap<String, Role>,
        sources: &IndexMap<String, String>,
    ) -> EvalResult<DatasetExpression>;

    /// Keep rows where `predicate` is `true`.
    fn execute_filter(
        &self,
        dataset: &DatasetExpression,
        predicate: &ResolvableExpression,
        source: &str,
    ) -> EvalResult<DatasetExpression>;

    /// Rename columns in place. A column whose name is taken by a rename
    /// target is dropped.
    fn execute_rename(
        &self,
        dataset: &DatasetExpression,
        from_to: &IndexMap<String, String>,
    ) -> EvalResult<DatasetExpression>;

    /// Concatenate datasets of equal structure, keeping the first row (in
    /// argument order) for each identifier key.
    fn execute_union(&self, datasets: &[DatasetExpression]) -> EvalResult<DatasetExpression>;

    /// Concatenate datasets of equal structure, keeping every row.
    fn execute_stack(&self, datasets: &[DatasetExpression]) -> EvalResult<DatasetExpression>;

    /// Group by `group_by` (all rows when empty) and aggregate.
    fn execute_aggr(
        &self,
        dataset: &DatasetExpression,
        group_by: &[String],
        aggregations: &IndexMap<String, AggregationExpression>,
    ) -> EvalResult<DatasetExpression>;

    /// Aggregate, `first_value` or `last_value` over a window frame.
    fn execute_simple_analytic(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        function: AnalyticFunction,
        source: &str,
        window: &Window,
    ) -> EvalResult<DatasetExpression>;

    fn execute_lead_or_lag(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        function: AnalyticFunction,
        source: &str,
        offset: i64,
        partition_by: &[String],
        order_by: &IndexMap<String, Order>,
    ) -> EvalResult<DatasetExpression>;

    fn execute_ratio_to_report(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        source: &str,
        partition_by: &[String],
    ) -> EvalResult<DatasetExpression>;

    /// Dense rank within each partition.
    fn execute_rank(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        partition_by: &[String],
        order_by: &IndexMap<String, Order>,
    ) -> EvalResult<DatasetExpression>;

    fn execute_inner_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression>;

    fn execute_left_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression>;

    fn execute_full_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression>;

    fn execute_cross_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
    ) -> EvalResult<DatasetExpression>;

    /// Datapoint ruleset validation, built from the primitives above.
    fn execute_validate_dp_ruleset(
        &self,
        dataset: &DatasetExpression,
        ruleset: &CompiledRuleset,
        output: ValidationOutput,
    ) -> EvalResult<DatasetExpression> {
        validation::validate_dp_ruleset(self, dataset, ruleset, output)
    }

    /// Simple validation, built from the primitives above.
    fn execute_validation_simple(
        &self,
        dataset: &DatasetExpression,
        error_code: Option<&ResolvableExpression>,
        error_level: Option<&ResolvableExpression>,
        imbalance: Option<&DatasetExpression>,
        output: ValidationOutput,
    ) -> EvalResult<DatasetExpression> {
        validation::validation_simple(self, dataset, error_code, error_level, imbalance, output)
    }
}

/// Backend for a configured name.
pub fn create_engine(name: &str) -> Option<Box<dyn ProcessingEngine>> {
    match name {
        "memory" => Some(Box::new(InMemoryEngine::new())),
        "recording" => Some(Box::new(RecordingEngine::new(InMemoryEngine::new()))),
        _ => None,
    }
}
