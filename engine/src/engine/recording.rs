//! A backend wrapper that logs and records every call before delegating.
//!
//! Useful to inspect the plan a script produces, and in tests to assert
//! that validation is built only from the public primitives.

use indexmap::IndexMap;
use log::info;
use std::sync::Mutex;

use super::ProcessingEngine;
use crate::error::EvalResult;
use crate::model::{
    AggregationExpression, AnalyticFunction, DatasetExpression, Order, ResolvableExpression, Role,
    Window,
};

pub struct RecordingEngine<E> {
    inner: E,
    calls: Mutex<Vec<String>>,
}

impl<E: ProcessingEngine> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        info!("[{}] {}", self.inner.name(), call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

fn names(datasets: &IndexMap<String, DatasetExpression>) -> String {
    datasets.keys().cloned().collect::<Vec<_>>().join(", ")
}

impl<E: ProcessingEngine> ProcessingEngine for RecordingEngine<E> {
    fn name(&self) -> &str {
        "recording"
    }

    fn execute_project(&self, dataset: &DatasetExpression, columns: &[String]) -> EvalResult<DatasetExpression> {
        self.record(format!("project [{}]", columns.join(", ")));
        self.inner.execute_project(dataset, columns)
    }

    fn execute_calc(
        &self,
        dataset: &DatasetExpression,
        expressions: &IndexMap<String, ResolvableExpression>,
        roles: &IndexMap<String, Role>,
        sources: &IndexMap<String, String>,
    ) -> EvalResult<DatasetExpression> {
        let items: Vec<String> = expressions
            .keys()
            .map(|name| match sources.get(name) {
                Some(source) => format!("{} := {}", name, source),
                None => name.clone(),
            })
            .collect();
        self.record(format!("calc [{}]", items.join(", ")));
        self.inner.execute_calc(dataset, expressions, roles, sources)
    }

    fn execute_filter(
        &self,
        dataset: &DatasetExpression,
        predicate: &ResolvableExpression,
        source: &str,
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("filter {}", source));
        self.inner.execute_filter(dataset, predicate, source)
    }

    fn execute_rename(
        &self,
        dataset: &DatasetExpression,
        from_to: &IndexMap<String, String>,
    ) -> EvalResult<DatasetExpression> {
        let items: Vec<String> = from_to.iter().map(|(f, t)| format!("{} to {}", f, t)).collect();
        self.record(format!("rename [{}]", items.join(", ")));
        self.inner.execute_rename(dataset, from_to)
    }

    fn execute_union(&self, datasets: &[DatasetExpression]) -> EvalResult<DatasetExpression> {
        self.record(format!("union of {}", datasets.len()));
        self.inner.execute_union(datasets)
    }

    fn execute_stack(&self, datasets: &[DatasetExpression]) -> EvalResult<DatasetExpression> {
        self.record(format!("stack of {}", datasets.len()));
        self.inner.execute_stack(datasets)
    }

    fn execute_aggr(
        &self,
        dataset: &DatasetExpression,
        group_by: &[String],
        aggregations: &IndexMap<String, AggregationExpression>,
    ) -> EvalResult<DatasetExpression> {
        let items: Vec<String> = aggregations
            .iter()
            .map(|(name, a)| format!("{} := {}", name, a.function()))
            .collect();
        self.record(format!("aggr [{}] group by [{}]", items.join(", "), group_by.join(", ")));
        self.inner.execute_aggr(dataset, group_by, aggregations)
    }

    fn execute_simple_analytic(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        function: AnalyticFunction,
        source: &str,
        window: &Window,
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("analytic {} := {}({})", target, function, source));
        self.inner.execute_simple_analytic(dataset, target, function, source, window)
    }

    fn execute_lead_or_lag(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        function: AnalyticFunction,
        source: &str,
        offset: i64,
        partition_by: &[String],
        order_by: &IndexMap<String, Order>,
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("analytic {} := {}({}, {})", target, function, source, offset));
        self.inner
            .execute_lead_or_lag(dataset, target, function, source, offset, partition_by, order_by)
    }

    fn execute_ratio_to_report(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        source: &str,
        partition_by: &[String],
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("analytic {} := ratio_to_report({})", target, source));
        self.inner.execute_ratio_to_report(dataset, target, source, partition_by)
    }

    fn execute_rank(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        partition_by: &[String],
        order_by: &IndexMap<String, Order>,
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("analytic {} := rank()", target));
        self.inner.execute_rank(dataset, target, partition_by, order_by)
    }

    fn execute_inner_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("inner_join {} using [{}]", names(datasets), keys.join(", ")));
        self.inner.execute_inner_join(datasets, keys)
    }

    fn execute_left_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("left_join {} using [{}]", names(datasets), keys.join(", ")));
        self.inner.execute_left_join(datasets, keys)
    }

    fn execute_full_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("full_join {} using [{}]", names(datasets), keys.join(", ")));
        self.inner.execute_full_join(datasets, keys)
    }

    fn execute_cross_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
    ) -> EvalResult<DatasetExpression> {
        self.record(format!("cross_join {}", names(datasets)));
        self.inner.execute_cross_join(datasets)
    }
}
