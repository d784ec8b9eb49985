//! In-memory reference backend.
//!
//! Every operation returns a lazy [`DatasetExpression`]: the input is only
//! materialized when the result is evaluated. Rows keep their input order,
//! except for grouping (first-seen group order) and joins (left operand
//! order, then unmatched right rows).

use indexmap::IndexMap;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

use super::compute::aggregate;
use super::join;
use super::window::{self, SortSpec};
use super::ProcessingEngine;
use crate::ast::JoinKind;
use crate::error::{EvalError, EvalResult};
use crate::model::{
    AggregationExpression, AnalyticFunction, Component, DataStructure, Dataset,
    DatasetExpression, Order, ResolvableExpression, Role, Row, RowBindings, Span, Value, ValueType,
    Window, WindowFrame,
};

/// Row-at-a-time backend over [`Dataset`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryEngine;

impl InMemoryEngine {
    pub fn new() -> Self {
        Self
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Lazily apply `transform` to the rows of `input`, producing `structure`.
fn derive<F>(input: &DatasetExpression, structure: DataStructure, transform: F) -> DatasetExpression
where
    F: Fn(&Dataset) -> EvalResult<Vec<Row>> + Send + Sync + 'static,
{
    let input = input.clone();
    let output = structure.clone();
    let span = input.span();
    DatasetExpression::new(structure, span, move |bindings| {
        let data = input.evaluate(bindings)?;
        let rows = transform(&data)?;
        Ok(Arc::new(Dataset::from_parts(output.clone(), rows)))
    })
}

fn indices(structure: &DataStructure, columns: &[String], span: Span) -> EvalResult<Vec<usize>> {
    columns
        .iter()
        .map(|c| {
            structure
                .index_of(c)
                .ok_or_else(|| EvalError::column_not_found(c, "dataset", span))
        })
        .collect()
}

/// Shared structure of union/stack operands.
fn common_structure(datasets: &[DatasetExpression]) -> EvalResult<DataStructure> {
    let first = datasets.first().ok_or_else(|| {
        EvalError::invalid_argument("union needs at least one dataset", Span::default())
    })?;
    for other in &datasets[1..] {
        if other.structure() != first.structure() {
            return Err(EvalError::incompatible(
                format!(
                    "the schema of the dataset is not compatible: {} and {}",
                    first.structure(),
                    other.structure()
                ),
                other.span(),
            ));
        }
    }
    Ok(first.structure().clone())
}

/// Rows of every input in argument order. With `key`, only the first row per
/// key value survives.
fn concat(
    datasets: &[DatasetExpression],
    structure: DataStructure,
    key: Option<Vec<usize>>,
) -> DatasetExpression {
    let inputs = datasets.to_vec();
    let output = structure.clone();
    let span = datasets.first().map(|d| d.span()).unwrap_or_default();
    DatasetExpression::new(structure, span, move |bindings| {
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for input in &inputs {
            let data = input.evaluate(bindings)?;
            for row in data.rows() {
                let fresh = match &key {
                    Some(key) => seen.insert(key.iter().map(|&i| row[i].key()).collect::<Vec<_>>()),
                    None => true,
                };
                if fresh {
                    rows.push(row.clone());
                }
            }
        }
        Ok(Arc::new(Dataset::from_parts(output.clone(), rows)))
    })
}

fn sort_spec(structure: &DataStructure, order_by: &IndexMap<String, Order>, span: Span) -> EvalResult<SortSpec> {
    order_by
        .iter()
        .map(|(column, order)| {
            structure
                .index_of(column)
                .map(|i| (i, *order))
                .ok_or_else(|| EvalError::column_not_found(column, "dataset", span))
        })
        .collect()
}

/// Structure with `target` added (or overwritten in place), and its index.
fn with_column(structure: &DataStructure, target: &str, value_type: ValueType) -> (DataStructure, usize) {
    let role = structure.get(target).map(|c| c.role).unwrap_or(Role::Measure);
    let mut structure = structure.clone();
    structure.upsert(Component::new(target, value_type, role));
    let index = structure.index_of(target).unwrap_or(structure.len() - 1);
    (structure, index)
}

/// Rows widened to `width` with nulls, ready for a window column to be written.
fn widened(data: &Dataset, width: usize) -> Vec<Row> {
    data.rows()
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.resize(width, Value::Null);
            row
        })
        .collect()
}

fn join_with(
    kind: JoinKind,
    datasets: &IndexMap<String, DatasetExpression>,
    keys: &[String],
) -> EvalResult<DatasetExpression> {
    let span = datasets.values().next().map(|d| d.span()).unwrap_or_default();
    let (structure, layouts) = join::plan(kind, datasets, keys, span)?;
    debug!(
        "{:?} join of {} dataset(s) on [{}] -> {} column(s)",
        kind,
        datasets.len(),
        keys.join(", "),
        structure.len()
    );
    let inputs: Vec<DatasetExpression> = datasets.values().cloned().collect();
    let output = structure.clone();
    Ok(DatasetExpression::new(structure, span, move |bindings| {
        let data = inputs
            .iter()
            .map(|d| d.evaluate(bindings))
            .collect::<EvalResult<Vec<_>>>()?;
        let rows = join::rows(kind, &data, &layouts);
        Ok(Arc::new(Dataset::from_parts(output.clone(), rows)))
    }))
}

// =============================================================================
// Contract
// =============================================================================

impl ProcessingEngine for InMemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    fn execute_project(
        &self,
        dataset: &DatasetExpression,
        columns: &[String],
    ) -> EvalResult<DatasetExpression> {
        let span = dataset.span();
        let source = dataset.structure();
        let positions = indices(source, columns, span)?;
        let structure = DataStructure::new(columns.iter().filter_map(|c| source.get(c).cloned()))
            .map_err(|e| e.or_span(span))?;
        debug!("project: {} -> {} column(s)", source.len(), structure.len());
        Ok(derive(dataset, structure, move |data| {
            Ok(data
                .rows()
                .iter()
                .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
                .collect())
        }))
    }

    fn execute_calc(
        &self,
        dataset: &DatasetExpression,
        expressions: &IndexMap<String, ResolvableExpression>,
        roles: &IndexMap<String, Role>,
        _sources: &IndexMap<String, String>,
    ) -> EvalResult<DatasetExpression> {
        let mut structure = dataset.structure().clone();
        for (name, expr) in expressions {
            let role = roles
                .get(name)
                .copied()
                .or_else(|| structure.get(name).map(|c| c.role))
                .unwrap_or(Role::Measure);
            structure.upsert(Component::new(name.clone(), expr.value_type().clone(), role));
        }
        debug!(
            "calc: {} expression(s) on {} column(s)",
            expressions.len(),
            dataset.structure().len()
        );
        let width = structure.len();
        let targets: Vec<(usize, ResolvableExpression)> = expressions
            .iter()
            .filter_map(|(name, expr)| structure.index_of(name).map(|i| (i, expr.clone())))
            .collect();
        Ok(derive(dataset, structure, move |data| {
            data.rows()
                .iter()
                .map(|row| {
                    let bindings = RowBindings::new(data.structure(), row);
                    let mut out = row.clone();
                    out.resize(width, Value::Null);
                    for (index, expr) in &targets {
                        out[*index] = expr.evaluate(&bindings)?;
                    }
                    Ok(out)
                })
                .collect()
        }))
    }

    fn execute_filter(
        &self,
        dataset: &DatasetExpression,
        predicate: &ResolvableExpression,
        source: &str,
    ) -> EvalResult<DatasetExpression> {
        debug!("filter: {}", source);
        let predicate = predicate.clone();
        Ok(derive(dataset, dataset.structure().clone(), move |data| {
            let mut rows = Vec::new();
            for row in data.rows() {
                let bindings = RowBindings::new(data.structure(), row);
                if predicate.evaluate(&bindings)?.as_bool() == Some(true) {
                    rows.push(row.clone());
                }
            }
            Ok(rows)
        }))
    }

    fn execute_rename(
        &self,
        dataset: &DatasetExpression,
        from_to: &IndexMap<String, String>,
    ) -> EvalResult<DatasetExpression> {
        let span = dataset.span();
        let source = dataset.structure();
        for from in from_to.keys() {
            source.require(from, "dataset", span)?;
        }
        let mut components = Vec::with_capacity(source.len());
        let mut kept = Vec::with_capacity(source.len());
        for (index, component) in source.components().enumerate() {
            if let Some(to) = from_to.get(&component.name) {
                components.push(component.renamed(to.clone()));
            } else if from_to.values().any(|to| to == &component.name) {
                continue;
            } else {
                components.push(component.clone());
            }
            kept.push(index);
        }
        let structure = DataStructure::new(components).map_err(|e| e.or_span(span))?;
        debug!("rename: {} column(s)", from_to.len());
        Ok(derive(dataset, structure, move |data| {
            Ok(data
                .rows()
                .iter()
                .map(|row| kept.iter().map(|&i| row[i].clone()).collect())
                .collect())
        }))
    }

    fn execute_union(&self, datasets: &[DatasetExpression]) -> EvalResult<DatasetExpression> {
        let structure = common_structure(datasets)?;
        let mut key: Vec<usize> = structure
            .components()
            .enumerate()
            .filter(|(_, c)| c.is_identifier())
            .map(|(i, _)| i)
            .collect();
        if key.is_empty() {
            key = (0..structure.len()).collect();
        }
        debug!("union: {} dataset(s)", datasets.len());
        Ok(concat(datasets, structure, Some(key)))
    }

    fn execute_stack(&self, datasets: &[DatasetExpression]) -> EvalResult<DatasetExpression> {
        let structure = common_structure(datasets)?;
        debug!("stack: {} dataset(s)", datasets.len());
        Ok(concat(datasets, structure, None))
    }

    fn execute_aggr(
        &self,
        dataset: &DatasetExpression,
        group_by: &[String],
        aggregations: &IndexMap<String, AggregationExpression>,
    ) -> EvalResult<DatasetExpression> {
        let span = dataset.span();
        let source = dataset.structure();
        let group_positions = indices(source, group_by, span)?;
        let mut components: Vec<Component> = group_by
            .iter()
            .filter_map(|c| source.get(c).cloned())
            .collect();
        for (name, aggregation) in aggregations {
            components.push(Component::measure(name.clone(), aggregation.value_type()));
        }
        let structure = DataStructure::new(components).map_err(|e| e.or_span(span))?;
        debug!(
            "aggr: {} aggregation(s) grouped by [{}]",
            aggregations.len(),
            group_by.join(", ")
        );
        let aggregations: Vec<AggregationExpression> = aggregations.values().cloned().collect();
        Ok(derive(dataset, structure, move |data| {
            let mut groups: IndexMap<Vec<_>, Vec<usize>> = IndexMap::new();
            for (index, row) in data.rows().iter().enumerate() {
                let key = group_positions.iter().map(|&g| row[g].key()).collect();
                groups.entry(key).or_default().push(index);
            }
            // Aggregating everything yields one row even with no input.
            if groups.is_empty() && group_positions.is_empty() {
                groups.insert(Vec::new(), Vec::new());
            }
            let mut rows = Vec::with_capacity(groups.len());
            for members in groups.values() {
                let mut out: Row = match members.first() {
                    Some(&first) => group_positions
                        .iter()
                        .map(|&g| data.rows()[first][g].clone())
                        .collect(),
                    None => Vec::new(),
                };
                for aggregation in &aggregations {
                    let value = match aggregation.operand() {
                        None => Value::Int64(members.len() as i64),
                        Some(operand) => {
                            let values = members
                                .iter()
                                .map(|&i| {
                                    operand.evaluate(&RowBindings::new(data.structure(), &data.rows()[i]))
                                })
                                .collect::<EvalResult<Vec<_>>>()?;
                            aggregate(aggregation.function(), &values, operand.value_type(), operand.span())?
                        }
                    };
                    out.push(value);
                }
                rows.push(out);
            }
            Ok(rows)
        }))
    }

    fn execute_simple_analytic(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        function: AnalyticFunction,
        source: &str,
        window: &Window,
    ) -> EvalResult<DatasetExpression> {
        let span = dataset.span();
        let input = dataset.structure();
        let source_type = input.require(source, "dataset", span)?.value_type.clone();
        let source_index = input.index_of(source).unwrap_or_default();
        let partition = indices(input, &window.partition_by, span)?;
        let order = sort_spec(input, &window.order_by, span)?;
        let frame: Option<WindowFrame> = window.frame;
        let aggregate_function = function.aggregate();
        let (structure, target_index) = with_column(input, target, function.result_type(&source_type));
        let width = structure.len();
        debug!("analytic: {} over {} into {}", function, source, target);

        Ok(derive(dataset, structure, move |data| {
            let mut rows = widened(data, width);
            for members in window::partitions(data, &partition) {
                let sorted = window::sort(data, members, &order);
                for (position, &row_index) in sorted.iter().enumerate() {
                    let (start, end) = window::frame(data, &sorted, position, &order, frame.as_ref());
                    let framed = &sorted[start..end];
                    let value_of = |i: &usize| data.rows()[*i][source_index].clone();
                    let value = match (function, aggregate_function) {
                        (AnalyticFunction::FirstValue, _) => framed.first().map(value_of).unwrap_or_default(),
                        (AnalyticFunction::LastValue, _) => framed.last().map(value_of).unwrap_or_default(),
                        (_, Some(agg)) => {
                            let values: Vec<Value> = framed.iter().map(value_of).collect();
                            aggregate(agg, &values, &source_type, span)?
                        }
                        (other, None) => {
                            return Err(EvalError::internal(
                                format!("{} is not a simple analytic function", other),
                                span,
                            ))
                        }
                    };
                    rows[row_index][target_index] = value;
                }
            }
            Ok(rows)
        }))
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
        let span = dataset.span();
        let input = dataset.structure();
        let source_type = input.require(source, "dataset", span)?.value_type.clone();
        let source_index = input.index_of(source).unwrap_or_default();
        let partition = indices(input, partition_by, span)?;
        let order = sort_spec(input, order_by, span)?;
        let step = match function {
            AnalyticFunction::Lead => offset,
            AnalyticFunction::Lag => -offset,
            other => {
                return Err(EvalError::internal(
                    format!("{} is not lead or lag", other),
                    span,
                ))
            }
        };
        let (structure, target_index) = with_column(input, target, source_type);
        let width = structure.len();
        debug!("{}: {} by {} into {}", function, source, offset, target);

        Ok(derive(dataset, structure, move |data| {
            let mut rows = widened(data, width);
            for members in window::partitions(data, &partition) {
                let sorted = window::sort(data, members, &order);
                for (position, &row_index) in sorted.iter().enumerate() {
                    let other = position as i64 + step;
                    rows[row_index][target_index] = if other >= 0 && (other as usize) < sorted.len() {
                        data.rows()[sorted[other as usize]][source_index].clone()
                    } else {
                        Value::Null
                    };
                }
            }
            Ok(rows)
        }))
    }

    fn execute_ratio_to_report(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        source: &str,
        partition_by: &[String],
    ) -> EvalResult<DatasetExpression> {
        let span = dataset.span();
        let input = dataset.structure();
        input.require(source, "dataset", span)?;
        let source_index = input.index_of(source).unwrap_or_default();
        let partition = indices(input, partition_by, span)?;
        let (structure, target_index) = with_column(input, target, ValueType::Float64);
        let width = structure.len();
        debug!("ratio_to_report: {} into {}", source, target);

        Ok(derive(dataset, structure, move |data| {
            let mut rows = widened(data, width);
            for members in window::partitions(data, &partition) {
                let total: f64 = members
                    .iter()
                    .filter_map(|&i| data.rows()[i][source_index].as_f64())
                    .sum();
                for &i in &members {
                    rows[i][target_index] = match data.rows()[i][source_index].as_f64() {
                        Some(x) if total != 0.0 => Value::Float64(x / total),
                        _ => Value::Null,
                    };
                }
            }
            Ok(rows)
        }))
    }

    fn execute_rank(
        &self,
        dataset: &DatasetExpression,
        target: &str,
        partition_by: &[String],
        order_by: &IndexMap<String, Order>,
    ) -> EvalResult<DatasetExpression> {
        let span = dataset.span();
        let input = dataset.structure();
        let partition = indices(input, partition_by, span)?;
        let order = sort_spec(input, order_by, span)?;
        let (structure, target_index) = with_column(input, target, ValueType::Int64);
        let width = structure.len();
        debug!("rank into {}", target);

        Ok(derive(dataset, structure, move |data| {
            let mut rows = widened(data, width);
            for members in window::partitions(data, &partition) {
                let sorted = window::sort(data, members, &order);
                let mut rank = 0i64;
                for (position, &row_index) in sorted.iter().enumerate() {
                    if position == 0
                        || window::compare_rows(data, sorted[position - 1], row_index, &order).is_ne()
                    {
                        rank += 1;
                    }
                    rows[row_index][target_index] = Value::Int64(rank);
                }
            }
            Ok(rows)
        }))
    }

    fn execute_inner_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression> {
        join_with(JoinKind::Inner, datasets, keys)
    }

    fn execute_left_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression> {
        join_with(JoinKind::Left, datasets, keys)
    }

    fn execute_full_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
        keys: &[String],
    ) -> EvalResult<DatasetExpression> {
        join_with(JoinKind::Full, datasets, keys)
    }

    fn execute_cross_join(
        &self,
        datasets: &IndexMap<String, DatasetExpression>,
    ) -> EvalResult<DatasetExpression> {
        join_with(JoinKind::Cross, datasets, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::model::{AggregateFunction, FrameBound};

    fn ds1() -> DatasetExpression {
        DatasetExpression::of(Arc::new(fixtures::ds1()), Span::default())
    }

    fn column(name: &str, t: ValueType) -> ResolvableExpression {
        ResolvableExpression::column(name, t, Span::default())
    }

    fn long1(result: &Dataset) -> Vec<Value> {
        result.column("long1").unwrap().into_iter().cloned().collect()
    }

    #[test]
    fn test_project_orders_columns() {
        let engine = InMemoryEngine::new();
        let out = engine
            .execute_project(&ds1(), &["long1".to_string(), "id".to_string()])
            .unwrap();
        assert_eq!(out.structure().names().collect::<Vec<_>>(), vec!["long1", "id"]);
        let data = out.resolve().unwrap();
        assert_eq!(data.rows()[0], vec![Value::Int64(30), Value::from("Toto")]);
    }

    #[test]
    fn test_calc_overwrites_in_place_and_appends() {
        let engine = InMemoryEngine::new();
        let mut exprs = IndexMap::new();
        exprs.insert("long1".to_string(), ResolvableExpression::constant(Value::Int64(0), ValueType::Int64, Span::default()));
        exprs.insert("flag".to_string(), column("bool1", ValueType::Boolean));
        let out = engine
            .execute_calc(&ds1(), &exprs, &IndexMap::new(), &IndexMap::new())
            .unwrap();
        let names: Vec<_> = out.structure().names().collect();
        assert_eq!(names.last(), Some(&"flag"));
        assert_eq!(out.structure().index_of("long1"), ds1().structure().index_of("long1"));
        let data = out.resolve().unwrap();
        assert!(long1(&data).iter().all(|v| v == &Value::Int64(0)));
    }

    #[test]
    fn test_rename_drops_shadowed_column() {
        let engine = InMemoryEngine::new();
        let mut from_to = IndexMap::new();
        from_to.insert("double1".to_string(), "long1".to_string());
        let out = engine.execute_rename(&ds1(), &from_to).unwrap();
        assert_eq!(out.structure().get("long1").unwrap().value_type, ValueType::Float64);
        assert!(!out.structure().contains("double1"));
        assert_eq!(out.structure().len(), ds1().structure().len() - 1);
    }

    #[test]
    fn test_union_keeps_first_duplicate() {
        let engine = InMemoryEngine::new();
        let mut exprs = IndexMap::new();
        exprs.insert("long1".to_string(), ResolvableExpression::constant(Value::Int64(-1), ValueType::Int64, Span::default()));
        let changed = engine.execute_calc(&ds1(), &exprs, &IndexMap::new(), &IndexMap::new()).unwrap();
        let union = engine.execute_union(&[ds1(), changed.clone()]).unwrap().resolve().unwrap();
        assert_eq!(union.len(), 4);
        assert_eq!(long1(&union), long1(&fixtures::ds1()));

        let union = engine.execute_union(&[changed, ds1()]).unwrap().resolve().unwrap();
        assert!(long1(&union).iter().all(|v| v == &Value::Int64(-1)));
    }

    #[test]
    fn test_union_rejects_different_structures() {
        let engine = InMemoryEngine::new();
        let projected = engine.execute_project(&ds1(), &["id".to_string()]).unwrap();
        assert!(matches!(
            engine.execute_union(&[ds1(), projected]),
            Err(EvalError::IncompatibleStructure { .. })
        ));
    }

    #[test]
    fn test_aggr_all_rows_on_empty_input() {
        let engine = InMemoryEngine::new();
        let empty = engine
            .execute_filter(&ds1(), &ResolvableExpression::constant(Value::Boolean(false), ValueType::Boolean, Span::default()), "false")
            .unwrap();
        let mut aggs = IndexMap::new();
        aggs.insert("n".to_string(), AggregationExpression::Count);
        aggs.insert(
            "total".to_string(),
            AggregationExpression::new(AggregateFunction::Sum, Some(column("long1", ValueType::Int64)), Span::default()).unwrap(),
        );
        let data = engine.execute_aggr(&empty, &[], &aggs).unwrap().resolve().unwrap();
        assert_eq!(data.rows(), &[vec![Value::Int64(0), Value::Null]]);
    }

    #[test]
    fn test_running_sum() {
        let engine = InMemoryEngine::new();
        let mut order_by = IndexMap::new();
        order_by.insert("long1".to_string(), Order::Asc);
        let window = Window {
            partition_by: vec![],
            order_by,
            frame: None,
        };
        let out = engine
            .execute_simple_analytic(&ds1(), "running", AnalyticFunction::Sum, "long1", &window)
            .unwrap()
            .resolve()
            .unwrap();
        // 10, 20, 30, 100 accumulate in order; rows stay in input order.
        let running: Vec<Value> = out.column("running").unwrap().into_iter().cloned().collect();
        assert_eq!(running, vec![Value::Int64(60), Value::Int64(10), Value::Int64(30), Value::Int64(160)]);
    }

    #[test]
    fn test_moving_average_rows_frame() {
        let engine = InMemoryEngine::new();
        let mut order_by = IndexMap::new();
        order_by.insert("long1".to_string(), Order::Asc);
        let window = Window {
            partition_by: vec![],
            order_by,
            frame: Some(WindowFrame::Rows {
                lower: FrameBound::Preceding(1),
                upper: FrameBound::CurrentRow,
            }),
        };
        let out = engine
            .execute_simple_analytic(&ds1(), "avg", AnalyticFunction::Avg, "long1", &window)
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(out.get(1, "avg"), Some(&Value::Float64(10.0)));
        assert_eq!(out.get(3, "avg"), Some(&Value::Float64(65.0)));
    }

    #[test]
    fn test_lag_and_rank() {
        let engine = InMemoryEngine::new();
        let mut order_by = IndexMap::new();
        order_by.insert("long1".to_string(), Order::Desc);
        let lag = engine
            .execute_lead_or_lag(&ds1(), "prev", AnalyticFunction::Lag, "long1", 1, &[], &order_by)
            .unwrap()
            .resolve()
            .unwrap();
        // Descending: 100, 30, 20, 10.
        assert_eq!(lag.get(3, "prev"), Some(&Value::Null));
        assert_eq!(lag.get(0, "prev"), Some(&Value::Int64(100)));

        let rank = engine
            .execute_rank(&ds1(), "r", &["bool1".to_string()], &order_by)
            .unwrap()
            .resolve()
            .unwrap();
        let ranks: Vec<Value> = rank.column("r").unwrap().into_iter().cloned().collect();
        // bool1 partitions {Toto, Franck} and {Hadrien, Nico}.
        assert_eq!(ranks, vec![Value::Int64(2), Value::Int64(2), Value::Int64(1), Value::Int64(1)]);
    }

    #[test]
    fn test_ratio_to_report() {
        let engine = InMemoryEngine::new();
        let out = engine
            .execute_ratio_to_report(&ds1(), "share", "long1", &[])
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(out.get(3, "share"), Some(&Value::Float64(100.0 / 160.0)));
        assert_eq!(out.structure().get("share").unwrap().value_type, ValueType::Float64);
    }
}
