//! Join and union operands.

use indexmap::IndexMap;
use log::debug;

use crate::ast::JoinKind;
use crate::engine::ProcessingEngine;
use crate::error::{EvalError, EvalResult};
use crate::model::{DatasetExpression, Span};

/// Join aliased operands. Keys are `using` when given, else the identifiers
/// common to every operand.
pub fn join(
    engine: &dyn ProcessingEngine,
    kind: JoinKind,
    operands: Vec<(String, DatasetExpression)>,
    using: Option<&[String]>,
    span: Span,
) -> EvalResult<DatasetExpression> {
    if operands.is_empty() {
        return Err(EvalError::invalid_argument("join needs at least one dataset", span));
    }
    let mut datasets = IndexMap::with_capacity(operands.len());
    for (alias, dataset) in operands {
        if datasets.contains_key(&alias) {
            return Err(EvalError::invalid_argument(
                format!("duplicate dataset alias: {}", alias),
                span,
            ));
        }
        datasets.insert(alias, dataset);
    }

    let keys = match using {
        Some(columns) => columns.to_vec(),
        None => common_identifiers(&datasets),
    };
    debug!("{:?} join of [{}] on [{}]", kind, datasets.keys().cloned().collect::<Vec<_>>().join(", "), keys.join(", "));

    let joined = match kind {
        JoinKind::Cross => engine.execute_cross_join(&datasets)?,
        _ if keys.is_empty() => {
            return Err(EvalError::invalid_argument(
                "join operands have no common identifier",
                span,
            ))
        }
        JoinKind::Inner => engine.execute_inner_join(&datasets, &keys)?,
        JoinKind::Left => engine.execute_left_join(&datasets, &keys)?,
        JoinKind::Full => engine.execute_full_join(&datasets, &keys)?,
    };
    Ok(joined.at(span))
}

fn common_identifiers(datasets: &IndexMap<String, DatasetExpression>) -> Vec<String> {
    let mut operands = datasets.values();
    let Some(first) = operands.next() else {
        return Vec::new();
    };
    let rest: Vec<&DatasetExpression> = operands.collect();
    first
        .structure()
        .identifier_names()
        .into_iter()
        .filter(|name| {
            rest.iter().all(|d| {
                d.structure()
                    .get(name)
                    .map(|c| c.is_identifier())
                    .unwrap_or(false)
            })
        })
        .collect()
}

/// Union of datasets with equal structures.
pub fn union(
    engine: &dyn ProcessingEngine,
    operands: Vec<DatasetExpression>,
    span: Span,
) -> EvalResult<DatasetExpression> {
    if operands.is_empty() {
        return Err(EvalError::invalid_argument("union needs at least one dataset", span));
    }
    engine.execute_union(&operands).map(|d| d.at(span))
}
