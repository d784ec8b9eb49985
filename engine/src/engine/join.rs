//! N-ary joins, folded pairwise from the left.
//!
//! Output layout is `keys ++ non-keys of operand 1 ++ non-keys of operand 2 ...`.
//! Key columns take their components from the first operand; in a full join
//! an unmatched right row supplies its own key values.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::ast::JoinKind;
use crate::error::{EvalError, EvalResult};
use crate::model::{Component, DataStructure, Dataset, DatasetExpression, Row, Span, Value, ValueKey};

/// Column positions of one operand in the joined layout.
#[derive(Debug, Clone)]
pub(crate) struct JoinLayout {
    pub keys: Vec<usize>,
    pub others: Vec<usize>,
}

/// Output structure and per-operand layouts.
pub(crate) fn plan(
    kind: JoinKind,
    datasets: &IndexMap<String, DatasetExpression>,
    keys: &[String],
    span: Span,
) -> EvalResult<(DataStructure, Vec<JoinLayout>)> {
    let (first_alias, first) = datasets
        .first()
        .ok_or_else(|| EvalError::invalid_argument("join needs at least one dataset", span))?;
    let keys: &[String] = if kind == JoinKind::Cross { &[] } else { keys };

    let mut components: Vec<Component> = Vec::new();
    for key in keys {
        let component = first.structure().require(key, first_alias, span)?;
        components.push(component.clone());
    }

    let mut layouts = Vec::with_capacity(datasets.len());
    for (alias, dataset) in datasets {
        let structure = dataset.structure();
        let mut key_positions = Vec::with_capacity(keys.len());
        for (key, key_component) in keys.iter().zip(&components) {
            let component = structure.require(key, alias, span)?;
            if component.value_type != key_component.value_type {
                return Err(EvalError::incompatible(
                    format!(
                        "join key {} is {} in {} but {} in {}",
                        key, key_component.value_type, first_alias, component.value_type, alias
                    ),
                    span,
                ));
            }
            key_positions.push(structure.index_of(key).unwrap_or_default());
        }
        let mut others = Vec::new();
        for (index, component) in structure.components().enumerate() {
            if keys.contains(&component.name) {
                continue;
            }
            components.push(component.clone());
            others.push(index);
        }
        layouts.push(JoinLayout {
            keys: key_positions,
            others,
        });
    }

    let structure = DataStructure::new(components).map_err(|e| e.or_span(span))?;
    Ok((structure, layouts))
}

fn arrange(row: &Row, layout: &JoinLayout) -> Row {
    layout
        .keys
        .iter()
        .chain(&layout.others)
        .map(|&i| row[i].clone())
        .collect()
}

/// Key of an arranged row; `None` when any key is null (nulls never match).
fn key_of(row: &Row, width: usize) -> Option<Vec<ValueKey>> {
    let key = &row[..width];
    if key.iter().any(Value::is_null) {
        return None;
    }
    Some(key.iter().map(Value::key).collect())
}

/// Join materialized operands laid out by [`plan`].
pub(crate) fn rows(kind: JoinKind, inputs: &[std::sync::Arc<Dataset>], layouts: &[JoinLayout]) -> Vec<Row> {
    let Some(first) = inputs.first() else {
        return Vec::new();
    };
    let key_width = layouts[0].keys.len();
    let mut acc: Vec<Row> = first.rows().iter().map(|r| arrange(r, &layouts[0])).collect();
    let mut left_width = key_width + layouts[0].others.len();

    for (input, layout) in inputs.iter().zip(layouts).skip(1) {
        let right: Vec<Row> = input.rows().iter().map(|r| arrange(r, layout)).collect();
        let right_width = layout.others.len();

        acc = if kind == JoinKind::Cross {
            acc.iter()
                .flat_map(|l| right.iter().map(move |r| [l.as_slice(), r.as_slice()].concat()))
                .collect()
        } else {
            let mut index: HashMap<Vec<ValueKey>, Vec<usize>> = HashMap::new();
            for (j, r) in right.iter().enumerate() {
                if let Some(key) = key_of(r, key_width) {
                    index.entry(key).or_default().push(j);
                }
            }
            let mut matched = vec![false; right.len()];
            let mut out = Vec::new();
            for l in &acc {
                let hits = key_of(l, key_width).and_then(|k| index.get(&k));
                match hits {
                    Some(hits) => {
                        for &j in hits {
                            matched[j] = true;
                            out.push([l.as_slice(), &right[j][key_width..]].concat());
                        }
                    }
                    None if kind != JoinKind::Inner => {
                        let mut row = l.clone();
                        row.extend(std::iter::repeat(Value::Null).take(right_width));
                        out.push(row);
                    }
                    None => {}
                }
            }
            if kind == JoinKind::Full {
                for (r, _) in right.iter().zip(&matched).filter(|(_, m)| !**m) {
                    let mut row: Row = r[..key_width].to_vec();
                    row.extend(std::iter::repeat(Value::Null).take(left_width - key_width));
                    row.extend_from_slice(&r[key_width..]);
                    out.push(row);
                }
            }
            out
        };
        left_width += right_width;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;
    use std::sync::Arc;

    fn operand(measure: &str, rows: Vec<(&str, i64)>) -> Arc<Dataset> {
        Arc::new(
            Dataset::from_rows(
                vec![
                    Component::identifier("id", ValueType::String),
                    Component::measure(measure, ValueType::Int64),
                ],
                rows.into_iter().map(|(id, v)| vec![id.into(), v.into()]).collect(),
            )
            .unwrap(),
        )
    }

    fn datasets(inputs: &[Arc<Dataset>]) -> IndexMap<String, DatasetExpression> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, d)| (format!("ds{}", i + 1), DatasetExpression::of(d.clone(), Span::default())))
            .collect()
    }

    fn join(kind: JoinKind, inputs: &[Arc<Dataset>]) -> (DataStructure, Vec<Row>) {
        let (structure, layouts) = plan(kind, &datasets(inputs), &["id".to_string()], Span::default()).unwrap();
        (structure, rows(kind, inputs, &layouts))
    }

    #[test]
    fn test_inner_left_full() {
        let a = operand("x", vec![("a", 1), ("b", 2)]);
        let b = operand("y", vec![("b", 20), ("c", 30)]);

        let (structure, inner) = join(JoinKind::Inner, &[a.clone(), b.clone()]);
        assert_eq!(structure.names().collect::<Vec<_>>(), vec!["id", "x", "y"]);
        assert_eq!(inner, vec![vec![Value::from("b"), Value::Int64(2), Value::Int64(20)]]);

        let (_, left) = join(JoinKind::Left, &[a.clone(), b.clone()]);
        assert_eq!(left.len(), 2);
        assert_eq!(left[0], vec![Value::from("a"), Value::Int64(1), Value::Null]);

        let (_, full) = join(JoinKind::Full, &[a, b]);
        assert_eq!(full.len(), 3);
        assert_eq!(full[2], vec![Value::from("c"), Value::Null, Value::Int64(30)]);
    }

    #[test]
    fn test_duplicate_measure_rejected() {
        let a = operand("x", vec![("a", 1)]);
        let b = operand("x", vec![("a", 2)]);
        let err = plan(JoinKind::Inner, &datasets(&[a, b]), &["id".to_string()], Span::default()).unwrap_err();
        assert_eq!(err.to_string(), "duplicate column: x");
    }

    #[test]
    fn test_cross_join() {
        let a = Arc::new(
            Dataset::from_rows(
                vec![Component::measure("x", ValueType::Int64)],
                vec![vec![Value::Int64(1)], vec![Value::Int64(2)]],
            )
            .unwrap(),
        );
        let b = Arc::new(
            Dataset::from_rows(vec![Component::measure("y", ValueType::Int64)], vec![vec![Value::Int64(3)]])
                .unwrap(),
        );
        let (structure, layouts) = plan(JoinKind::Cross, &datasets(&[a.clone(), b.clone()]), &[], Span::default()).unwrap();
        assert_eq!(structure.len(), 2);
        let rows = rows(JoinKind::Cross, &[a, b], &layouts);
        assert_eq!(
            rows,
            vec![
                vec![Value::Int64(1), Value::Int64(3)],
                vec![Value::Int64(2), Value::Int64(3)]
            ]
        );
    }
}
