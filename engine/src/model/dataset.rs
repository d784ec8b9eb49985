//! Materialized datasets.

use indexmap::IndexMap;
use serde::Serialize;

use super::expression::{Bindings, Span};
use super::structure::{Component, DataStructure};
use super::types::Value;
use crate::error::{EvalError, EvalResult};

/// One row, aligned with the structure's column order.
pub type Row = Vec<Value>;

/// A structure plus rows whose values conform to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    structure: DataStructure,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset, checking row width and value types.
    ///
    /// `Int64` values in `Float64` columns are widened.
    pub fn new(structure: DataStructure, rows: Vec<Row>) -> EvalResult<Self> {
        let mut checked = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != structure.len() {
                return Err(EvalError::invalid_argument(
                    format!(
                        "row {} has {} values, expected {}",
                        index,
                        row.len(),
                        structure.len()
                    ),
                    Span::default(),
                ));
            }
            let row = row
                .into_iter()
                .zip(structure.components())
                .map(|(value, component)| {
                    value.conform(&component.value_type).map_err(|found| {
                        EvalError::invalid_type(found, &component.value_type, Span::default())
                    })
                })
                .collect::<EvalResult<Row>>()?;
            checked.push(row);
        }
        Ok(Self {
            structure,
            rows: checked,
        })
    }

    /// Convenience constructor from components and rows.
    pub fn from_rows(components: Vec<Component>, rows: Vec<Row>) -> EvalResult<Self> {
        Self::new(DataStructure::new(components)?, rows)
    }

    pub fn empty(structure: DataStructure) -> Self {
        Self {
            structure,
            rows: Vec::new(),
        }
    }

    /// Rows produced by a processing engine from already-typed values.
    pub(crate) fn from_parts(structure: DataStructure, rows: Vec<Row>) -> Self {
        Self { structure, rows }
    }

    pub fn structure(&self) -> &DataStructure {
        &self.structure
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at (row, column name).
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.structure.index_of(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.structure.index_of(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Row `index` as name → value bindings.
    pub fn row_bindings(&self, index: usize) -> Option<RowBindings<'_>> {
        self.rows
            .get(index)
            .map(|row| RowBindings::new(&self.structure, row))
    }

    /// Rows as ordered name → value maps.
    pub fn to_maps(&self) -> Vec<IndexMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.structure
                    .names()
                    .map(str::to_string)
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Rows re-ordered by the given columns, nulls first. Used to compare
    /// results whose row order is not part of the contract.
    pub fn sorted_by(&self, columns: &[&str]) -> Vec<Row> {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.structure.index_of(c))
            .collect();
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a[i].sort_cmp(&b[i]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }
}

/// A row seen through its structure.
#[derive(Debug, Clone, Copy)]
pub struct RowBindings<'a> {
    structure: &'a DataStructure,
    row: &'a [Value],
}

impl<'a> RowBindings<'a> {
    pub fn new(structure: &'a DataStructure, row: &'a [Value]) -> Self {
        Self { structure, row }
    }
}

impl Bindings for RowBindings<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        self.structure
            .index_of(name)
            .and_then(|index| self.row.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;

    fn components() -> Vec<Component> {
        vec![
            Component::identifier("id", ValueType::String),
            Component::measure("x", ValueType::Float64),
        ]
    }

    #[test]
    fn test_new_widens_and_checks() {
        let ds = Dataset::from_rows(
            components(),
            vec![vec!["a".into(), Value::Int64(2)], vec!["b".into(), Value::Null]],
        )
        .unwrap();
        assert_eq!(ds.get(0, "x"), Some(&Value::Float64(2.0)));
        assert_eq!(ds.get(1, "x"), Some(&Value::Null));

        let err = Dataset::from_rows(components(), vec![vec!["a".into(), "oops".into()]])
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid type String, expected Double");
    }

    #[test]
    fn test_row_width_checked() {
        let err = Dataset::from_rows(components(), vec![vec!["a".into()]]).unwrap_err();
        assert!(matches!(err, EvalError::InvalidArgument { .. }));
    }

    #[test]
    fn test_row_bindings() {
        let ds = Dataset::from_rows(components(), vec![vec!["a".into(), Value::Float64(1.5)]])
            .unwrap();
        let row = ds.row_bindings(0).unwrap();
        assert_eq!(row.get("x"), Some(&Value::Float64(1.5)));
        assert_eq!(row.get("nope"), None);
        assert_eq!(ds.to_maps()[0]["id"], Value::from("a"));
    }
}
