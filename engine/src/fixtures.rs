//! Shared test datasets.

use crate::model::{Component, Dataset, Value, ValueType};

/// `ds1{id, long1, double1, string1, bool1}` with four rows.
///
/// | id      | long1 | double1 | string1 | bool1 |
/// |---------|-------|---------|---------|-------|
/// | Toto    | 30    | 12.2    | toto    | true  |
/// | Hadrien | 10    | 1.1     | hadrien | false |
/// | Nico    | 20    | 2.2     | nico    | false |
/// | Franck  | 100   | -1.21   | franck  | true  |
pub fn ds1() -> Dataset {
    let rows = [
        ("Toto", 30, 12.2, "toto", true),
        ("Hadrien", 10, 1.1, "hadrien", false),
        ("Nico", 20, 2.2, "nico", false),
        ("Franck", 100, -1.21, "franck", true),
    ];
    Dataset::from_rows(
        vec![
            Component::identifier("id", ValueType::String),
            Component::measure("long1", ValueType::Int64),
            Component::measure("double1", ValueType::Float64),
            Component::measure("string1", ValueType::String),
            Component::measure("bool1", ValueType::Boolean),
        ],
        rows.iter()
            .map(|&(id, long1, double1, string1, bool1)| {
                vec![
                    Value::from(id),
                    Value::Int64(long1),
                    Value::Float64(double1),
                    Value::from(string1),
                    Value::Boolean(bool1),
                ]
            })
            .collect(),
    )
    .expect("valid fixture")
}
