//! Column structure of a dataset.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::expression::Span;
use super::types::ValueType;
use crate::error::{EvalError, EvalResult};

/// Role of a column in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Part of the natural key (joins, grouping, union de-duplication).
    Identifier,
    #[default]
    Measure,
    Attribute,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Identifier => write!(f, "identifier"),
            Role::Measure => write!(f, "measure"),
            Role::Attribute => write!(f, "attribute"),
        }
    }
}

/// A named, typed column with a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub role: Role,
}

impl Component {
    pub fn new(name: impl Into<String>, value_type: ValueType, role: Role) -> Self {
        Self {
            name: name.into(),
            value_type,
            role,
        }
    }

    pub fn identifier(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, value_type, Role::Identifier)
    }

    pub fn measure(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, value_type, Role::Measure)
    }

    pub fn is_identifier(&self) -> bool {
        self.role == Role::Identifier
    }

    /// Same component under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// Ordered name → component mapping. Insertion order is output column order.
#[derive(Debug, Clone, Default)]
pub struct DataStructure {
    components: IndexMap<String, Component>,
}

impl DataStructure {
    /// Build a structure, rejecting duplicate names.
    pub fn new(components: impl IntoIterator<Item = Component>) -> EvalResult<Self> {
        let mut structure = Self::default();
        for component in components {
            structure.insert(component)?;
        }
        Ok(structure)
    }

    /// Append a component; the name must be new.
    pub fn insert(&mut self, component: Component) -> EvalResult<()> {
        if self.components.contains_key(&component.name) {
            return Err(EvalError::duplicate_column(&component.name, Span::default()));
        }
        self.components.insert(component.name.clone(), component);
        Ok(())
    }

    /// Replace a component in place, or append it when the name is new.
    pub fn upsert(&mut self, component: Component) {
        self.components.insert(component.name.clone(), component);
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.components.get_index_of(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &Component> {
        self.components().filter(|c| c.is_identifier())
    }

    pub fn identifier_names(&self) -> Vec<String> {
        self.identifiers().map(|c| c.name.clone()).collect()
    }

    /// Non-identifier components.
    pub fn measures(&self) -> impl Iterator<Item = &Component> {
        self.components().filter(|c| c.role == Role::Measure)
    }

    /// Look a column up, reporting `dataset` in the error.
    pub fn require(&self, name: &str, dataset: &str, span: Span) -> EvalResult<&Component> {
        self.get(name)
            .ok_or_else(|| EvalError::column_not_found(name, dataset, span))
    }
}

// Order matters: IndexMap equality alone ignores it.
impl PartialEq for DataStructure {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.components().eq(other.components())
    }
}

impl Serialize for DataStructure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.components())
    }
}

impl<'de> Deserialize<'de> for DataStructure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let components = Vec::<Component>::deserialize(deserializer)?;
        DataStructure::new(components).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for DataStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.components().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", c.name, c.value_type)?;
            if c.role != Role::Measure {
                write!(f, "({})", c.role)?;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataStructure {
        DataStructure::new(vec![
            Component::identifier("id", ValueType::String),
            Component::measure("a", ValueType::Int64),
            Component::measure("b", ValueType::Float64),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = DataStructure::new(vec![
            Component::measure("a", ValueType::Int64),
            Component::measure("a", ValueType::String),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "duplicate column: a");
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut s = sample();
        s.upsert(Component::measure("a", ValueType::String));
        s.upsert(Component::measure("c", ValueType::Boolean));
        let names: Vec<_> = s.names().collect();
        assert_eq!(names, vec!["id", "a", "b", "c"]);
        assert_eq!(s.get("a").unwrap().value_type, ValueType::String);
    }

    #[test]
    fn test_equality_is_ordered() {
        let a = sample();
        let b = DataStructure::new(vec![
            Component::identifier("id", ValueType::String),
            Component::measure("b", ValueType::Float64),
            Component::measure("a", ValueType::Int64),
        ])
        .unwrap();
        assert_ne!(a, b);
        assert_eq!(a, sample());
    }

    #[test]
    fn test_json_shape() {
        let s: DataStructure = serde_json::from_value(serde_json::json!([
            {"name": "id", "type": "string", "role": "identifier"},
            {"name": "x", "type": "int64"}
        ]))
        .unwrap();
        assert_eq!(s.identifier_names(), vec!["id"]);
        assert_eq!(s.get("x").unwrap().role, Role::Measure);
        assert_eq!(s.to_string(), "{id:String(identifier), x:Long}");
    }
}
