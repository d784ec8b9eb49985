//! Datapoint rulesets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::expression::{ResolvableExpression, Span};
use super::types::ValueType;
use crate::ast::Expr;

/// Which rows a validation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutput {
    /// Only failing rows, without the `bool_var` column.
    Invalid,
    /// Every row with its `bool_var`.
    All,
}

/// A named rule, kept in parse-tree form until applied to a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    /// Absent antecedent means the rule always applies.
    pub antecedent: Option<Expr>,
    pub consequent: Expr,
    pub error_code: Option<Expr>,
    pub error_level: Option<Expr>,
    pub span: Span,
}

/// A checked ruleset definition, ready to bind in the host.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPointRuleset {
    pub name: String,
    pub variables: Vec<String>,
    /// Dataset column name → rule-local name.
    pub alias: IndexMap<String, String>,
    pub rules: Vec<Rule>,
    pub error_code_type: ValueType,
    pub error_level_type: ValueType,
}

/// A rule compiled against the aliased dataset structure.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub antecedent: Option<ResolvableExpression>,
    pub consequent: ResolvableExpression,
    pub error_code: Option<ResolvableExpression>,
    pub error_level: Option<ResolvableExpression>,
}

/// What a processing engine needs to validate a dataset against a ruleset.
#[derive(Debug, Clone)]
pub struct CompiledRuleset {
    pub alias: IndexMap<String, String>,
    pub rules: Vec<CompiledRule>,
    pub error_code_type: ValueType,
    pub error_level_type: ValueType,
}
