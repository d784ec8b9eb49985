//! Clause Planner
//!
//! Maps each structural clause to processing-engine calls:
//!
//! ```text
//!   keep / drop ──▶ execute_project        (structure order preserved)
//!   calc        ──▶ execute_<analytic> per window item (scratch column),
//!                   one batched execute_calc, then a project dropping
//!                   the scratch columns
//!   filter      ──▶ execute_filter
//!   rename      ──▶ execute_rename
//!   aggregate   ──▶ execute_calc (inline operands) ──▶ execute_aggr
//! ```
//!
//! Item bodies are compiled by an [`Evaluator`] in structure scope, so
//! column names resolve against the dataset the clause applies to.

mod analytics;
mod join;

use indexmap::IndexMap;
use log::debug;
use std::collections::HashSet;

use crate::ast::{AggregateItem, CalcItem, Clause, Expr, ExprKind, Grouping, RenameItem};
use crate::engine::ProcessingEngine;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{type_check, Evaluator};
use crate::model::{AggregationExpression, DatasetExpression, ResolvableExpression, Role, Span};

pub use join::{join, union};

/// Applies clauses to one dataset operand.
pub struct ClausePlanner<'a> {
    engine: &'a dyn ProcessingEngine,
    dataset: DatasetExpression,
    /// Operand name used in error messages.
    label: String,
}

impl<'a> ClausePlanner<'a> {
    pub fn new(
        engine: &'a dyn ProcessingEngine,
        dataset: DatasetExpression,
        label: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            dataset,
            label: label.into(),
        }
    }

    pub fn plan(self, clause: &Clause, span: Span) -> EvalResult<DatasetExpression> {
        let result = match clause {
            Clause::Keep { columns } => self.project(columns, true, span),
            Clause::Drop { columns } => self.project(columns, false, span),
            Clause::Calc { items } => self.calc(items, span),
            Clause::Filter { condition } => self.filter(condition),
            Clause::Rename { items } => self.rename(items, span),
            Clause::Aggregate { items, grouping } => self.aggregate(items, grouping.as_ref(), span),
        }?;
        Ok(result.at(span))
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::for_structure(self.engine, self.dataset.structure(), &self.label)
    }

    // =========================================================================
    // keep / drop
    // =========================================================================

    fn project(&self, columns: &[String], keep: bool, span: Span) -> EvalResult<DatasetExpression> {
        let structure = self.dataset.structure();
        for column in columns {
            structure.require(column, &self.label, span)?;
        }
        let requested: HashSet<&str> = columns.iter().map(String::as_str).collect();
        let kept: Vec<String> = structure
            .names()
            .filter(|name| requested.contains(name) == keep)
            .map(str::to_string)
            .collect();
        self.engine.execute_project(&self.dataset, &kept)
    }

    // =========================================================================
    // calc
    // =========================================================================

    fn calc(&self, items: &[CalcItem], span: Span) -> EvalResult<DatasetExpression> {
        let mut names = HashSet::new();
        for item in items {
            if !names.insert(item.name.as_str()) {
                return Err(EvalError::duplicate_column(&item.name, item.expr.span.or(span)));
            }
        }

        // Window items land in scratch columns first, so every item of the
        // clause reads the input row.
        let mut current = self.dataset.clone();
        let mut scratch: IndexMap<&str, String> = IndexMap::new();
        for item in items {
            if let ExprKind::Analytic { .. } = item.expr.kind {
                let column = format!("{}#window", item.name);
                current = analytics::apply(self.engine, &current, &self.label, item, &column)?;
                scratch.insert(item.name.as_str(), column);
            }
        }

        let evaluator = self.evaluator();
        let mut expressions = IndexMap::new();
        let mut roles = IndexMap::new();
        let mut sources = IndexMap::new();
        for item in items {
            let expr = match scratch.get(item.name.as_str()) {
                Some(column) => {
                    let value_type = current
                        .structure()
                        .get(column)
                        .map(|c| c.value_type.clone())
                        .ok_or_else(|| EvalError::internal(format!("missing {}", column), item.expr.span))?;
                    ResolvableExpression::column(column.clone(), value_type, item.expr.span)
                }
                None => {
                    let expr = evaluator.scalar(&item.expr)?;
                    if !expr.value_type().is_scalar() {
                        return Err(EvalError::invalid_type(expr.value_type(), "a scalar", item.expr.span));
                    }
                    expr
                }
            };
            roles.insert(item.name.clone(), item.role.unwrap_or(Role::Measure));
            sources.insert(
                item.name.clone(),
                item.source.clone().unwrap_or_else(|| item.expr.to_string()),
            );
            expressions.insert(item.name.clone(), expr);
        }

        debug!(
            "calc on {}: {} item(s), {} window function(s)",
            self.label,
            expressions.len(),
            scratch.len()
        );
        let computed = self.engine.execute_calc(&current, &expressions, &roles, &sources)?;
        if scratch.is_empty() {
            return Ok(computed);
        }
        let kept: Vec<String> = computed
            .structure()
            .names()
            .filter(|name| !scratch.values().any(|column| column == name))
            .map(str::to_string)
            .collect();
        self.engine.execute_project(&computed, &kept)
    }

    // =========================================================================
    // filter / rename
    // =========================================================================

    fn filter(&self, condition: &Expr) -> EvalResult<DatasetExpression> {
        let predicate = type_check::assert_boolean(self.evaluator().scalar(condition)?)?;
        self.engine
            .execute_filter(&self.dataset, &predicate, &condition.to_string())
    }

    fn rename(&self, items: &[RenameItem], span: Span) -> EvalResult<DatasetExpression> {
        let structure = self.dataset.structure();
        let mut from_to = IndexMap::new();
        let mut targets = HashSet::new();
        for item in items {
            let item_span = item.span.or(span);
            structure.require(&item.from, &self.label, item_span)?;
            if !targets.insert(item.to.as_str()) {
                return Err(EvalError::duplicate_column(&item.to, item_span));
            }
            if from_to.insert(item.from.clone(), item.to.clone()).is_some() {
                return Err(EvalError::invalid_argument(
                    format!("column {} renamed twice", item.from),
                    item_span,
                ));
            }
        }
        self.engine.execute_rename(&self.dataset, &from_to)
    }

    // =========================================================================
    // aggregate
    // =========================================================================

    fn aggregate(
        &self,
        items: &[AggregateItem],
        grouping: Option<&Grouping>,
        span: Span,
    ) -> EvalResult<DatasetExpression> {
        let structure = self.dataset.structure();
        let group_by = self.group_columns(grouping, span)?;
        let mut seen: HashSet<&str> = group_by.iter().map(String::as_str).collect();
        for item in items {
            if !seen.insert(item.name.as_str()) {
                return Err(EvalError::duplicate_column(&item.name, item.span.or(span)));
            }
        }

        // Phase 1: inline operands become intermediate columns.
        let evaluator = self.evaluator();
        let mut expressions = IndexMap::new();
        let mut sources = IndexMap::new();
        let mut operand_columns: IndexMap<&str, String> = IndexMap::new();
        for item in items {
            let Some(operand) = &item.operand else {
                continue;
            };
            match operand.as_variable() {
                Some(column) => {
                    structure.require(column, &self.label, operand.span)?;
                    operand_columns.insert(item.name.as_str(), column.to_string());
                }
                None => {
                    let expr = evaluator.scalar(operand)?;
                    expressions.insert(item.name.clone(), expr);
                    sources.insert(
                        item.name.clone(),
                        item.source.clone().unwrap_or_else(|| operand.to_string()),
                    );
                    operand_columns.insert(item.name.as_str(), item.name.clone());
                }
            }
        }
        let materialized = if expressions.is_empty() {
            self.dataset.clone()
        } else {
            let roles = expressions.keys().map(|k| (k.clone(), Role::Measure)).collect();
            self.engine
                .execute_calc(&self.dataset, &expressions, &roles, &sources)?
        };

        // Phase 2: one aggregation per output alias.
        let mut aggregations = IndexMap::new();
        for item in items {
            let operand = match operand_columns.get(item.name.as_str()) {
                Some(column) => {
                    let component = materialized.structure().require(column, &self.label, item.span)?;
                    Some(ResolvableExpression::column(
                        column.clone(),
                        component.value_type.clone(),
                        item.span,
                    ))
                }
                None => None,
            };
            let aggregation = AggregationExpression::new(item.function, operand, item.span.or(span))?;
            aggregations.insert(item.name.clone(), aggregation);
        }
        debug!(
            "aggregate on {}: {} item(s) grouped by [{}]",
            self.label,
            aggregations.len(),
            group_by.join(", ")
        );
        let aggregated = self
            .engine
            .execute_aggr(&materialized, &group_by, &aggregations)?;

        // Declared non-measure roles are applied on the aggregated columns.
        let roles: IndexMap<String, Role> = items
            .iter()
            .filter_map(|item| match item.role {
                Some(role) if role != Role::Measure => Some((item.name.clone(), role)),
                _ => None,
            })
            .collect();
        if roles.is_empty() {
            return Ok(aggregated);
        }
        let expressions = roles
            .keys()
            .filter_map(|name| {
                aggregated.structure().get(name).map(|c| {
                    (
                        name.clone(),
                        ResolvableExpression::column(name.clone(), c.value_type.clone(), span),
                    )
                })
            })
            .collect();
        let sources = roles.keys().map(|k| (k.clone(), k.clone())).collect();
        self.engine.execute_calc(&aggregated, &expressions, &roles, &sources)
    }

    fn group_columns(&self, grouping: Option<&Grouping>, span: Span) -> EvalResult<Vec<String>> {
        let structure = self.dataset.structure();
        match grouping {
            None => Ok(Vec::new()),
            Some(Grouping::GroupBy { columns }) => {
                for column in columns {
                    structure.require(column, &self.label, span)?;
                }
                Ok(columns.clone())
            }
            Some(Grouping::GroupExcept { columns }) => {
                for column in columns {
                    structure.require(column, &self.label, span)?;
                }
                Ok(structure
                    .identifier_names()
                    .into_iter()
                    .filter(|name| !columns.contains(name))
                    .collect())
            }
        }
    }
}

trait SpanExt {
    fn or(self, fallback: Span) -> Span;
}

impl SpanExt for Span {
    /// `self`, unless it is the default (unknown) span.
    fn or(self, fallback: Span) -> Span {
        if self == Span::default() {
            fallback
        } else {
            self
        }
    }
}
