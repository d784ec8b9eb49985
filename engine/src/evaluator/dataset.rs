//! Dataset-valued constructs: membership, clauses, joins, union, validation.

use super::{dataset_label, Binding, Evaluator};
use crate::ast::{Clause, Expr, JoinKind, JoinOperand};
use crate::error::{EvalError, EvalResult};
use crate::model::{DatasetExpression, Span, ValidationOutput};
use crate::planner::{self, ClausePlanner};
use crate::validation;

impl<'a> Evaluator<'a> {
    /// `ds#component`: identifiers plus the named component.
    pub(super) fn membership(
        &self,
        dataset: &Expr,
        component: &str,
        span: Span,
    ) -> EvalResult<DatasetExpression> {
        let label = dataset_label(dataset);
        let dataset = self.dataset(dataset)?;
        let structure = dataset.structure();
        let target = structure.require(component, &label, span)?;
        let mut columns: Vec<String> = structure.identifier_names();
        if !target.is_identifier() {
            columns.push(component.to_string());
        }
        self.engine.execute_project(&dataset, &columns).map(|d| d.at(span))
    }

    pub(super) fn clause(
        &self,
        dataset: &Expr,
        clause: &Clause,
        span: Span,
    ) -> EvalResult<DatasetExpression> {
        let label = dataset_label(dataset);
        let dataset = self.dataset(dataset)?;
        ClausePlanner::new(self.engine, dataset, label).plan(clause, span)
    }

    pub(super) fn join(
        &self,
        kind: JoinKind,
        operands: &[JoinOperand],
        using: Option<&[String]>,
        span: Span,
    ) -> EvalResult<DatasetExpression> {
        self.environment(span)?;
        let operands = operands
            .iter()
            .enumerate()
            .map(|(i, operand)| {
                let alias = operand
                    .alias
                    .clone()
                    .or_else(|| operand.expr.as_variable().map(str::to_string))
                    .unwrap_or_else(|| format!("ds{}", i + 1));
                Ok((alias, self.dataset(&operand.expr)?))
            })
            .collect::<EvalResult<Vec<_>>>()?;
        planner::join(self.engine, kind, operands, using, span)
    }

    pub(super) fn union(&self, operands: &[Expr], span: Span) -> EvalResult<DatasetExpression> {
        self.environment(span)?;
        let operands = operands
            .iter()
            .map(|o| self.dataset(o))
            .collect::<EvalResult<Vec<_>>>()?;
        planner::union(self.engine, operands, span)
    }

    pub(super) fn check_datapoint(
        &self,
        dataset: &Expr,
        ruleset: &str,
        output: Option<ValidationOutput>,
        span: Span,
    ) -> EvalResult<DatasetExpression> {
        let environment = self.environment(span)?;
        let ruleset = match environment.binding(ruleset) {
            Some(Binding::Ruleset(ruleset)) => ruleset.clone(),
            Some(other) => {
                return Err(EvalError::invalid_type(other.kind(), "Ruleset", span));
            }
            None => {
                return Err(EvalError::UndefinedVariable {
                    name: ruleset.to_string(),
                    span,
                })
            }
        };
        let label = dataset_label(dataset);
        let dataset = self.dataset(dataset)?;
        validation::check_datapoint(
            self.engine,
            &dataset,
            &label,
            &ruleset,
            output.unwrap_or(self.validation_output),
            span,
        )
    }

    pub(super) fn check(
        &self,
        operand: &Expr,
        error_code: Option<&Expr>,
        error_level: Option<&Expr>,
        imbalance: Option<&Expr>,
        output: Option<ValidationOutput>,
        span: Span,
    ) -> EvalResult<DatasetExpression> {
        self.environment(span)?;
        let dataset = self.dataset(operand)?;
        let error_code = error_code.map(|e| self.scalar(e)).transpose()?;
        let error_level = error_level.map(|e| self.scalar(e)).transpose()?;
        let imbalance = imbalance.map(|e| self.dataset(e)).transpose()?;
        validation::check(
            self.engine,
            &dataset,
            error_code,
            error_level,
            imbalance,
            output.unwrap_or(ValidationOutput::All),
            span,
        )
    }
}
