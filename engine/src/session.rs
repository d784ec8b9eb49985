//! A thin host: the variable table and a statement runner.
//!
//! The evaluator never names or stores its results; the session binds each
//! assignment in its [`VariableTable`]. Dataset results are materialized at
//! assignment time so later statements read plain data.

use indexmap::IndexMap;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use crate::ast::{Program, Statement};
use crate::config::EngineOptions;
use crate::engine::{InMemoryEngine, ProcessingEngine};
use crate::error::{EvalResult, SessionError, SessionResult};
use crate::evaluator::{Binding, Environment, Evaluator};
use crate::model::{Dataset, EmptyBindings, Expression, Value};
use crate::validation;

/// Name → scalar, dataset or ruleset.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    bindings: IndexMap<String, Binding>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.bindings.insert(name.into(), binding)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Bound names, in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Environment for VariableTable {
    fn binding(&self, name: &str) -> Option<&Binding> {
        self.get(name)
    }
}

/// Runs statements against one processing engine.
pub struct Session {
    options: EngineOptions,
    engine: Box<dyn ProcessingEngine>,
    variables: VariableTable,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Session on the in-memory engine with default options.
    pub fn new() -> Self {
        Self {
            options: EngineOptions::default(),
            engine: Box::new(InMemoryEngine::new()),
            variables: VariableTable::new(),
        }
    }

    pub fn with_options(options: EngineOptions) -> SessionResult<Self> {
        let engine = options.create_engine()?;
        debug!(
            "session on {} engine (median accuracy {})",
            engine.name(),
            options.median_accuracy
        );
        Ok(Self {
            options,
            engine,
            variables: VariableTable::new(),
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn engine(&self) -> &dyn ProcessingEngine {
        self.engine.as_ref()
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn bind_dataset(&mut self, name: impl Into<String>, dataset: Dataset) {
        self.variables.insert(name, Binding::Dataset(Arc::new(dataset)));
    }

    pub fn bind_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name, Binding::scalar(value.into()));
    }

    /// Execute one statement and bind its result.
    pub fn execute(&mut self, statement: &Statement) -> EvalResult<()> {
        let (name, binding) = match statement {
            Statement::Assignment { name, expr } => {
                let evaluator = Evaluator::new(self.engine.as_ref(), &self.variables)
                    .with_validation_output(self.options.default_validation_output);
                let binding = match evaluator.evaluate(expr)? {
                    Expression::Scalar(scalar) => Binding::Scalar {
                        value: scalar.evaluate(&EmptyBindings)?,
                        value_type: scalar.value_type().clone(),
                    },
                    Expression::Dataset(dataset) => Binding::Dataset(dataset.resolve()?),
                };
                (name, binding)
            }
            Statement::DefineDatapointRuleset {
                name,
                variables,
                rules,
                span,
            } => {
                let ruleset = validation::define_datapoint_ruleset(
                    self.engine.as_ref(),
                    name,
                    variables,
                    rules,
                    *span,
                )?;
                (name, Binding::Ruleset(Arc::new(ruleset)))
            }
        };
        match &binding {
            Binding::Dataset(dataset) => info!(
                "{} := dataset ({} column(s), {} row(s))",
                name,
                dataset.structure().len(),
                dataset.len()
            ),
            Binding::Scalar { value, .. } => info!("{} := {}", name, value),
            Binding::Ruleset(ruleset) => {
                info!("{} := ruleset ({} rule(s))", name, ruleset.rules.len())
            }
        }
        self.variables.insert(name.clone(), binding);
        Ok(())
    }

    /// Execute statements in order, stopping at the first failure.
    ///
    /// Errors report the 1-based index of the failing statement.
    pub fn run(&mut self, statements: &[Statement]) -> SessionResult<()> {
        for (index, statement) in statements.iter().enumerate() {
            self.execute(statement)
                .map_err(|source| SessionError::Statement {
                    index: index + 1,
                    source,
                })?;
        }
        Ok(())
    }

    /// Load the program's datasets (paths relative to `base_dir`) and run it.
    pub fn run_program(&mut self, program: &Program, base_dir: &Path) -> SessionResult<()> {
        for (name, source) in &program.datasets {
            let dataset = source.load(name, base_dir)?;
            info!("loaded {} ({} row(s))", name, dataset.len());
            self.bind_dataset(name.clone(), dataset);
        }
        self.run(&program.statements)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.variables.get(name)
    }

    pub fn dataset(&self, name: &str) -> SessionResult<Arc<Dataset>> {
        match self.variables.get(name) {
            Some(Binding::Dataset(dataset)) => Ok(dataset.clone()),
            _ => Err(SessionError::UnknownVariable(name.to_string())),
        }
    }

    pub fn value(&self, name: &str) -> SessionResult<Value> {
        match self.variables.get(name) {
            Some(Binding::Scalar { value, .. }) => Ok(value.clone()),
            _ => Err(SessionError::UnknownVariable(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ArithmeticOp, Clause, ComparisonOp, Expr};
    use crate::error::EvalError;
    use crate::fixtures;

    fn assign(name: &str, expr: Expr) -> Statement {
        Statement::Assignment {
            name: name.to_string(),
            expr,
        }
    }

    #[test]
    fn test_scalar_assignment() {
        let mut session = Session::new();
        session.bind_value("a", 6i64);
        session
            .execute(&assign(
                "b",
                Expr::arithmetic(ArithmeticOp::Div, Expr::var("a"), Expr::constant(3i64)),
            ))
            .unwrap();
        assert_eq!(session.value("b").unwrap(), Value::Float64(2.0));
    }

    #[test]
    fn test_dataset_assignment_is_materialized() {
        let mut session = Session::new();
        session.bind_dataset("ds1", fixtures::ds1());
        session
            .execute(&assign(
                "res",
                Expr::clause(
                    Expr::var("ds1"),
                    Clause::Filter {
                        condition: Expr::comparison(ComparisonOp::Gt, Expr::var("long1"), Expr::constant(25i64)),
                    },
                ),
            ))
            .unwrap();
        assert_eq!(session.dataset("res").unwrap().len(), 2);
        assert_eq!(session.variables().names().collect::<Vec<_>>(), vec!["ds1", "res"]);
    }

    #[test]
    fn test_run_reports_statement_index() {
        let mut session = Session::new();
        let err = session
            .run(&[assign("a", Expr::constant(1i64)), assign("b", Expr::var("missing"))])
            .unwrap_err();
        match err {
            SessionError::Statement { index, source } => {
                assert_eq!(index, 2);
                assert!(matches!(source, EvalError::UndefinedVariable { .. }));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(session.value("a").unwrap(), Value::Int64(1));
    }

    #[test]
    fn test_unknown_variable() {
        let session = Session::new();
        assert!(matches!(session.dataset("nope"), Err(SessionError::UnknownVariable(_))));
    }
}
