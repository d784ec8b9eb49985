//! # SDTL - statistical dataset transformation engine
//!
//! Evaluates the typed parse tree of a dataset transformation and validation
//! language: scalar expressions with three-valued null logic, structural
//! clauses over datasets, window functions and datapoint-ruleset validation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │  ast::Expr  │────▶│  Evaluator  │────▶│   Planner   │────▶│ ProcessingEngine │
//! │ (JSON tree) │     │ (typed exp) │     │ (clauses)   │     │ (memory, ...)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │ Validation  │
//!                                         │ (rulesets)  │
//!                                         └─────────────┘
//! ```
//!
//! Results are lazy [`DatasetExpression`]s and [`ResolvableExpression`]s;
//! the [`Session`] host materializes and binds them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sdtl::{Program, Session};
//!
//! let mut session = Session::new();
//! session.run_program(&Program::example(), std::path::Path::new("."))?;
//! println!("{} rows", session.dataset("res")?.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types with source spans
//! - [`model`] - Types, values, structures, datasets and expressions
//! - [`ast`] - Parse-tree contract
//! - [`evaluator`] - Expression evaluator and function registry
//! - [`planner`] - Clause planner, joins and union
//! - [`validation`] - Datapoint rulesets and `check`
//! - [`engine`] - Processing-engine contract and backends
//! - [`loader`] - CSV and JSON dataset loading
//! - [`session`] - Variable table and statement runner
//! - [`config`] - Options from the environment
//! - [`logs`] - Stderr logger for the CLI

// Core modules
pub mod error;
pub mod model;

// Parse tree
pub mod ast;

// Evaluation
pub mod evaluator;
pub mod planner;
pub mod validation;

// Backends
pub mod engine;

// Host
pub mod config;
pub mod loader;
pub mod logs;
pub mod session;

#[cfg(test)]
pub(crate) mod fixtures;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{EvalError, EvalResult, LoadError, LoadResult, SessionError, SessionResult};

// =============================================================================
// Re-exports - Model
// =============================================================================

pub use model::{
    AggregateFunction, AggregationExpression, AnalyticFunction, Component, DataPointRuleset,
    DataStructure, Dataset, DatasetExpression, Expression, Order, ResolvableExpression, Role,
    Span, ValidationOutput, Value, ValueType, Window, WindowFrame,
};

// =============================================================================
// Re-exports - Parse tree
// =============================================================================

pub use ast::{Clause, Expr, ExprKind, Program, Statement};

// =============================================================================
// Re-exports - Evaluation
// =============================================================================

pub use evaluator::{Binding, Environment, Evaluator, FunctionRegistry, FunctionSignature, REGISTRY};
pub use planner::ClausePlanner;

// =============================================================================
// Re-exports - Backends
// =============================================================================

pub use engine::{create_engine, InMemoryEngine, ProcessingEngine, RecordingEngine, ENGINE_NAMES};

// =============================================================================
// Re-exports - Host
// =============================================================================

pub use config::EngineOptions;
pub use loader::{parse_bytes_auto, parse_csv, parse_csv_file_auto, DatasetSource};
pub use session::{Session, VariableTable};
