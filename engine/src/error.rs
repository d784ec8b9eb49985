//! Error types for the SDTL engine.
//!
//! Errors are layered the same way the crate is:
//!
//! - [`EvalError`] - expression evaluation, clause planning and backend errors
//! - [`LoadError`] - dataset loading errors (CSV, JSON)
//! - [`SessionError`] - top-level statement execution errors
//!
//! Every [`EvalError`] carries the [`Span`] of the construct that raised it so
//! the host can point at the offending script text. Conversion between layers
//! is automatic via `From` implementations, allowing `?` to work across error
//! boundaries.

use thiserror::Error;

use crate::model::Span;

// =============================================================================
// Evaluation Errors
// =============================================================================

/// Errors raised while evaluating expressions or executing dataset operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    /// Operand or argument type does not match the expected type.
    #[error("invalid type {found}, expected {expected}")]
    InvalidType {
        found: String,
        expected: String,
        span: Span,
    },

    /// Heterogeneous list literal.
    #[error("conflicting types: {}", types.join(", "))]
    ConflictingTypes { types: Vec<String>, span: Span },

    /// Domain violation: negative sqrt, duplicate rename target, bad digits...
    #[error("{message}")]
    InvalidArgument { message: String, span: Span },

    /// No registered signature matches the call's argument types.
    #[error("function '{signature}' not found")]
    FunctionNotFound { signature: String, span: Span },

    #[error("undefined variable {name}")]
    UndefinedVariable { name: String, span: Span },

    #[error("column {column} not found in {dataset}")]
    ColumnNotFound {
        column: String,
        dataset: String,
        span: Span,
    },

    /// Dataset structures that must agree do not.
    #[error("incompatible structure: {message}")]
    IncompatibleStructure { message: String, span: Span },

    /// Ruleset definition inconsistencies.
    #[error("{message}")]
    InvalidRuleset { message: String, span: Span },

    /// Broken engine invariant. Not a user error.
    #[error("internal error: {message}")]
    Internal { message: String, span: Span },
}

impl EvalError {
    pub fn invalid_type(found: impl ToString, expected: impl ToString, span: Span) -> Self {
        EvalError::InvalidType {
            found: found.to_string(),
            expected: expected.to_string(),
            span,
        }
    }

    pub fn invalid_argument(message: impl Into<String>, span: Span) -> Self {
        EvalError::InvalidArgument {
            message: message.into(),
            span,
        }
    }

    pub fn duplicate_column(name: &str, span: Span) -> Self {
        Self::invalid_argument(format!("duplicate column: {}", name), span)
    }

    pub fn column_not_found(column: &str, dataset: &str, span: Span) -> Self {
        EvalError::ColumnNotFound {
            column: column.to_string(),
            dataset: dataset.to_string(),
            span,
        }
    }

    pub fn incompatible(message: impl Into<String>, span: Span) -> Self {
        EvalError::IncompatibleStructure {
            message: message.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>, span: Span) -> Self {
        EvalError::Internal {
            message: message.into(),
            span,
        }
    }

    /// Source position of the construct that raised the error.
    pub fn span(&self) -> Span {
        match self {
            EvalError::InvalidType { span, .. }
            | EvalError::ConflictingTypes { span, .. }
            | EvalError::InvalidArgument { span, .. }
            | EvalError::FunctionNotFound { span, .. }
            | EvalError::UndefinedVariable { span, .. }
            | EvalError::ColumnNotFound { span, .. }
            | EvalError::IncompatibleStructure { span, .. }
            | EvalError::InvalidRuleset { span, .. }
            | EvalError::Internal { span, .. } => *span,
        }
    }

    /// Attach a span to errors raised without positional context.
    pub fn or_span(mut self, fallback: Span) -> Self {
        if self.span() == Span::default() {
            match &mut self {
                EvalError::InvalidType { span, .. }
                | EvalError::ConflictingTypes { span, .. }
                | EvalError::InvalidArgument { span, .. }
                | EvalError::FunctionNotFound { span, .. }
                | EvalError::UndefinedVariable { span, .. }
                | EvalError::ColumnNotFound { span, .. }
                | EvalError::IncompatibleStructure { span, .. }
                | EvalError::InvalidRuleset { span, .. }
                | EvalError::Internal { span, .. } => *span = fallback,
            }
        }
        self
    }

    /// Whether the error signals an engine bug rather than a script error.
    pub fn is_internal(&self) -> bool {
        matches!(self, EvalError::Internal { .. })
    }
}

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while turning external input into a typed [`crate::model::Dataset`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode content: {0}")]
    Encoding(String),

    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV file is empty")]
    EmptyFile,

    #[error("Missing column '{0}' in CSV header")]
    MissingColumn(String),

    /// A cell or JSON value could not be read as its column type.
    #[error("Line {line}, column '{column}' (value '{value}'): {message}")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
        message: String,
    },

    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Dataset '{0}' has neither a CSV path nor inline rows")]
    NoSource(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Structure(#[from] EvalError),
}

// =============================================================================
// Session Errors
// =============================================================================

/// Top-level errors surfaced by [`crate::session::Session`] and the CLI.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A statement failed to evaluate.
    #[error("statement {index}: {source}")]
    Statement {
        index: usize,
        #[source]
        source: EvalError,
    },

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown processing engine: {0}")]
    UnknownEngine(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type EvalResult<T> = Result<T, EvalError>;
pub type LoadResult<T> = Result<T, LoadError>;
pub type SessionResult<T> = Result<T, SessionError>;
