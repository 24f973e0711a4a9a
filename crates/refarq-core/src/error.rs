//! Error types for refarq
//!
//! Every failure surfaced by evaluation, parsing or loading maps onto one
//! variant of [`Error`].

use thiserror::Error;

/// The main error type for refarq operations
#[derive(Error, Debug)]
pub enum Error {
    // ========== Evaluation Errors ==========
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Query execution error: {0}")]
    QueryExecution(String),

    #[error("Unsupported aggregator: {0}")]
    UnsupportedAggregator(String),

    #[error("Procedure not found: {0}")]
    ProcedureNotFound(String),

    #[error("Invalid procedure arguments: {0}")]
    InvalidProcedureArgs(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Expression evaluation error: {0}")]
    ExpressionEval(String),

    #[error("Evaluation exceeded maximum depth of {0}")]
    RecursionLimit(usize),

    // ========== Parsing and Loading Errors ==========
    #[error("Query parse error: {0}")]
    QueryParse(String),

    #[error("Data load error at line {line}: {message}")]
    DataLoad { line: usize, message: String },

    // ========== Serialization Errors ==========
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ========== IO Errors ==========
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Configuration Errors ==========
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for refarq operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for an expression evaluation error
    pub fn expr<S: Into<String>>(message: S) -> Self {
        Error::ExpressionEval(message.into())
    }

    /// Returns true if this error came from evaluating an expression.
    ///
    /// Filters and assignments absorb these; everything else aborts the query.
    pub fn is_expression_error(&self) -> bool {
        matches!(self, Error::ExpressionEval(_))
    }

    /// Returns true if the evaluator declared no semantics for the request
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedOperator(_) | Error::UnsupportedAggregator(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
