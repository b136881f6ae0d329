//! Memory driver error types.

use thiserror::Error;

use crate::driver::QueryError;

/// Result type for memory driver operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised by the in-memory driver.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unsupported statement: {0}")]
    Unsupported(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("column not found: {table}.{column}")]
    ColumnNotFound { table: String, column: String },

    #[error("INSERT has {got} value(s) for {expected} column(s)")]
    ValueCount { expected: usize, got: usize },

    #[error("no argument for placeholder {0}")]
    MissingPlaceholder(usize),

    #[error("savepoint statements require an open transaction")]
    NoTransaction,

    #[error("savepoint does not exist: {0}")]
    SavepointNotFound(String),

    #[error("cannot execute {0} in a read-only transaction")]
    ReadOnly(String),

    /// Failure planted with `MemoryDb::fail_on`.
    #[error("injected failure: {0}")]
    Injected(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl MemoryError {
    /// Check if this failure was planted by a test.
    pub fn is_injected(&self) -> bool {
        matches!(self, MemoryError::Injected(_))
    }
}

impl From<sqlparser::parser::ParserError> for MemoryError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        MemoryError::Syntax(e.to_string())
    }
}
