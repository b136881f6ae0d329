//! Errors raised by the provided `Queryer` helpers.

use thiserror::Error;

/// Result type for argument binding and row decoding.
pub type QueryResult<T> = Result<T, QueryError>;

/// Failures that happen on our side of the driver boundary.
///
/// Driver error types implement `From<QueryError>` so the helpers can surface
/// these through the driver's own error type.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A `:name` parameter in the query has no value in the argument map.
    #[error("missing named argument: {0}")]
    MissingArgument(String),

    /// A prepared statement was executed with the wrong number of arguments.
    #[error("expected {expected} argument(s), got {got}")]
    ArgumentCount { expected: usize, got: usize },

    /// `query_row`/`get` found an empty result.
    #[error("no rows in result set")]
    NoRows,

    /// Named arguments must come from a JSON object or a struct.
    #[error("named arguments must serialize to an object, got {0}")]
    NotAnObject(&'static str),

    /// A row could not be converted into the requested type.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = QueryError::ArgumentCount { expected: 2, got: 1 };
        assert_eq!(err.to_string(), "expected 2 argument(s), got 1");
    }
}
