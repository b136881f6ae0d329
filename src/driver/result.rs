//! Statement and query result types.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{QueryError, QueryResult};

/// A single result row, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Last generated id, for drivers that report one.
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub fn affected(rows: u64) -> Self {
        Self {
            rows_affected: rows,
            last_insert_id: None,
        }
    }
}

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rows {
    /// Column names in order.
    pub columns: Vec<String>,
    /// Rows as maps of column name to value.
    pub rows: Vec<Row>,
}

impl Rows {
    /// Create an empty result with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Add a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a row by index.
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Decode every row into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> QueryResult<Vec<T>> {
        self.rows.into_iter().map(decode_row).collect()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Decode one row into a `Deserialize` type, matching columns to fields.
pub fn decode_row<T: DeserializeOwned>(row: Row) -> QueryResult<T> {
    let object = Value::Object(row.into_iter().collect());
    serde_json::from_value(object).map_err(QueryError::from)
}

/// A statement the driver has validated and can execute repeatedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    sql: String,
    params: usize,
}

impl Prepared {
    pub fn new(sql: impl Into<String>, params: usize) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of positional placeholders in the statement.
    pub fn param_count(&self) -> usize {
        self.params
    }

    pub(crate) fn check_args(&self, args: &[Value]) -> QueryResult<()> {
        if args.len() != self.params {
            return Err(QueryError::ArgumentCount {
                expected: self.params,
                got: args.len(),
            });
        }
        Ok(())
    }
}
