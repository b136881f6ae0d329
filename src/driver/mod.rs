//! The queryable surface shared by connections and open transactions.
//!
//! A driver implements [`Queryer`] twice: once for its raw connection and once
//! for its transaction handle. The nested-transaction [`Node`] consumes these
//! traits and itself implements [`Queryer`], routing every call to whichever
//! handle is currently live.
//!
//! ```text
//!            ┌──────────────┐
//!            │   Queryer    │  exec / query / prepare / bind
//!            └──────────────┘
//!              ▲          ▲
//!   ┌──────────┴───┐  ┌───┴───────────┐
//!   │  Connection  │  │  Transaction  │
//!   │  begin/close │  │ commit/rollback│
//!   └──────────────┘  └───────────────┘
//! ```
//!
//! [`Node`]: crate::transaction::Node

mod bind;
mod error;
mod result;

pub use bind::{compile_named, count_placeholders, named_args, rebind, BindStyle, NamedArgs};
pub use error::{QueryError, QueryResult};
pub use result::{decode_row, ExecResult, Prepared, Row, Rows};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::transaction::TxOptions;

/// Operations available on both a raw connection and an open transaction.
pub trait Queryer {
    /// The driver's own error type. Statement failures are surfaced as-is.
    type Error: std::error::Error + From<QueryError> + 'static;

    /// Dialect/driver name, e.g. `"mysql"` or `"postgres"`.
    fn driver_name(&self) -> &str;

    /// Placeholder syntax the driver expects.
    fn bind_style(&self) -> BindStyle {
        BindStyle::for_driver(self.driver_name())
    }

    /// Execute a statement that does not return rows.
    fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Self::Error>;

    /// Execute a query and collect its rows.
    fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Self::Error>;

    /// Validate a statement for repeated execution.
    fn prepare(&mut self, sql: &str) -> Result<Prepared, Self::Error>;

    /// Execute a prepared statement.
    fn exec_prepared(&mut self, stmt: &Prepared, args: &[Value]) -> Result<ExecResult, Self::Error> {
        stmt.check_args(args)?;
        self.exec(stmt.sql(), args)
    }

    /// Run a prepared query.
    fn query_prepared(&mut self, stmt: &Prepared, args: &[Value]) -> Result<Rows, Self::Error> {
        stmt.check_args(args)?;
        self.query(stmt.sql(), args)
    }

    /// Rewrite `?` placeholders into this driver's bind style.
    fn rebind(&self, sql: &str) -> String {
        rebind(sql, self.bind_style())
    }

    /// Compile `:name` parameters into positional placeholders and values.
    fn bind_named(&self, sql: &str, args: &NamedArgs) -> Result<(String, Vec<Value>), Self::Error> {
        Ok(compile_named(sql, args, self.bind_style())?)
    }

    /// Execute a statement with named parameters.
    fn named_exec(&mut self, sql: &str, args: &NamedArgs) -> Result<ExecResult, Self::Error> {
        let (sql, values) = self.bind_named(sql, args)?;
        self.exec(&sql, &values)
    }

    /// Run a query with named parameters.
    fn named_query(&mut self, sql: &str, args: &NamedArgs) -> Result<Rows, Self::Error> {
        let (sql, values) = self.bind_named(sql, args)?;
        self.query(&sql, &values)
    }

    /// Return the first row of a query, or [`QueryError::NoRows`].
    fn query_row(&mut self, sql: &str, args: &[Value]) -> Result<Row, Self::Error> {
        let row = self.query(sql, args)?.into_iter().next();
        Ok(row.ok_or(QueryError::NoRows)?)
    }

    /// Decode the first row of a query into `T`.
    fn get<T: DeserializeOwned>(&mut self, sql: &str, args: &[Value]) -> Result<T, Self::Error>
    where
        Self: Sized,
    {
        let row = self.query_row(sql, args)?;
        Ok(decode_row(row)?)
    }

    /// Decode every row of a query into `T`.
    fn select<T: DeserializeOwned>(&mut self, sql: &str, args: &[Value]) -> Result<Vec<T>, Self::Error>
    where
        Self: Sized,
    {
        Ok(self.query(sql, args)?.decode()?)
    }
}

/// A raw session capable of opening flat transactions.
pub trait Connection: Queryer {
    /// The handle returned by [`Connection::begin`].
    type Transaction: Transaction<Error = Self::Error>;

    /// Open a real transaction.
    fn begin(&mut self, options: &TxOptions) -> Result<Self::Transaction, Self::Error>;

    /// Close the session.
    fn close(self) -> Result<(), Self::Error>
    where
        Self: Sized;
}

/// An open flat transaction.
///
/// Finishing consumes the handle: once `commit` or `rollback` has been
/// attempted the transaction is over, whatever the outcome.
pub trait Transaction: Queryer {
    fn commit(self) -> Result<(), Self::Error>;

    fn rollback(self) -> Result<(), Self::Error>;
}
