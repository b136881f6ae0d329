//! nestedtx - nested transactions for flat-transaction databases
//!
//! Wraps a single database connection in a [`Node`](transaction::Node) that
//! accepts nested `begin`/`commit`/`rollback` calls. Only the outermost level
//! touches the real transaction; inner levels are emulated with savepoints
//! when the driver supports them.
//!
//! Drivers plug in through the traits in [`driver`]. The crate ships one
//! in-process driver, [`memory`], used by the tests and the `nestedtx` CLI.
//!
//! # Example
//!
//! ```
//! use nestedtx::driver::Queryer;
//! use nestedtx::memory::{MemoryDb, MemoryError};
//! use nestedtx::transaction::{Node, NodeConfig, TransactionError, TxOptions};
//!
//! let db = MemoryDb::new();
//! let mut conn = db.connect();
//! conn.exec("CREATE TABLE users (id TEXT, name TEXT)", &[]).unwrap();
//!
//! let mut node = Node::with_config(conn, NodeConfig::new().savepoints(true)).unwrap();
//! node.with_transaction(TxOptions::default(), |node| {
//!     node.exec("INSERT INTO users VALUES ('1', 'Alice')", &[])?;
//!     Ok::<_, TransactionError<MemoryError>>(())
//! })
//! .unwrap();
//! ```

pub mod driver;
pub mod memory;
pub mod repl;
pub mod savepoint;
pub mod transaction;
