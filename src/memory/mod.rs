//! In-memory reference driver.
//!
//! Implements the [`driver`](crate::driver) traits over plain in-process
//! tables with real flat transactions and savepoints. Statements are parsed
//! with `sqlparser` and logged, so tests can assert exactly what a
//! [`Node`](crate::transaction::Node) issued.
//!
//! ```
//! use nestedtx::driver::Queryer;
//! use nestedtx::memory::MemoryDb;
//!
//! let db = MemoryDb::new();
//! let mut conn = db.connect();
//! conn.exec("CREATE TABLE users (id TEXT, name TEXT)", &[]).unwrap();
//! conn.exec("INSERT INTO users VALUES ('1', 'Alice')", &[]).unwrap();
//! assert_eq!(db.table_rows("users").unwrap().len(), 1);
//! ```

mod connection;
mod error;
mod sql;
mod store;

pub use connection::{MemoryConnection, MemoryDb, MemoryStats, MemoryTransaction};
pub use error::{MemoryError, MemoryResult};
