//! Nested transactions over a single connection.
//!
//! Most databases only offer flat transactions. A [`Node`] lets code open a
//! transaction without knowing whether its caller already did: the first
//! `begin` opens a real transaction, later ones only push a savepoint, and
//! the real transaction ends when the outermost level commits or rolls back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Node                              │
//! │   (Idle | Active: real tx + depth/commit counters + stack)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ Connection/ │       │  Savepoint  │       │ NodeConfig  │
//!  │ Transaction │       │    Namer    │       │ + TxOptions │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use nestedtx::driver::Queryer;
//! use nestedtx::memory::MemoryDb;
//! use nestedtx::transaction::{Node, NodeConfig, TxOptions};
//!
//! let db = MemoryDb::new();
//! let mut conn = db.connect();
//! conn.exec("CREATE TABLE t (id INT)", &[]).unwrap();
//!
//! let mut node = Node::with_config(conn, NodeConfig::new().savepoints(true)).unwrap();
//! node.begin(TxOptions::default()).unwrap();
//! node.exec("INSERT INTO t VALUES (1)", &[]).unwrap();
//!
//! // Inner scope: undone on its own.
//! node.begin_default().unwrap();
//! node.exec("INSERT INTO t VALUES (2)", &[]).unwrap();
//! node.rollback().unwrap();
//!
//! node.commit().unwrap();
//! assert_eq!(db.table_rows("t").unwrap().len(), 1);
//! ```

mod config;
mod error;
mod isolation;
mod node;

pub use config::{supports_savepoints, NodeConfig, SAVEPOINT_DIALECTS};
pub use error::{TransactionError, TransactionResult};
pub use isolation::{IsolationLevel, TxOptions};
pub use node::{Node, TransactionInfo};
