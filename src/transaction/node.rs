//! The nested-transaction node.
//!
//! A [`Node`] owns one connection and turns nested `begin`/`commit`/`rollback`
//! calls into a single real transaction plus a stack of savepoints:
//!
//! ```text
//!  begin    ── Idle? ──yes──► open real tx ─┐
//!                 └──no───────────────────── ┴─► depth += 1, SAVEPOINT
//!
//!  commit   ── commits += 1 ── depth == commits? ──yes──► COMMIT, Idle
//!                                     └──no──► SAVEPOINT
//!
//!  rollback ── depth -= 1 ──── depth == commits? ──yes──► ROLLBACK, Idle
//!                                     └──no──► ROLLBACK TO <top>, pop
//! ```
//!
//! Savepoint statements are only issued when the node was built with
//! [`NodeConfig::savepoints`] enabled.

use std::fmt;
use std::mem;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::driver::{Connection, ExecResult, Prepared, Queryer, Rows, Transaction};
use crate::savepoint::{SavepointName, SavepointNamer, UlidNamer};
use crate::transaction::config::NodeConfig;
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::isolation::TxOptions;

/// Snapshot of the open transaction, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionInfo {
    /// Logical nesting depth.
    pub depth: usize,
    /// Logical commits seen at the current depth.
    pub commits: usize,
    /// Savepoints currently on the stack, oldest first.
    pub savepoints: Vec<SavepointName>,
    /// Options the real transaction was opened with.
    pub options: TxOptions,
    /// When the real transaction was opened.
    pub started_at: DateTime<Utc>,
}

enum State<T> {
    Idle,
    Active(ActiveTx<T>),
}

struct ActiveTx<T> {
    tx: T,
    savepoints: Vec<SavepointName>,
    depth: usize,
    commits: usize,
    options: TxOptions,
    started_at: DateTime<Utc>,
}

impl<T> ActiveTx<T> {
    fn new(tx: T, options: TxOptions) -> Self {
        Self {
            tx,
            savepoints: Vec::new(),
            depth: 0,
            commits: 0,
            options,
            started_at: Utc::now(),
        }
    }
}

/// A connection with emulated nested transactions.
///
/// `begin` returns the node itself as the nested handle, so calls compose
/// naturally: code that opens "its own" transaction works the same whether
/// or not a caller already opened one.
///
/// The node implements [`Queryer`]; statements go to the open transaction
/// when there is one and to the raw connection otherwise.
pub struct Node<C: Connection, N = UlidNamer> {
    conn: C,
    state: State<C::Transaction>,
    savepoints_enabled: bool,
    namer: N,
}

impl<C: Connection> Node<C, UlidNamer> {
    /// Wrap a connection with the default configuration (savepoints off).
    ///
    /// Nesting is still counted, but inner rollbacks are no-ops: only the
    /// outermost commit or rollback has any effect on the database.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            state: State::Idle,
            savepoints_enabled: false,
            namer: UlidNamer::new(),
        }
    }

    /// Wrap a connection, checking `config` against its driver.
    pub fn with_config(conn: C, config: NodeConfig) -> TransactionResult<Self, C::Error> {
        Self::with_namer(conn, config, UlidNamer::new())
    }
}

impl<C: Connection, N: SavepointNamer> Node<C, N> {
    /// Wrap a connection with a custom savepoint namer.
    pub fn with_namer(conn: C, config: NodeConfig, namer: N) -> TransactionResult<Self, C::Error> {
        if let Some(option) = config.incompatibility(conn.driver_name()) {
            return Err(TransactionError::incompatible(option, conn.driver_name()));
        }
        Ok(Self {
            conn,
            state: State::Idle,
            savepoints_enabled: config.savepoints,
            namer,
        })
    }

    /// Begin a (possibly nested) transaction.
    ///
    /// Only the outermost call opens a real transaction, so only its
    /// `options` take effect. If the savepoint cannot be created the level is
    /// not opened, and a real transaction opened by this call is rolled back.
    pub fn begin(&mut self, options: TxOptions) -> TransactionResult<&mut Self, C::Error> {
        if let State::Idle = self.state {
            let tx = self.conn.begin(&options)?;
            log::debug!("opened transaction ({})", options.isolation);
            self.state = State::Active(ActiveTx::new(tx, options));
        }

        let State::Active(active) = &mut self.state else {
            return Err(TransactionError::NotInTransaction);
        };
        active.depth += 1;

        if self.savepoints_enabled {
            let name = self.namer.next_name();
            if let Err(e) = active.tx.exec(&name.create_sql(), &[]) {
                active.depth -= 1;
                if active.depth == 0 {
                    if let Some(active) = self.take_active() {
                        if let Err(rollback_err) = active.tx.rollback() {
                            log::warn!("rollback after failed savepoint failed: {}", rollback_err);
                        }
                    }
                }
                return Err(e.into());
            }
            log::debug!("begin at depth {}: savepoint {}", active.depth, name);
            active.savepoints.push(name);
        } else {
            log::debug!("begin at depth {}", active.depth);
        }
        Ok(self)
    }

    /// Begin with default options.
    pub fn begin_default(&mut self) -> TransactionResult<&mut Self, C::Error> {
        self.begin(TxOptions::default())
    }

    /// Commit the current nesting level.
    ///
    /// The real transaction is committed once every level that was begun
    /// has been committed. A failed partial commit leaves the level open.
    pub fn commit(&mut self) -> TransactionResult<(), C::Error> {
        let State::Active(active) = &mut self.state else {
            return Err(TransactionError::NotInTransaction);
        };
        active.commits += 1;

        if active.commits < active.depth {
            if self.savepoints_enabled {
                let name = self.namer.next_name();
                if let Err(e) = active.tx.exec(&name.create_sql(), &[]) {
                    active.commits -= 1;
                    return Err(e.into());
                }
                log::debug!("partial commit {}/{}: savepoint {}", active.commits, active.depth, name);
                active.savepoints.push(name);
            } else {
                log::debug!("partial commit {}/{}", active.commits, active.depth);
            }
            return Ok(());
        }

        if let Some(active) = self.take_active() {
            log::debug!("committing transaction");
            active.tx.commit()?;
        }
        Ok(())
    }

    /// Roll back the current nesting level.
    ///
    /// Inner levels roll back to their savepoint; the outermost level rolls
    /// back the real transaction. Does nothing when no transaction is open.
    pub fn rollback(&mut self) -> TransactionResult<(), C::Error> {
        let State::Active(active) = &mut self.state else {
            log::debug!("rollback with no open transaction ignored");
            return Ok(());
        };
        active.depth = active.depth.saturating_sub(1);

        if active.depth > active.commits {
            if !self.savepoints_enabled {
                log::warn!(
                    "rollback at depth {} cannot undo work without savepoints",
                    active.depth + 1
                );
                return Ok(());
            }
            match active.savepoints.last().cloned() {
                Some(name) => {
                    active.tx.exec(&name.rollback_sql(), &[])?;
                    log::debug!("rolled back to savepoint {}", name);
                    active.savepoints.pop();
                }
                None => log::warn!("rollback at depth {} has no savepoint", active.depth + 1),
            }
            return Ok(());
        }

        if let Some(active) = self.take_active() {
            log::debug!("rolling back transaction");
            active.tx.rollback()?;
        }
        Ok(())
    }

    /// Run `f` inside a nested transaction.
    ///
    /// Commits if `f` succeeds and rolls back if it fails. A failed rollback
    /// is logged and the error from `f` is returned.
    pub fn with_transaction<F, T, E>(&mut self, options: TxOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<TransactionError<C::Error>>,
    {
        self.begin(options)?;

        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    log::warn!("rollback after failed transaction body failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Close the connection, rolling back any open transaction first.
    pub fn close(mut self) -> TransactionResult<(), C::Error> {
        if let Some(active) = self.take_active() {
            log::warn!("closing with an open transaction at depth {}; rolling back", active.depth);
            active.tx.rollback()?;
        }
        self.conn.close()?;
        Ok(())
    }
}

impl<C: Connection, N> Node<C, N> {
    pub fn in_transaction(&self) -> bool {
        matches!(self.state, State::Active(_))
    }

    /// Current nesting depth; zero when idle.
    pub fn depth(&self) -> usize {
        match &self.state {
            State::Active(active) => active.depth,
            State::Idle => 0,
        }
    }

    pub fn savepoints_enabled(&self) -> bool {
        self.savepoints_enabled
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// The open transaction handle, if any.
    pub fn tx(&self) -> Option<&C::Transaction> {
        match &self.state {
            State::Active(active) => Some(&active.tx),
            State::Idle => None,
        }
    }

    pub fn tx_mut(&mut self) -> Option<&mut C::Transaction> {
        match &mut self.state {
            State::Active(active) => Some(&mut active.tx),
            State::Idle => None,
        }
    }

    pub fn info(&self) -> Option<TransactionInfo> {
        match &self.state {
            State::Active(active) => Some(TransactionInfo {
                depth: active.depth,
                commits: active.commits,
                savepoints: active.savepoints.clone(),
                options: active.options,
                started_at: active.started_at,
            }),
            State::Idle => None,
        }
    }

    fn take_active(&mut self) -> Option<ActiveTx<C::Transaction>> {
        match mem::replace(&mut self.state, State::Idle) {
            State::Active(active) => Some(active),
            State::Idle => None,
        }
    }
}

impl<C: Connection, N> Queryer for Node<C, N> {
    type Error = C::Error;

    fn driver_name(&self) -> &str {
        self.conn.driver_name()
    }

    fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, C::Error> {
        match &mut self.state {
            State::Active(active) => active.tx.exec(sql, args),
            State::Idle => self.conn.exec(sql, args),
        }
    }

    fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, C::Error> {
        match &mut self.state {
            State::Active(active) => active.tx.query(sql, args),
            State::Idle => self.conn.query(sql, args),
        }
    }

    fn prepare(&mut self, sql: &str) -> Result<Prepared, C::Error> {
        match &mut self.state {
            State::Active(active) => active.tx.prepare(sql),
            State::Idle => self.conn.prepare(sql),
        }
    }
}

impl<C: Connection, N> fmt::Debug for Node<C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("driver", &self.conn.driver_name())
            .field("in_transaction", &self.in_transaction())
            .field("depth", &self.depth())
            .field("savepoints_enabled", &self.savepoints_enabled)
            .finish()
    }
}
