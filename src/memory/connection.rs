//! Shared in-memory database, its connections and transactions.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::error::{MemoryError, MemoryResult};
use super::sql::{self, Command};
use super::store::{Outcome, Tables};
use crate::driver::{count_placeholders, Connection, ExecResult, Prepared, Queryer, Row, Rows, Transaction};
use crate::transaction::TxOptions;

/// Statement counters derived from the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Real transactions opened.
    pub begins: usize,
    /// Real commits attempted.
    pub commits: usize,
    /// Real rollbacks attempted (not counting `ROLLBACK TO`).
    pub rollbacks: usize,
    /// Every statement issued, transaction control included.
    pub statements: usize,
}

/// An in-process database with flat transactions and savepoints.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Clone)]
pub struct MemoryDb {
    inner: Arc<MemoryDbInner>,
}

struct MemoryDbInner {
    driver_name: String,
    tables: RwLock<Tables>,
    log: Mutex<Vec<String>>,
    /// One-shot failures keyed by uppercase statement prefix.
    failures: Mutex<Vec<String>>,
}

impl MemoryDb {
    /// Create an empty database reporting driver name `"memory"`.
    pub fn new() -> Self {
        Self::with_driver_name("memory")
    }

    /// Create an empty database reporting a custom driver name.
    pub fn with_driver_name(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryDbInner {
                driver_name: name.into(),
                tables: RwLock::new(Tables::default()),
                log: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Open a connection.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection { db: self.clone() }
    }

    pub fn driver_name(&self) -> &str {
        &self.inner.driver_name
    }

    /// Every statement issued so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.inner.log.lock().clone()
    }

    pub fn clear_log(&self) {
        self.inner.log.lock().clear();
    }

    pub fn stats(&self) -> MemoryStats {
        let log = self.inner.log.lock();
        let mut stats = MemoryStats {
            statements: log.len(),
            ..Default::default()
        };
        for stmt in log.iter() {
            match stmt.as_str() {
                "COMMIT" => stats.commits += 1,
                "ROLLBACK" => stats.rollbacks += 1,
                s if s.starts_with("BEGIN") => stats.begins += 1,
                _ => {}
            }
        }
        stats
    }

    /// Make the next statement starting with `prefix` fail.
    ///
    /// The prefix is matched case-insensitively; `"BEGIN"`, `"COMMIT"` and
    /// `"ROLLBACK"` cover the real transaction control issued by handles.
    pub fn fail_on(&self, prefix: impl Into<String>) {
        self.inner
            .failures
            .lock()
            .push(prefix.into().to_ascii_uppercase());
    }

    /// Committed rows of a table, or `None` if it does not exist.
    pub fn table_rows(&self, table: &str) -> Option<Vec<Row>> {
        self.inner.tables.read().get(table).map(|t| t.rows.clone())
    }

    /// Committed table names.
    pub fn table_names(&self) -> Vec<String> {
        self.inner.tables.read().names()
    }

    /// Log a statement, then fail it if a failure was planted for it.
    fn record(&self, sql: &str) -> MemoryResult<()> {
        self.inner.log.lock().push(sql.to_string());

        let upper = sql.trim_start().to_ascii_uppercase();
        let mut failures = self.inner.failures.lock();
        if let Some(pos) = failures.iter().position(|p| upper.starts_with(p.as_str())) {
            failures.remove(pos);
            return Err(MemoryError::Injected(sql.to_string()));
        }
        Ok(())
    }

    fn snapshot(&self) -> Tables {
        self.inner.tables.read().clone()
    }

    fn publish(&self, tables: Tables) {
        *self.inner.tables.write() = tables;
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDb")
            .field("driver_name", &self.inner.driver_name)
            .field("tables", &self.table_names())
            .finish()
    }
}

fn begin_sql(options: &TxOptions) -> String {
    let mut sql = String::from("BEGIN");
    if let Some(level) = options.isolation.sql_name() {
        sql.push_str(" ISOLATION LEVEL ");
        sql.push_str(level);
    }
    if options.read_only {
        sql.push_str(" READ ONLY");
    }
    sql
}

fn into_exec(outcome: Outcome) -> ExecResult {
    match outcome {
        Outcome::Modified(result) => result,
        Outcome::Rows(_) => ExecResult::default(),
    }
}

fn into_rows(outcome: Outcome) -> Rows {
    match outcome {
        Outcome::Rows(rows) => rows,
        Outcome::Modified(_) => Rows::default(),
    }
}

/// A connection to a [`MemoryDb`]. Statements outside a transaction
/// autocommit.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    db: MemoryDb,
}

impl MemoryConnection {
    pub fn db(&self) -> &MemoryDb {
        &self.db
    }

    fn run(&mut self, sql: &str, args: &[Value]) -> MemoryResult<Outcome> {
        self.db.record(sql)?;
        let command = sql::parse(sql)?;
        self.db.inner.tables.write().execute(&command, args)
    }
}

impl Queryer for MemoryConnection {
    type Error = MemoryError;

    fn driver_name(&self) -> &str {
        self.db.driver_name()
    }

    fn exec(&mut self, sql: &str, args: &[Value]) -> MemoryResult<ExecResult> {
        self.run(sql, args).map(into_exec)
    }

    fn query(&mut self, sql: &str, args: &[Value]) -> MemoryResult<Rows> {
        self.run(sql, args).map(into_rows)
    }

    fn prepare(&mut self, sql: &str) -> MemoryResult<Prepared> {
        sql::parse(sql)?;
        Ok(Prepared::new(sql, count_placeholders(sql)))
    }
}

impl Connection for MemoryConnection {
    type Transaction = MemoryTransaction;

    fn begin(&mut self, options: &TxOptions) -> MemoryResult<MemoryTransaction> {
        self.db.record(&begin_sql(options))?;
        Ok(MemoryTransaction {
            db: self.db.clone(),
            options: *options,
            working: self.db.snapshot(),
            savepoints: Vec::new(),
        })
    }

    fn close(self) -> MemoryResult<()> {
        Ok(())
    }
}

/// An open transaction on a [`MemoryDb`].
///
/// Works on a private copy of the tables; savepoints snapshot that copy.
/// Commit publishes the copy, replacing the committed state.
#[derive(Debug)]
pub struct MemoryTransaction {
    db: MemoryDb,
    options: TxOptions,
    working: Tables,
    savepoints: Vec<(String, Tables)>,
}

impl MemoryTransaction {
    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    /// Names of the savepoints currently defined, oldest first.
    pub fn savepoint_names(&self) -> Vec<String> {
        self.savepoints.iter().map(|(name, _)| name.clone()).collect()
    }

    fn find_savepoint(&self, name: &str) -> MemoryResult<usize> {
        self.savepoints
            .iter()
            .rposition(|(n, _)| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| MemoryError::SavepointNotFound(name.to_string()))
    }

    fn run(&mut self, sql: &str, args: &[Value]) -> MemoryResult<Outcome> {
        self.db.record(sql)?;
        let command = sql::parse(sql)?;

        match command {
            Command::Savepoint(name) => {
                self.savepoints.push((name, self.working.clone()));
            }
            Command::RollbackTo(name) => {
                let pos = self.find_savepoint(&name)?;
                // The savepoint itself survives; later ones are destroyed.
                self.savepoints.truncate(pos + 1);
                self.working = self.savepoints[pos].1.clone();
            }
            Command::Release(name) => {
                let pos = self.find_savepoint(&name)?;
                self.savepoints.truncate(pos);
            }
            command => {
                if self.options.read_only && command.is_write() {
                    return Err(MemoryError::ReadOnly(sql.to_string()));
                }
                return self.working.execute(&command, args);
            }
        }
        Ok(Outcome::Modified(ExecResult::default()))
    }
}

impl Queryer for MemoryTransaction {
    type Error = MemoryError;

    fn driver_name(&self) -> &str {
        self.db.driver_name()
    }

    fn exec(&mut self, sql: &str, args: &[Value]) -> MemoryResult<ExecResult> {
        self.run(sql, args).map(into_exec)
    }

    fn query(&mut self, sql: &str, args: &[Value]) -> MemoryResult<Rows> {
        self.run(sql, args).map(into_rows)
    }

    fn prepare(&mut self, sql: &str) -> MemoryResult<Prepared> {
        sql::parse(sql)?;
        Ok(Prepared::new(sql, count_placeholders(sql)))
    }
}

impl Transaction for MemoryTransaction {
    fn commit(self) -> MemoryResult<()> {
        self.db.record("COMMIT")?;
        self.db.publish(self.working);
        Ok(())
    }

    fn rollback(self) -> MemoryResult<()> {
        self.db.record("ROLLBACK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::IsolationLevel;
    use serde_json::json;

    fn setup() -> (MemoryDb, MemoryConnection) {
        let db = MemoryDb::new();
        let mut conn = db.connect();
        conn.exec("CREATE TABLE t1 (id TEXT)", &[]).unwrap();
        db.clear_log();
        (db, conn)
    }

    fn ids(db: &MemoryDb) -> Vec<Value> {
        db.table_rows("t1")
            .unwrap()
            .into_iter()
            .map(|r| r["id"].clone())
            .collect()
    }

    #[test]
    fn test_autocommit() {
        let (db, mut conn) = setup();
        let result = conn.exec("INSERT INTO t1 (id) VALUES (?)", &[json!("a")]).unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(ids(&db), vec![json!("a")]);
    }

    #[test]
    fn test_commit_publishes() {
        let (db, mut conn) = setup();
        let mut tx = conn.begin(&TxOptions::default()).unwrap();
        tx.exec("INSERT INTO t1 (id) VALUES ('a')", &[]).unwrap();

        // Not visible outside until commit.
        assert!(ids(&db).is_empty());
        assert_eq!(tx.query("SELECT * FROM t1", &[]).unwrap().len(), 1);

        tx.commit().unwrap();
        assert_eq!(ids(&db), vec![json!("a")]);
        assert_eq!(db.stats().commits, 1);
    }

    #[test]
    fn test_rollback_discards() {
        let (db, mut conn) = setup();
        let mut tx = conn.begin(&TxOptions::default()).unwrap();
        tx.exec("INSERT INTO t1 (id) VALUES ('a')", &[]).unwrap();
        tx.rollback().unwrap();
        assert!(ids(&db).is_empty());
        assert_eq!(db.stats().rollbacks, 1);
    }

    #[test]
    fn test_savepoints() {
        let (db, mut conn) = setup();
        let mut tx = conn.begin(&TxOptions::default()).unwrap();
        tx.exec("INSERT INTO t1 (id) VALUES ('a')", &[]).unwrap();
        tx.exec("SAVEPOINT s1", &[]).unwrap();
        tx.exec("INSERT INTO t1 (id) VALUES ('b')", &[]).unwrap();
        tx.exec("SAVEPOINT s2", &[]).unwrap();
        tx.exec("INSERT INTO t1 (id) VALUES ('c')", &[]).unwrap();

        tx.exec("ROLLBACK TO SAVEPOINT s1", &[]).unwrap();
        assert_eq!(tx.savepoint_names(), vec!["s1".to_string()]);
        assert_eq!(tx.query("SELECT * FROM t1", &[]).unwrap().len(), 1);

        assert!(matches!(
            tx.exec("ROLLBACK TO SAVEPOINT s2", &[]),
            Err(MemoryError::SavepointNotFound(_))
        ));

        tx.exec("RELEASE SAVEPOINT s1", &[]).unwrap();
        assert!(tx.savepoint_names().is_empty());

        tx.commit().unwrap();
        assert_eq!(ids(&db), vec![json!("a")]);
    }

    #[test]
    fn test_begin_logs_options() {
        let (db, mut conn) = setup();
        let opts = TxOptions::new()
            .isolation(IsolationLevel::Serializable)
            .read_only(true);
        let tx = conn.begin(&opts).unwrap();
        tx.rollback().unwrap();
        assert_eq!(
            db.statements(),
            vec![
                "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY".to_string(),
                "ROLLBACK".to_string(),
            ]
        );
        assert_eq!(db.stats().begins, 1);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let (_db, mut conn) = setup();
        let mut tx = conn.begin(&TxOptions::new().read_only(true)).unwrap();
        assert!(tx.query("SELECT * FROM t1", &[]).is_ok());
        assert!(matches!(
            tx.exec("INSERT INTO t1 (id) VALUES ('a')", &[]),
            Err(MemoryError::ReadOnly(_))
        ));
        tx.exec("SAVEPOINT s1", &[]).unwrap();
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let (db, mut conn) = setup();
        db.fail_on("insert");
        let err = conn.exec("INSERT INTO t1 (id) VALUES ('a')", &[]).unwrap_err();
        assert!(err.is_injected());
        conn.exec("INSERT INTO t1 (id) VALUES ('a')", &[]).unwrap();
        assert_eq!(ids(&db), vec![json!("a")]);
    }

    #[test]
    fn test_failed_commit_publishes_nothing() {
        let (db, mut conn) = setup();
        db.fail_on("COMMIT");
        let mut tx = conn.begin(&TxOptions::default()).unwrap();
        tx.exec("INSERT INTO t1 (id) VALUES ('a')", &[]).unwrap();
        assert!(tx.commit().unwrap_err().is_injected());
        assert!(ids(&db).is_empty());
    }

    #[test]
    fn test_prepare_counts_placeholders() {
        let (db, mut conn) = setup();
        let stmt = conn.prepare("INSERT INTO t1 (id) VALUES (?)").unwrap();
        assert_eq!(stmt.param_count(), 1);
        conn.exec_prepared(&stmt, &[json!("p")]).unwrap();
        assert!(conn.exec_prepared(&stmt, &[]).is_err());
        assert_eq!(ids(&db), vec![json!("p")]);

        assert!(conn.prepare("SELEKT").is_err());
    }

    #[test]
    fn test_savepoint_outside_transaction() {
        let (_db, mut conn) = setup();
        assert!(matches!(
            conn.exec("SAVEPOINT s1", &[]),
            Err(MemoryError::NoTransaction)
        ));
    }
}
