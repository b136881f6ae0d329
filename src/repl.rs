//! Interactive REPL driving a [`Node`] over the memory driver.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::driver::{Queryer, Rows};
use crate::memory::{MemoryConnection, MemoryDb, MemoryError};
use crate::transaction::{Node, NodeConfig, TransactionError};

/// Result type for REPL operations.
pub type ReplResult<T> = Result<T, ReplError>;

#[derive(Debug, Error)]
pub enum ReplError {
    #[error(transparent)]
    Transaction(#[from] TransactionError<MemoryError>),

    #[error(transparent)]
    Query(#[from] MemoryError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What a single input line produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Transaction control acknowledgement.
    Message(String),
    Modified(u64),
    Rows(Rows),
}

/// A node plus the database it runs on.
pub struct Session {
    db: MemoryDb,
    node: Node<MemoryConnection>,
}

impl Session {
    /// Start a session on a fresh in-memory database.
    pub fn new(config: NodeConfig) -> ReplResult<Self> {
        let db = MemoryDb::new();
        let node = Node::with_config(db.connect(), config)?;
        Ok(Self { db, node })
    }

    pub fn db(&self) -> &MemoryDb {
        &self.db
    }

    pub fn node(&self) -> &Node<MemoryConnection> {
        &self.node
    }

    /// Run one statement. `BEGIN`, `COMMIT` and `ROLLBACK` drive the node;
    /// anything else is sent to the driver.
    pub fn execute(&mut self, input: &str) -> ReplResult<Output> {
        let stmt = input.trim().trim_end_matches(';').trim();
        let keyword = stmt.to_ascii_uppercase();

        match keyword.as_str() {
            "BEGIN" | "START TRANSACTION" => {
                self.node.begin_default()?;
                Ok(Output::Message(format!("BEGIN (depth {})", self.node.depth())))
            }
            "COMMIT" | "END" => {
                self.node.commit()?;
                Ok(Output::Message(self.after_finish("COMMIT")))
            }
            "ROLLBACK" => {
                self.node.rollback()?;
                Ok(Output::Message(self.after_finish("ROLLBACK")))
            }
            _ if keyword.starts_with("SELECT") => Ok(Output::Rows(self.node.query(stmt, &[])?)),
            _ => Ok(Output::Modified(self.node.exec(stmt, &[])?.rows_affected)),
        }
    }

    /// Run every `;`-separated statement in `script`, stopping at the first
    /// failure.
    pub fn execute_script(&mut self, script: &str) -> ReplResult<Vec<Output>> {
        script
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| self.execute(s))
            .collect()
    }

    /// One-line description of the node's state.
    pub fn status(&self) -> String {
        match self.node.info() {
            Some(info) => format!(
                "in transaction: depth {}, commits {}, savepoints [{}], since {}",
                info.depth,
                info.commits,
                info.savepoints
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                info.started_at.format("%H:%M:%S"),
            ),
            None => "idle".to_string(),
        }
    }

    fn after_finish(&self, verb: &str) -> String {
        if self.node.in_transaction() {
            format!("{} (depth {})", verb, self.node.depth())
        } else {
            verb.to_string()
        }
    }
}

/// REPL configuration.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Prompt string.
    pub prompt: String,
    /// Max rows to display.
    pub max_rows: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "nestedtx".into(),
            max_rows: 100,
        }
    }
}

/// The interactive REPL.
pub struct Repl {
    session: Session,
    config: ReplConfig,
    history: Vec<String>,
}

impl Repl {
    pub fn new(session: Session) -> Self {
        Self::with_config(session, ReplConfig::default())
    }

    pub fn with_config(session: Session, config: ReplConfig) -> Self {
        Self {
            session,
            config,
            history: Vec::new(),
        }
    }

    /// Run the REPL interactively.
    pub fn run(&mut self) -> ReplResult<()> {
        println!("nestedtx v{}", env!("CARGO_PKG_VERSION"));
        println!("Type \\help for commands, or enter SQL statements.");
        println!();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("{}", self.prompt());
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                println!();
                break;
            }

            let cmd = line.trim();
            if cmd.is_empty() {
                continue;
            }
            self.history.push(cmd.to_string());

            if cmd.starts_with('\\') || cmd.starts_with('.') {
                if self.handle_command(cmd) {
                    break;
                }
                continue;
            }

            for stmt in cmd.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                match self.session.execute(stmt) {
                    Ok(output) => print_output(&output, self.config.max_rows),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }

        if self.session.node().in_transaction() {
            eprintln!("Warning: exiting with an open transaction; it will be rolled back");
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        match self.session.node().depth() {
            0 => format!("{}> ", self.config.prompt),
            depth => format!("{}*{}> ", self.config.prompt, depth),
        }
    }

    /// Returns true when the REPL should exit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        let cmd = cmd.trim_start_matches(&['.', '\\'][..]);
        match cmd.to_lowercase().as_str() {
            "help" | "h" | "?" => self.print_help(),
            "quit" | "exit" | "q" => return true,
            "status" | "s" => println!("{}", self.session.status()),
            "log" => {
                for (i, stmt) in self.session.db().statements().iter().enumerate() {
                    println!("  {}: {}", i + 1, stmt);
                }
            }
            "stats" => {
                let stats = self.session.db().stats();
                println!("Statement Statistics:");
                println!("  Begins: {}", stats.begins);
                println!("  Commits: {}", stats.commits);
                println!("  Rollbacks: {}", stats.rollbacks);
                println!("  Statements: {}", stats.statements);
            }
            "tables" | "dt" => {
                let tables = self.session.db().table_names();
                if tables.is_empty() {
                    println!("No tables found.");
                } else {
                    for table in tables {
                        println!("  {}", table);
                    }
                }
            }
            "history" => {
                for (i, cmd) in self.history.iter().enumerate() {
                    println!("  {}: {}", i + 1, cmd);
                }
            }
            other => {
                eprintln!("Unknown command: \\{}", other);
                eprintln!("Type \\help for available commands");
            }
        }
        false
    }

    fn print_help(&self) {
        println!("Commands:");
        println!("  \\help, \\h, \\?           Show this help message");
        println!("  \\quit, \\exit, \\q        Exit the REPL");
        println!("  \\status, \\s             Show transaction depth and savepoints");
        println!("  \\log                    Show every statement sent to the database");
        println!("  \\stats                  Show begin/commit/rollback counts");
        println!("  \\tables, \\dt            List committed tables");
        println!("  \\history                Show command history");
        println!();
        println!("Transaction control (nestable):");
        println!("  BEGIN / COMMIT / ROLLBACK");
        println!();
        println!("SQL Statements:");
        println!("  CREATE TABLE name (columns...)");
        println!("  DROP TABLE name");
        println!("  INSERT INTO table [(cols)] VALUES (vals)");
        println!("  SELECT cols FROM table [WHERE ...]");
        println!("  UPDATE table SET col=val [WHERE ...]");
        println!("  DELETE FROM table [WHERE ...]");
        println!();
    }
}

/// Print one statement's output to stdout.
pub fn print_output(output: &Output, max_rows: usize) {
    match output {
        Output::Message(message) => println!("{}", message),
        Output::Modified(rows) => println!("{} row(s) modified", rows),
        Output::Rows(rows) => print_rows(rows, max_rows),
    }
}

fn print_rows(rs: &Rows, max_rows: usize) {
    if rs.is_empty() {
        println!("(0 rows)");
        return;
    }

    let mut widths: Vec<usize> = rs.columns.iter().map(|c| c.len()).collect();
    for row in rs.iter() {
        for (i, col) in rs.columns.iter().enumerate() {
            if let Some(val) = row.get(col) {
                widths[i] = widths[i].max(format_value(val).len());
            }
        }
    }

    let header: Vec<String> = rs
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    println!("{}", header.join(" | "));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", sep.join("-+-"));

    let limit = rs.len().min(max_rows);
    for row in rs.iter().take(limit) {
        let values: Vec<String> = rs
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let val = row.get(col).map(format_value).unwrap_or_default();
                format!("{:width$}", val, width = widths[i])
            })
            .collect();
        println!("{}", values.join(" | "));
    }

    if rs.len() > limit {
        println!("... ({} more rows)", rs.len() - limit);
    }
    println!("({} rows)", rs.len());
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Session {
        let mut session = Session::new(NodeConfig::new().savepoints(true)).unwrap();
        session.execute("CREATE TABLE t (id INT)").unwrap();
        session
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&serde_json::Value::Null), "NULL");
        assert_eq!(format_value(&serde_json::json!(true)), "true");
        assert_eq!(format_value(&serde_json::json!(42)), "42");
        assert_eq!(format_value(&serde_json::json!("hello")), "hello");
    }

    #[test]
    fn test_transaction_keywords() {
        let mut session = setup();
        assert_eq!(
            session.execute("begin;").unwrap(),
            Output::Message("BEGIN (depth 1)".into())
        );
        assert_eq!(
            session.execute("BEGIN").unwrap(),
            Output::Message("BEGIN (depth 2)".into())
        );
        assert_eq!(
            session.execute("ROLLBACK").unwrap(),
            Output::Message("ROLLBACK (depth 1)".into())
        );
        assert_eq!(
            session.execute("COMMIT").unwrap(),
            Output::Message("COMMIT".into())
        );
        assert_eq!(session.status(), "idle");
    }

    #[test]
    fn test_script() {
        let mut session = setup();
        let outputs = session
            .execute_script(
                "BEGIN; INSERT INTO t VALUES (1); BEGIN; INSERT INTO t VALUES (2); \
                 ROLLBACK; COMMIT; SELECT * FROM t",
            )
            .unwrap();

        match outputs.last() {
            Some(Output::Rows(rows)) => assert_eq!(rows.len(), 1),
            other => panic!("expected rows, got {:?}", other),
        }
        assert_eq!(session.db().stats().commits, 1);
    }

    #[test]
    fn test_commit_without_begin() {
        let mut session = setup();
        let err = session.execute("COMMIT").unwrap_err();
        assert!(matches!(
            err,
            ReplError::Transaction(TransactionError::NotInTransaction)
        ));
    }

    #[test]
    fn test_status_in_transaction() {
        let mut session = setup();
        session.execute("BEGIN").unwrap();
        assert!(session.status().starts_with("in transaction: depth 1, commits 0"));
    }

    #[test]
    fn test_sql_errors_surface() {
        let mut session = setup();
        assert!(matches!(
            session.execute("SELECT * FROM missing"),
            Err(ReplError::Query(MemoryError::TableNotFound(_)))
        ));
    }
}
