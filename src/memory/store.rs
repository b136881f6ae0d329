//! Table storage and command execution for the memory driver.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use super::error::{MemoryError, MemoryResult};
use super::sql::{BinaryOp, Command, Expr};
use crate::driver::{ExecResult, Row, Rows};

/// What a command produced.
#[derive(Debug)]
pub(crate) enum Outcome {
    Modified(ExecResult),
    Rows(Rows),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    fn check_column(&self, table: &str, column: &str) -> MemoryResult<()> {
        if self.columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(MemoryError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }
}

/// A full set of tables. Cloned wholesale for transactions and savepoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Tables {
    tables: BTreeMap<String, Table>,
}

impl Tables {
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn table(&self, name: &str) -> MemoryResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| MemoryError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> MemoryResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| MemoryError::TableNotFound(name.to_string()))
    }

    /// Execute a data or schema command. Savepoint commands are handled by
    /// the transaction, not here.
    pub fn execute(&mut self, command: &Command, args: &[Value]) -> MemoryResult<Outcome> {
        match command {
            Command::CreateTable {
                name,
                columns,
                if_not_exists,
            } => {
                if self.tables.contains_key(name) {
                    if *if_not_exists {
                        return Ok(Outcome::Modified(ExecResult::affected(0)));
                    }
                    return Err(MemoryError::TableExists(name.clone()));
                }
                self.tables.insert(
                    name.clone(),
                    Table {
                        columns: columns.clone(),
                        rows: Vec::new(),
                    },
                );
                Ok(Outcome::Modified(ExecResult::affected(0)))
            }

            Command::DropTable { name, if_exists } => {
                if self.tables.remove(name).is_none() && !*if_exists {
                    return Err(MemoryError::TableNotFound(name.clone()));
                }
                Ok(Outcome::Modified(ExecResult::affected(0)))
            }

            Command::Insert {
                table,
                columns,
                rows,
            } => {
                let target = self.table_mut(table)?;
                let columns = columns.clone().unwrap_or_else(|| target.columns.clone());
                for column in &columns {
                    target.check_column(table, column)?;
                }

                let empty = Row::new();
                let mut inserted = Vec::with_capacity(rows.len());
                for values in rows {
                    if values.len() != columns.len() {
                        return Err(MemoryError::ValueCount {
                            expected: columns.len(),
                            got: values.len(),
                        });
                    }
                    let mut row: Row = target
                        .columns
                        .iter()
                        .map(|c| (c.clone(), Value::Null))
                        .collect();
                    for (column, expr) in columns.iter().zip(values) {
                        row.insert(column.clone(), eval(expr, &empty, args, table)?);
                    }
                    inserted.push(row);
                }

                let count = inserted.len() as u64;
                target.rows.extend(inserted);
                Ok(Outcome::Modified(ExecResult::affected(count)))
            }

            Command::Select {
                table,
                columns,
                filter,
            } => {
                let source = self.table(table)?;
                let columns = match columns {
                    Some(cols) => {
                        for column in cols {
                            source.check_column(table, column)?;
                        }
                        cols.clone()
                    }
                    None => source.columns.clone(),
                };

                let mut rows = Rows::new(columns.clone());
                for row in &source.rows {
                    if matches(filter.as_ref(), row, args, table)? {
                        rows.push(
                            columns
                                .iter()
                                .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                                .collect(),
                        );
                    }
                }
                Ok(Outcome::Rows(rows))
            }

            Command::Update {
                table,
                assignments,
                filter,
            } => {
                let target = self.table_mut(table)?;
                for (column, _) in assignments {
                    target.check_column(table, column)?;
                }

                // Evaluate every row before writing anything.
                let mut pending = Vec::new();
                for (index, row) in target.rows.iter().enumerate() {
                    if !matches(filter.as_ref(), row, args, table)? {
                        continue;
                    }
                    let mut updates = Vec::with_capacity(assignments.len());
                    for (column, expr) in assignments {
                        updates.push((column.clone(), eval(expr, row, args, table)?));
                    }
                    pending.push((index, updates));
                }

                let count = pending.len() as u64;
                for (index, updates) in pending {
                    target.rows[index].extend(updates);
                }
                Ok(Outcome::Modified(ExecResult::affected(count)))
            }

            Command::Delete { table, filter } => {
                let target = self.table_mut(table)?;
                let mut doomed = Vec::with_capacity(target.rows.len());
                for row in &target.rows {
                    doomed.push(matches(filter.as_ref(), row, args, table)?);
                }
                let count = doomed.iter().filter(|d| **d).count() as u64;
                let mut flags = doomed.into_iter();
                target.rows.retain(|_| !flags.next().unwrap_or(false));
                Ok(Outcome::Modified(ExecResult::affected(count)))
            }

            Command::Savepoint(_) | Command::RollbackTo(_) | Command::Release(_) => {
                Err(MemoryError::NoTransaction)
            }
        }
    }
}

fn matches(filter: Option<&Expr>, row: &Row, args: &[Value], table: &str) -> MemoryResult<bool> {
    match filter {
        None => Ok(true),
        Some(expr) => Ok(eval(expr, row, args, table)? == Value::Bool(true)),
    }
}

/// Evaluate an expression against a row. Comparisons involving NULL yield
/// NULL, which filters treat as false.
fn eval(expr: &Expr, row: &Row, args: &[Value], table: &str) -> MemoryResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Param(i) => args
            .get(*i)
            .cloned()
            .ok_or(MemoryError::MissingPlaceholder(*i + 1)),
        Expr::Column(name) => row.get(name).cloned().ok_or_else(|| MemoryError::ColumnNotFound {
            table: table.to_string(),
            column: name.clone(),
        }),
        Expr::Not(inner) => Ok(match eval(inner, row, args, table)? {
            Value::Bool(b) => Value::Bool(!b),
            _ => Value::Null,
        }),
        Expr::IsNull { expr, negated } => {
            let is_null = eval(expr, row, args, table)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        Expr::Binary { left, op, right } => {
            let l = eval(left, row, args, table)?;
            let r = eval(right, row, args, table)?;
            Ok(binary(*op, &l, &r))
        }
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::And => match (l, r) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
            (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
            _ => Value::Null,
        },
        BinaryOp::Or => match (l, r) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
            (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
            _ => Value::Null,
        },
        _ => match compare(l, r) {
            None => Value::Null,
            Some(ord) => Value::Bool(match op {
                BinaryOp::Eq => ord == Ordering::Equal,
                BinaryOp::NotEq => ord != Ordering::Equal,
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::LtEq => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                BinaryOp::GtEq => ord != Ordering::Less,
                BinaryOp::And | BinaryOp::Or => false,
            }),
        },
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::sql::parse;
    use serde_json::json;

    fn run(tables: &mut Tables, sql: &str, args: &[Value]) -> MemoryResult<Outcome> {
        tables.execute(&parse(sql).unwrap(), args)
    }

    fn select(tables: &mut Tables, sql: &str, args: &[Value]) -> Rows {
        match run(tables, sql, args).unwrap() {
            Outcome::Rows(rows) => rows,
            other => panic!("Expected rows, got {:?}", other),
        }
    }

    fn affected(outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Modified(r) => r.rows_affected,
            other => panic!("Expected modification, got {:?}", other),
        }
    }

    fn setup() -> Tables {
        let mut tables = Tables::default();
        run(&mut tables, "CREATE TABLE users (id TEXT, age INTEGER)", &[]).unwrap();
        run(
            &mut tables,
            "INSERT INTO users (id, age) VALUES ('a', 30), ('b', 41), ('c', NULL)",
            &[],
        )
        .unwrap();
        tables
    }

    #[test]
    fn test_insert_and_select() {
        let mut tables = setup();
        let rows = select(&mut tables, "SELECT * FROM users", &[]);
        assert_eq!(rows.columns, vec!["id".to_string(), "age".to_string()]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.get(0).unwrap().get("age"), Some(&json!(30)));
    }

    #[test]
    fn test_insert_fills_missing_columns_with_null() {
        let mut tables = setup();
        run(&mut tables, "INSERT INTO users (id) VALUES (?)", &[json!("d")]).unwrap();
        let rows = select(&mut tables, "SELECT age FROM users WHERE id = 'd'", &[]);
        assert_eq!(rows.get(0).unwrap().get("age"), Some(&Value::Null));
    }

    #[test]
    fn test_where_clauses() {
        let mut tables = setup();
        assert_eq!(select(&mut tables, "SELECT id FROM users WHERE age > 35", &[]).len(), 1);
        assert_eq!(select(&mut tables, "SELECT id FROM users WHERE age >= 30 AND age <= 41", &[]).len(), 2);
        assert_eq!(select(&mut tables, "SELECT id FROM users WHERE id = 'a' OR id = 'c'", &[]).len(), 2);
        assert_eq!(select(&mut tables, "SELECT id FROM users WHERE age IS NULL", &[]).len(), 1);
        assert_eq!(select(&mut tables, "SELECT id FROM users WHERE age <> 30", &[]).len(), 1);
        assert_eq!(select(&mut tables, "SELECT id FROM users WHERE id = ?", &[json!("b")]).len(), 1);
    }

    #[test]
    fn test_update_and_delete() {
        let mut tables = setup();
        let n = affected(run(&mut tables, "UPDATE users SET age = 50 WHERE id = 'a'", &[]).unwrap());
        assert_eq!(n, 1);
        let rows = select(&mut tables, "SELECT age FROM users WHERE id = 'a'", &[]);
        assert_eq!(rows.get(0).unwrap().get("age"), Some(&json!(50)));

        let n = affected(run(&mut tables, "DELETE FROM users WHERE age IS NOT NULL", &[]).unwrap());
        assert_eq!(n, 2);
        assert_eq!(select(&mut tables, "SELECT * FROM users", &[]).len(), 1);
    }

    #[test]
    fn test_errors() {
        let mut tables = setup();
        assert!(matches!(
            run(&mut tables, "SELECT * FROM nope", &[]),
            Err(MemoryError::TableNotFound(_))
        ));
        assert!(matches!(
            run(&mut tables, "CREATE TABLE users (id TEXT)", &[]),
            Err(MemoryError::TableExists(_))
        ));
        assert!(matches!(
            run(&mut tables, "SELECT nope FROM users", &[]),
            Err(MemoryError::ColumnNotFound { .. })
        ));
        assert!(matches!(
            run(&mut tables, "INSERT INTO users (id, age) VALUES ('x')", &[]),
            Err(MemoryError::ValueCount { expected: 2, got: 1 })
        ));
        assert!(matches!(
            run(&mut tables, "INSERT INTO users (id) VALUES (?)", &[]),
            Err(MemoryError::MissingPlaceholder(1))
        ));
        assert!(matches!(
            run(&mut tables, "SAVEPOINT a", &[]),
            Err(MemoryError::NoTransaction)
        ));
    }

    #[test]
    fn test_create_if_not_exists_and_drop() {
        let mut tables = setup();
        run(&mut tables, "CREATE TABLE IF NOT EXISTS users (id TEXT)", &[]).unwrap();
        assert_eq!(tables.get("users").unwrap().rows.len(), 3);

        run(&mut tables, "DROP TABLE users", &[]).unwrap();
        assert!(tables.get("users").is_none());
        run(&mut tables, "DROP TABLE IF EXISTS users", &[]).unwrap();
        assert!(run(&mut tables, "DROP TABLE users", &[]).is_err());
    }
}
