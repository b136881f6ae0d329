//! SQL parsing for the memory driver.
//!
//! Uses `sqlparser` for data statements, then converts to the small command
//! set the store executes. Savepoint statements are recognized before
//! `sqlparser` sees them.

use serde_json::Value;
use sqlparser::ast as sp;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;

use super::error::{MemoryError, MemoryResult};

/// A statement the memory store can execute.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    CreateTable {
        name: String,
        columns: Vec<String>,
        if_not_exists: bool,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Expr>>,
    },
    Select {
        table: String,
        /// `None` for `SELECT *`.
        columns: Option<Vec<String>>,
        filter: Option<Expr>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        filter: Option<Expr>,
    },
    Delete {
        table: String,
        filter: Option<Expr>,
    },
    Savepoint(String),
    RollbackTo(String),
    Release(String),
}

impl Command {
    /// Check if the command changes data or schema.
    pub(crate) fn is_write(&self) -> bool {
        !matches!(
            self,
            Command::Select { .. }
                | Command::Savepoint(_)
                | Command::RollbackTo(_)
                | Command::Release(_)
        )
    }
}

/// Scalar expressions in VALUES, SET and WHERE.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Column(String),
    Literal(Value),
    /// Zero-based positional argument.
    Param(usize),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Parse one SQL statement.
pub(crate) fn parse(sql: &str) -> MemoryResult<Command> {
    let sql = sql.trim().trim_end_matches(';').trim();
    if sql.is_empty() {
        return Err(MemoryError::Syntax("empty statement".into()));
    }

    if let Some(command) = parse_transaction_control(sql)? {
        return Ok(command);
    }

    let statements = SqlParser::parse_sql(&GenericDialect {}, sql)?;
    if statements.len() != 1 {
        return Err(MemoryError::Unsupported(
            "exactly one statement per call".into(),
        ));
    }

    Converter::default().statement(&statements[0])
}

fn parse_transaction_control(sql: &str) -> MemoryResult<Option<Command>> {
    let words: Vec<&str> = sql.split_whitespace().collect();
    let upper: Vec<String> = words.iter().map(|w| w.to_ascii_uppercase()).collect();
    let upper: Vec<&str> = upper.iter().map(String::as_str).collect();

    let command = match upper.as_slice() {
        ["SAVEPOINT", _] => Command::Savepoint(words[1].to_string()),
        ["ROLLBACK", "TO", "SAVEPOINT", _] => Command::RollbackTo(words[3].to_string()),
        ["ROLLBACK", "TO", _] => Command::RollbackTo(words[2].to_string()),
        ["RELEASE", "SAVEPOINT", _] => Command::Release(words[2].to_string()),
        ["RELEASE", _] => Command::Release(words[1].to_string()),
        ["BEGIN", ..]
        | ["START", "TRANSACTION", ..]
        | ["COMMIT", ..]
        | ["END", ..]
        | ["ROLLBACK", ..] => {
            return Err(MemoryError::Unsupported(format!(
                "{} (open transactions with Connection::begin)",
                sql
            )))
        }
        _ => return Ok(None),
    };
    Ok(Some(command))
}

/// Converts `sqlparser` statements, numbering `?` placeholders as it goes.
#[derive(Default)]
struct Converter {
    next_param: usize,
}

impl Converter {
    fn statement(&mut self, stmt: &sp::Statement) -> MemoryResult<Command> {
        match stmt {
            sp::Statement::CreateTable(create) => Ok(Command::CreateTable {
                name: Self::table_name(&create.name)?,
                columns: create.columns.iter().map(|c| c.name.value.clone()).collect(),
                if_not_exists: create.if_not_exists,
            }),
            sp::Statement::Drop {
                object_type: sp::ObjectType::Table,
                names,
                if_exists,
                ..
            } => {
                if names.len() != 1 {
                    return Err(MemoryError::Unsupported(
                        "DROP multiple tables not supported".into(),
                    ));
                }
                Ok(Command::DropTable {
                    name: Self::table_name(&names[0])?,
                    if_exists: *if_exists,
                })
            }
            sp::Statement::Query(query) => self.query(query),
            sp::Statement::Insert(insert) => self.insert(insert),
            sp::Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => {
                let table = Self::from_table(table)?;
                let assignments = assignments
                    .iter()
                    .map(|a| -> MemoryResult<(String, Expr)> {
                        Ok((Self::assignment_target(&a.target)?, self.expr(&a.value)?))
                    })
                    .collect::<MemoryResult<Vec<_>>>()?;
                let filter = selection.as_ref().map(|e| self.expr(e)).transpose()?;
                Ok(Command::Update {
                    table,
                    assignments,
                    filter,
                })
            }
            sp::Statement::Delete(delete) => {
                let tables = match &delete.from {
                    sp::FromTable::WithFromKeyword(tables) => tables,
                    sp::FromTable::WithoutKeyword(tables) => tables,
                };
                if tables.len() != 1 {
                    return Err(MemoryError::Unsupported(
                        "DELETE from multiple tables not supported".into(),
                    ));
                }
                let table = Self::from_table(&tables[0])?;
                let filter = delete.selection.as_ref().map(|e| self.expr(e)).transpose()?;
                Ok(Command::Delete { table, filter })
            }
            other => Err(MemoryError::Unsupported(other.to_string())),
        }
    }

    fn query(&mut self, query: &sp::Query) -> MemoryResult<Command> {
        let select = match query.body.as_ref() {
            sp::SetExpr::Select(s) => s,
            other => return Err(MemoryError::Unsupported(other.to_string())),
        };

        if select.from.len() != 1 {
            return Err(MemoryError::Unsupported(
                "exactly one table in FROM required".into(),
            ));
        }
        let table = Self::from_table(&select.from[0])?;

        let mut columns = Some(Vec::new());
        for item in &select.projection {
            match item {
                sp::SelectItem::Wildcard(_) => columns = None,
                sp::SelectItem::UnnamedExpr(sp::Expr::Identifier(ident)) => {
                    if let Some(cols) = columns.as_mut() {
                        cols.push(ident.value.clone());
                    }
                }
                other => return Err(MemoryError::Unsupported(other.to_string())),
            }
        }

        let filter = select.selection.as_ref().map(|e| self.expr(e)).transpose()?;
        Ok(Command::Select {
            table,
            columns,
            filter,
        })
    }

    fn insert(&mut self, insert: &sp::Insert) -> MemoryResult<Command> {
        let table = match &insert.table {
            sp::TableObject::TableName(name) => Self::table_name(name)?,
            sp::TableObject::TableFunction(_) => {
                return Err(MemoryError::Unsupported("table function not supported".into()))
            }
        };

        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.iter().map(|c| c.value.clone()).collect())
        };

        let rows = match insert.source.as_ref().map(|s| s.body.as_ref()) {
            Some(sp::SetExpr::Values(sp::Values { rows, .. })) => rows
                .iter()
                .map(|row| row.iter().map(|e| self.expr(e)).collect::<MemoryResult<Vec<_>>>())
                .collect::<MemoryResult<Vec<_>>>()?,
            _ => {
                return Err(MemoryError::Unsupported(
                    "INSERT ... SELECT not supported".into(),
                ))
            }
        };

        Ok(Command::Insert {
            table,
            columns,
            rows,
        })
    }

    fn expr(&mut self, expr: &sp::Expr) -> MemoryResult<Expr> {
        match expr {
            sp::Expr::Identifier(id) => Ok(Expr::Column(id.value.clone())),
            sp::Expr::CompoundIdentifier(parts) => parts
                .last()
                .map(|p| Expr::Column(p.value.clone()))
                .ok_or_else(|| MemoryError::Syntax("empty compound identifier".into())),
            sp::Expr::Value(v) => self.value(&v.value),
            sp::Expr::Nested(inner) => self.expr(inner),
            sp::Expr::BinaryOp { left, op, right } => {
                let op = Self::binary_op(op)?;
                Ok(Expr::Binary {
                    left: Box::new(self.expr(left)?),
                    op,
                    right: Box::new(self.expr(right)?),
                })
            }
            sp::Expr::UnaryOp { op, expr } => match op {
                sp::UnaryOperator::Not => Ok(Expr::Not(Box::new(self.expr(expr)?))),
                sp::UnaryOperator::Plus => self.expr(expr),
                sp::UnaryOperator::Minus => match self.expr(expr)? {
                    Expr::Literal(Value::Number(n)) => Ok(Expr::Literal(negate(&n))),
                    _ => Err(MemoryError::Unsupported(expr.to_string())),
                },
                other => Err(MemoryError::Unsupported(other.to_string())),
            },
            sp::Expr::IsNull(e) => Ok(Expr::IsNull {
                expr: Box::new(self.expr(e)?),
                negated: false,
            }),
            sp::Expr::IsNotNull(e) => Ok(Expr::IsNull {
                expr: Box::new(self.expr(e)?),
                negated: true,
            }),
            other => Err(MemoryError::Unsupported(other.to_string())),
        }
    }

    fn value(&mut self, v: &sp::Value) -> MemoryResult<Expr> {
        let value = match v {
            sp::Value::Null => Value::Null,
            sp::Value::Boolean(b) => Value::Bool(*b),
            sp::Value::Number(s, _) => number(s)?,
            sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
                Value::String(s.clone())
            }
            sp::Value::Placeholder(p) => return self.placeholder(p),
            other => return Err(MemoryError::Unsupported(other.to_string())),
        };
        Ok(Expr::Literal(value))
    }

    fn placeholder(&mut self, p: &str) -> MemoryResult<Expr> {
        if p == "?" {
            let index = self.next_param;
            self.next_param += 1;
            return Ok(Expr::Param(index));
        }
        match p.strip_prefix('$').map(str::parse::<usize>) {
            Some(Ok(n)) if n > 0 => Ok(Expr::Param(n - 1)),
            _ => Err(MemoryError::Unsupported(format!("placeholder {}", p))),
        }
    }

    fn binary_op(op: &sp::BinaryOperator) -> MemoryResult<BinaryOp> {
        match op {
            sp::BinaryOperator::Eq => Ok(BinaryOp::Eq),
            sp::BinaryOperator::NotEq => Ok(BinaryOp::NotEq),
            sp::BinaryOperator::Lt => Ok(BinaryOp::Lt),
            sp::BinaryOperator::LtEq => Ok(BinaryOp::LtEq),
            sp::BinaryOperator::Gt => Ok(BinaryOp::Gt),
            sp::BinaryOperator::GtEq => Ok(BinaryOp::GtEq),
            sp::BinaryOperator::And => Ok(BinaryOp::And),
            sp::BinaryOperator::Or => Ok(BinaryOp::Or),
            other => Err(MemoryError::Unsupported(format!("operator {}", other))),
        }
    }

    fn table_name(name: &sp::ObjectName) -> MemoryResult<String> {
        name.0
            .last()
            .map(|p| p.as_ident().map(|id| id.value.clone()).unwrap_or_else(|| p.to_string()))
            .map(|n| n.to_lowercase())
            .ok_or_else(|| MemoryError::Syntax("empty table name".into()))
    }

    fn from_table(from: &sp::TableWithJoins) -> MemoryResult<String> {
        if !from.joins.is_empty() {
            return Err(MemoryError::Unsupported("joins not supported".into()));
        }
        match &from.relation {
            sp::TableFactor::Table { name, .. } => Self::table_name(name),
            other => Err(MemoryError::Unsupported(other.to_string())),
        }
    }

    fn assignment_target(target: &sp::AssignmentTarget) -> MemoryResult<String> {
        match target {
            sp::AssignmentTarget::ColumnName(name) => name
                .0
                .last()
                .map(|p| p.as_ident().map(|id| id.value.clone()).unwrap_or_else(|| p.to_string()))
                .ok_or_else(|| MemoryError::Syntax("empty assignment target".into())),
            sp::AssignmentTarget::Tuple(_) => Err(MemoryError::Unsupported(
                "tuple assignment not supported".into(),
            )),
        }
    }
}

fn number(s: &str) -> MemoryResult<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| MemoryError::Syntax(format!("invalid number: {}", s)))
}

fn negate(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        return Value::from(-i);
    }
    n.as_f64()
        .and_then(|f| serde_json::Number::from_f64(-f))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_create_table() {
        let cmd = parse("CREATE TABLE IF NOT EXISTS T1 (id TEXT PRIMARY KEY, n INTEGER)").unwrap();
        assert_eq!(
            cmd,
            Command::CreateTable {
                name: "t1".into(),
                columns: vec!["id".into(), "n".into()],
                if_not_exists: true,
            }
        );
    }

    #[test]
    fn test_parse_insert_with_placeholders() {
        let cmd = parse("INSERT INTO t1 (id, n) VALUES (?, ?), ('c', -3)").unwrap();
        match cmd {
            Command::Insert { table, columns, rows } => {
                assert_eq!(table, "t1");
                assert_eq!(columns, Some(vec!["id".into(), "n".into()]));
                assert_eq!(rows[0], vec![Expr::Param(0), Expr::Param(1)]);
                assert_eq!(
                    rows[1],
                    vec![Expr::Literal(json!("c")), Expr::Literal(json!(-3))]
                );
            }
            other => panic!("Expected Insert, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_dollar_placeholders() {
        match parse("SELECT * FROM t1 WHERE id = $2 AND n = $1").unwrap() {
            Command::Select { filter: Some(Expr::Binary { left, op, right }), .. } => {
                assert_eq!(op, BinaryOp::And);
                assert_eq!(
                    *left,
                    Expr::Binary {
                        left: Box::new(Expr::Column("id".into())),
                        op: BinaryOp::Eq,
                        right: Box::new(Expr::Param(1)),
                    }
                );
                assert_eq!(
                    *right,
                    Expr::Binary {
                        left: Box::new(Expr::Column("n".into())),
                        op: BinaryOp::Eq,
                        right: Box::new(Expr::Param(0)),
                    }
                );
            }
            other => panic!("Expected Select with filter, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_select_columns() {
        match parse("SELECT id, n FROM t1;").unwrap() {
            Command::Select { table, columns, filter } => {
                assert_eq!(table, "t1");
                assert_eq!(columns, Some(vec!["id".into(), "n".into()]));
                assert!(filter.is_none());
            }
            other => panic!("Expected Select, got {:?}", other),
        }
        assert!(matches!(
            parse("SELECT * FROM t1").unwrap(),
            Command::Select { columns: None, .. }
        ));
    }

    #[test]
    fn test_parse_update_and_delete() {
        assert!(matches!(
            parse("UPDATE t1 SET n = 2 WHERE id = 'a'").unwrap(),
            Command::Update { ref assignments, filter: Some(_), .. } if assignments.len() == 1
        ));
        assert!(matches!(
            parse("DELETE FROM t1").unwrap(),
            Command::Delete { filter: None, .. }
        ));
    }

    #[test]
    fn test_parse_savepoint_statements() {
        assert_eq!(parse("SAVEPOINT sp_1").unwrap(), Command::Savepoint("sp_1".into()));
        assert_eq!(
            parse("ROLLBACK TO SAVEPOINT sp_1").unwrap(),
            Command::RollbackTo("sp_1".into())
        );
        assert_eq!(parse("rollback to sp_1").unwrap(), Command::RollbackTo("sp_1".into()));
        assert_eq!(
            parse("RELEASE SAVEPOINT sp_1").unwrap(),
            Command::Release("sp_1".into())
        );
    }

    #[test]
    fn test_transaction_keywords_rejected() {
        for sql in ["BEGIN", "COMMIT", "ROLLBACK", "START TRANSACTION"] {
            assert!(matches!(parse(sql), Err(MemoryError::Unsupported(_))), "{}", sql);
        }
    }

    #[test]
    fn test_is_write() {
        assert!(!parse("SELECT * FROM t").unwrap().is_write());
        assert!(parse("DELETE FROM t").unwrap().is_write());
        assert!(!parse("SAVEPOINT a").unwrap().is_write());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("").unwrap_err(), MemoryError::Syntax(_)));
        assert!(matches!(parse("SELEKT nope").unwrap_err(), MemoryError::Syntax(_)));
    }
}
