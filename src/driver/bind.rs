//! Named-parameter compilation and placeholder rewriting.
//!
//! Queries can be written once with `:name` parameters or `?` placeholders and
//! rewritten into whatever bind syntax the connected dialect expects.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::error::{QueryError, QueryResult};

/// Named arguments, keyed by parameter name without the leading colon.
pub type NamedArgs = BTreeMap<String, Value>;

/// Placeholder syntax understood by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindStyle {
    /// `?` (MySQL, SQLite).
    #[default]
    Question,
    /// `$1`, `$2`, ... (PostgreSQL).
    Dollar,
    /// `@p1`, `@p2`, ... (SQL Server).
    At,
    /// `:name` (Oracle).
    Named,
}

impl BindStyle {
    /// Pick the bind style conventionally used by a driver name.
    pub fn for_driver(driver: &str) -> Self {
        match driver.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" | "pq" => BindStyle::Dollar,
            "sqlserver" | "mssql" => BindStyle::At,
            "oracle" | "oci8" | "godror" => BindStyle::Named,
            _ => BindStyle::Question,
        }
    }

    /// Placeholder text for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            BindStyle::Question => "?".to_string(),
            BindStyle::Dollar => format!("${}", index),
            BindStyle::At => format!("@p{}", index),
            BindStyle::Named => format!(":arg{}", index),
        }
    }
}

/// Build named arguments from any serializable struct or map.
pub fn named_args<T: Serialize>(value: &T) -> QueryResult<NamedArgs> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Err(QueryError::NotAnObject("null")),
        Value::Bool(_) => Err(QueryError::NotAnObject("bool")),
        Value::Number(_) => Err(QueryError::NotAnObject("number")),
        Value::String(_) => Err(QueryError::NotAnObject("string")),
        Value::Array(_) => Err(QueryError::NotAnObject("array")),
    }
}

/// Replace `:name` parameters with positional placeholders.
///
/// Returns the rewritten query and the argument values in placeholder order.
/// Text inside single quotes and `::` casts are left untouched.
pub fn compile_named(
    sql: &str,
    args: &NamedArgs,
    style: BindStyle,
) -> QueryResult<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_quote = !in_quote;
            out.push(c);
            continue;
        }
        if in_quote || c != ':' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&':') {
            chars.next();
            out.push_str("::");
            continue;
        }

        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_ascii_alphanumeric() || n == '_' {
                name.push(n);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            out.push(':');
            continue;
        }

        let value = args
            .get(&name)
            .ok_or_else(|| QueryError::MissingArgument(name.clone()))?;
        values.push(value.clone());
        match style {
            BindStyle::Named => {
                out.push(':');
                out.push_str(&name);
            }
            _ => out.push_str(&style.placeholder(values.len())),
        }
    }

    Ok((out, values))
}

/// Rewrite `?` placeholders into the given bind style.
pub fn rebind(sql: &str, style: BindStyle) -> String {
    if style == BindStyle::Question {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut in_quote = false;
    let mut index = 0;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                out.push(c);
            }
            '?' if !in_quote => {
                index += 1;
                out.push_str(&style.placeholder(index));
            }
            _ => out.push(c),
        }
    }
    out
}

/// Count positional placeholders (`?` or `$n`) outside string literals.
pub fn count_placeholders(sql: &str) -> usize {
    let mut in_quote = false;
    let mut count = 0;
    let mut highest_dollar = 0;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => in_quote = !in_quote,
            '?' if !in_quote => count += 1,
            '$' if !in_quote => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Ok(n) = digits.parse::<usize>() {
                    highest_dollar = highest_dollar.max(n);
                }
            }
            _ => {}
        }
    }

    count + highest_dollar
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args() -> NamedArgs {
        let mut args = NamedArgs::new();
        args.insert("id".into(), json!("abc"));
        args.insert("age".into(), json!(30));
        args
    }

    #[test]
    fn test_compile_question() {
        let (sql, values) = compile_named(
            "INSERT INTO t (id, age) VALUES (:id, :age)",
            &args(),
            BindStyle::Question,
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO t (id, age) VALUES (?, ?)");
        assert_eq!(values, vec![json!("abc"), json!(30)]);
    }

    #[test]
    fn test_compile_dollar_repeats_parameter() {
        let (sql, values) = compile_named(
            "SELECT * FROM t WHERE id = :id OR parent = :id",
            &args(),
            BindStyle::Dollar,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id = $1 OR parent = $2");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_compile_skips_quotes_and_casts() {
        let (sql, values) = compile_named(
            "SELECT ':id', age::text FROM t WHERE id = :id",
            &args(),
            BindStyle::Question,
        )
        .unwrap();
        assert_eq!(sql, "SELECT ':id', age::text FROM t WHERE id = ?");
        assert_eq!(values, vec![json!("abc")]);
    }

    #[test]
    fn test_compile_missing_argument() {
        let err = compile_named("SELECT :nope", &args(), BindStyle::Question).unwrap_err();
        assert!(matches!(err, QueryError::MissingArgument(name) if name == "nope"));
    }

    #[test]
    fn test_named_args_from_struct() {
        #[derive(Serialize)]
        struct Insert {
            id: &'static str,
        }
        let args = named_args(&Insert { id: "x" }).unwrap();
        assert_eq!(args.get("id"), Some(&json!("x")));

        assert!(matches!(
            named_args(&42).unwrap_err(),
            QueryError::NotAnObject("number")
        ));
    }

    #[test]
    fn test_rebind() {
        let sql = "UPDATE t SET a = ? WHERE b = '?' AND c = ?";
        assert_eq!(rebind(sql, BindStyle::Question), sql);
        assert_eq!(
            rebind(sql, BindStyle::Dollar),
            "UPDATE t SET a = $1 WHERE b = '?' AND c = $2"
        );
        assert_eq!(
            rebind(sql, BindStyle::At),
            "UPDATE t SET a = @p1 WHERE b = '?' AND c = @p2"
        );
    }

    #[test]
    fn test_bind_style_for_driver() {
        assert_eq!(BindStyle::for_driver("postgres"), BindStyle::Dollar);
        assert_eq!(BindStyle::for_driver("MySQL"), BindStyle::Question);
        assert_eq!(BindStyle::for_driver("mssql"), BindStyle::At);
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("VALUES (?, ?, '?')"), 2);
        assert_eq!(count_placeholders("WHERE a = $1 AND b = $2 OR c = $1"), 2);
        assert_eq!(count_placeholders("SELECT 1"), 0);
    }
}
