//! Transaction isolation levels and options.
//!
//! Options are only honoured when a node opens its outermost, real
//! transaction. Nested `begin` calls reuse the transaction already open.

use std::fmt;

use serde::Serialize;

/// SQL transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub enum IsolationLevel {
    /// Use whatever the server is configured with.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    /// Snapshot isolation, where the backend offers it separately.
    Snapshot,
    Serializable,
}

impl IsolationLevel {
    /// SQL text for `SET TRANSACTION ISOLATION LEVEL ...`, if not the default.
    pub fn sql_name(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::Default => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Snapshot => Some("SNAPSHOT"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name().unwrap_or("DEFAULT"))
    }
}

/// Parse isolation level from string (SQL syntax).
impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "" | "DEFAULT" => Ok(IsolationLevel::Default),
            "READ UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" => Ok(IsolationLevel::RepeatableRead),
            "SNAPSHOT" => Ok(IsolationLevel::Snapshot),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(format!("unknown isolation level: {}", s)),
        }
    }
}

/// Options for opening a real transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level.
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    /// Set the read-only flag.
    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_isolation() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::Default);
        assert_eq!(IsolationLevel::Default.sql_name(), None);
    }

    #[test]
    fn test_parse_isolation() {
        assert_eq!(
            "READ COMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "repeatable_read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "Serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert!("chaos".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let level = IsolationLevel::ReadUncommitted;
        assert_eq!(level.to_string(), "READ UNCOMMITTED");
        assert_eq!(level.to_string().parse::<IsolationLevel>().unwrap(), level);
    }

    #[test]
    fn test_options_builder() {
        let opts = TxOptions::new()
            .isolation(IsolationLevel::Serializable)
            .read_only(true);
        assert_eq!(opts.isolation, IsolationLevel::Serializable);
        assert!(opts.read_only);
        assert_eq!(TxOptions::default().isolation, IsolationLevel::Default);
    }
}
