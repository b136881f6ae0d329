//! Node configuration and the driver capability check.

/// Drivers known to support `SAVEPOINT` / `ROLLBACK TO SAVEPOINT`.
pub const SAVEPOINT_DIALECTS: &[&str] = &[
    "mysql",
    "mariadb",
    "postgres",
    "postgresql",
    "pgx",
    "sqlite",
    "sqlite3",
    "memory",
];

/// Check a driver name against [`SAVEPOINT_DIALECTS`], ignoring case.
pub fn supports_savepoints(driver: &str) -> bool {
    SAVEPOINT_DIALECTS
        .iter()
        .any(|d| d.eq_ignore_ascii_case(driver))
}

/// Configuration fixed when a node is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeConfig {
    /// Emulate nesting with savepoints.
    ///
    /// Off by default. Without savepoints the node still tracks nesting, but
    /// an inner rollback cannot undo anything; only the outermost commit or
    /// rollback has an effect.
    pub savepoints: bool,
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the savepoints flag.
    pub fn savepoints(mut self, enabled: bool) -> Self {
        self.savepoints = enabled;
        self
    }

    /// Check the configuration against the connected driver.
    ///
    /// Returns the name of the first option the driver cannot honour.
    pub fn incompatibility(&self, driver: &str) -> Option<&'static str> {
        if self.savepoints && !supports_savepoints(driver) {
            return Some("savepoints");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_dialects() {
        assert!(supports_savepoints("mysql"));
        assert!(supports_savepoints("Postgres"));
        assert!(supports_savepoints("sqlite3"));
        assert!(!supports_savepoints("clickhouse"));
        assert!(!supports_savepoints(""));
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(!config.savepoints);
        assert_eq!(config.incompatibility("clickhouse"), None);
    }

    #[test]
    fn test_incompatibility() {
        let config = NodeConfig::new().savepoints(true);
        assert_eq!(config.incompatibility("mysql"), None);
        assert_eq!(config.incompatibility("clickhouse"), Some("savepoints"));
    }
}
