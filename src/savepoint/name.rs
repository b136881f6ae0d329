//! Validated savepoint identifiers.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors for invalid savepoint names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNameError {
    #[error("savepoint name cannot be empty")]
    Empty,

    #[error("savepoint name too long: {0} bytes (max 63)")]
    TooLong(usize),

    #[error("savepoint name prefix too long: {0} bytes (max 42)")]
    PrefixTooLong(usize),

    #[error("savepoint name must start with a letter, found '{0}'")]
    InvalidStart(char),

    #[error("invalid character '{char}' at position {position}")]
    InvalidCharacter { char: char, position: usize },
}

/// A savepoint identifier that is safe to splice into SQL.
///
/// Valid names:
/// - 1-63 bytes
/// - Start with an ASCII letter
/// - ASCII alphanumerics and underscores only
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SavepointName(String);

impl SavepointName {
    /// PostgreSQL truncates identifiers past this length.
    pub const MAX_LEN: usize = 63;

    /// Create a new SavepointName, validating the input.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Replace hyphens with underscores, then validate.
    pub fn sanitize(raw: &str) -> Result<Self, InvalidNameError> {
        Self::new(raw.replace('-', "_"))
    }

    /// Wrap a name produced by one of our generators.
    pub(crate) fn generated(name: String) -> Self {
        debug_assert!(Self::validate(&name).is_ok(), "generator produced {name:?}");
        Self(name)
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        let first = name.chars().next().ok_or(InvalidNameError::Empty)?;

        if name.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        if !first.is_ascii_alphabetic() {
            return Err(InvalidNameError::InvalidStart(first));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// `SAVEPOINT <name>`
    pub fn create_sql(&self) -> String {
        format!("SAVEPOINT {}", self.0)
    }

    /// `ROLLBACK TO SAVEPOINT <name>`
    pub fn rollback_sql(&self) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", self.0)
    }

    /// `RELEASE SAVEPOINT <name>`
    pub fn release_sql(&self) -> String {
        format!("RELEASE SAVEPOINT {}", self.0)
    }
}

impl fmt::Display for SavepointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SavepointName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(SavepointName::new("sp_1").is_ok());
        assert!(SavepointName::new("a").is_ok());
        assert!(SavepointName::new("Level2_inner").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(SavepointName::new(""), Err(InvalidNameError::Empty));
        assert_eq!(
            SavepointName::new("1sp"),
            Err(InvalidNameError::InvalidStart('1'))
        );
        assert_eq!(
            SavepointName::new("_sp"),
            Err(InvalidNameError::InvalidStart('_'))
        );
        assert_eq!(
            SavepointName::new("sp-1"),
            Err(InvalidNameError::InvalidCharacter { char: '-', position: 2 })
        );
        assert!(matches!(
            SavepointName::new("s".repeat(64)),
            Err(InvalidNameError::TooLong(64))
        ));
    }

    #[test]
    fn test_sanitize_replaces_hyphens() {
        let name = SavepointName::sanitize("sp-0190-abcd").unwrap();
        assert_eq!(name.as_str(), "sp_0190_abcd");
    }

    #[test]
    fn test_statement_text() {
        let name = SavepointName::new("sp_7").unwrap();
        assert_eq!(name.create_sql(), "SAVEPOINT sp_7");
        assert_eq!(name.rollback_sql(), "ROLLBACK TO SAVEPOINT sp_7");
        assert_eq!(name.release_sql(), "RELEASE SAVEPOINT sp_7");
    }
}
