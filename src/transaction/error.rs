//! Transaction error types.

use thiserror::Error;

/// Result type for nested-transaction operations over a driver with error `E`.
pub type TransactionResult<T, E> = Result<T, TransactionError<E>>;

/// Errors that can occur during nested-transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError<E> {
    /// `commit` was called with no transaction open.
    #[error("not in transaction")]
    NotInTransaction,

    /// A configuration option the connected driver cannot honour.
    #[error("incompatible option: {option} is not supported by driver {driver:?}")]
    IncompatibleOption {
        option: &'static str,
        driver: String,
    },

    /// A statement failed in the driver. The driver's error is kept as-is.
    #[error(transparent)]
    Driver(#[from] E),
}

impl<E> TransactionError<E> {
    /// Check if this error came from the driver.
    pub fn is_driver(&self) -> bool {
        matches!(self, TransactionError::Driver(_))
    }

    /// Borrow the driver error, if that is what this is.
    pub fn driver_error(&self) -> Option<&E> {
        match self {
            TransactionError::Driver(e) => Some(e),
            _ => None,
        }
    }

    /// Take the driver error, if that is what this is.
    pub fn into_driver(self) -> Option<E> {
        match self {
            TransactionError::Driver(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn incompatible(option: &'static str, driver: impl Into<String>) -> Self {
        Self::IncompatibleOption {
            option,
            driver: driver.into(),
        }
    }
}
