//! Savepoint name generators.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use ulid::{Generator, Ulid};

use super::name::{InvalidNameError, SavepointName};

/// Produces a fresh savepoint name on every call.
///
/// Implementations must never return the same name twice for one node.
pub trait SavepointNamer {
    fn next_name(&self) -> SavepointName;
}

impl<N: SavepointNamer + ?Sized> SavepointNamer for Arc<N> {
    fn next_name(&self) -> SavepointName {
        (**self).next_name()
    }
}

impl<N: SavepointNamer + ?Sized> SavepointNamer for &N {
    fn next_name(&self) -> SavepointName {
        (**self).next_name()
    }
}

/// Names backed by monotonic ULIDs: `sp_` followed by 32 hex digits.
///
/// Monotonic generation keeps names unique even within one millisecond, so
/// names are unique across every node sharing the generator.
pub struct UlidNamer {
    generator: Mutex<Generator>,
}

impl UlidNamer {
    pub fn new() -> Self {
        Self {
            generator: Mutex::new(Generator::new()),
        }
    }

    /// A process-wide generator, for callers that want names unique across nodes.
    pub fn shared() -> Arc<UlidNamer> {
        static SHARED: OnceLock<Arc<UlidNamer>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(UlidNamer::new())).clone()
    }

    fn next_ulid(&self) -> Ulid {
        // Fails only when the random part overflows within one millisecond.
        self.generator.lock().generate().unwrap_or_else(|_| Ulid::new())
    }
}

impl Default for UlidNamer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UlidNamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UlidNamer").finish_non_exhaustive()
    }
}

impl SavepointNamer for UlidNamer {
    fn next_name(&self) -> SavepointName {
        let id = u128::from(self.next_ulid());
        SavepointName::generated(format!("sp_{:032x}", id))
    }
}

/// Deterministic `<prefix>_<n>` names, handy in tests and statement logs.
#[derive(Debug)]
pub struct SequentialNamer {
    prefix: String,
    next: AtomicU64,
}

impl SequentialNamer {
    /// Longest prefix for which `<prefix>_<u64::MAX>` still fits.
    pub const MAX_PREFIX_LEN: usize = SavepointName::MAX_LEN - 1 - 20;

    /// Create a namer with the given prefix. The prefix must itself be a
    /// valid savepoint name of at most [`Self::MAX_PREFIX_LEN`] bytes.
    pub fn new(prefix: impl Into<String>) -> Result<Self, InvalidNameError> {
        let prefix = prefix.into();
        if prefix.len() > Self::MAX_PREFIX_LEN {
            return Err(InvalidNameError::PrefixTooLong(prefix.len()));
        }
        SavepointName::new(format!("{}_1", prefix))?;
        Ok(Self {
            prefix,
            next: AtomicU64::new(1),
        })
    }
}

impl Default for SequentialNamer {
    fn default() -> Self {
        Self {
            prefix: "sp".to_string(),
            next: AtomicU64::new(1),
        }
    }
}

impl SavepointNamer for SequentialNamer {
    fn next_name(&self) -> SavepointName {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        SavepointName::generated(format!("{}_{}", self.prefix, n))
    }
}
