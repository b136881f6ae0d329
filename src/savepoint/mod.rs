//! Savepoint naming.
//!
//! Savepoints are identified by names spliced directly into SQL, so every
//! name handed to the database goes through [`SavepointName`] validation.
//! Names come from an injected [`SavepointNamer`]; [`UlidNamer`] is the
//! default and [`SequentialNamer`] gives deterministic names for tests.

mod name;
mod namer;

pub use name::{InvalidNameError, SavepointName};
pub use namer::{SavepointNamer, SequentialNamer, UlidNamer};
