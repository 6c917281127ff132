//! fielddiff Core Types
//!
//! Pure types shared by the planner and the engine: the [`Difference`]
//! record, type-erased scalar [`Value`]s, object [`Snapshot`]s,
//! [`TypeKey`]s and the error type.
//! Nothing in this crate performs I/O or synchronization.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod difference;
pub mod error;
pub mod snapshot;
pub mod type_key;
pub mod value;

// Re-exports
pub use difference::Difference;
pub use error::{DiffError, DiffResult};
pub use snapshot::Snapshot;
pub use type_key::TypeKey;
pub use value::{stable_hash, Scalar, Value};
