//! fielddiff
//!
//! Structured, field-level difference reports between two values of the
//! same type, for audit logs and change tracking.
//!
//! ```ignore
//! use fielddiff::{Diffable, Engine};
//!
//! #[derive(Diffable)]
//! struct Account {
//!     id: u64,
//!     owner: String,
//!     tags: Vec<String>,
//! }
//!
//! let engine = Engine::new();
//! engine.configure::<Account>()?.ignore("id")?.register()?.now();
//! for difference in engine.compare(&before, &after) {
//!     println!("{difference}");
//! }
//! ```
//!
//! Every type is compiled once per [`Engine`] into a [`Procedure`] and
//! cached. Configuration must be registered before the type (or any type
//! that contains it) is first compared.

#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate self as fielddiff;

pub mod engine;

// Re-exports
pub use engine::{CompileStats, Configure, Engine, Precompile};
pub use fielddiff_derive::Diffable;
pub use fielddiff_plan::{
    collection, object_diffable, scalar_diffable, CollectionMode, ConfigRegistry, DiffOptions, Diffable, Elements, Entries,
    MapKey, Matcher, Member, MemberClass, MemberInfo, MemberKind, Members, Object, PlanContext, Procedure, Step,
    StepKind, StepOutline, Synthesizer, TypeConfig, TypeConfigBuilder, TypeDescriptor,
};
pub use fielddiff_core::{DiffError, DiffResult, Difference, Scalar, Snapshot, TypeKey, Value};
