//! fielddiff Planner
//!
//! Turns a type's declared shape plus its configuration into a reusable
//! comparison [`Procedure`].
//!
//! Types describe themselves through [`Diffable`] (every comparable type)
//! and [`Object`] (types with members). The [`Synthesizer`] walks those
//! members once, classifies each as scalar, map, sequence or nested object,
//! and emits one [`Step`] per member. The collection algorithms in
//! [`collection`] do the per-entry work at comparison time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod collection;
pub mod config;
pub mod impls;
pub mod member;
pub mod options;
pub mod procedure;
pub mod registry;
pub mod shape;
pub mod step;
pub mod synth;

// Re-exports
pub use builder::TypeConfigBuilder;
pub use config::{Matcher, MemberSettings, TypeConfig};
pub use member::{Elements, Entries, Member, MemberDef, Members};
pub use options::DiffOptions;
pub use procedure::Procedure;
pub use registry::{ConfigRegistry, SharedRegistry};
pub use shape::{Diffable, MapKey, MemberClass, MemberInfo, MemberKind, Object, TypeDescriptor};
pub use step::{CollectionMode, Step, StepKind, StepOutline};
pub use synth::{resolve, ErasedProcedure, LazyProcedure, PlanContext, ProcedureSource, Synthesizer};

pub use fielddiff_core::{DiffError, DiffResult, Difference, Scalar, Snapshot, TypeKey, Value};
