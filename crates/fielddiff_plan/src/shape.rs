//! Declared type shapes.
//!
//! [`Diffable`] is the type-directed classification: every comparable type
//! says how a member, a sequence element or a map value of its own type is
//! planned. `Option`, `Box` and `Arc` forward to their inner type, so a
//! member's class is always that of the peeled type.

use crate::member::{Elements, Entries, Member, Members};
use crate::step::Step;
use crate::synth::PlanContext;
use fielddiff_core::TypeKey;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;

/// Classification of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemberClass {
    /// Compared atomically by value equality
    Scalar,
    /// Keyed association
    Map,
    /// Ordered or iterable collection (not a map)
    Sequence,
    /// Anything with members of its own
    Object,
}

impl fmt::Display for MemberClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scalar => "scalar",
            Self::Map => "map",
            Self::Sequence => "sequence",
            Self::Object => "object",
        };
        f.write_str(s)
    }
}

/// How a member is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemberKind {
    /// Always compared
    Property,
    /// Compared only when field comparison is enabled
    Field,
}

/// Shape of a declared type with `Option`/`Box`/`Arc` layers peeled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Peeled type
    pub key: TypeKey,
    /// Classification
    pub class: MemberClass,
    /// Sequence element or map value shape
    pub element: Option<Box<TypeDescriptor>>,
}

impl TypeDescriptor {
    /// Descriptor of a scalar type
    #[must_use]
    pub fn scalar<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            class: MemberClass::Scalar,
            element: None,
        }
    }

    /// Descriptor of an object type
    #[must_use]
    pub fn object<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            class: MemberClass::Object,
            element: None,
        }
    }

    /// Descriptor of sequence `S` holding `E`
    #[must_use]
    pub fn sequence<S: ?Sized + 'static, E: Diffable>() -> Self {
        Self {
            key: TypeKey::of::<S>(),
            class: MemberClass::Sequence,
            element: Some(Box::new(E::descriptor())),
        }
    }

    /// Descriptor of map `M` with values `V`
    #[must_use]
    pub fn map<M: ?Sized + 'static, V: Diffable>() -> Self {
        Self {
            key: TypeKey::of::<M>(),
            class: MemberClass::Map,
            element: Some(Box::new(V::descriptor())),
        }
    }

    /// Element or value shape, if this is a collection
    #[must_use]
    pub fn element(&self) -> Option<&TypeDescriptor> {
        self.element.as_deref()
    }
}

/// Declared member of an object type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Member name as used in difference paths and selectors
    pub name: String,
    /// Property or field
    pub kind: MemberKind,
    /// Declared (peeled) shape
    pub descriptor: TypeDescriptor,
}

/// A type that can appear in a compared object graph
///
/// Implemented for the scalar allowlist (see [`crate::scalar_diffable`]),
/// the standard collections, `Option`/`Box`/`Arc`, and by
/// `#[derive(Diffable)]` for user types.
pub trait Diffable: Sized + Send + Sync + 'static {
    /// Declared shape of the type
    fn descriptor() -> TypeDescriptor;

    /// Plan the comparison of a member of this type
    fn plan_member<P: 'static>(cx: &mut PlanContext, member: Member<P, Self>) -> Option<Step<P>>;

    /// Plan the comparison of a sequence whose elements have this type
    fn plan_elements<P: 'static>(cx: &mut PlanContext, elements: Elements<P, Self>) -> Option<Step<P>> {
        cx.unsupported(elements.path(), "sequence element");
        None
    }

    /// Plan the comparison of a map whose values have this type
    fn plan_entries<P: 'static, K: MapKey>(cx: &mut PlanContext, entries: Entries<P, K, Self>) -> Option<Step<P>> {
        cx.unsupported(entries.path(), "map value");
        None
    }
}

/// A type with named members
pub trait Object: Diffable {
    /// Declare members in comparison order
    fn members(members: &mut Members<Self>);
}

/// Keys usable in maps and merge-key selectors
pub trait MapKey: fmt::Display + Hash + Eq + Clone + Send + Sync + 'static {}

impl<K: fmt::Display + Hash + Eq + Clone + Send + Sync + 'static> MapKey for K {}
