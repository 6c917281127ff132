//! [`Diffable`] for the scalar allowlist, wrappers and standard collections.

use crate::member::{element_reader, entry_reader, Elements, Entries, Member};
use crate::shape::{Diffable, MapKey, TypeDescriptor};
use crate::step::Step;
use crate::synth::PlanContext;
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Implement [`Diffable`] for types that implement [`crate::Scalar`]
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Money(i64);
/// impl fielddiff::Scalar for Money {}
/// fielddiff::scalar_diffable!(Money);
/// ```
#[macro_export]
macro_rules! scalar_diffable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Diffable for $ty {
                fn descriptor() -> $crate::TypeDescriptor {
                    $crate::TypeDescriptor::scalar::<Self>()
                }

                fn plan_member<P: 'static>(
                    cx: &mut $crate::PlanContext,
                    member: $crate::Member<P, Self>,
                ) -> Option<$crate::Step<P>> {
                    Some(cx.scalar(member))
                }

                fn plan_elements<P: 'static>(
                    cx: &mut $crate::PlanContext,
                    elements: $crate::Elements<P, Self>,
                ) -> Option<$crate::Step<P>> {
                    Some(cx.scalar_set(elements))
                }

                fn plan_entries<P: 'static, K: $crate::MapKey>(
                    cx: &mut $crate::PlanContext,
                    entries: $crate::Entries<P, K, Self>,
                ) -> Option<$crate::Step<P>> {
                    Some(cx.scalar_map(entries))
                }
            }
        )*
    };
}

/// Implement [`Diffable`] for types that implement [`crate::Object`] by hand
#[macro_export]
macro_rules! object_diffable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Diffable for $ty {
                fn descriptor() -> $crate::TypeDescriptor {
                    $crate::TypeDescriptor::object::<Self>()
                }

                fn plan_member<P: 'static>(
                    cx: &mut $crate::PlanContext,
                    member: $crate::Member<P, Self>,
                ) -> Option<$crate::Step<P>> {
                    cx.nested(member)
                }

                fn plan_elements<P: 'static>(
                    cx: &mut $crate::PlanContext,
                    elements: $crate::Elements<P, Self>,
                ) -> Option<$crate::Step<P>> {
                    Some(cx.object_elements(elements))
                }

                fn plan_entries<P: 'static, K: $crate::MapKey>(
                    cx: &mut $crate::PlanContext,
                    entries: $crate::Entries<P, K, Self>,
                ) -> Option<$crate::Step<P>> {
                    Some(cx.object_entries(entries))
                }
            }
        )*
    };
}

scalar_diffable!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str, Box<str>, Arc<str>, (),
    std::time::Duration, std::time::SystemTime,
    std::net::IpAddr, std::net::Ipv4Addr, std::net::Ipv6Addr, std::net::SocketAddr,
    std::path::PathBuf,
    chrono::NaiveDate, chrono::NaiveTime, chrono::NaiveDateTime, chrono::TimeDelta,
    chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::FixedOffset>, chrono::DateTime<chrono::Local>,
    uuid::Uuid,
);

#[allow(clippy::borrowed_box)]
fn unbox<T>(boxed: &Box<T>) -> Option<&T> {
    Some(&**boxed)
}

fn unarc<T>(shared: &Arc<T>) -> Option<&T> {
    Some(&**shared)
}

/// `Option`, `Box` and `Arc` forward to the inner type; `None` is an absent value
macro_rules! forward_diffable {
    ($wrapper:ident, $peel:expr) => {
        impl<T: Diffable> Diffable for $wrapper<T> {
            fn descriptor() -> TypeDescriptor {
                T::descriptor()
            }

            fn plan_member<P: 'static>(cx: &mut PlanContext, member: Member<P, Self>) -> Option<Step<P>> {
                T::plan_member(cx, member.project($peel))
            }

            fn plan_elements<P: 'static>(cx: &mut PlanContext, elements: Elements<P, Self>) -> Option<Step<P>> {
                T::plan_elements(cx, elements.flat_map($peel))
            }

            fn plan_entries<P: 'static, K: MapKey>(cx: &mut PlanContext, entries: Entries<P, K, Self>) -> Option<Step<P>> {
                T::plan_entries(cx, entries.flat_map($peel))
            }
        }
    };
}

forward_diffable!(Option, Option::as_ref);
forward_diffable!(Box, unbox);
forward_diffable!(Arc, unarc);

/// Sequences: elements are read in iteration order
macro_rules! sequence_diffable {
    ($($seq:ident),* $(,)?) => {
        $(
            impl<E: Diffable> Diffable for $seq<E> {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::sequence::<Self, E>()
                }

                fn plan_member<P: 'static>(cx: &mut PlanContext, member: Member<P, Self>) -> Option<Step<P>> {
                    let (path, settings, access) = member.into_parts();
                    let read = element_reader(move |parent: &P| {
                        access(parent).map(|seq| seq.iter().map(Some).collect()).unwrap_or_default()
                    });
                    E::plan_elements(cx, Elements::new(path, settings, read))
                }
            }
        )*
    };
}

sequence_diffable!(Vec, VecDeque, HashSet, BTreeSet, IndexSet);

/// Maps: entries are read in iteration order
macro_rules! map_diffable {
    ($($map:ident),* $(,)?) => {
        $(
            impl<K: MapKey, V: Diffable> Diffable for $map<K, V> {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::map::<Self, V>()
                }

                fn plan_member<P: 'static>(cx: &mut PlanContext, member: Member<P, Self>) -> Option<Step<P>> {
                    let (path, settings, access) = member.into_parts();
                    let read = entry_reader(move |parent: &P| {
                        access(parent)
                            .map(|map| map.iter().map(|(key, value)| (key, Some(value))).collect())
                            .unwrap_or_default()
                    });
                    V::plan_entries(cx, Entries::new(path, settings, read))
                }
            }
        )*
    };
}

map_diffable!(HashMap, BTreeMap, IndexMap);
