//! Finalized per-type configuration.
//!
//! A [`TypeConfig`] is built by [`crate::builder::TypeConfigBuilder`],
//! published once in a [`crate::registry::ConfigRegistry`] and read-only
//! from then on. Synthesis only asks it questions.

use crate::collection;
use crate::options::DiffOptions;
use crate::shape::MapKey;
use fielddiff_core::{Difference, TypeKey};
use indexmap::{IndexMap, IndexSet};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Key extraction for merge-keyed sequences
pub type KeySelector<E, K> = Arc<dyn Fn(&E) -> K + Send + Sync>;

/// Per-element comparison handed to keyed diffs
pub type ElementCompare<'a, E> = &'a dyn Fn(Option<&E>, Option<&E>) -> Vec<Difference>;

/// Keyed sequence diff with its key type erased:
/// `(name, old, new, compare, options, output)`
pub type KeyedRunner<E> = Arc<
    dyn Fn(&str, &[Option<&E>], &[Option<&E>], ElementCompare<'_, E>, &DiffOptions, &mut Vec<Difference>)
        + Send
        + Sync,
>;

fn keyed_runner<E, C>(body: C) -> KeyedRunner<E>
where
    C: Fn(&str, &[Option<&E>], &[Option<&E>], ElementCompare<'_, E>, &DiffOptions, &mut Vec<Difference>)
        + Send
        + Sync
        + 'static,
{
    Arc::new(body)
}

/// Merge-key configuration of one sequence member
#[derive(Clone)]
pub struct Matcher {
    key_member: String,
    key_type: TypeKey,
    element_type: TypeKey,
    sentinel: Option<String>,
    runner: Arc<dyn Any + Send + Sync>,
}

impl Matcher {
    /// Match elements of type `E` by the key `selector` returns
    ///
    /// Elements whose key equals `sentinel` are always reported as new.
    #[must_use]
    pub fn new<E, K>(key_member: &str, selector: KeySelector<E, K>, sentinel: Option<K>) -> Self
    where
        E: Send + Sync + 'static,
        K: MapKey,
    {
        let rendered = sentinel.as_ref().map(ToString::to_string);
        let runner = keyed_runner(move |name, old, new, compare, options, out| {
            collection::diff_keyed_sequence(
                name,
                old,
                new,
                &*selector,
                sentinel.as_ref(),
                compare,
                options,
                out,
            );
        });
        Self {
            key_member: key_member.to_string(),
            key_type: TypeKey::of::<K>(),
            element_type: TypeKey::of::<E>(),
            sentinel: rendered,
            runner: Arc::new(runner),
        }
    }

    /// Name of the key member on the element type
    #[must_use]
    pub fn key_member(&self) -> &str {
        &self.key_member
    }

    /// Rendered sentinel key, if any
    #[must_use]
    pub fn sentinel(&self) -> Option<&str> {
        self.sentinel.as_deref()
    }

    /// The keyed diff for elements of type `E`
    #[must_use]
    pub fn runner<E: 'static>(&self) -> Option<KeyedRunner<E>> {
        self.runner.downcast_ref::<KeyedRunner<E>>().cloned()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("key_member", &self.key_member)
            .field("key_type", &self.key_type)
            .field("element_type", &self.element_type)
            .field("sentinel", &self.sentinel)
            .finish()
    }
}

/// What synthesis needs to know about one member
#[derive(Debug, Clone, Default)]
pub struct MemberSettings {
    /// Map member marked for deep comparison
    pub deep: bool,
    /// Merge key of a sequence member
    pub matcher: Option<Matcher>,
}

/// Read-only configuration of one type
#[derive(Debug, Clone)]
pub struct TypeConfig {
    type_key: TypeKey,
    compare_fields: bool,
    ignored: IndexSet<String>,
    ignored_types: IndexSet<TypeKey>,
    deep_maps: IndexSet<String>,
    matchers: IndexMap<String, Matcher>,
}

impl TypeConfig {
    /// Default configuration: nothing ignored, properties only
    #[must_use]
    pub fn new(type_key: TypeKey) -> Self {
        Self {
            type_key,
            compare_fields: false,
            ignored: IndexSet::new(),
            ignored_types: IndexSet::new(),
            deep_maps: IndexSet::new(),
            matchers: IndexMap::new(),
        }
    }

    /// Configured type
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Whether field members are compared
    #[must_use]
    pub fn compares_fields(&self) -> bool {
        self.compare_fields
    }

    /// Whether the member is ignored
    #[must_use]
    pub fn is_ignored(&self, member: &str) -> bool {
        self.ignored.contains(member)
    }

    /// Whether members of the (peeled) declared type are ignored
    #[must_use]
    pub fn is_type_ignored(&self, key: TypeKey) -> bool {
        self.ignored_types.contains(&key)
    }

    /// Whether the map member is marked for deep comparison
    #[must_use]
    pub fn is_deep_compare(&self, member: &str) -> bool {
        self.deep_maps.contains(member)
    }

    /// Merge key of a sequence member
    #[must_use]
    pub fn matcher(&self, member: &str) -> Option<&Matcher> {
        self.matchers.get(member)
    }

    /// Ignored member names in configuration order
    pub fn ignored(&self) -> impl Iterator<Item = &str> {
        self.ignored.iter().map(String::as_str)
    }

    /// Settings handed to the planner of `member`
    #[must_use]
    pub fn settings(&self, member: &str) -> MemberSettings {
        MemberSettings {
            deep: self.is_deep_compare(member),
            matcher: self.matcher(member).cloned(),
        }
    }

    pub(crate) fn set_compare_fields(&mut self) {
        self.compare_fields = true;
    }

    pub(crate) fn add_ignored(&mut self, member: &str) {
        self.ignored.insert(member.to_string());
    }

    pub(crate) fn add_ignored_type(&mut self, key: TypeKey) {
        self.ignored_types.insert(key);
    }

    pub(crate) fn add_deep_map(&mut self, member: &str) {
        self.deep_maps.insert(member.to_string());
    }

    pub(crate) fn add_matcher(&mut self, member: &str, matcher: Matcher) {
        self.matchers.insert(member.to_string(), matcher);
    }
}
