//! Validated construction of a [`TypeConfig`].
//!
//! Every verb checks its selector against the declared members of the
//! type and fails immediately; nothing is deferred to synthesis.

use crate::config::{KeySelector, Matcher, TypeConfig};
use crate::member::Members;
use crate::shape::{Diffable, MapKey, MemberClass, MemberInfo, Object};
use fielddiff_core::{DiffError, DiffResult, TypeKey};
use indexmap::IndexSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// Builder for the configuration of `T`
pub struct TypeConfigBuilder<T> {
    config: TypeConfig,
    members: Vec<MemberInfo>,
    configured: IndexSet<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Object> TypeConfigBuilder<T> {
    /// Start from the default configuration of `T`
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TypeConfig::new(TypeKey::of::<T>()),
            members: Members::<T>::collect().infos(),
            configured: IndexSet::new(),
            _marker: PhantomData,
        }
    }

    /// Exclude a member and everything nested under it
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` for an unknown member, or
    /// `MemberAlreadyConfigured` if the member was configured before
    pub fn ignore(mut self, member: &str) -> DiffResult<Self> {
        self.resolve(member)?;
        self.claim(member)?;
        self.config.add_ignored(member);
        Ok(self)
    }

    /// Exclude every member whose declared type is `F`
    #[must_use]
    pub fn ignore_type<F: Diffable>(mut self) -> Self {
        self.config.add_ignored_type(F::descriptor().key);
        self
    }

    /// Compare `Field` members as well as properties
    #[must_use]
    pub fn compare_fields(mut self) -> Self {
        self.config.set_compare_fields();
        self
    }

    /// Compare a map of objects field by field instead of as whole values
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` unless the member is a map with object
    /// values, or `MemberAlreadyConfigured`
    pub fn deep_compare(mut self, member: &str) -> DiffResult<Self> {
        let info = self.resolve(member)?;
        if info.descriptor.class != MemberClass::Map {
            return Err(self.invalid(member, format!("expected a map member, found {}", info.descriptor.class)));
        }
        let value_class = info.descriptor.element().map(|element| element.class);
        if value_class != Some(MemberClass::Object) {
            return Err(self.invalid(member, "deep comparison needs object values"));
        }
        self.claim(member)?;
        self.config.add_deep_map(member);
        Ok(self)
    }

    /// Match the elements of a sequence of `E` by their `key` member
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` if `member` is not a sequence of `E` or
    /// `key` is not a member of `E` of type `K`, or `MemberAlreadyConfigured`
    pub fn match_using<E: Object, K: MapKey>(self, member: &str, key: &str) -> DiffResult<Self> {
        self.add_matcher::<E, K>(member, key, None)
    }

    /// Like [`Self::match_using`]; elements whose key equals `sentinel`
    /// are always reported as new
    ///
    /// # Errors
    ///
    /// Same as [`Self::match_using`]
    pub fn match_using_or_new<E: Object, K: MapKey>(self, member: &str, key: &str, sentinel: K) -> DiffResult<Self> {
        self.add_matcher::<E, K>(member, key, Some(sentinel))
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> TypeConfig {
        self.config
    }

    fn add_matcher<E: Object, K: MapKey>(mut self, member: &str, key: &str, sentinel: Option<K>) -> DiffResult<Self> {
        let info = self.resolve(member)?;
        if info.descriptor.class != MemberClass::Sequence {
            return Err(self.invalid(member, format!("expected a sequence member, found {}", info.descriptor.class)));
        }
        let element = info.descriptor.element().map(|element| element.key);
        if element != Some(TypeKey::of::<E>()) {
            return Err(self.invalid(
                member,
                format!("elements are not of type {}", TypeKey::of::<E>().short_name()),
            ));
        }

        check_simple(key).map_err(|reason| DiffError::invalid_selector(TypeKey::of::<E>().name(), key, reason))?;
        let elements = Members::<E>::collect();
        let Some(def) = elements.find(key) else {
            return Err(DiffError::invalid_selector(TypeKey::of::<E>().name(), key, "unknown member"));
        };
        let Some(getter) = def.getter::<K>() else {
            return Err(DiffError::invalid_selector(
                TypeKey::of::<E>().name(),
                key,
                format!("key member is not of type {}", TypeKey::of::<K>().short_name()),
            ));
        };

        self.claim(member)?;
        let selector: KeySelector<E, K> = Arc::new(move |element: &E| getter(element).clone());
        self.config.add_matcher(member, Matcher::new(key, selector, sentinel));
        Ok(self)
    }

    fn resolve(&self, member: &str) -> DiffResult<MemberInfo> {
        check_simple(member).map_err(|reason| self.invalid(member, reason))?;
        self.members
            .iter()
            .find(|info| info.name == member)
            .cloned()
            .ok_or_else(|| self.invalid(member, "unknown member"))
    }

    fn claim(&mut self, member: &str) -> DiffResult<()> {
        if !self.configured.insert(member.to_string()) {
            return Err(DiffError::MemberAlreadyConfigured {
                type_name: TypeKey::of::<T>().name().to_string(),
                member: member.to_string(),
            });
        }
        Ok(())
    }

    fn invalid(&self, selector: &str, reason: impl Into<String>) -> DiffError {
        DiffError::invalid_selector(TypeKey::of::<T>().name(), selector, reason)
    }
}

impl<T: Object> Default for TypeConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A selector must name one member directly
fn check_simple(selector: &str) -> Result<(), &'static str> {
    if selector.is_empty() {
        return Err("empty selector");
    }
    if !selector.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err("not a simple member access");
    }
    Ok(())
}
