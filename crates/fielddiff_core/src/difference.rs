//! The difference record produced by comparisons.

use crate::value::{Scalar, Value};
use serde::Serialize;
use std::fmt;

/// One named change between an old and a new value
///
/// `name` is a dotted path from the compared root (`Child.GrandChild.Name`,
/// `Names.en`, `Children.{New 1}.Id`). An absent side is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difference {
    /// Dotted path of the changed value
    pub name: String,
    /// Value in the old object
    pub old_value: Option<Value>,
    /// Value in the new object
    pub new_value: Option<Value>,
}

impl Difference {
    /// Create a difference
    #[must_use]
    pub fn new(name: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            name: name.into(),
            old_value,
            new_value,
        }
    }

    /// A value that only exists on the new side
    #[must_use]
    pub fn added(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, None, Some(value))
    }

    /// A value that only exists on the old side
    #[must_use]
    pub fn removed(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, Some(value), None)
    }

    /// Prepend `prefix` to the name; `prefix` carries its own trailing separator
    #[must_use]
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.name.insert_str(0, prefix);
        self
    }

    /// Old value as `T`
    #[must_use]
    pub fn old_as<T: Scalar>(&self) -> Option<&T> {
        self.old_value.as_ref().and_then(Value::downcast_ref)
    }

    /// New value as `T`
    #[must_use]
    pub fn new_as<T: Scalar>(&self) -> Option<&T> {
        self.new_value.as_ref().and_then(Value::downcast_ref)
    }

    /// True when only the new side carries a value
    #[must_use]
    pub fn is_addition(&self) -> bool {
        self.old_value.is_none() && self.new_value.is_some()
    }

    /// True when only the old side carries a value
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_none()
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: &Option<Value>| v.as_ref().map_or_else(|| "<absent>".to_string(), Value::to_string);
        write!(f, "{}: {} -> {}", self.name, side(&self.old_value), side(&self.new_value))
    }
}
