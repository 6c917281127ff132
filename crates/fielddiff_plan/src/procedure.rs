//! Synthesized comparison procedures.

use crate::step::{Step, StepOutline};
use fielddiff_core::{Difference, Snapshot, TypeKey};
use std::fmt;
use std::sync::Arc;

struct Inner<T> {
    type_key: TypeKey,
    steps: Vec<Step<T>>,
}

/// Reusable comparison of two values of `T`
///
/// Cloning is cheap. A procedure is pure: the same inputs always produce
/// the same differences, in member declaration order.
pub struct Procedure<T> {
    inner: Arc<Inner<T>>,
}

impl<T: 'static> Procedure<T> {
    /// Wrap synthesized steps
    #[must_use]
    pub fn new(steps: Vec<Step<T>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                type_key: TypeKey::of::<T>(),
                steps,
            }),
        }
    }

    /// Compare two possibly absent values
    ///
    /// Nothing is reported when both are absent.
    #[must_use]
    pub fn compare(&self, old: Option<&T>, new: Option<&T>) -> Vec<Difference> {
        let mut out = Vec::new();
        if old.is_none() && new.is_none() {
            return out;
        }
        for step in &self.inner.steps {
            step.execute(old, new, &mut out);
        }
        out
    }

    /// Compare two present values
    #[must_use]
    pub fn call(&self, old: &T, new: &T) -> Vec<Difference> {
        self.compare(Some(old), Some(new))
    }

    /// Whether two values compare without differences
    #[must_use]
    pub fn same(&self, old: &T, new: &T) -> bool {
        self.call(old, new).is_empty()
    }

    /// Every leaf value of `value`, as reported when it is added
    #[must_use]
    pub fn snapshot(&self, value: &T) -> Snapshot {
        Snapshot::from_additions(self.compare(None, Some(value)))
    }

    /// Compared type
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.inner.type_key
    }

    /// Number of top-level steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.steps.len()
    }

    /// Whether the type has nothing to compare
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.steps.is_empty()
    }

    /// Debug view of the step tree
    #[must_use]
    pub fn outline(&self) -> Vec<StepOutline> {
        self.inner.steps.iter().map(Step::outline).collect()
    }
}

impl<T> Clone for Procedure<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Procedure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("type", &self.inner.type_key)
            .field("steps", &self.inner.steps.len())
            .finish()
    }
}
