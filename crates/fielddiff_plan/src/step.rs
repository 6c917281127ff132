//! Comparison steps.
//!
//! Synthesis produces one [`Step`] per compared member; a [`Procedure`]
//! runs them in declaration order. Steps never re-walk the type: all
//! classification happened when they were built.
//!
//! [`Procedure`]: crate::procedure::Procedure

use fielddiff_core::Difference;
use serde::Serialize;

/// Step body: `(old root, new root, output)`
pub type Run<P> = Box<dyn Fn(Option<&P>, Option<&P>, &mut Vec<Difference>) + Send + Sync>;

/// Build a [`Run`] from a closure
pub fn run<P, C>(body: C) -> Run<P>
where
    C: Fn(Option<&P>, Option<&P>, &mut Vec<Difference>) + Send + Sync + 'static,
{
    Box::new(body)
}

/// Algorithm a collection step delegates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionMode {
    /// Set difference; objects are equal when their comparison is empty
    Set,
    /// Per-key value equality
    Shallow,
    /// Per-key recursive comparison
    Deep,
    /// Object elements keyed by a merge key
    Keyed {
        /// Whether a sentinel key marks brand-new elements
        sentinel: bool,
    },
}

/// Scalar member comparison
pub struct ScalarStep<P> {
    /// Dotted path
    pub path: String,
    compare: Run<P>,
}

/// Map or sequence member comparison
pub struct CollectionStep<P> {
    /// Dotted path
    pub path: String,
    /// Delegated algorithm
    pub mode: CollectionMode,
    diff: Run<P>,
}

/// Nested object comparison
pub struct NestedStep<P> {
    /// Dotted path
    pub path: String,
    /// Outline of the nested type's steps
    pub children: Vec<StepOutline>,
    body: Run<P>,
}

/// One comparison step of a procedure over `P`
pub enum Step<P> {
    /// Compare one scalar member
    Scalar(ScalarStep<P>),
    /// Diff a map member
    Map(CollectionStep<P>),
    /// Diff a sequence member
    Sequence(CollectionStep<P>),
    /// Recurse into a nested object member
    Nested(NestedStep<P>),
}

impl<P> Step<P> {
    /// Scalar step
    #[must_use]
    pub fn scalar(path: String, compare: Run<P>) -> Self {
        Self::Scalar(ScalarStep { path, compare })
    }

    /// Map step
    #[must_use]
    pub fn map(path: String, mode: CollectionMode, diff: Run<P>) -> Self {
        Self::Map(CollectionStep { path, mode, diff })
    }

    /// Sequence step
    #[must_use]
    pub fn sequence(path: String, mode: CollectionMode, diff: Run<P>) -> Self {
        Self::Sequence(CollectionStep { path, mode, diff })
    }

    /// Nested step
    #[must_use]
    pub fn nested(path: String, children: Vec<StepOutline>, body: Run<P>) -> Self {
        Self::Nested(NestedStep { path, children, body })
    }

    /// Dotted path of the compared member
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Scalar(step) => &step.path,
            Self::Map(step) | Self::Sequence(step) => &step.path,
            Self::Nested(step) => &step.path,
        }
    }

    /// Append the differences of `old` and `new` for this member
    pub fn execute(&self, old: Option<&P>, new: Option<&P>, out: &mut Vec<Difference>) {
        match self {
            Self::Scalar(step) => (step.compare)(old, new, out),
            Self::Map(step) | Self::Sequence(step) => (step.diff)(old, new, out),
            Self::Nested(step) => (step.body)(old, new, out),
        }
    }

    /// Inspectable summary of the step
    #[must_use]
    pub fn outline(&self) -> StepOutline {
        match self {
            Self::Scalar(step) => StepOutline::leaf(&step.path, StepKind::Scalar),
            Self::Map(step) => StepOutline::leaf(&step.path, StepKind::Map(step.mode)),
            Self::Sequence(step) => StepOutline::leaf(&step.path, StepKind::Sequence(step.mode)),
            Self::Nested(step) => StepOutline {
                path: step.path.clone(),
                kind: StepKind::Nested,
                children: step.children.clone(),
            },
        }
    }
}

/// Kind of a step, for outlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    /// Scalar comparison
    Scalar,
    /// Map diff
    Map(CollectionMode),
    /// Sequence diff
    Sequence(CollectionMode),
    /// Nested object
    Nested,
}

/// Debug view of a synthesized step tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutline {
    /// Dotted path
    pub path: String,
    /// Step kind
    pub kind: StepKind,
    /// Steps of a nested object
    pub children: Vec<StepOutline>,
}

impl StepOutline {
    fn leaf(path: &str, kind: StepKind) -> Self {
        Self {
            path: path.to_string(),
            kind,
            children: Vec::new(),
        }
    }

    /// Paths of every leaf step, depth first
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<&str> {
        if self.children.is_empty() {
            return vec![self.path.as_str()];
        }
        self.children.iter().flat_map(StepOutline::leaf_paths).collect()
    }
}
