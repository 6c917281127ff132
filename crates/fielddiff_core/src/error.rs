//! Error types for fielddiff.
//!
//! Only configuration can fail. Comparison of well-typed values never does.

/// Result alias used by every fallible fielddiff operation
pub type DiffResult<T> = Result<T, DiffError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// The type already has a registered configuration
    #[error("Type {type_name} is already configured")]
    AlreadyConfigured {
        /// Configured type
        type_name: String,
    },

    /// The type was compiled with its default configuration
    #[error("Type {type_name} was compiled with its default configuration and can no longer be configured")]
    Sealed {
        /// Sealed type
        type_name: String,
    },

    /// The same member was configured twice
    #[error("Member `{member}` of {type_name} is already configured")]
    MemberAlreadyConfigured {
        /// Owning type
        type_name: String,
        /// Member name
        member: String,
    },

    /// A selector does not resolve to a simple member access
    #[error("Invalid selector `{selector}` on {type_name}: {reason}")]
    InvalidSelector {
        /// Owning type
        type_name: String,
        /// Selector as written
        selector: String,
        /// Why it was rejected
        reason: String,
    },
}

impl DiffError {
    /// True for the configuration-conflict family (duplicate type, sealed type, duplicate member)
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyConfigured { .. } | Self::Sealed { .. } | Self::MemberAlreadyConfigured { .. }
        )
    }

    /// Build an [`DiffError::InvalidSelector`]
    #[must_use]
    pub fn invalid_selector(type_name: &str, selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            type_name: type_name.to_string(),
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}
