//! Engine-wide comparison options.

use serde::{Deserialize, Serialize};

/// Options shared by every procedure an engine synthesizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Separator between path segments
    pub separator: String,
    /// Label used for sentinel-keyed additions (`{New 1}`)
    pub new_item_label: String,
    /// Compare `Field` members of every type, not only configured ones
    pub compare_fields: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            new_item_label: "New".to_string(),
            compare_fields: false,
        }
    }
}

impl DiffOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path separator
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Set the sentinel addition label
    #[must_use]
    pub fn with_new_item_label(mut self, label: impl Into<String>) -> Self {
        self.new_item_label = label.into();
        self
    }

    /// Enable field comparison for every type
    #[must_use]
    pub fn with_compare_fields(mut self, enabled: bool) -> Self {
        self.compare_fields = enabled;
        self
    }

    /// Parse options from JSON; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the input is not a JSON object of options
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Join a parent path and a segment
    #[must_use]
    pub fn join(&self, parent: &str, segment: &str) -> String {
        format!("{}{}{}", parent, self.separator, segment)
    }

    /// Label for the `ordinal`-th sentinel addition
    #[must_use]
    pub fn new_item(&self, ordinal: usize) -> String {
        format!("{{{} {}}}", self.new_item_label, ordinal)
    }
}
