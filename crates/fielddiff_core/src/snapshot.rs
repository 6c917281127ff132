//! Leaf-value snapshots of whole objects.

use crate::difference::Difference;
use crate::value::{Scalar, Value};

/// The leaf values of one object, by dotted member path
///
/// Set diffs and shallow map diffs treat objects as whole values; the
/// value they report for an object is its `Snapshot`. Two snapshots are
/// equal when they list the same paths with equal values in the same
/// order. A path can repeat when the object holds a sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    fields: Vec<(String, Option<Value>)>,
}

impl Snapshot {
    /// Snapshot built from the differences of comparing nothing against an object
    #[must_use]
    pub fn from_additions(differences: Vec<Difference>) -> Self {
        Self {
            fields: differences.into_iter().map(|d| (d.name, d.new_value)).collect(),
        }
    }

    /// First value recorded at `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == path)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Paths and values in member order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Number of recorded leaf values
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the object had no leaf values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn repeats(&self, path: &str) -> bool {
        self.fields.iter().filter(|(name, _)| name == path).count() > 1
    }
}

impl Scalar for Snapshot {
    /// A JSON object keyed by path; repeated paths collect into an array
    fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.fields {
            let value = value.as_ref().map_or(serde_json::Value::Null, Value::to_json);
            if !self.repeats(name) {
                object.insert(name.clone(), value);
                continue;
            }
            let slot = object
                .entry(name.clone())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if let serde_json::Value::Array(values) = slot {
                values.push(value);
            }
        }
        serde_json::Value::Object(object)
    }
}
