//! Newline-delimited tag sets.

use std::collections::BTreeSet;

/// A set of control identifiers parsed from a newline-delimited cell.
///
/// Iteration and rendering are in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Creates an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a cell value. Each non-blank line, trimmed, is one tag.
    pub fn parse(cell: &str) -> Self {
        Self(
            cell.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Renders the set back to a cell value, one tag per line, sorted.
    pub fn render(&self) -> String {
        self.0.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    /// Adds every tag of `other` to this set.
    pub fn union_with(&mut self, other: &TagSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Returns the tags of `self` that are not in `other`, sorted.
    pub fn missing_from(&self, other: &TagSet) -> Vec<String> {
        self.0.difference(&other.0).cloned().collect()
    }

    /// Inserts a tag. Returns false if it was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// Returns true if the tag is present.
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Returns true if `self` holds every tag in `other`.
    pub fn is_superset(&self, other: &TagSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
