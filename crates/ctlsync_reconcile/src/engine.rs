//! The reconciliation pass.
//!
//! Given a master collection and a target collection of mapping rows, every
//! target row whose key appears in the master gains the master tags it is
//! missing. Nothing is ever removed.

use crate::key::CapabilityKey;
use crate::tags::TagSet;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One row of a mapping collection.
///
/// Both fields are stored verbatim. `tags` is the raw newline-delimited
/// cell; it is only rewritten when new tags are merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    /// Capability name as it appears in the source.
    pub capability: String,
    /// Raw tag cell.
    pub tags: String,
}

impl MappingRow {
    /// Creates a new mapping row.
    pub fn new(capability: impl Into<String>, tags: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            tags: tags.into(),
        }
    }

    /// Returns the normalized key, or `None` for a blank name.
    pub fn key(&self) -> Option<CapabilityKey> {
        CapabilityKey::normalize(&self.capability)
    }

    /// Parses the tag cell.
    pub fn tag_set(&self) -> TagSet {
        TagSet::parse(&self.tags)
    }
}

/// Lookup from normalized capability key to the union of its master tags.
#[derive(Debug, Clone, Default)]
pub struct MasterLookup {
    entries: HashMap<CapabilityKey, TagSet>,
}

impl MasterLookup {
    /// Builds the lookup from master rows.
    ///
    /// Rows sharing a normalized key have their tag sets unioned. Rows with
    /// a blank name are ignored.
    pub fn build<'a>(rows: impl IntoIterator<Item = &'a MappingRow>) -> Self {
        let mut entries: HashMap<CapabilityKey, TagSet> = HashMap::new();
        for row in rows {
            let Some(key) = row.key() else {
                continue;
            };
            entries.entry(key).or_default().union_with(&row.tag_set());
        }
        Self { entries }
    }

    /// Returns the merged tags for a key.
    pub fn get(&self, key: &CapabilityKey) -> Option<&TagSet> {
        self.entries.get(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the master had no usable rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reconciles target rows against this lookup.
    pub fn reconcile(&self, target: &[MappingRow]) -> Reconciliation {
        let mut stats = ReconcileStats {
            master_keys: self.len(),
            ..ReconcileStats::default()
        };
        let mut seen_unmatched = HashSet::new();
        let mut rows = Vec::with_capacity(target.len());

        for (index, row) in target.iter().enumerate() {
            let Some(key) = row.key() else {
                rows.push(row.clone());
                continue;
            };

            let Some(master_tags) = self.get(&key) else {
                if seen_unmatched.insert(key.clone()) {
                    stats.unmatched.push(key.to_string());
                }
                rows.push(row.clone());
                continue;
            };

            let mut current = row.tag_set();
            let missing = master_tags.missing_from(&current);
            if missing.is_empty() {
                rows.push(row.clone());
                continue;
            }

            for tag in &missing {
                current.insert(tag.as_str());
            }
            debug!(capability = %key, added = missing.len(), "merging missing tags");

            stats.rows_updated += 1;
            stats.tags_added += missing.len();
            stats.changes.push(RowChange {
                index,
                capability: key.to_string(),
                added: missing,
            });
            rows.push(MappingRow {
                capability: row.capability.clone(),
                tags: current.render(),
            });
        }

        Reconciliation { rows, stats }
    }
}

/// A single row that gained tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    /// Position of the row in the target collection.
    pub index: usize,
    /// Normalized capability key.
    pub capability: String,
    /// Tags that were added, sorted.
    pub added: Vec<String>,
}

/// Statistics about a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Number of distinct keys in the master.
    pub master_keys: usize,
    /// Number of target rows that gained at least one tag.
    pub rows_updated: usize,
    /// Total number of tags added across all rows.
    pub tags_added: usize,
    /// Target keys with no master entry, once each, in order of first appearance.
    pub unmatched: Vec<String>,
    /// Per-row detail of what was added.
    pub changes: Vec<RowChange>,
}

impl ReconcileStats {
    /// Returns true if the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.rows_updated == 0
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The updated target rows, in input order.
    pub rows: Vec<MappingRow>,
    /// What changed.
    pub stats: ReconcileStats,
}

/// Reconciles `target` against `master`.
///
/// Convenience wrapper over [`MasterLookup::build`] and
/// [`MasterLookup::reconcile`].
pub fn reconcile(master: &[MappingRow], target: &[MappingRow]) -> Reconciliation {
    MasterLookup::build(master).reconcile(target)
}
