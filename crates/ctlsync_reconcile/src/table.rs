//! Column-addressed tables.
//!
//! Callers hand over rows as column→value maps. The identity and tag
//! columns are named by a [`ColumnSpec`]; every other column is carried
//! through untouched.

use crate::engine::{MappingRow, MasterLookup, ReconcileStats};
use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// One table row: column name to cell value.
pub type Row = BTreeMap<String, String>;

/// An ordered set of rows sharing a header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Column names, in header order.
    pub columns: Vec<String>,
    /// Rows, in source order. A row may omit cells; a missing cell reads as empty.
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Table {
    /// Creates a table with the given header and no rows.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row built from `(column, value)` pairs.
    pub fn with_row<K, V>(mut self, cells: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.rows
            .push(cells.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Returns true if the header contains `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    fn require_column(&self, table: &str, column: &str) -> ReconcileResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(ReconcileError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }

    fn mapping_rows(&self, spec: &ColumnSpec) -> Vec<MappingRow> {
        self.rows
            .iter()
            .map(|row| {
                MappingRow::new(
                    cell(row, &spec.key_column),
                    cell(row, &spec.tags_column),
                )
            })
            .collect()
    }
}

fn cell<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).map(String::as_str).unwrap_or("")
}

/// Names of the identity and tag columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column holding the capability name.
    pub key_column: String,
    /// Column holding the newline-delimited tags.
    pub tags_column: String,
}

impl ColumnSpec {
    /// Creates a column spec.
    pub fn new(key_column: impl Into<String>, tags_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            tags_column: tags_column.into(),
        }
    }
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self::new("Solution Capability", "Suggested Mappings")
    }
}

/// Result of reconciling two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReconciliation {
    /// The updated target table.
    pub table: Table,
    /// What changed.
    pub stats: ReconcileStats,
}

/// Reconciles the tag column of `target` against `master`.
///
/// Both tables must carry both columns named by `spec`; otherwise
/// [`ReconcileError::ColumnNotFound`] is returned and nothing is computed.
/// Only the tag cells of updated rows change; a row that had no tag cell
/// gains one when tags are merged in.
pub fn reconcile_tables(
    master: &Table,
    target: &Table,
    spec: &ColumnSpec,
) -> ReconcileResult<TableReconciliation> {
    master.require_column("master", &spec.key_column)?;
    master.require_column("master", &spec.tags_column)?;
    target.require_column("target", &spec.key_column)?;
    target.require_column("target", &spec.tags_column)?;

    let lookup = MasterLookup::build(&master.mapping_rows(spec));
    let outcome = lookup.reconcile(&target.mapping_rows(spec));

    let mut table = target.clone();
    for change in &outcome.stats.changes {
        let merged = outcome.rows[change.index].tags.clone();
        table.rows[change.index].insert(spec.tags_column.clone(), merged);
    }

    info!(
        master_keys = outcome.stats.master_keys,
        rows_updated = outcome.stats.rows_updated,
        tags_added = outcome.stats.tags_added,
        unmatched = outcome.stats.unmatched.len(),
        "reconciled target table"
    );

    Ok(TableReconciliation {
        table,
        stats: outcome.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: &str = "Solution Capability";
    const MAP: &str = "Suggested Mappings";

    fn master() -> Table {
        Table::new([CAP, MAP])
            .with_row([(CAP, "Access Control:"), (MAP, "AC-1\nAC-2")])
            .with_row([(CAP, "Audit"), (MAP, "AU-2")])
    }

    #[test]
    fn other_columns_are_preserved() {
        let target = Table::new([CAP, MAP, "Owner"])
            .with_row([(CAP, "Access Control"), (MAP, "AC-1"), ("Owner", "alice")]);

        let result = reconcile_tables(&master(), &target, &ColumnSpec::default()).unwrap();

        let row = &result.table.rows[0];
        assert_eq!(row.get(MAP).unwrap(), "AC-1\nAC-2");
        assert_eq!(row.get("Owner").unwrap(), "alice");
        assert_eq!(row.get(CAP).unwrap(), "Access Control");
        assert_eq!(result.table.columns, target.columns);
    }

    #[test]
    fn missing_tag_cell_is_created_on_merge() {
        let target = Table::new([CAP, MAP]).with_row([(CAP, "Audit")]);

        let result = reconcile_tables(&master(), &target, &ColumnSpec::default()).unwrap();

        assert_eq!(result.table.rows[0].get(MAP).unwrap(), "AU-2");
    }

    #[test]
    fn missing_column_is_fatal() {
        let target = Table::new([CAP]).with_row([(CAP, "Audit")]);

        let err = reconcile_tables(&master(), &target, &ColumnSpec::default()).unwrap_err();

        assert_eq!(
            err,
            ReconcileError::ColumnNotFound {
                table: "target".into(),
                column: MAP.into(),
            }
        );
    }

    #[test]
    fn custom_column_names() {
        let spec = ColumnSpec::new("Name", "Tags");
        let master = Table::new(["Name", "Tags"]).with_row([("Name", "X"), ("Tags", "t1\nt2")]);
        let target = Table::new(["Name", "Tags"]).with_row([("Name", "X"), ("Tags", "t2")]);

        let result = reconcile_tables(&master, &target, &spec).unwrap();

        assert_eq!(result.table.rows[0].get("Tags").unwrap(), "t1\nt2");
        assert_eq!(result.stats.tags_added, 1);
    }

    #[test]
    fn table_json_shape() {
        let json = r#"{"columns":["Solution Capability","Suggested Mappings"],
                       "rows":[{"Solution Capability":"Audit","Suggested Mappings":"AU-2"}]}"#;
        let table: Table = serde_json::from_str(json).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert!(table.has_column(MAP));
    }
}
