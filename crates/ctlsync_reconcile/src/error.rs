//! Error types for reconciliation.

use thiserror::Error;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that can occur before a reconciliation pass starts.
///
/// A key missing from the master is a data-quality finding and is reported
/// through [`crate::ReconcileStats::unmatched`], not through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A required column is missing from a table header.
    #[error("column '{column}' not found in {table} table")]
    ColumnNotFound {
        /// Which table was being inspected ("master" or "target").
        table: String,
        /// The missing column name.
        column: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ReconcileError::ColumnNotFound {
            table: "target".into(),
            column: "Suggested Mappings".into(),
        };
        assert_eq!(
            err.to_string(),
            "column 'Suggested Mappings' not found in target table"
        );
    }
}
