//! # ctlsync reconcile
//!
//! Additive reconciliation of control mappings.
//!
//! This crate provides:
//! - Capability key normalization
//! - Newline-delimited tag sets
//! - A master lookup that unions duplicate keys
//! - The reconciliation pass itself
//! - A column-addressed table adapter
//!
//! ## Key Invariants
//!
//! - Reconciliation only adds tags, it never removes or rewrites them
//! - Rows without missing tags come back unchanged
//! - Running the pass on its own output changes nothing
//! - Non-tag columns are never touched

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod key;
mod table;
mod tags;

pub use engine::{reconcile, MappingRow, MasterLookup, Reconciliation, ReconcileStats, RowChange};
pub use error::{ReconcileError, ReconcileResult};
pub use key::CapabilityKey;
pub use table::{reconcile_tables, ColumnSpec, Row, Table, TableReconciliation};
pub use tags::TagSet;
