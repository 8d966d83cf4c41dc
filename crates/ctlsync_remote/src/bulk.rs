//! Bulk record creation with duplicate detection.
//!
//! Items are processed strictly in input order, one at a time. A failure on
//! one item is recorded against that item and never aborts the batch, so a
//! finished [`SyncReport`] always satisfies
//! `created + skipped + failed == total == items.len()`.

use crate::error::SyncError;
use crate::record::{Record, RecordInput};
use crate::store::RecordStore;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options controlling a bulk create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    /// Compare each item against existing records before creating it.
    pub check_duplicates: bool,
    /// Create items even when a duplicate exists.
    pub allow_duplicates: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            check_duplicates: true,
            allow_duplicates: false,
        }
    }
}

impl BulkOptions {
    /// Sets whether duplicates are checked.
    pub fn with_check_duplicates(mut self, check: bool) -> Self {
        self.check_duplicates = check;
        self
    }

    /// Sets whether duplicates are created anyway.
    pub fn with_allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    fn skips_duplicates(&self) -> bool {
        self.check_duplicates && !self.allow_duplicates
    }
}

/// Status of one item, as reported to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// The item is about to be handled.
    Processing,
    /// The item was created.
    Success,
    /// The item was a duplicate and was not created.
    Skipped,
    /// Creating the item failed.
    Failed,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Processing => "processing",
            ItemStatus::Success => "success",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        };
        f.pad(s)
    }
}

/// A progress notification, emitted on every status transition of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<'a> {
    /// 1-based position of the item.
    pub current: usize,
    /// Number of items in the batch.
    pub total: usize,
    /// Display label of the item.
    pub label: &'a str,
    /// New status of the item.
    pub status: ItemStatus,
}

/// An item that was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedItem {
    /// Display label of the input item.
    pub name: String,
    /// The record returned by the store.
    pub record: Record,
}

/// An item that was skipped as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    /// Display label of the input item.
    pub name: String,
    /// Id of the existing record it duplicates.
    pub existing_id: String,
}

/// An item that could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Display label of the input item.
    pub name: String,
    /// Why it failed.
    pub error: String,
}

/// Outcome of a bulk create.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Number of input items.
    pub total: usize,
    /// Number created.
    pub created: usize,
    /// Number skipped as duplicates.
    pub skipped: usize,
    /// Number that failed.
    pub failed: usize,
    /// Created items, in input order.
    pub created_items: Vec<CreatedItem>,
    /// Skipped items, in input order.
    pub skipped_items: Vec<SkippedItem>,
    /// Failed items, in input order.
    pub failed_items: Vec<FailedItem>,
}

impl SyncReport {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Returns true if every item has exactly one outcome.
    pub fn is_balanced(&self) -> bool {
        self.created + self.skipped + self.failed == self.total
    }

    /// Returns true if any item failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record_created(&mut self, name: String, record: Record) {
        self.created += 1;
        self.created_items.push(CreatedItem { name, record });
    }

    fn record_skipped(&mut self, name: String, existing_id: String) {
        self.skipped += 1;
        self.skipped_items.push(SkippedItem { name, existing_id });
    }

    fn record_failed(&mut self, name: String, error: String) {
        self.failed += 1;
        self.failed_items.push(FailedItem { name, error });
    }
}

/// Finds the existing record a candidate duplicates.
///
/// The candidate's reference id is compared against every existing record
/// first; only if none matches is the name compared, ignoring case and
/// surrounding whitespace. The first match in `existing` wins.
pub fn find_duplicate<'a>(candidate: &RecordInput, existing: &'a [Record]) -> Option<&'a Record> {
    if let Some(reference_id) = candidate.reference_id() {
        if let Some(found) = existing.iter().find(|r| r.has_reference_id(&reference_id)) {
            return Some(found);
        }
    }
    let name = candidate.name()?;
    existing.iter().find(|r| r.has_name(&name))
}

/// What a bulk create would do with one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PlannedAction {
    /// The item would be created.
    Create,
    /// The item duplicates an existing record.
    Skip {
        /// Id of the existing record.
        existing_id: String,
    },
}

/// A planned outcome for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedItem {
    /// Display label of the input item.
    pub name: String,
    /// What would happen to it.
    #[serde(flatten)]
    pub action: PlannedAction,
}

/// Computes what [`BulkSync::create_all`] would do, without calling the store.
pub fn plan_create(
    items: &[RecordInput],
    existing: &[Record],
    options: BulkOptions,
) -> Vec<PlannedItem> {
    items
        .iter()
        .map(|item| {
            let duplicate = options
                .skips_duplicates()
                .then(|| find_duplicate(item, existing))
                .flatten();
            let action = match duplicate {
                Some(record) => PlannedAction::Skip {
                    existing_id: record.id.to_string(),
                },
                None => PlannedAction::Create,
            };
            PlannedItem {
                name: item.label(),
                action,
            }
        })
        .collect()
}

/// Creates batches of records against a store.
pub struct BulkSync<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    options: BulkOptions,
    cancelled: Arc<AtomicBool>,
}

impl<'s, S: RecordStore + ?Sized> BulkSync<'s, S> {
    /// Creates a bulk sync over `store` with default options.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            options: BulkOptions::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the options.
    pub fn with_options(mut self, options: BulkOptions) -> Self {
        self.options = options;
        self
    }

    /// Shares a cancel flag with the caller.
    ///
    /// Setting the flag stops the batch before the next item starts. Items
    /// not yet started are recorded as failed.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Returns the options.
    pub fn options(&self) -> BulkOptions {
        self.options
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Creates every item, in order.
    ///
    /// When duplicate skipping is in effect and `existing` is `None`, the
    /// store's record list is fetched once up front. If that fetch fails the
    /// batch proceeds without duplicate checks.
    pub fn create_all<F>(
        &self,
        items: &[RecordInput],
        existing: Option<&[Record]>,
        mut progress: F,
    ) -> SyncReport
    where
        F: FnMut(Progress<'_>),
    {
        let total = items.len();
        let mut report = SyncReport::new(total);

        let fetched;
        let existing: &[Record] = match existing {
            Some(records) => records,
            None if self.options.skips_duplicates() && total > 0 => {
                fetched = match self.store.list_cached() {
                    Ok(records) => records,
                    Err(e) => {
                        warn!(error = %e, "could not fetch existing records, duplicate check disabled");
                        Vec::new()
                    }
                };
                &fetched
            }
            None => &[],
        };

        info!(total, existing = existing.len(), "starting bulk create");

        for (index, item) in items.iter().enumerate() {
            let current = index + 1;
            let label = item.label();
            let mut notify = |status: ItemStatus| {
                progress(Progress {
                    current,
                    total,
                    label: &label,
                    status,
                })
            };

            if self.is_cancelled() {
                notify(ItemStatus::Failed);
                report.record_failed(label.clone(), SyncError::Cancelled.to_string());
                continue;
            }

            notify(ItemStatus::Processing);

            if self.options.skips_duplicates() {
                if let Some(found) = find_duplicate(item, existing) {
                    debug!(item = %label, existing = %found.id, "skipping duplicate");
                    notify(ItemStatus::Skipped);
                    report.record_skipped(label.clone(), found.id.to_string());
                    continue;
                }
            }

            match self.store.create(&item.to_payload()) {
                Ok(record) => {
                    debug!(item = %label, id = %record.id, "created");
                    notify(ItemStatus::Success);
                    report.record_created(label.clone(), record);
                }
                Err(e) => {
                    warn!(item = %label, error = %e, "create failed");
                    notify(ItemStatus::Failed);
                    report.record_failed(label.clone(), e.to_string());
                }
            }
        }

        info!(
            total = report.total,
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "bulk create finished"
        );
        report
    }
}
