//! # ctlsync remote
//!
//! Client side of the remote record store: a retrying request layer, a
//! record store abstraction, and a bulk create engine.
//!
//! This crate provides:
//! - Retrying requests (linear backoff, no retry on client errors)
//! - A connectivity probe with its own short timeout
//! - Record and association types with loose input parsing
//! - An HTTP-backed store with a read-through record cache
//! - Bulk creation with duplicate detection and per-item outcomes
//!
//! ## Key Invariants
//!
//! - 4xx responses are never retried; 5xx and transport failures are
//! - A record without a name is never sent to the store
//! - The record cache is cleared after every create, update or delete
//! - Bulk creation is sequential and never aborts on a single failure
//!
//! ## Example
//!
//! ```no_run
//! use ctlsync_remote::{
//!     BulkSync, ClientConfig, HttpRecordStore, RecordInput, ReqwestClient, RetryingClient,
//! };
//!
//! let config = ClientConfig::new("https://api.example.com/v1", "secret");
//! let client = RetryingClient::new(config, ReqwestClient::new()?)?;
//! let store = HttpRecordStore::new(client);
//!
//! let items = vec![RecordInput::new().with("name", "Quarterly access review")];
//! let report = BulkSync::new(&store).create_all(&items, None, |p| {
//!     println!("[{}/{}] {} {}", p.current, p.total, p.label, p.status);
//! });
//! assert!(report.is_balanced());
//! # Ok::<(), ctlsync_remote::SyncError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod association;
mod bulk;
mod config;
mod error;
mod http;
mod record;
mod request;
mod store;

pub use association::{Association, SubjectType};
pub use bulk::{
    find_duplicate, plan_create, BulkOptions, BulkSync, CreatedItem, FailedItem, ItemStatus,
    PlannedAction, PlannedItem, Progress, SkippedItem, SyncReport,
};
pub use config::{ClientConfig, RetryConfig};
pub use error::{RemoteResult, SyncError};
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient, ScriptedHttpClient};
pub use record::{search_records, Payload, Record, RecordId, RecordInput};
pub use request::{RequestStats, RetryingClient};
pub use store::{
    resolve_record, ControlImplementation, HttpRecordStore, MemoryRecordStore, Project,
    RecordRef, RecordStore,
};
