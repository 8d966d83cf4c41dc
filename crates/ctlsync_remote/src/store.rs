//! Remote record store abstraction.

use crate::association::Association;
use crate::error::{RemoteResult, SyncError};
use crate::http::{HttpClient, Method};
use crate::record::{Payload, Record, RecordId};
use crate::request::{RequestStats, RetryingClient};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A store of records that the sync engine reads from and writes to.
///
/// This trait abstracts the remote system, allowing an HTTP-backed store in
/// production and an in-memory store in tests.
pub trait RecordStore: Send + Sync {
    /// Fetches every record.
    fn list_all(&self) -> RemoteResult<Vec<Record>>;

    /// Fetches every record, reusing a cached copy when one is held.
    fn list_cached(&self) -> RemoteResult<Vec<Record>> {
        self.list_all()
    }

    /// Fetches one record. Fails with [`SyncError::NotFound`] if absent.
    fn get(&self, id: &RecordId) -> RemoteResult<Record>;

    /// Creates a record. Fails with [`SyncError::Validation`] without a name.
    fn create(&self, payload: &Payload) -> RemoteResult<Record>;

    /// Updates a record.
    fn update(&self, id: &RecordId, payload: &Payload) -> RemoteResult<Record>;

    /// Deletes a record.
    fn delete(&self, id: &RecordId) -> RemoteResult<()>;

    /// Links a record to a subject.
    fn associate(&self, association: &Association) -> RemoteResult<()>;

    /// Checks connectivity and credentials.
    fn probe(&self) -> RemoteResult<()>;
}

/// How a caller names an existing record.
///
/// Decided once at the boundary; never guessed from the string's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    /// By remote identifier.
    ById(RecordId),
    /// By display name, matched ignoring case and surrounding whitespace.
    ByName(String),
}

/// Looks up the record a [`RecordRef`] names.
///
/// A name must match exactly one record; several matches are a
/// [`SyncError::Validation`] error.
pub fn resolve_record<S: RecordStore + ?Sized>(
    store: &S,
    reference: &RecordRef,
) -> RemoteResult<Record> {
    match reference {
        RecordRef::ById(id) => store.get(id),
        RecordRef::ByName(name) => {
            let records = store.list_cached()?;
            let mut matches = records.into_iter().filter(|r| r.has_name(name));
            match (matches.next(), matches.next()) {
                (Some(record), None) => Ok(record),
                (None, _) => Err(SyncError::NotFound(format!("no record named '{}'", name))),
                (Some(_), Some(_)) => Err(SyncError::Validation(format!(
                    "name '{}' matches more than one record, use its id instead",
                    name
                ))),
            }
        }
    }
}

/// A project that control implementations belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub id: String,
    /// Project name.
    #[serde(default)]
    pub name: Option<String>,
    /// Project type, as reported by the store.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A control implementation within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlImplementation {
    /// Identifier, usable as an association subject.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Remaining fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

const RECORDS_PATH: &str = "/evidence";

/// A record store reached over HTTP.
///
/// Holds an optional read-through cache of the full record list. Any
/// create, update or delete clears it.
pub struct HttpRecordStore<C: HttpClient> {
    client: RetryingClient<C>,
    cache: Mutex<Option<Vec<Record>>>,
}

impl<C: HttpClient> HttpRecordStore<C> {
    /// Creates a store over a retrying client.
    pub fn new(client: RetryingClient<C>) -> Self {
        Self {
            client,
            cache: Mutex::new(None),
        }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &RetryingClient<C> {
        &self.client
    }

    /// Returns the request counters.
    pub fn stats(&self) -> RequestStats {
        self.client.stats()
    }

    /// Drops the cached record list.
    pub fn invalidate_cache(&self) {
        *self.cache.lock() = None;
    }

    /// Returns true if a record list is cached.
    pub fn is_cached(&self) -> bool {
        self.cache.lock().is_some()
    }

    /// Lists all projects.
    pub fn projects(&self) -> RemoteResult<Vec<Project>> {
        let value = self.client.request(Method::Get, "/projects", None)?;
        list_field(value, "projects")
    }

    /// Lists the control implementations of a project.
    pub fn control_implementations(&self, project_id: &str) -> RemoteResult<Vec<ControlImplementation>> {
        RecordId::new(project_id).validate()?;
        let path = format!("/projects/{}/control-implementations", project_id);
        let value = self.client.request(Method::Get, &path, None)?;
        list_field(value, "controlImplementations")
    }

    fn record_path(id: &RecordId) -> RemoteResult<String> {
        id.validate()?;
        Ok(format!("{}/{}", RECORDS_PATH, id))
    }
}

impl<C: HttpClient> RecordStore for HttpRecordStore<C> {
    fn list_all(&self) -> RemoteResult<Vec<Record>> {
        let value = self.client.request(Method::Get, RECORDS_PATH, None)?;
        let records: Vec<Record> = list_field(value, "evidences")?;
        *self.cache.lock() = Some(records.clone());
        Ok(records)
    }

    fn list_cached(&self) -> RemoteResult<Vec<Record>> {
        if let Some(records) = self.cache.lock().as_ref() {
            debug!(count = records.len(), "using cached record list");
            return Ok(records.clone());
        }
        self.list_all()
    }

    fn get(&self, id: &RecordId) -> RemoteResult<Record> {
        let path = Self::record_path(id)?;
        let value = self
            .client
            .request(Method::Get, &path, None)
            .map_err(|e| not_found(e, id))?;
        decode(value)
    }

    fn create(&self, payload: &Payload) -> RemoteResult<Record> {
        payload.require_name()?;
        let body = payload.to_json()?;
        let result = self.client.request(Method::Post, RECORDS_PATH, Some(&body));
        self.invalidate_cache();
        let value = result?;
        if is_empty_body(&value) {
            warn!("create accepted without a record in the response, id unknown");
            return Ok(Record::from_payload(RecordId::unassigned(), payload));
        }
        decode(value)
    }

    fn update(&self, id: &RecordId, payload: &Payload) -> RemoteResult<Record> {
        let path = Self::record_path(id)?;
        if payload.is_empty() {
            return Err(SyncError::Validation("update has no fields to change".into()));
        }
        let body = payload.to_json()?;
        let result = self.client.request(Method::Patch, &path, Some(&body));
        self.invalidate_cache();
        let value = result.map_err(|e| not_found(e, id))?;
        if is_empty_body(&value) {
            debug!(id = %id, "update accepted without a record in the response");
            return Ok(Record::from_payload(id.clone(), payload));
        }
        decode(value)
    }

    fn delete(&self, id: &RecordId) -> RemoteResult<()> {
        let path = Self::record_path(id)?;
        let result = self.client.request(Method::Delete, &path, None);
        self.invalidate_cache();
        result.map_err(|e| not_found(e, id))?;
        Ok(())
    }

    fn associate(&self, association: &Association) -> RemoteResult<()> {
        let path = format!("{}/associate", Self::record_path(&association.evidence_id)?);
        if association.subject_id.trim().is_empty() {
            return Err(SyncError::Validation("subject id must not be empty".into()));
        }
        self.client
            .request(Method::Post, &path, Some(&association.body()))
            .map_err(|e| not_found(e, &association.evidence_id))?;
        Ok(())
    }

    fn probe(&self) -> RemoteResult<()> {
        self.client.probe(RECORDS_PATH)
    }
}

fn not_found(err: SyncError, id: &RecordId) -> SyncError {
    if err.status() == Some(404) {
        SyncError::NotFound(format!("record {}", id))
    } else {
        err
    }
}

/// True for a 2xx response that carried no body.
fn is_empty_body(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.is_empty())
}

fn decode<T: DeserializeOwned>(value: Value) -> RemoteResult<T> {
    serde_json::from_value(value).map_err(|e| SyncError::Decode(e.to_string()))
}

/// Extracts a list from `{ "<field>": [...] }`, also accepting a bare array.
fn list_field<T: DeserializeOwned>(value: Value, field: &str) -> RemoteResult<Vec<T>> {
    match value {
        Value::Array(_) => decode(value),
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(list) => decode(list),
        },
        other => Err(SyncError::Decode(format!(
            "expected '{}' list, got {}",
            field, other
        ))),
    }
}

/// An in-memory record store for testing.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<Record>>,
    associations: RwLock<Vec<Association>>,
    failures: Mutex<HashMap<String, SyncError>>,
    next_id: Mutex<u64>,
    creates: Mutex<u64>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records.
    pub fn with_records(records: Vec<Record>) -> Self {
        let store = Self::new();
        *store.records.write() = records;
        store
    }

    /// Makes `create` fail with `error` for records with this name.
    pub fn fail_create_for(&self, name: &str, error: SyncError) {
        self.failures.lock().insert(name.to_lowercase(), error);
    }

    /// Returns a copy of the stored records.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Returns every association made.
    pub fn associations(&self) -> Vec<Association> {
        self.associations.read().clone()
    }

    /// Number of `create` calls that reached the store.
    pub fn create_calls(&self) -> u64 {
        *self.creates.lock()
    }

    fn position(&self, id: &RecordId) -> RemoteResult<usize> {
        self.records
            .read()
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("record {}", id)))
    }
}

impl RecordStore for MemoryRecordStore {
    fn list_all(&self) -> RemoteResult<Vec<Record>> {
        Ok(self.records())
    }

    fn get(&self, id: &RecordId) -> RemoteResult<Record> {
        let index = self.position(id)?;
        Ok(self.records.read()[index].clone())
    }

    fn create(&self, payload: &Payload) -> RemoteResult<Record> {
        payload.require_name()?;
        *self.creates.lock() += 1;

        let name = payload.name.clone().unwrap_or_default();
        if let Some(err) = self.failures.lock().get(&name.to_lowercase()) {
            return Err(err.clone());
        }

        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            RecordId::new(format!("mem-{}", *next))
        };
        let record = Record::from_payload(id, payload);
        self.records.write().push(record.clone());
        Ok(record)
    }

    fn update(&self, id: &RecordId, payload: &Payload) -> RemoteResult<Record> {
        let index = self.position(id)?;
        let mut records = self.records.write();
        let record = &mut records[index];
        if let Some(name) = &payload.name {
            record.name = name.clone();
        }
        if payload.reference_id.is_some() {
            record.reference_id = payload.reference_id.clone();
        }
        if payload.description.is_some() {
            record.description = payload.description.clone();
        }
        if payload.instructions.is_some() {
            record.instructions = payload.instructions.clone();
        }
        if payload.remarks.is_some() {
            record.remarks = payload.remarks.clone();
        }
        if payload.automated.is_some() {
            record.automated = payload.automated;
        }
        Ok(record.clone())
    }

    fn delete(&self, id: &RecordId) -> RemoteResult<()> {
        let index = self.position(id)?;
        self.records.write().remove(index);
        Ok(())
    }

    fn associate(&self, association: &Association) -> RemoteResult<()> {
        self.position(&association.evidence_id)?;
        self.associations.write().push(association.clone());
        Ok(())
    }

    fn probe(&self) -> RemoteResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::SubjectType;
    use crate::record::RecordInput;

    #[test]
    fn memory_store_crud() {
        let store = MemoryRecordStore::new();

        let created = store
            .create(&RecordInput::new().with("name", "Backups").to_payload())
            .unwrap();
        assert_eq!(store.get(&created.id).unwrap().name, "Backups");

        let updated = store
            .update(
                &created.id,
                &RecordInput::new().with("remarks", "weekly").to_payload(),
            )
            .unwrap();
        assert_eq!(updated.remarks.as_deref(), Some("weekly"));
        assert_eq!(updated.id, created.id);

        store.delete(&created.id).unwrap();
        assert!(store.get(&created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn memory_store_rejects_nameless_create() {
        let store = MemoryRecordStore::new();
        let err = store.create(&Payload::default()).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(store.create_calls(), 0);
    }

    #[test]
    fn memory_store_associations_require_record() {
        let store = MemoryRecordStore::new();
        let missing = Association::new("nope", "ci-1", SubjectType::ControlImplementation);
        assert!(store.associate(&missing).is_err());

        let record = store
            .create(&RecordInput::new().with("name", "A").to_payload())
            .unwrap();
        let link = Association::new(record.id.clone(), "ci-1", SubjectType::SolutionCapability);
        store.associate(&link).unwrap();
        store.associate(&link).unwrap();
        assert_eq!(store.associations().len(), 2);
    }

    #[test]
    fn resolve_by_id_and_name() {
        let store = MemoryRecordStore::new();
        let a = store
            .create(&RecordInput::new().with("name", "Access Review").to_payload())
            .unwrap();
        store
            .create(&RecordInput::new().with("name", "Dup").to_payload())
            .unwrap();
        store
            .create(&RecordInput::new().with("name", "dup ").to_payload())
            .unwrap();

        let by_id = resolve_record(&store, &RecordRef::ById(a.id.clone())).unwrap();
        assert_eq!(by_id, a);

        let by_name = resolve_record(&store, &RecordRef::ByName("ACCESS REVIEW".into())).unwrap();
        assert_eq!(by_name.id, a.id);

        let err = resolve_record(&store, &RecordRef::ByName("missing".into())).unwrap_err();
        assert!(err.is_not_found());

        let err = resolve_record(&store, &RecordRef::ByName("dup".into())).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn list_field_shapes() {
        let records: Vec<Record> =
            list_field(serde_json::json!({"evidences": [{"id": "1", "name": "A"}]}), "evidences")
                .unwrap();
        assert_eq!(records.len(), 1);

        let records: Vec<Record> =
            list_field(serde_json::json!([{"id": "2", "name": "B"}]), "evidences").unwrap();
        assert_eq!(records[0].id.as_str(), "2");

        let records: Vec<Record> = list_field(serde_json::json!({}), "evidences").unwrap();
        assert!(records.is_empty());

        let err = list_field::<Record>(serde_json::json!("nope"), "evidences").unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }
}
