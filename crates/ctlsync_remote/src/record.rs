//! Records, loose record input and payload construction.

use crate::error::{RemoteResult, SyncError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier assigned by the remote store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// An id for a record the store accepted without echoing it back.
    ///
    /// Fails [`validate`](Self::validate), so it is never sent in a path.
    pub fn unassigned() -> Self {
        Self(String::new())
    }

    /// Returns true if the store has not reported this record's id.
    pub fn is_unassigned(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the id can be used as a path segment.
    pub fn validate(&self) -> RemoteResult<()> {
        if self.0.trim().is_empty() {
            return Err(SyncError::Validation("record id must not be empty".into()));
        }
        if self.0.contains(['/', '?', '#']) {
            return Err(SyncError::Validation(format!(
                "record id '{}' contains reserved characters",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A record as held by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Remote identifier.
    pub id: RecordId,
    /// Optional caller-supplied business key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Collection instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Free-form remarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// Whether collection is automated; `None` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<bool>,
    /// Attached artifacts. Read-only.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub artifacts: Vec<Value>,
}

impl Record {
    /// Builds a record from the fields that were sent to the store.
    pub fn from_payload(id: RecordId, payload: &Payload) -> Self {
        Self {
            id,
            reference_id: payload.reference_id.clone(),
            name: payload.name.clone().unwrap_or_default(),
            description: payload.description.clone(),
            instructions: payload.instructions.clone(),
            remarks: payload.remarks.clone(),
            automated: payload.automated,
            artifacts: Vec::new(),
        }
    }

    /// Returns true if `name` equals this record's name, ignoring case and
    /// surrounding whitespace.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }

    /// Returns true if `reference_id` equals this record's reference id,
    /// ignoring surrounding whitespace.
    pub fn has_reference_id(&self, reference_id: &str) -> bool {
        self.reference_id
            .as_deref()
            .map(str::trim)
            .is_some_and(|own| !own.is_empty() && own == reference_id.trim())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Accepted spellings, lowercase, in priority order.
const NAME: &[&str] = &["name"];
const REFERENCE_ID: &[&str] = &["referenceid", "reference_id", "id"];
const DESCRIPTION: &[&str] = &["description"];
const INSTRUCTIONS: &[&str] = &["instructions"];
const REMARKS: &[&str] = &["remarks", "notes"];
const AUTOMATED: &[&str] = &["automated"];

/// A candidate record as supplied by a caller: loose field names, loose values.
///
/// Keys are lowercased and trimmed on the way in so lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct RecordInput {
    fields: BTreeMap<String, Value>,
}

impl RecordInput {
    /// Creates an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a field.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(normalize_field(key), value.into());
    }

    /// Returns a raw field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(&normalize_field(key))
    }

    /// Returns true if no field has a value.
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| text_of(v).is_none())
    }

    /// The record name, if present.
    pub fn name(&self) -> Option<String> {
        self.text(NAME)
    }

    /// The reference id, trimmed.
    ///
    /// Looks at `referenceId`, `reference_id`, then a loose `id`.
    pub fn reference_id(&self) -> Option<String> {
        self.text(REFERENCE_ID).map(|s| s.trim().to_string())
    }

    /// The tri-state automated flag.
    pub fn automated(&self) -> Option<bool> {
        AUTOMATED
            .iter()
            .find_map(|key| self.fields.get(*key))
            .and_then(parse_flag)
    }

    /// Label used in progress and reports.
    pub fn label(&self) -> String {
        self.name().unwrap_or_else(|| "N/A".to_string())
    }

    /// Builds the outgoing payload. Only non-empty fields are included.
    pub fn to_payload(&self) -> Payload {
        Payload {
            name: self.name(),
            reference_id: self.reference_id(),
            description: self.text(DESCRIPTION),
            instructions: self.text(INSTRUCTIONS),
            remarks: self.text(REMARKS),
            automated: self.automated(),
        }
    }

    fn text(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .find_map(text_of)
    }
}

impl From<BTreeMap<String, Value>> for RecordInput {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        raw.into_iter().collect()
    }
}

impl<K: AsRef<str>> FromIterator<(K, Value)> for RecordInput {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (normalize_field(k.as_ref()), v))
                .collect(),
        }
    }
}

fn normalize_field(key: &str) -> String {
    key.trim().to_lowercase()
}

fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parses the tri-state flag from a boolean or its string forms.
fn parse_flag(value: &Value) -> Option<bool> {
    let text = match value {
        Value::Bool(b) => return Some(*b),
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    match text.as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// The body sent on create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Name; required on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reference id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Remarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// Automated flag; omitted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automated: Option<bool>,
}

impl Payload {
    /// Fails with [`SyncError::Validation`] if there is no name.
    pub fn require_name(&self) -> RemoteResult<()> {
        match &self.name {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err(SyncError::Validation(
                "record must have a 'name' field".into(),
            )),
        }
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Payload::default()
    }

    /// Serializes to a JSON body.
    pub fn to_json(&self) -> RemoteResult<Value> {
        serde_json::to_value(self).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

/// Returns the records whose name or reference id contains `term`,
/// ignoring case.
pub fn search_records<'a>(records: &'a [Record], term: &str) -> Vec<&'a Record> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|record| {
            record.name.to_lowercase().contains(&term)
                || record
                    .reference_id
                    .as_deref()
                    .is_some_and(|r| r.to_lowercase().contains(&term))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unassigned_id_is_never_a_path() {
        let id = RecordId::unassigned();
        assert!(id.is_unassigned());
        assert!(id.validate().is_err());
        assert!(!RecordId::new("e-1").is_unassigned());
    }

    #[test]
    fn keys_are_case_insensitive() {
        let input: RecordInput = serde_json::from_value(json!({
            " Name ": "Access Review",
            "ReferenceID": " EV-1 ",
            "NOTES": "quarterly",
        }))
        .unwrap();

        let payload = input.to_payload();
        assert_eq!(payload.name.as_deref(), Some("Access Review"));
        assert_eq!(payload.reference_id.as_deref(), Some("EV-1"));
        assert_eq!(payload.remarks.as_deref(), Some("quarterly"));
    }

    #[test]
    fn remarks_preferred_over_notes() {
        let input = RecordInput::new()
            .with("notes", "from notes")
            .with("remarks", "from remarks");
        assert_eq!(input.to_payload().remarks.as_deref(), Some("from remarks"));
    }

    #[test]
    fn reference_id_priority() {
        let input = RecordInput::new().with("id", "loose").with("reference_id", "snake");
        assert_eq!(input.reference_id().as_deref(), Some("snake"));

        let input = RecordInput::new().with("id", "loose");
        assert_eq!(input.reference_id().as_deref(), Some("loose"));
    }

    #[test]
    fn automated_tri_state() {
        let cases = [
            (json!(true), Some(true)),
            (json!(false), Some(false)),
            (json!("Yes"), Some(true)),
            (json!("no"), Some(false)),
            (json!("1"), Some(true)),
            (json!(0), Some(false)),
            (json!("maybe"), None),
            (Value::Null, None),
        ];
        for (value, expected) in cases {
            let input = RecordInput::new().with("Automated", value.clone());
            assert_eq!(input.automated(), expected, "value {}", value);
        }
        assert_eq!(RecordInput::new().automated(), None);
    }

    #[test]
    fn payload_omits_empty_fields() {
        let input = RecordInput::new()
            .with("name", "Backups")
            .with("description", "   ")
            .with("instructions", Value::Null);

        let body = input.to_payload().to_json().unwrap();
        assert_eq!(body, json!({"name": "Backups"}));
    }

    #[test]
    fn payload_requires_name() {
        let payload = RecordInput::new().with("description", "x").to_payload();
        assert!(matches!(payload.require_name(), Err(SyncError::Validation(_))));
        assert!(RecordInput::new().to_payload().is_empty());
    }

    #[test]
    fn record_deserializes_remote_shape() {
        let record: Record = serde_json::from_value(json!({
            "id": "b6f1",
            "referenceId": "EV-7",
            "name": null,
            "automated": true,
            "artifacts": [{"id": "a1"}],
            "createdAt": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(record.id.as_str(), "b6f1");
        assert_eq!(record.name, "");
        assert_eq!(record.automated, Some(true));
        assert_eq!(record.artifacts.len(), 1);
    }

    #[test]
    fn record_identity_matching() {
        let record: Record =
            serde_json::from_value(json!({"id": "1", "name": " Access Review ", "referenceId": "EV-1"}))
                .unwrap();
        assert!(record.has_name("access review"));
        assert!(record.has_reference_id(" EV-1"));
        assert!(!record.has_reference_id("EV-2"));
    }

    #[test]
    fn search_matches_name_or_reference() {
        let records: Vec<Record> = serde_json::from_value(json!([
            {"id": "1", "name": "Firewall Rules", "referenceId": "NET-1"},
            {"id": "2", "name": "Backup Logs", "referenceId": "OPS-4"},
            {"id": "3", "name": "Access Review"}
        ]))
        .unwrap();

        let hits: Vec<&str> = search_records(&records, "net")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(hits, vec!["1"]);
        assert_eq!(search_records(&records, "LOG").len(), 1);
        assert!(search_records(&records, " ").is_empty());
    }

    #[test]
    fn record_id_validation() {
        assert!(RecordId::new("abc-123").validate().is_ok());
        assert!(RecordId::new("").validate().is_err());
        assert!(RecordId::new("a/b").validate().is_err());
    }
}
