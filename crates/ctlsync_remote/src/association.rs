//! Links between records and the subjects they evidence.

use crate::error::SyncError;
use crate::record::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of subject a record can be associated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectType {
    /// A control implementation within a project.
    ControlImplementation,
    /// A solution capability.
    SolutionCapability,
}

impl SubjectType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::ControlImplementation => "CONTROL_IMPLEMENTATION",
            SubjectType::SolutionCapability => "SOLUTION_CAPABILITY",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SubjectType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "CONTROL_IMPLEMENTATION" => Ok(SubjectType::ControlImplementation),
            "SOLUTION_CAPABILITY" => Ok(SubjectType::SolutionCapability),
            _ => Err(SyncError::Validation(format!(
                "invalid subject type '{}', expected CONTROL_IMPLEMENTATION or SOLUTION_CAPABILITY",
                s
            ))),
        }
    }
}

/// A directed link from a record to a subject.
///
/// The client does not deduplicate associations; the remote store decides
/// whether a repeated link is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Association {
    /// The record being linked.
    pub evidence_id: RecordId,
    /// The subject's identifier.
    pub subject_id: String,
    /// The subject's kind.
    pub subject_type: SubjectType,
}

impl Association {
    /// Creates an association.
    pub fn new(
        evidence_id: impl Into<RecordId>,
        subject_id: impl Into<String>,
        subject_type: SubjectType,
    ) -> Self {
        Self {
            evidence_id: evidence_id.into(),
            subject_id: subject_id.into(),
            subject_type,
        }
    }

    /// Request body for the associate call.
    pub fn body(&self) -> Value {
        json!({
            "associationType": "CONNECT",
            "subjectType": self.subject_type,
            "subjectId": self.subject_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_type_parsing() {
        assert_eq!(
            "control_implementation".parse::<SubjectType>().unwrap(),
            SubjectType::ControlImplementation
        );
        assert_eq!(
            " Solution-Capability ".parse::<SubjectType>().unwrap(),
            SubjectType::SolutionCapability
        );
        assert!(matches!(
            "PROJECT".parse::<SubjectType>(),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn association_body_shape() {
        let association = Association::new("ev-1", "ci-9", SubjectType::ControlImplementation);
        assert_eq!(
            association.body(),
            json!({
                "associationType": "CONNECT",
                "subjectType": "CONTROL_IMPLEMENTATION",
                "subjectId": "ci-9"
            })
        );
    }
}
