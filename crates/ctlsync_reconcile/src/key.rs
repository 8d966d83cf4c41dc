//! Capability key normalization.

use std::fmt;

/// A normalized capability name used to match rows across tables.
///
/// Normalization trims surrounding whitespace, strips one trailing `:` and
/// trims again. Comparison is case-sensitive. The raw name stays on the row;
/// only the key is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityKey(String);

impl CapabilityKey {
    /// Normalizes a raw capability name.
    ///
    /// Returns `None` when nothing is left after normalization.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_suffix(':').unwrap_or(trimmed).trim();
        if stripped.is_empty() {
            None
        } else {
            Some(Self(stripped.to_string()))
        }
    }

    /// Returns the normalized key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CapabilityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whitespace_and_one_colon() {
        let key = CapabilityKey::normalize("  Access Control:  ").unwrap();
        assert_eq!(key.as_str(), "Access Control");

        let key = CapabilityKey::normalize("Access Control : ").unwrap();
        assert_eq!(key.as_str(), "Access Control");
    }

    #[test]
    fn strips_only_one_trailing_colon() {
        let key = CapabilityKey::normalize("Logging::").unwrap();
        assert_eq!(key.as_str(), "Logging:");
    }

    #[test]
    fn blank_names_have_no_key() {
        assert!(CapabilityKey::normalize("").is_none());
        assert!(CapabilityKey::normalize("   ").is_none());
        assert!(CapabilityKey::normalize(" : ").is_none());
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert_ne!(
            CapabilityKey::normalize("access control"),
            CapabilityKey::normalize("Access Control")
        );
    }
}
