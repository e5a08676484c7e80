//! Identifier types: athlete ids, record ids and deterministic cache keys.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An opaque record id as returned by the API.
///
/// Ids are only unique within one record type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
            .expect("static uuid pattern")
    })
}

/// The cross-event identity of a person (`identityPersonId`).
///
/// Every wrestler-appearance record of the same athlete shares this id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AthleteId(String);

impl AthleteId {
    /// Parse an athlete id from a bare UUID or any text containing one,
    /// such as a profile link.
    pub fn parse(input: &str) -> Option<Self> {
        let found = uuid_pattern().find(input)?;
        let uuid = Uuid::parse_str(found.as_str()).ok()?;
        Some(Self(uuid.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a raw `identityPersonId` attribute refers to this athlete.
    pub fn matches(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw)
    }
}

impl fmt::Display for AthleteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for AthleteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AthleteId({})", self.0)
    }
}

/// A deterministic key derived from a content hash.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Generate a key from input fields.
    /// Uses SHA256 and takes the first 16 characters for brevity.
    pub fn generate(fields: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            hasher.update(field.as_bytes());
        }
        let hash = hex::encode(hasher.finalize());
        Self(hash[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_athlete_id_bare_uuid() {
        let id = AthleteId::parse("4a7f2c1e-9b3d-4e8a-a1b2-0c9d8e7f6a5b").unwrap();
        assert_eq!(id.as_str(), "4a7f2c1e-9b3d-4e8a-a1b2-0c9d8e7f6a5b");
    }

    #[test]
    fn test_athlete_id_from_link() {
        let id = AthleteId::parse(
            "https://arena.flowrestling.org/athlete/4A7F2C1E-9B3D-4E8A-A1B2-0C9D8E7F6A5B?tab=bouts",
        )
        .unwrap();
        assert_eq!(id.as_str(), "4a7f2c1e-9b3d-4e8a-a1b2-0c9d8e7f6a5b");
    }

    #[test]
    fn test_athlete_id_rejects_garbage() {
        assert!(AthleteId::parse("John Smith").is_none());
        assert!(AthleteId::parse("").is_none());
    }

    #[test]
    fn test_athlete_id_matches_case_insensitive() {
        let id = AthleteId::parse("4a7f2c1e-9b3d-4e8a-a1b2-0c9d8e7f6a5b").unwrap();
        assert!(id.matches("4A7F2C1E-9B3D-4E8A-A1B2-0C9D8E7F6A5B"));
        assert!(!id.matches("00000000-9b3d-4e8a-a1b2-0c9d8e7f6a5b"));
    }

    #[test]
    fn test_cache_key_deterministic() {
        let a = CacheKey::generate(&["athlete", "filter"]);
        let b = CacheKey::generate(&["athlete", "filter"]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cache_key_field_boundaries() {
        let a = CacheKey::generate(&["ab", "c"]);
        let b = CacheKey::generate(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_id_serializes_transparently() {
        let id = RecordId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        assert_eq!(format!("{:?}", id), "RecordId(abc)");
    }
}
