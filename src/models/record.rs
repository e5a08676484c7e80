//! Normalized API records and the bundles that carry them.
//!
//! The arena API speaks JSON:API: every response is a homogeneous list of
//! primary records plus a heterogeneous `included` side-table, linked only
//! by `(type, id)` references. Attributes are kept as raw JSON so that new
//! fields never break deserialization.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RecordId;

/// Discriminant of a record.
///
/// Unknown type strings map to [`RecordType::Unrecognized`] so that API
/// additions never fail a whole response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    Bout,
    /// One wrestler entry in one event (a "wrestler appearance").
    Wrestler,
    Event,
    WeightClass,
    Division,
    Team,
    Grade,
    RoundName,
    BracketPlacement,
    Unrecognized(String),
}

impl RecordType {
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::Bout => "bout",
            RecordType::Wrestler => "wrestler",
            RecordType::Event => "event",
            RecordType::WeightClass => "weightClass",
            RecordType::Division => "division",
            RecordType::Team => "team",
            RecordType::Grade => "grade",
            RecordType::RoundName => "roundName",
            RecordType::BracketPlacement => "bracketPlacement",
            RecordType::Unrecognized(other) => other,
        }
    }
}

impl From<String> for RecordType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "bout" => RecordType::Bout,
            "wrestler" => RecordType::Wrestler,
            "event" => RecordType::Event,
            "weightClass" => RecordType::WeightClass,
            "division" => RecordType::Division,
            "team" => RecordType::Team,
            "grade" => RecordType::Grade,
            "roundName" => RecordType::RoundName,
            "bracketPlacement" => RecordType::BracketPlacement,
            _ => RecordType::Unrecognized(s),
        }
    }
}

impl From<RecordType> for String {
    fn from(t: RecordType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(type, id)` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: RecordType,
    pub id: RecordId,
}

/// Target(s) of a relationship entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    One(Identifier),
    Many(Vec<Identifier>),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipData>,
}

/// A single typed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: RecordType,

    pub id: RecordId,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Relationship>,
}

impl Record {
    pub fn new(kind: RecordType, id: impl Into<RecordId>) -> Self {
        Self {
            kind,
            id: id.into(),
            attributes: Map::new(),
            relationships: BTreeMap::new(),
        }
    }

    /// Builder: set an attribute.
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Builder: set a to-one relationship.
    pub fn with_relationship(mut self, key: &str, kind: RecordType, id: &str) -> Self {
        self.relationships.insert(
            key.to_string(),
            Relationship {
                data: Some(RelationshipData::One(Identifier {
                    kind,
                    id: RecordId::from(id),
                })),
            },
        );
        self
    }

    /// Builder: set a to-many relationship.
    pub fn with_relationships(mut self, key: &str, kind: RecordType, ids: &[&str]) -> Self {
        let targets = ids
            .iter()
            .map(|id| Identifier {
                kind: kind.clone(),
                id: RecordId::from(*id),
            })
            .collect();
        self.relationships.insert(
            key.to_string(),
            Relationship {
                data: Some(RelationshipData::Many(targets)),
            },
        );
        self
    }

    /// Raw attribute value; JSON `null` counts as absent.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// Non-empty string attribute.
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attr(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn bool_attr(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(Value::as_bool)
    }

    pub fn f64_attr(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(Value::as_f64)
    }

    pub fn i64_attr(&self, key: &str) -> Option<i64> {
        self.attr(key).and_then(Value::as_i64)
    }

    /// String field of a nested attribute object, e.g. `location.name`.
    pub fn nested_str(&self, object: &str, key: &str) -> Option<&str> {
        self.attr(object)
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Timestamp attribute.
    pub fn datetime_attr(&self, key: &str) -> Option<DateTime<Utc>> {
        self.str_attr(key).and_then(parse_timestamp)
    }

    /// Id of a to-one related record.
    ///
    /// The `*Id` attribute wins; the relationship entry is the fallback.
    pub fn related_id(&self, attr_key: &str, relationship: &str) -> Option<RecordId> {
        if let Some(id) = self.str_attr(attr_key) {
            return Some(RecordId::from(id));
        }
        match self.relationships.get(relationship)?.data.as_ref()? {
            RelationshipData::One(target) => Some(target.id.clone()),
            RelationshipData::Many(targets) => targets.first().map(|t| t.id.clone()),
        }
    }

    /// Ids of a to-many relationship, in source order.
    pub fn related_ids(&self, relationship: &str) -> Vec<RecordId> {
        match self
            .relationships
            .get(relationship)
            .and_then(|r| r.data.as_ref())
        {
            Some(RelationshipData::Many(targets)) => {
                targets.iter().map(|t| t.id.clone()).collect()
            }
            Some(RelationshipData::One(target)) => vec![target.id.clone()],
            None => Vec::new(),
        }
    }

    /// The `identityPersonId` of a wrestler record.
    pub fn identity_person_id(&self) -> Option<&str> {
        self.str_attr("identityPersonId")
    }

    /// `firstName lastName` of a wrestler record, else its `fullName`.
    pub fn person_name(&self) -> Option<String> {
        let first = self.str_attr("firstName");
        let last = self
            .str_attr("lastName")
            .or_else(|| self.str_attr("lastname"));
        match (first, last) {
            (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
            _ => self.str_attr("fullName").map(str::to_string),
        }
    }

    /// Cross-event identity of a team record.
    ///
    /// Teams are re-registered per event; `identityTeamId` links the
    /// copies. Teams without one are their own identity.
    pub fn team_identity(&self) -> &str {
        self.str_attr("identityTeamId")
            .unwrap_or_else(|| self.id.as_str())
    }

    fn key(&self) -> (RecordType, RecordId) {
        (self.kind.clone(), self.id.clone())
    }
}

/// Parse an API timestamp.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Response metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    #[serde(default)]
    pub total: u64,
}

/// A normalized response: primary records plus their side-tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "data", default)]
    pub primary: Vec<Record>,

    #[serde(default)]
    pub included: Vec<Record>,

    #[serde(default)]
    pub meta: BundleMeta,
}

impl Bundle {
    pub fn new(primary: Vec<Record>, included: Vec<Record>) -> Self {
        let total = primary.len() as u64;
        Self {
            primary,
            included,
            meta: BundleMeta { total },
        }
    }

    /// Look up an included record by type and id.
    ///
    /// A missing id returns `None` without scanning. Duplicate `(type, id)`
    /// pairs resolve to the first one in bundle order.
    pub fn resolve(&self, kind: &RecordType, id: Option<&RecordId>) -> Option<&Record> {
        let id = id?;
        self.included
            .iter()
            .find(|r| &r.kind == kind && &r.id == id)
    }

    /// Append another page of the same collection.
    ///
    /// Primary records are appended in order; included records are
    /// de-duplicated by `(type, id)` keeping the first copy seen.
    pub fn merge_page(&mut self, page: Bundle) {
        let mut seen: HashSet<(RecordType, RecordId)> =
            self.included.iter().map(Record::key).collect();
        self.primary.extend(page.primary);
        for record in page.included {
            if seen.insert(record.key()) {
                self.included.push(record);
            }
        }
        self.meta.total = self.meta.total.max(page.meta.total);
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}
