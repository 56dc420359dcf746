//! Record types stored in and read back from the Dgraph graph.
//!
//! Every scalar a caller may leave out is an `Option`, and every `Option` is
//! omitted from the serialized form when `None`. The mutation format treats a
//! present field as a write instruction, so "age unspecified" must never be
//! written as `"age": 0`. Collections are omitted when empty and default to
//! empty when a response does not carry them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// `dgraph.type` tag for person nodes.
pub const PERSON_TYPE: &str = "Person";

/// `dgraph.type` tag for institution nodes.
pub const INSTITUTION_TYPE: &str = "Institution";

// ── Identifiers ───────────────────────────────────────────────────

/// Identifier carried by a record in the `uid` field.
///
/// A record without a `Uid` is created as a new anonymous node. A blank
/// label also creates a node, but lets the caller find the assigned uid in
/// the mutation response. An assigned uid turns the record into a partial
/// update of an existing node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Uid {
    /// Client-chosen label, written as `_:label`.
    Blank(String),
    /// Server-assigned identifier such as `0x2a`.
    Assigned(String),
    /// Query variable bound by an upsert block, written as `uid(name)`.
    Variable(String),
}

impl Uid {
    pub fn blank(label: impl Into<String>) -> Self {
        Self::Blank(label.into())
    }

    pub fn assigned(id: impl Into<String>) -> Self {
        Self::Assigned(id.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Parse the wire form of a uid.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let uid = if let Some(label) = raw.strip_prefix("_:") {
            Self::Blank(label.to_string())
        } else if let Some(name) = raw.strip_prefix("uid(").and_then(|r| r.strip_suffix(')')) {
            Self::Variable(name.to_string())
        } else {
            Self::Assigned(raw.to_string())
        };
        uid.validate()?;
        Ok(uid)
    }

    /// The blank-node label, if this uid asks for a new node.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Blank(label) => Some(label),
            _ => None,
        }
    }

    /// The server-assigned id, if this uid names an existing node.
    pub fn as_assigned(&self) -> Option<&str> {
        match self {
            Self::Assigned(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank(_))
    }

    /// Reject values that would reach the wire as an empty or malformed id.
    pub fn validate(&self) -> Result<(), CoreError> {
        let (value, reason) = match self {
            Self::Blank(label) if label.is_empty() => (label, "empty blank-node label"),
            Self::Blank(label) if label.chars().any(char::is_whitespace) => {
                (label, "blank-node label contains whitespace")
            }
            Self::Assigned(id) if id.is_empty() => (id, "empty uid"),
            Self::Variable(name) if name.is_empty() => (name, "empty variable name"),
            Self::Variable(name) if name.contains(['(', ')']) => {
                (name, "variable name contains parentheses")
            }
            _ => return Ok(()),
        };
        Err(CoreError::InvalidUid {
            value: value.clone(),
            reason,
        })
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank(label) => write!(f, "_:{label}"),
            Self::Assigned(id) => f.write_str(id),
            Self::Variable(name) => write!(f, "uid({name})"),
        }
    }
}

impl FromStr for Uid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.validate().map_err(ser::Error::custom)?;
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

// ── Records ───────────────────────────────────────────────────────

/// A person node and its outgoing `friends` and `school` edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub married: Option<bool>,

    /// Opaque payload, base64 encoded on the wire.
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_bytes: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub friends: Vec<Person>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub school: Vec<Institution>,

    #[serde(rename = "dgraph.type", default, skip_serializing_if = "Vec::is_empty")]
    pub dgraph_type: Vec<String>,
}

impl Person {
    /// An empty record: serializes to `{}`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new `Person`-typed record with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with_name(name).with_type(PERSON_TYPE)
    }

    pub fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_dob(mut self, dob: DateTime<Utc>) -> Self {
        self.dob = Some(dob);
        self
    }

    pub fn with_married(mut self, married: bool) -> Self {
        self.married = Some(married);
        self
    }

    pub fn with_raw_bytes(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw_bytes = Some(raw.into());
        self
    }

    pub fn with_location(mut self, loc: Location) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn with_friend(mut self, friend: Person) -> Self {
        self.friends.push(friend);
        self
    }

    pub fn with_school(mut self, school: Institution) -> Self {
        self.school.push(school);
        self
    }

    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.dgraph_type.push(tag.into());
        self
    }
}

/// A school or other institution linked from `Person::school`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "dgraph.type", default, skip_serializing_if = "Vec::is_empty")]
    pub dgraph_type: Vec<String>,
}

impl Institution {
    /// A new `Institution`-typed record with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            uid: None,
            name: Some(name.into()),
            dgraph_type: vec![INSTITUTION_TYPE.to_string()],
        }
    }

    pub fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = Some(uid);
        self
    }
}

/// GeoJSON shape kinds accepted for `geo` predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoKind {
    Point,
}

/// A GeoJSON point. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: GeoKind,
    pub coordinates: [f64; 2],
}

impl Location {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeoKind::Point,
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|e| BASE64.decode(e.as_bytes()).map_err(de::Error::custom))
            .transpose()
    }
}
