//! Parameterized read queries and decoding of their JSON results.
//!
//! Query text is always a `'static` template; caller data only ever travels
//! as named variables, so it is never spliced into DQL.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use kinship_core::{Person, Uid};

use crate::client::{GraphClient, GraphError, Txn};
use crate::transport::{variable_key, Request, Transport};

/// Result block of [`LOOKUP_BY_NAME`].
pub const NAME_BLOCK: &str = "matches";

/// Result block of the lookup-by-uid templates.
pub const PERSON_BLOCK: &str = "person";

/// At most one uid for people with an exact `name`. Ties are broken by the server.
pub const LOOKUP_BY_NAME: &str = r#"query q($name: string) {
    matches(func: eq(name, $name), first: 1) {
        uid
    }
}"#;

/// A person by uid, with every friend and school.
pub const LOOKUP_BY_UID: &str = r#"query q($id: string) {
    person(func: uid($id)) {
        uid
        name
        dob
        age
        loc
        raw_bytes
        married
        dgraph.type
        friends {
            uid
            name
            age
            dgraph.type
        }
        school {
            uid
            name
            dgraph.type
        }
    }
}"#;

/// A person by uid, with only the friends whose name equals `$friend`.
pub const LOOKUP_BY_UID_FRIENDS_NAMED: &str = r#"query q($id: string, $friend: string) {
    person(func: uid($id)) {
        uid
        name
        dob
        age
        loc
        raw_bytes
        married
        dgraph.type
        friends @filter(eq(name, $friend)) {
            uid
            name
            age
            dgraph.type
        }
        school {
            uid
            name
            dgraph.type
        }
    }
}"#;

/// Which friends a person lookup returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FriendFilter {
    #[default]
    All,
    NameEquals(String),
}

/// An immutable query template plus its variable bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    template: &'static str,
    vars: BTreeMap<String, String>,
}

impl QueryRequest {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            vars: BTreeMap::new(),
        }
    }

    /// Bind `$name` (the `$` is added when missing) to `value`.
    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(variable_key(name), value.into());
        self
    }

    /// Lookup-by-name request for [`LOOKUP_BY_NAME`].
    pub fn lookup_by_name(name: &str) -> Self {
        Self::new(LOOKUP_BY_NAME).bind("$name", name)
    }

    /// Lookup-by-uid request; `uid` must be server-assigned.
    pub fn lookup_by_uid(uid: &Uid, friends: &FriendFilter) -> Result<Self, GraphError> {
        let id = uid
            .as_assigned()
            .ok_or_else(|| GraphError::Unassigned(uid.to_string()))?;

        Ok(match friends {
            FriendFilter::All => Self::new(LOOKUP_BY_UID).bind("$id", id),
            FriendFilter::NameEquals(name) => Self::new(LOOKUP_BY_UID_FRIENDS_NAMED)
                .bind("$id", id)
                .bind("$friend", name.as_str()),
        })
    }

    pub fn template(&self) -> &'static str {
        self.template
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn to_request(&self) -> Request {
        Request {
            query: self.template.to_string(),
            vars: self.vars.clone(),
            ..Default::default()
        }
    }
}

/// People returned by a lookup, plus the size of the raw response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonLookup {
    pub people: Vec<Person>,
    pub bytes: usize,
}

/// Decode the array under `block` in a query response.
///
/// An empty array is an empty result. A missing block, or a block of the
/// wrong shape, is a [`GraphError::Decode`].
pub fn decode_block<T: DeserializeOwned>(json: &[u8], block: &str) -> Result<Vec<T>, GraphError> {
    let decode_err = |reason: String| GraphError::Decode {
        block: block.to_string(),
        reason,
    };

    let mut blocks: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(json).map_err(|e| decode_err(e.to_string()))?;
    let value = blocks
        .remove(block)
        .ok_or_else(|| decode_err("block missing from response".to_string()))?;
    serde_json::from_value(value).map_err(|e| decode_err(e.to_string()))
}

impl<'a, T: Transport> Txn<'a, T> {
    /// Run a read query in this transaction and return the raw JSON.
    pub async fn query(&mut self, query: &QueryRequest) -> Result<Vec<u8>, GraphError> {
        let response = self.execute(&query.to_request()).await?;
        Ok(response.json)
    }
}

impl<T: Transport> GraphClient<T> {
    /// Run a read query in its own transaction and return the raw JSON.
    pub async fn query(&self, query: &QueryRequest) -> Result<Vec<u8>, GraphError> {
        let mut txn = self.new_txn();
        let outcome = txn.query(query).await;
        txn.release(outcome).await
    }

    /// Uid of the first person named `name`, or `None` when nobody matches.
    pub async fn lookup_uid(&self, name: &str) -> Result<Option<Uid>, GraphError> {
        let json = self.query(&QueryRequest::lookup_by_name(name)).await?;
        let matches: Vec<Person> = decode_block(&json, NAME_BLOCK)?;

        match matches.into_iter().next() {
            None => {
                tracing::debug!(name, "No person matched");
                Ok(None)
            }
            Some(person) => person.uid.map(Some).ok_or_else(|| GraphError::MissingUid {
                block: NAME_BLOCK.to_string(),
            }),
        }
    }

    /// The person with `uid`, its schools, and the friends selected by `friends`.
    pub async fn lookup_person(
        &self,
        uid: &Uid,
        friends: &FriendFilter,
    ) -> Result<PersonLookup, GraphError> {
        let json = self.query(&QueryRequest::lookup_by_uid(uid, friends)?).await?;
        let people = decode_block(&json, PERSON_BLOCK)?;
        Ok(PersonLookup {
            people,
            bytes: json.len(),
        })
    }

    /// Look a person up by name, then fetch the full record.
    pub async fn find_person(
        &self,
        name: &str,
        friends: &FriendFilter,
    ) -> Result<Option<Person>, GraphError> {
        let Some(uid) = self.lookup_uid(name).await? else {
            return Ok(None);
        };
        let lookup = self.lookup_person(&uid, friends).await?;
        Ok(lookup.people.into_iter().next())
    }
}
