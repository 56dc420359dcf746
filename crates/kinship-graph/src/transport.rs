//! Wire-level request and response shapes, and the trait a Dgraph binding implements.
//!
//! The client layer never talks to the network directly: it hands an
//! [`Operation`] or a [`Request`] to a [`Transport`] and gets back raw JSON and
//! assigned uids. Transactions are identified by the server's start timestamp.

use std::collections::BTreeMap;

use crate::client::GraphError;

/// A schema-level alter: not transactional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create or update predicates and types from schema text.
    Schema(String),
    /// Delete all data, keep the schema.
    DropData,
    /// Delete all data and the schema.
    DropAll,
}

/// One `set` clause of a mutation, optionally guarded by an `@if(...)` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub set_json: serde_json::Value,
    pub cond: Option<String>,
}

impl Mutation {
    pub fn set(set_json: serde_json::Value) -> Self {
        Self {
            set_json,
            cond: None,
        }
    }
}

/// Everything a single `Do` round trip can carry: a query block with its
/// variables, zero or more mutations, and the commit flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub query: String,
    pub vars: BTreeMap<String, String>,
    pub mutations: Vec<Mutation>,
    pub commit_now: bool,
}

impl Request {
    /// A request that mutates and therefore needs the mutate endpoint.
    pub fn is_mutation(&self) -> bool {
        !self.mutations.is_empty()
    }
}

/// Key under which a query variable is bound: `name` with a leading `$`.
pub(crate) fn variable_key(name: &str) -> String {
    if name.starts_with('$') {
        name.to_string()
    } else {
        format!("${name}")
    }
}

/// Result of a `Do` round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Raw JSON of the query blocks, keyed by block name.
    pub json: Vec<u8>,
    /// Blank-node label (without `_:`) to assigned uid.
    pub uids: BTreeMap<String, String>,
    /// Start timestamp of the transaction the server ran this request in.
    pub start_ts: Option<u64>,
}

/// The capabilities consumed from a Dgraph binding.
///
/// Implementations must be shareable across concurrent transactions.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// Apply a schema alter or drop.
    async fn alter(&self, op: &Operation) -> Result<(), GraphError>;

    /// Run a query, mutation or upsert inside the transaction started at
    /// `start_ts` (or a fresh one when `None`).
    async fn execute(&self, start_ts: Option<u64>, request: &Request) -> Result<Response, GraphError>;

    /// Abort the transaction started at `start_ts`.
    async fn discard(&self, start_ts: u64) -> Result<(), GraphError>;
}
