//! kinship-graph: Dgraph client layer for kinship records.
//!
//! Builds alter, mutation, query and upsert requests from the typed records in
//! `kinship-core`, runs each unit of work inside its own transaction, and
//! decodes responses back into records. The wire binding is the [`Transport`]
//! trait; [`HttpTransport`] talks to a Dgraph alpha over its HTTP API.

pub mod client;
pub mod http;
pub mod mutations;
pub mod queries;
pub mod schema;
pub mod transport;
pub mod upsert;

pub use client::{GraphClient, GraphConfig, GraphError, Txn};
pub use http::HttpTransport;
pub use mutations::{build_set_mutation, AssignedUids, SetMutation};
pub use queries::{decode_block, FriendFilter, PersonLookup, QueryRequest};
pub use transport::{Mutation, Operation, Request, Response, Transport};
pub use upsert::UpsertRequest;
