//! kinship-cli: command driver for the kinship Dgraph client.
//!
//! Sequences schema, mutation, query, upsert and drop commands against a
//! connected [`kinship_graph::GraphClient`].

pub mod commands;
pub mod demo;
