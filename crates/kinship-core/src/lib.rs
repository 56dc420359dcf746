//! kinship-core: Record model and shared configuration for the kinship Dgraph client.
//!
//! This crate provides the foundational types used by the graph and CLI crates:
//! - Record identifiers (blank nodes, assigned uids, upsert variables)
//! - Person, Location and Institution records with presence-preserving fields
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{Institution, Location, Person, Uid};
