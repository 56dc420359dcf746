//! `set` mutations built from records, and the uids the server assigns.
//!
//! The record's own presence rules decide what is written: unset fields are
//! left alone, records with an assigned uid are merged into existing nodes,
//! and records without one (or with a blank label) become new nodes.

use std::collections::BTreeMap;

use serde::Serialize;

use kinship_core::Uid;

use crate::client::{GraphClient, GraphError, Txn};
use crate::transport::{Mutation, Request, Transport};

/// A serialized `set` payload and its commit flag.
#[derive(Debug, Clone, PartialEq)]
pub struct SetMutation {
    pub mutation: Mutation,
    pub commit_now: bool,
}

impl SetMutation {
    pub fn into_request(self) -> Request {
        Request {
            mutations: vec![self.mutation],
            commit_now: self.commit_now,
            ..Default::default()
        }
    }
}

/// Serialize `record` into a `set` mutation that commits immediately.
pub fn build_set_mutation<R: Serialize>(record: &R) -> Result<SetMutation, GraphError> {
    let set_json =
        serde_json::to_value(record).map_err(|e| GraphError::Serialization(e.to_string()))?;
    Ok(SetMutation {
        mutation: Mutation::set(set_json),
        commit_now: true,
    })
}

/// Uids the server assigned to blank-node labels in one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignedUids(BTreeMap<String, Uid>);

impl AssignedUids {
    /// Uid assigned to the blank label `label` (without the `_:` prefix).
    pub fn get(&self, label: &str) -> Option<&Uid> {
        self.0.get(label.strip_prefix("_:").unwrap_or(label))
    }

    /// Uid assigned to a [`Uid::Blank`] from the submitted record.
    pub fn for_uid(&self, uid: &Uid) -> Option<&Uid> {
        uid.label().and_then(|label| self.get(label))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Uid)> {
        self.0.iter().map(|(label, uid)| (label.as_str(), uid))
    }
}

impl From<BTreeMap<String, String>> for AssignedUids {
    fn from(raw: BTreeMap<String, String>) -> Self {
        Self(
            raw.into_iter()
                .filter(|(_, id)| !id.is_empty())
                .map(|(label, id)| (label, Uid::Assigned(id)))
                .collect(),
        )
    }
}

impl<'a, T: Transport> Txn<'a, T> {
    /// Run a `set` mutation in this transaction.
    pub async fn mutate(&mut self, set: SetMutation) -> Result<AssignedUids, GraphError> {
        let response = self.execute(&set.into_request()).await?;
        Ok(AssignedUids::from(response.uids))
    }
}

impl<T: Transport> GraphClient<T> {
    /// Write `record` in its own committed transaction.
    pub async fn mutate<R: Serialize>(&self, record: &R) -> Result<AssignedUids, GraphError> {
        let set = build_set_mutation(record)?;
        let mut txn = self.new_txn();
        let outcome = txn.mutate(set).await;
        let uids = txn.release(outcome).await?;
        tracing::info!(assigned = uids.len(), "Set mutation committed");
        Ok(uids)
    }
}
