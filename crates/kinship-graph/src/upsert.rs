//! Upserts: a variable-bound lookup and the mutations that run against the
//! nodes it found, inside one transaction.
//!
//! The HTTP `/mutate` endpoint does not accept query variables, so caller data
//! never travels with the mutation. The lookup runs first as a read in the
//! transaction (variables bound by name), then a single upsert block binds the
//! variable to the server-assigned uids it returned and applies the mutations,
//! committing in the same request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kinship_core::{Person, Uid};

use crate::client::{GraphClient, GraphError, Txn};
use crate::mutations::build_set_mutation;
use crate::queries::decode_block;
use crate::transport::{variable_key, Mutation, Request, Response, Transport};

/// Variable bound by [`UPSERT_BY_NAME`].
pub const USER_VAR: &str = "user";

/// Finds the first person whose name equals `$name`. The result block is
/// named after the variable it binds.
pub const UPSERT_BY_NAME: &str = r#"query q($name: string) {
    user(func: eq(name, $name), first: 1) {
        uid
    }
}"#;

/// Condition that keeps a mutation from running unless `user` bound exactly one node.
pub const USER_FOUND: &str = "@if(eq(len(user), 1))";

/// Lookup, bound variable and mutation clauses, always committed on success.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
    lookup: &'static str,
    var: &'static str,
    vars: BTreeMap<String, String>,
    mutations: Vec<Mutation>,
}

#[derive(Deserialize)]
struct Bound {
    uid: Uid,
}

impl UpsertRequest {
    /// `lookup` must return the uids to bind in a block named `var`.
    pub fn new(lookup: &'static str, var: &'static str) -> Self {
        Self {
            lookup,
            var,
            vars: BTreeMap::new(),
            mutations: Vec::new(),
        }
    }

    /// Patch the first person named `name`, if there is one.
    ///
    /// `patch` is written against `uid(user)`; its own uid is replaced.
    pub fn by_name(name: &str, patch: Person) -> Result<Self, GraphError> {
        let patch = patch.with_uid(Uid::variable(USER_VAR));
        Self::new(UPSERT_BY_NAME, USER_VAR)
            .bind("$name", name)
            .set_if(&patch, USER_FOUND)
    }

    /// Bind a lookup variable (the `$` is added when missing).
    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(variable_key(name), value.into());
        self
    }

    pub fn mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Add an unconditional `set` of `record`.
    pub fn set<R: Serialize>(self, record: &R) -> Result<Self, GraphError> {
        let set = build_set_mutation(record)?;
        Ok(self.mutation(set.mutation))
    }

    /// Add a `set` of `record` guarded by `cond`, e.g. `@if(eq(len(v), 1))`.
    pub fn set_if<R: Serialize>(self, record: &R, cond: impl Into<String>) -> Result<Self, GraphError> {
        let mut set = build_set_mutation(record)?;
        set.mutation.cond = Some(cond.into());
        Ok(self.mutation(set.mutation))
    }

    pub fn var(&self) -> &'static str {
        self.var
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// The read that finds the nodes to bind.
    pub fn lookup_request(&self) -> Request {
        Request {
            query: self.lookup.to_string(),
            vars: self.vars.clone(),
            ..Default::default()
        }
    }

    /// The committing upsert block: one query block binding the variable to
    /// `bound`, plus every mutation clause. Carries no variables.
    pub fn mutation_request(&self, bound: &[Uid]) -> Result<Request, GraphError> {
        Ok(Request {
            query: binding_query(self.var, bound)?,
            vars: BTreeMap::new(),
            mutations: self.mutations.clone(),
            commit_now: true,
        })
    }
}

/// `{ var as var(func: uid(0x1, 0x2)) }`, built only from server-assigned uids.
pub fn binding_query(var: &str, bound: &[Uid]) -> Result<String, GraphError> {
    let ids = bound
        .iter()
        .map(|uid| match uid.as_assigned() {
            Some(id) if is_hex_uid(id) => Ok(id),
            _ => Err(GraphError::Unassigned(uid.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("{{ {var} as var(func: uid({})) }}", ids.join(", ")))
}

fn is_hex_uid(id: &str) -> bool {
    id.strip_prefix("0x")
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

impl<'a, T: Transport> Txn<'a, T> {
    /// Look up the nodes to bind, then apply the mutations against them and commit.
    ///
    /// When the lookup binds nothing no mutation is sent and the transaction
    /// stays read-only.
    pub async fn upsert(&mut self, upsert: &UpsertRequest) -> Result<Response, GraphError> {
        let lookup = self.execute(&upsert.lookup_request()).await?;
        let bound: Vec<Bound> = decode_block(&lookup.json, upsert.var)?;
        if bound.is_empty() {
            tracing::debug!(var = upsert.var, "Upsert lookup bound nothing");
            return Ok(Response {
                start_ts: lookup.start_ts,
                ..Response::default()
            });
        }

        let uids: Vec<Uid> = bound.into_iter().map(|b| b.uid).collect();
        self.execute(&upsert.mutation_request(&uids)?).await
    }
}

impl<T: Transport> GraphClient<T> {
    /// Run an upsert in its own transaction.
    pub async fn upsert(&self, upsert: UpsertRequest) -> Result<Response, GraphError> {
        let mut txn = self.new_txn();
        let outcome = txn.upsert(&upsert).await;
        let response = txn.release(outcome).await?;
        tracing::info!(
            mutations = upsert.mutations.len(),
            assigned = response.uids.len(),
            "Upsert finished"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn by_name_binds_name_only_in_the_lookup() {
        let patch = Person::new().with_married(false).with_age(30);
        let upsert = UpsertRequest::by_name("Alice", patch).unwrap();

        let lookup = upsert.lookup_request();
        assert_eq!(lookup.query, UPSERT_BY_NAME);
        assert!(!lookup.query.contains("Alice"));
        assert_eq!(lookup.vars.get("$name").map(String::as_str), Some("Alice"));
        assert!(lookup.mutations.is_empty());
        assert!(!lookup.commit_now);
    }

    #[test]
    fn mutation_request_has_one_block_and_the_guarded_patch() {
        let patch = Person::new().with_married(false).with_age(30);
        let upsert = UpsertRequest::by_name("Alice", patch).unwrap();
        let request = upsert.mutation_request(&[Uid::assigned("0x2a")]).unwrap();

        assert!(request.commit_now);
        assert_eq!(request.query, "{ user as var(func: uid(0x2a)) }");
        assert_eq!(request.query.matches(" as var(").count(), 1);
        assert!(request.vars.is_empty());
        assert_eq!(request.mutations.len(), 1);
        assert_eq!(
            request.mutations[0].set_json,
            json!({"uid": "uid(user)", "age": 30, "married": false})
        );
        assert_eq!(request.mutations[0].cond.as_deref(), Some(USER_FOUND));
    }

    #[test]
    fn by_name_replaces_patch_uid() {
        let patch = Person::new().with_uid(Uid::assigned("0x1")).with_age(30);
        let upsert = UpsertRequest::by_name("Alice", patch).unwrap();
        assert_eq!(upsert.mutations()[0].set_json["uid"], "uid(user)");
    }

    #[test]
    fn supplied_clauses_are_kept_in_order() {
        let request = UpsertRequest::new(UPSERT_BY_NAME, USER_VAR)
            .bind("name", "Alice")
            .mutation(Mutation::set(json!({"uid": "uid(user)", "married": false})))
            .mutation(Mutation::set(json!({"uid": "uid(user)", "age": 30})))
            .mutation_request(&[Uid::assigned("0x1"), Uid::assigned("0x2")])
            .unwrap();

        assert!(request.commit_now);
        assert_eq!(request.query, "{ user as var(func: uid(0x1, 0x2)) }");
        assert_eq!(request.mutations.len(), 2);
        assert_eq!(request.mutations[0].set_json["married"], false);
        assert_eq!(request.mutations[1].set_json["age"], 30);
        assert!(request.mutations.iter().all(|m| m.cond.is_none()));
    }

    #[test]
    fn binding_accepts_only_server_uids() {
        for bad in [
            Uid::blank("alice"),
            Uid::variable("user"),
            Uid::assigned("0x"),
            Uid::assigned("0x2a) } q(func: has(name)"),
            Uid::assigned("42"),
        ] {
            let err = binding_query(USER_VAR, &[bad]).unwrap_err();
            assert!(matches!(err, GraphError::Unassigned(_)));
        }
    }
}
