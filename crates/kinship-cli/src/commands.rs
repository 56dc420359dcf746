//! Command dispatch: one unit of work per invocation.

use std::io::Write;

use anyhow::Context;
use clap::{ArgAction, Subcommand};

use kinship_core::Person;
use kinship_graph::{FriendFilter, GraphClient, Transport, UpsertRequest};

use crate::demo;

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create the schema in the database.
    Schema,
    /// Add graph data to the database.
    Mutate,
    /// Get a person and their graph data from the database.
    Query {
        /// Name to look up.
        #[arg(long, default_value = "Alice")]
        name: String,
        /// Only return friends with this name.
        #[arg(long)]
        friend: Option<String>,
    },
    /// Update a person's age and marital status, if the person exists.
    Upsert {
        /// Name of the person to update.
        #[arg(long, default_value = "Alice")]
        name: String,
        #[arg(long, default_value_t = 30)]
        age: i64,
        #[arg(long, default_value_t = false, action = ArgAction::Set)]
        married: bool,
    },
    /// Drop all data in the database.
    DropData,
    /// Drop data and schema in the database.
    DropSchema,
}

/// Run `command` and write its report to `out`.
pub async fn run<T: Transport, W: Write>(
    client: &GraphClient<T>,
    command: &Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Schema => {
            client.apply_schema().await.context("schema failed")?;
            writeln!(out, "schema: created.")?;
        }
        Command::Mutate => {
            let uids = client
                .mutate(&demo::alice())
                .await
                .context("mutation failed")?;
            let alice = uids
                .get(demo::ALICE_LABEL)
                .map(ToString::to_string)
                .unwrap_or_else(|| "<none>".to_string());
            writeln!(out, "mutate: 'set' mutation done. Alice: {alice}")?;
        }
        Command::Query { name, friend } => {
            let Some(uid) = client.lookup_uid(name).await.context("query failed")? else {
                writeln!(out, "query: no person named {name:?}.")?;
                return Ok(());
            };

            let filter = friend
                .clone()
                .map_or(FriendFilter::All, FriendFilter::NameEquals);
            let lookup = client
                .lookup_person(&uid, &filter)
                .await
                .context("query failed")?;
            writeln!(out, "query: [{}] bytes of graph data retrieved.", lookup.bytes)?;

            match lookup.people.first() {
                Some(person) => writeln!(
                    out,
                    "query: want: {uid} => have: {}, name: {}, friends: {}, schools: {}",
                    person
                        .uid
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    person.name.as_deref().unwrap_or_default(),
                    person.friends.len(),
                    person.school.len(),
                )?,
                None => writeln!(out, "query: {uid} is no longer present.")?,
            }
        }
        Command::Upsert { name, age, married } => {
            let patch = Person::new().with_age(*age).with_married(*married);
            client
                .upsert(UpsertRequest::by_name(name, patch)?)
                .await
                .context("upsert failed")?;
            writeln!(out, "upsert: done.")?;
        }
        Command::DropData => {
            client.drop_data().await.context("data dropping failed")?;
            writeln!(out, "drop-data: dropped all the data.")?;
        }
        Command::DropSchema => {
            client.drop_all().await.context("schema dropping failed")?;
            writeln!(out, "drop-schema: dropped the schema.")?;
        }
    }
    Ok(())
}
