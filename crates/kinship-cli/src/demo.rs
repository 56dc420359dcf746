//! The sample graph written by `kinship mutate`.

use chrono::{TimeZone, Utc};

use kinship_core::{Institution, Location, Person, Uid};

/// Blank-node label of the root person.
pub const ALICE_LABEL: &str = "alice";

/// Alice, her friends Bob and Charlie, and her school.
///
/// No record carries an assigned uid, so every node is created. Only Alice
/// gets a blank label; that is the uid the mutation reports back.
pub fn alice() -> Person {
    let dob = Utc
        .with_ymd_and_hms(1980, 1, 1, 23, 0, 0)
        .single()
        .unwrap_or_default();

    Person::named("Alice")
        .with_uid(Uid::blank(ALICE_LABEL))
        .with_age(26)
        .with_married(true)
        .with_location(Location::point(1.1, 2.0))
        .with_dob(dob)
        .with_raw_bytes(&b"raw_bytes"[..])
        .with_friend(Person::named("Bob").with_age(24))
        .with_friend(Person::named("Charlie").with_age(29))
        .with_school(Institution::named("Crown Public School"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_graph_shape() {
        let alice = alice();
        assert_eq!(alice.uid, Some(Uid::blank("alice")));
        assert_eq!(alice.name.as_deref(), Some("Alice"));
        assert_eq!(alice.age, Some(26));
        assert_eq!(alice.married, Some(true));
        assert_eq!(alice.dgraph_type, ["Person"]);
        assert_eq!(alice.dob.map(|d| d.to_rfc3339()).as_deref(), Some("1980-01-01T23:00:00+00:00"));

        let friends: Vec<_> = alice.friends.iter().map(|f| (f.name.as_deref(), f.age)).collect();
        assert_eq!(friends, [(Some("Bob"), Some(24)), (Some("Charlie"), Some(29))]);
        assert!(alice.friends.iter().all(|f| f.uid.is_none()));

        assert_eq!(alice.school.len(), 1);
        assert_eq!(alice.school[0].dgraph_type, ["Institution"]);
    }
}
