#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Map, Value};

use kinship_graph::queries::{LOOKUP_BY_NAME, LOOKUP_BY_UID, LOOKUP_BY_UID_FRIENDS_NAMED};
use kinship_graph::upsert::{UPSERT_BY_NAME, USER_FOUND, USER_VAR};
use kinship_graph::{GraphError, Operation, Request, Response, Transport};

const EDGES: [&str; 2] = ["friends", "school"];

/// A request the transport received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Alter(Operation),
    Execute {
        start_ts: Option<u64>,
        request: Request,
    },
    Discard(u64),
}

/// In-memory stand-in for a Dgraph alpha that understands the kinship
/// templates: stores `set` payloads as nodes and answers the lookups.
#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct State {
    next_uid: u64,
    next_ts: u64,
    nodes: BTreeMap<String, Map<String, Value>>,
    schema: Option<String>,
    calls: Vec<Call>,
    failures: VecDeque<GraphError>,
    canned: VecDeque<Value>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every execute waits `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail the next execute with `err`.
    pub fn fail_next(&self, err: GraphError) {
        self.state.lock().unwrap().failures.push_back(err);
    }

    /// Answer the next non-mutating execute with `data` instead of the stored graph.
    pub fn respond_next(&self, data: Value) {
        self.state.lock().unwrap().canned.push_back(data);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn discards(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Discard(ts) => Some(ts),
                _ => None,
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    pub fn schema(&self) -> Option<String> {
        self.state.lock().unwrap().schema.clone()
    }
}

impl Transport for MemoryGraph {
    async fn alter(&self, op: &Operation) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Alter(op.clone()));
        match op {
            Operation::Schema(text) => state.schema = Some(text.clone()),
            Operation::DropData => state.nodes.clear(),
            Operation::DropAll => {
                state.nodes.clear();
                state.schema = None;
            }
        }
        Ok(())
    }

    async fn execute(&self, start_ts: Option<u64>, request: &Request) -> Result<Response, GraphError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Execute {
            start_ts,
            request: request.clone(),
        });
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let start_ts = start_ts.unwrap_or_else(|| {
            state.next_ts += 1;
            state.next_ts
        });

        if request.is_mutation() {
            if !request.vars.is_empty() {
                return Err(GraphError::Unsupported("query variables cannot be sent to /mutate"));
            }
            let bound = bound_uids(&request.query);

            let mut uids = BTreeMap::new();
            for mutation in &request.mutations {
                if mutation.cond.as_deref() == Some(USER_FOUND) && bound.len() != 1 {
                    continue;
                }
                state.store(&mutation.set_json, bound.first().map(String::as_str), &mut uids)?;
            }
            return Ok(Response {
                json: b"{}".to_vec(),
                uids,
                start_ts: Some(start_ts),
            });
        }

        let data = match state.canned.pop_front() {
            Some(data) => data,
            None => state.answer(request)?,
        };
        Ok(Response {
            json: serde_json::to_vec(&data).unwrap(),
            uids: BTreeMap::new(),
            start_ts: Some(start_ts),
        })
    }

    async fn discard(&self, start_ts: u64) -> Result<(), GraphError> {
        self.state.lock().unwrap().calls.push(Call::Discard(start_ts));
        Ok(())
    }
}

impl State {
    fn fresh_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("0x{:x}", self.next_uid)
    }

    fn first_named(&self, name: &str) -> Option<String> {
        self.nodes
            .iter()
            .find(|(_, node)| node.get("name").and_then(Value::as_str) == Some(name))
            .map(|(uid, _)| uid.clone())
    }

    /// Store one JSON node (and its edges) and return its uid.
    fn store(
        &mut self,
        value: &Value,
        bound: Option<&str>,
        uids: &mut BTreeMap<String, String>,
    ) -> Result<String, GraphError> {
        let obj = value.as_object().ok_or_else(|| GraphError::Server {
            code: "ErrorInvalidRequest".to_string(),
            message: "set payload must be an object".to_string(),
        })?;

        let uid = match obj.get("uid").and_then(Value::as_str) {
            Some(raw) if raw.starts_with("_:") => {
                let label = raw.trim_start_matches("_:").to_string();
                match uids.get(&label) {
                    Some(uid) => uid.clone(),
                    None => {
                        let uid = self.fresh_uid();
                        uids.insert(label, uid.clone());
                        uid
                    }
                }
            }
            Some(raw) if raw == format!("uid({USER_VAR})") => match bound {
                Some(uid) => uid.to_string(),
                None => self.fresh_uid(),
            },
            Some(raw) => raw.to_string(),
            None => self.fresh_uid(),
        };

        let mut fields = Map::new();
        for (key, v) in obj {
            if key == "uid" {
                continue;
            }
            if EDGES.contains(&key.as_str()) {
                let mut refs = Vec::new();
                for child in v.as_array().into_iter().flatten() {
                    let child_uid = self.store(child, bound, uids)?;
                    refs.push(json!({ "uid": child_uid }));
                }
                fields.insert(key.clone(), Value::Array(refs));
            } else {
                fields.insert(key.clone(), v.clone());
            }
        }

        let node = self.nodes.entry(uid.clone()).or_default();
        for (key, v) in fields {
            if EDGES.contains(&key.as_str()) {
                if let (Some(Value::Array(existing)), Value::Array(new)) = (node.get_mut(&key), &v) {
                    existing.extend(new.iter().cloned());
                    continue;
                }
            }
            node.insert(key, v);
        }
        Ok(uid)
    }

    fn answer(&self, request: &Request) -> Result<Value, GraphError> {
        let var = |name: &str| request.vars.get(name).cloned().unwrap_or_default();

        if request.query == LOOKUP_BY_NAME {
            let matches: Vec<Value> = self
                .first_named(&var("$name"))
                .map(|uid| json!({ "uid": uid }))
                .into_iter()
                .collect();
            return Ok(json!({ "matches": matches }));
        }

        if request.query == UPSERT_BY_NAME {
            let bound: Vec<Value> = self
                .first_named(&var("$name"))
                .map(|uid| json!({ "uid": uid }))
                .into_iter()
                .collect();
            return Ok(json!({ USER_VAR: bound }));
        }

        if request.query == LOOKUP_BY_UID || request.query == LOOKUP_BY_UID_FRIENDS_NAMED {
            let friend = (request.query == LOOKUP_BY_UID_FRIENDS_NAMED).then(|| var("$friend"));
            let person: Vec<Value> = self
                .expand(&var("$id"), friend.as_deref())
                .into_iter()
                .collect();
            return Ok(json!({ "person": person }));
        }

        Err(GraphError::Server {
            code: "ErrorInvalidRequest".to_string(),
            message: "unknown query".to_string(),
        })
    }

    fn expand(&self, uid: &str, friend: Option<&str>) -> Option<Value> {
        let node = self.nodes.get(uid)?;
        let mut out = node.clone();
        out.insert("uid".to_string(), json!(uid));

        for edge in EDGES {
            let Some(Value::Array(refs)) = node.get(edge) else {
                continue;
            };
            let children: Vec<Value> = refs
                .iter()
                .filter_map(|r| r.get("uid").and_then(Value::as_str))
                .filter_map(|child| {
                    let mut c = self.nodes.get(child)?.clone();
                    c.retain(|k, _| !EDGES.contains(&k.as_str()));
                    c.insert("uid".to_string(), json!(child));
                    Some(Value::Object(c))
                })
                .filter(|c| match (edge, friend) {
                    ("friends", Some(name)) => c.get("name").and_then(Value::as_str) == Some(name),
                    _ => true,
                })
                .collect();
            out.insert(edge.to_string(), Value::Array(children));
        }
        Some(Value::Object(out))
    }
}

/// Uids bound by a `{ user as var(func: uid(...)) }` block.
fn bound_uids(query: &str) -> Vec<String> {
    let prefix = format!("{{ {USER_VAR} as var(func: uid(");
    query
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_suffix(")) }"))
        .map(|ids| ids.split(", ").map(str::to_string).collect())
        .unwrap_or_default()
}
