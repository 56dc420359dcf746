//! [`Transport`] over the Dgraph alpha HTTP API.
//!
//! | capability | endpoint |
//! |---|---|
//! | alter   | `POST /alter` |
//! | query   | `POST /query?startTs=` |
//! | mutate / upsert block | `POST /mutate?commitNow=&startTs=` (no variables) |
//! | discard | `POST /commit?startTs=&abort=true` |

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::GraphError;
use crate::transport::{Mutation, Operation, Request, Response, Transport};

/// HTTP binding to one Dgraph alpha.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base: String,
}

impl HttpTransport {
    /// Build a transport for `address` and check that the alpha answers `/health`.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let transport = Self::new(http, address);
        transport.health().await?;
        Ok(transport)
    }

    /// Build a transport without probing the server.
    pub fn new(http: reqwest::Client, address: &str) -> Self {
        Self {
            http,
            base: address.trim_end_matches('/').to_string(),
        }
    }

    pub fn address(&self) -> &str {
        &self.base
    }

    async fn health(&self) -> Result<(), GraphError> {
        let resp = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GraphError::Connection(format!(
                "health check on {} returned {}",
                self.base,
                resp.status()
            )));
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Send a request and unwrap the `{data, errors, extensions}` envelope.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Envelope, GraphError> {
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        let envelope: Envelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(GraphError::Server {
                    code: status.as_u16().to_string(),
                    message: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Err(e) => {
                return Err(GraphError::Decode {
                    block: "response".to_string(),
                    reason: e.to_string(),
                });
            }
        };

        if let Some(err) = envelope.errors.first() {
            return Err(GraphError::Server {
                code: err
                    .extensions
                    .as_ref()
                    .and_then(|x| x.code.clone())
                    .unwrap_or_else(|| "Error".to_string()),
                message: err.message.clone(),
            });
        }
        if !status.is_success() {
            return Err(GraphError::Server {
                code: status.as_u16().to_string(),
                message: status.canonical_reason().unwrap_or("request failed").to_string(),
            });
        }
        Ok(envelope)
    }
}

impl Transport for HttpTransport {
    async fn alter(&self, op: &Operation) -> Result<(), GraphError> {
        let builder = self.http.post(self.url("/alter"));
        let builder = match op {
            Operation::Schema(text) => builder.body(text.clone()),
            Operation::DropData => builder.json(&json!({ "drop_op": "DATA" })),
            Operation::DropAll => builder.json(&json!({ "drop_all": true })),
        };
        self.send(builder).await?;
        Ok(())
    }

    async fn execute(&self, start_ts: Option<u64>, request: &Request) -> Result<Response, GraphError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(ts) = start_ts {
            params.push(("startTs", ts.to_string()));
        }

        if request.is_mutation() {
            if !request.vars.is_empty() {
                return Err(GraphError::Unsupported(
                    "query variables cannot be sent to /mutate",
                ));
            }
            if request.commit_now {
                params.push(("commitNow", "true".to_string()));
            }
            let builder = self
                .http
                .post(self.url("/mutate"))
                .query(&params)
                .json(&mutate_body(request));
            let envelope = self.send(builder).await?;
            let start_ts = envelope.start_ts();

            let data: MutationData =
                serde_json::from_value(envelope.data).map_err(|e| GraphError::Decode {
                    block: "data".to_string(),
                    reason: e.to_string(),
                })?;
            let json = serde_json::to_vec(&data.queries.unwrap_or_else(|| json!({})))
                .map_err(|e| GraphError::Serialization(e.to_string()))?;

            Ok(Response {
                json,
                uids: data.uids,
                start_ts,
            })
        } else {
            let builder = self
                .http
                .post(self.url("/query"))
                .query(&params)
                .json(&json!({ "query": request.query, "variables": request.vars }));
            let envelope = self.send(builder).await?;
            let start_ts = envelope.start_ts();
            let json = serde_json::to_vec(&envelope.data)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;

            Ok(Response {
                json,
                uids: BTreeMap::new(),
                start_ts,
            })
        }
    }

    async fn discard(&self, start_ts: u64) -> Result<(), GraphError> {
        let builder = self
            .http
            .post(self.url("/commit"))
            .query(&[("startTs", start_ts.to_string()), ("abort", "true".to_string())]);
        self.send(builder).await?;
        Ok(())
    }
}

/// JSON body for `/mutate`: one mutation inline, several under `mutations`.
fn mutate_body(request: &Request) -> Value {
    let mut body = Map::new();
    if !request.query.is_empty() {
        body.insert("query".to_string(), Value::String(request.query.clone()));
    }
    match request.mutations.as_slice() {
        [single] => {
            if let Value::Object(clause) = mutation_json(single) {
                body.extend(clause);
            }
        }
        many => {
            body.insert(
                "mutations".to_string(),
                Value::Array(many.iter().map(mutation_json).collect()),
            );
        }
    }
    Value::Object(body)
}

fn mutation_json(mutation: &Mutation) -> Value {
    let mut clause = Map::new();
    clause.insert("set".to_string(), mutation.set_json.clone());
    if let Some(cond) = &mutation.cond {
        clause.insert("cond".to_string(), Value::String(cond.clone()));
    }
    Value::Object(clause)
}

// ── Response envelope ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    errors: Vec<ServerError>,
    #[serde(default)]
    extensions: Option<Extensions>,
}

impl Envelope {
    fn start_ts(&self) -> Option<u64> {
        self.extensions
            .as_ref()
            .and_then(|x| x.txn.as_ref())
            .map(|txn| txn.start_ts)
            .filter(|ts| *ts > 0)
    }
}

#[derive(Debug, Deserialize)]
struct ServerError {
    message: String,
    #[serde(default)]
    extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct ErrorExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Extensions {
    txn: Option<TxnExtension>,
}

#[derive(Debug, Deserialize)]
struct TxnExtension {
    #[serde(default)]
    start_ts: u64,
}

#[derive(Debug, Deserialize)]
struct MutationData {
    #[serde(default)]
    queries: Option<Value>,
    #[serde(default)]
    uids: BTreeMap<String, String>,
}
