//! Dgraph client handle, transaction scoping and deadlines.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kinship_core::config::DgraphSettings;

use crate::http::HttpTransport;
use crate::transport::{Operation, Request, Response, Transport};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Dgraph connection error: {0}")]
    Connection(String),

    #[error("Dgraph HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dgraph server error ({code}): {message}")]
    Server { code: String, message: String },

    #[error("Deadline of {deadline:?} exceeded during {operation}")]
    DeadlineExceeded {
        operation: &'static str,
        deadline: Duration,
    },

    #[error("Transaction already committed or discarded")]
    TxnFinished,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to decode {block:?}: {reason}")]
    Decode { block: String, reason: String },

    #[error("Block {block:?} returned a node without a uid")]
    MissingUid { block: String },

    #[error("Uid {0} has not been assigned by the server")]
    Unassigned(String),

    #[error("Unsupported request: {0}")]
    Unsupported(&'static str),
}

/// Configuration for connecting to a Dgraph alpha.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub address: String,
    /// Upper bound for every request sent to the server.
    pub deadline: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8080".to_string(),
            deadline: Duration::from_secs(10),
        }
    }
}

impl From<&DgraphSettings> for GraphConfig {
    fn from(settings: &DgraphSettings) -> Self {
        Self {
            address: settings.address.clone(),
            deadline: settings.deadline(),
        }
    }
}

/// Shared Dgraph client.
///
/// Clone is cheap (inner Arc); clones share the transport and may run
/// transactions concurrently.
pub struct GraphClient<T = HttpTransport> {
    transport: Arc<T>,
    deadline: Duration,
}

impl<T> Clone for GraphClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            deadline: self.deadline,
        }
    }
}

impl GraphClient<HttpTransport> {
    /// Connect to a Dgraph alpha over HTTP with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let transport = HttpTransport::connect(&config.address, config.deadline).await?;
        tracing::info!(address = %config.address, "Connected to Dgraph");
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> GraphClient<T> {
    /// Wrap an already established transport.
    pub fn with_transport(transport: T, config: &GraphConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            deadline: config.deadline,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Begin a transaction. Nothing is sent until the first request.
    pub fn new_txn(&self) -> Txn<'_, T> {
        Txn {
            client: self,
            start_ts: None,
            dirty: false,
            finished: false,
        }
    }

    /// Send a schema alter or drop.
    pub async fn alter(&self, op: &Operation) -> Result<(), GraphError> {
        self.bounded("alter", self.transport.alter(op)).await
    }

    /// Run `fut` under the client deadline.
    pub(crate) async fn bounded<R>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<R, GraphError>>,
    ) -> Result<R, GraphError> {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(GraphError::DeadlineExceeded {
                operation,
                deadline: self.deadline,
            }),
        }
    }
}

/// A transaction scope.
///
/// Open one per unit of work and finish it with [`Txn::release`], which
/// discards anything left uncommitted and hands back the work's outcome.
///
/// Callers must release every transaction that sent uncommitted writes.
/// Dropping such a `Txn` sends nothing: the server keeps the writes pending
/// until its own transaction timeout aborts them, and only a warning is logged.
pub struct Txn<'a, T: Transport> {
    client: &'a GraphClient<T>,
    start_ts: Option<u64>,
    /// Mutations were sent without being committed.
    dirty: bool,
    finished: bool,
}

impl<'a, T: Transport> Txn<'a, T> {
    pub fn start_ts(&self) -> Option<u64> {
        self.start_ts
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Send one request (query, mutation or upsert) in this transaction.
    pub async fn execute(&mut self, request: &Request) -> Result<Response, GraphError> {
        if self.finished {
            return Err(GraphError::TxnFinished);
        }

        tracing::debug!(
            start_ts = ?self.start_ts,
            mutations = request.mutations.len(),
            vars = request.vars.len(),
            commit_now = request.commit_now,
            "Executing request"
        );

        let response = self
            .client
            .bounded("execute", self.client.transport.execute(self.start_ts, request))
            .await?;

        if self.start_ts.is_none() {
            self.start_ts = response.start_ts;
        }
        if request.is_mutation() {
            if request.commit_now {
                self.finished = true;
                self.dirty = false;
            } else {
                self.dirty = true;
            }
        }
        Ok(response)
    }

    /// Abort the transaction. Idempotent, and a no-op once committed or
    /// when nothing was written.
    pub async fn discard(&mut self) -> Result<(), GraphError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        match (self.dirty, self.start_ts) {
            (true, Some(start_ts)) => {
                self.dirty = false;
                self.client
                    .bounded("discard", self.client.transport.discard(start_ts))
                    .await
            }
            _ => Ok(()),
        }
    }

    /// Discard the transaction and return `outcome` unchanged.
    ///
    /// A failed discard is logged; it never replaces the outcome.
    pub async fn release<R>(mut self, outcome: Result<R, GraphError>) -> Result<R, GraphError> {
        if let Err(e) = self.discard().await {
            tracing::warn!(error = %e, start_ts = ?self.start_ts, "Failed to discard transaction");
        }
        outcome
    }
}

impl<T: Transport> Drop for Txn<'_, T> {
    fn drop(&mut self) {
        if self.dirty && !self.finished {
            tracing::warn!(start_ts = ?self.start_ts, "Transaction dropped with uncommitted writes");
        }
    }
}
