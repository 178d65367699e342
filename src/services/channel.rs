//! Request/response boundary to the background worker.
//!
//! Every request carries a correlation id; the [`CorrelationTable`] maps ids to
//! the caller waiting on them, so replies resolve by id and never by arrival
//! order. A router task owns the table and is the only thing that touches it,
//! which keeps the worker side free of shared state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::model::types::{DatasetSchema, RowRecord};

pub type CorrelationId = u64;

/// Requests understood by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Configure,
    LoadNext,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Configure => "CONFIGURE",
            Action::LoadNext => "LOAD_NEXT",
        }
    }
}

impl FromStr for Action {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIGURE" => Ok(Action::Configure),
            "LOAD_NEXT" => Ok(Action::LoadNext),
            other => Err(WorkerError::new(
                ErrorCode::UnknownAction,
                format!("unknown action '{}'", other),
            )),
        }
    }
}

/// Machine-readable error codes carried in worker responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownAction,
    BadPayload,
    Transport,
    Decode,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::UnknownAction => "UNKNOWN_ACTION",
            ErrorCode::BadPayload => "BAD_PAYLOAD",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Decode => "DECODE",
        };
        write!(f, "{}", code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerError {
    pub code: ErrorCode,
    pub message: String,
}

impl WorkerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<WorkerError> for LoadError {
    fn from(err: WorkerError) -> Self {
        LoadError::Worker {
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub correlation_id: CorrelationId,
    /// Kept as a string so unknown actions reach the worker and get a
    /// structured error back
    pub action: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkerError>,
}

impl WorkerResponse {
    pub fn from_outcome(correlation_id: CorrelationId, outcome: Result<Value, WorkerError>) -> Self {
        match outcome {
            Ok(result) => Self {
                correlation_id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                correlation_id,
                result: None,
                error: Some(error),
            },
        }
    }

    fn into_outcome(self) -> Result<Value, LoadError> {
        match (self.error, self.result) {
            (Some(error), _) => Err(error.into()),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurePayload {
    pub segment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadNextPayload {
    pub segment: String,
    #[serde(alias = "startAtRecordId")]
    pub start_after_record_id: Option<u64>,
    pub page_size: usize,
}

pub type PendingReply = oneshot::Sender<Result<Value, LoadError>>;

/// Pending operations keyed by correlation id
#[derive(Debug, Default)]
pub struct CorrelationTable {
    next_id: CorrelationId,
    pending: HashMap<CorrelationId, PendingReply>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id to a waiting caller
    pub fn register(&mut self, reply: PendingReply) -> CorrelationId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, reply);
        id
    }

    /// Complete the operation that issued `response.correlation_id`.
    /// Returns false when no such operation is pending.
    pub fn resolve(&mut self, response: WorkerResponse) -> bool {
        let Some(reply) = self.pending.remove(&response.correlation_id) else {
            warn!(
                "Dropping reply for unknown correlation id {}",
                response.correlation_id
            );
            return false;
        };

        // The caller may have given up waiting; that is not an error here
        let _ = reply.send(response.into_outcome());
        true
    }

    /// Fail one pending operation with `error`
    pub fn fail(&mut self, id: CorrelationId, error: LoadError) -> bool {
        match self.pending.remove(&id) {
            Some(reply) => {
                let _ = reply.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Resolve every pending operation as aborted
    pub fn abort_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(LoadError::Aborted));
        }
        if count > 0 {
            debug!("Aborted {} pending worker operations", count);
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// The two directions of a worker connection
pub struct WorkerChannels {
    pub requests: mpsc::UnboundedSender<WorkerRequest>,
    pub responses: mpsc::UnboundedReceiver<WorkerResponse>,
}

enum ClientCommand {
    Send {
        action: String,
        payload: Value,
        reply: PendingReply,
    },
}

/// Cloneable handle for issuing requests to the worker
#[derive(Clone)]
pub struct WorkerClient {
    commands: mpsc::UnboundedSender<ClientCommand>,
}

impl WorkerClient {
    /// Start the router task that owns the correlation table.
    ///
    /// When the router stops (worker gone, every client dropped, or the task
    /// aborted) every pending operation resolves as [`LoadError::Aborted`].
    pub fn connect(handle: &Handle, channels: WorkerChannels) -> (Self, JoinHandle<()>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let router = handle.spawn(route(command_rx, channels));
        (Self { commands }, router)
    }

    /// Send a raw request and wait for its reply
    pub async fn send(&self, action: &str, payload: Value) -> Result<Value, LoadError> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(ClientCommand::Send {
                action: action.to_string(),
                payload,
                reply,
            })
            .map_err(|_| LoadError::Aborted)?;

        // A dropped sender means the router went away without answering
        reply_rx.await.map_err(|_| LoadError::Aborted)?
    }

    pub async fn configure(&self, segment: &str) -> Result<DatasetSchema, LoadError> {
        let payload = to_payload(&ConfigurePayload {
            segment: segment.to_string(),
        })?;
        let result = self.send(Action::Configure.as_str(), payload).await?;
        serde_json::from_value(result).map_err(|e| LoadError::Decode(e.to_string()))
    }

    pub async fn load_next(
        &self,
        segment: &str,
        start_after_record_id: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RowRecord>, LoadError> {
        let payload = to_payload(&LoadNextPayload {
            segment: segment.to_string(),
            start_after_record_id,
            page_size,
        })?;
        let result = self.send(Action::LoadNext.as_str(), payload).await?;
        serde_json::from_value(result).map_err(|e| LoadError::Decode(e.to_string()))
    }
}

fn to_payload<T: Serialize>(payload: &T) -> Result<Value, LoadError> {
    serde_json::to_value(payload).map_err(|e| LoadError::Decode(e.to_string()))
}

async fn route(mut commands: mpsc::UnboundedReceiver<ClientCommand>, channels: WorkerChannels) {
    let WorkerChannels {
        requests,
        mut responses,
    } = channels;
    let mut table = CorrelationTable::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ClientCommand::Send { action, payload, reply }) => {
                    let correlation_id = table.register(reply);
                    debug!("-> worker #{} {}", correlation_id, action);
                    let request = WorkerRequest { correlation_id, action, payload };
                    if requests.send(request).is_err() {
                        table.fail(correlation_id, LoadError::Aborted);
                        break;
                    }
                }
                None => break,
            },
            response = responses.recv() => match response {
                Some(response) => {
                    debug!("<- worker #{}", response.correlation_id);
                    table.resolve(response);
                }
                None => break,
            },
        }
    }

    table.abort_all();
}
