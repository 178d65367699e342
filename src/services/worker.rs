//! Background worker: answers CONFIGURE / LOAD_NEXT requests from a
//! [`DataSource`]. Each request is served by its own task, so replies may
//! come back in a different order than the requests went in.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use super::channel::{
    Action, ConfigurePayload, ErrorCode, LoadNextPayload, WorkerChannels, WorkerError,
    WorkerRequest, WorkerResponse,
};
use super::data_source::DataSource;

/// A running worker: the client-side channel ends plus its task
pub struct WorkerEndpoint {
    pub channels: WorkerChannels,
    pub task: JoinHandle<()>,
}

/// Spawn the worker loop on `handle`.
///
/// Aborting the returned task also aborts every request still in flight.
pub fn spawn_worker(handle: &Handle, source: Arc<dyn DataSource>) -> WorkerEndpoint {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();

    let task = handle.spawn(serve(source, request_rx, response_tx));

    WorkerEndpoint {
        channels: WorkerChannels {
            requests: request_tx,
            responses: response_rx,
        },
        task,
    }
}

async fn serve(
    source: Arc<dyn DataSource>,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(request) => {
                    let source = Arc::clone(&source);
                    let responses = responses.clone();
                    in_flight.spawn(async move {
                        let response = handle_request(source.as_ref(), request).await;
                        // Receiver gone means the model was torn down
                        let _ = responses.send(response);
                    });
                }
                None => break,
            },
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    debug!("Worker request channel closed, finishing {} in-flight requests", in_flight.len());
    while in_flight.join_next().await.is_some() {}
}

/// Dispatch one request. Never fails: every problem becomes an error response.
pub async fn handle_request(source: &dyn DataSource, request: WorkerRequest) -> WorkerResponse {
    let WorkerRequest {
        correlation_id,
        action,
        payload,
    } = request;

    let outcome = match action.parse::<Action>() {
        Ok(Action::Configure) => configure(source, payload).await,
        Ok(Action::LoadNext) => load_next(source, payload).await,
        Err(err) => {
            warn!("Worker request #{}: {}", correlation_id, err.message);
            Err(err)
        }
    };

    WorkerResponse::from_outcome(correlation_id, outcome)
}

async fn configure(source: &dyn DataSource, payload: Value) -> Result<Value, WorkerError> {
    let payload: ConfigurePayload = parse_payload(payload)?;
    let schema = source
        .configure(&payload.segment)
        .await
        .map_err(|e| WorkerError::new(e.code(), e.to_string()))?;
    to_result(&schema)
}

async fn load_next(source: &dyn DataSource, payload: Value) -> Result<Value, WorkerError> {
    let payload: LoadNextPayload = parse_payload(payload)?;
    let rows = source
        .load_next(
            &payload.segment,
            payload.start_after_record_id,
            payload.page_size,
        )
        .await
        .map_err(|e| WorkerError::new(e.code(), e.to_string()))?;
    to_result(&rows)
}

fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, WorkerError> {
    serde_json::from_value(payload).map_err(|e| WorkerError::new(ErrorCode::BadPayload, e.to_string()))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, WorkerError> {
    serde_json::to_value(value).map_err(|e| WorkerError::new(ErrorCode::Decode, e.to_string()))
}
