//! Error types shared by the grid model and the background loader.

use thiserror::Error;

use crate::model::dimension::Axis;
use crate::services::channel::ErrorCode;

/// Errors raised by mutation and lifecycle operations on the grid model.
#[derive(Debug, Clone, Error)]
pub enum GridError {
    #[error("{axis} index {index} is out of range (length {len})")]
    IndexOutOfRange { axis: Axis, index: usize, len: usize },

    #[error("cell (column {column}, row {row}) is out of range")]
    CellOutOfRange { column: usize, row: usize },

    #[error("invalid item size {0}: sizes must be finite and greater than zero")]
    InvalidSize(f64),

    #[error("no background loader has been started for this model")]
    NotLoading,

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Errors observed at the correlation-id boundary between the model and
/// the background worker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// The background context was torn down before the reply arrived.
    #[error("operation aborted: background loader was terminated")]
    Aborted,

    #[error("worker replied with {code}: {message}")]
    Worker { code: ErrorCode, message: String },

    #[error("could not decode worker reply: {0}")]
    Decode(String),

    #[error("page out of order: received record {received} after {after}")]
    OutOfOrder { after: u64, received: u64 },

    /// The row stream ended without delivering what CONFIGURE announced.
    #[error(
        "row stream ended early: expected {expected} records up to {expected_last:?}, \
         received {received} up to {received_last:?}"
    )]
    Incomplete {
        expected: usize,
        received: usize,
        expected_last: Option<u64>,
        received_last: Option<u64>,
    },
}

/// Failures inside a data source (HTTP transport, decoding, local files).
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unknown dataset segment '{0}'")]
    UnknownSegment(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DataSourceError {
    /// Wire error code reported back through the worker channel
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Decode(_) | Self::Csv(_) => ErrorCode::Decode,
            Self::Transport(_) | Self::Status { .. } | Self::UnknownSegment(_) | Self::Io(_) => {
                ErrorCode::Transport
            }
        }
    }
}
