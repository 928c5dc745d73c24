use std::error::Error as StdError;

use thiserror::Error;

pub use newrelic_telemetry_types::ValidationError;

use crate::harvester::HarvesterState;

/// A boxed error coming out of a transport implementation.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The error type of the SDK.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An item or value was rejected before it reached a batch.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The batch is full; the item was dropped.
    #[error("batch is full ({max_pending} pending)")]
    Capacity {
        /// The configured bound.
        max_pending: usize,
    },
    /// The request never produced a response (connect, DNS, TLS, timeout or
    /// a closed client).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// The ingest API answered with a non-2xx status.
    #[error("request failed with status code {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: Vec<u8>,
    },
    /// A payload or a response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The options cannot produce a working client.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A harvester operation was called in the wrong lifecycle state.
    #[error("cannot {operation} a harvester that is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the harvester was in.
        state: HarvesterState,
    },
    /// The harvester thread could not be spawned.
    #[error("failed to spawn harvester thread")]
    Spawn(#[source] std::io::Error),
}

impl Error {
    /// Wraps any error as a transport failure.
    pub fn transport<E: Into<BoxError>>(err: E) -> Self {
        Error::Transport(err.into())
    }

    /// The HTTP status code, for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether sending the same payload again may succeed.
    ///
    /// Transport failures, server errors and `429 Too Many Requests` are
    /// retryable; any other status is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Http { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
