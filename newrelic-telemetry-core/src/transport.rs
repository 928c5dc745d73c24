use std::sync::Arc;

use uuid::Uuid;

use crate::{Error, Response};

/// The payload produced by flushing a batch.
pub trait BatchSnapshot: Send + 'static {
    /// Identifies the payload, sent as `x-request-id`.
    fn batch_id(&self) -> Uuid;

    /// The number of items in the payload.
    fn len(&self) -> usize;

    /// Whether there is nothing to send.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A batch that can be drained into a snapshot.
pub trait Flush: Send + Sync + 'static {
    /// Names the pipeline in diagnostics.
    const NAME: &'static str;

    /// The snapshot type produced by [`Flush::flush`].
    type Snapshot: BatchSnapshot;

    /// Atomically drains the batch.
    fn flush(&self) -> Self::Snapshot;
}

/// Delivers snapshots of type `S`.
///
/// The HTTP clients of the `newrelic-telemetry` crate implement this for
/// their snapshot type.  Implementations must be thread safe as they are
/// driven from the harvester thread.
pub trait Transport<S>: Send + Sync + 'static {
    /// Sends a snapshot, blocking until a response arrives.
    fn send_batch(&self, snapshot: &S) -> Result<Response, Error>;

    /// Releases pooled connections.  Called once when the harvester stops.
    fn close(&self) {}
}

impl<S, T: Transport<S>> Transport<S> for Arc<T> {
    fn send_batch(&self, snapshot: &S) -> Result<Response, Error> {
        (**self).send_batch(snapshot)
    }

    fn close(&self) {
        (**self).close()
    }
}
