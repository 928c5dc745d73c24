//! Buffers for events, spans and logs.

use std::fmt;
use std::sync::Mutex;

use newrelic_telemetry_types::{Attributes, Common, Event, Log, Span, TelemetryItem};
use uuid::Uuid;

use crate::constants::DEFAULT_MAX_PENDING;
use crate::transport::{BatchSnapshot, Flush};
use crate::utils::lock;
use crate::{ClientOptions, Error};

/// A buffer of events.  Event payloads never carry a common block.
pub type EventBatch = Batch<Event>;
/// A buffer of spans.
pub type SpanBatch = Batch<Span>;
/// A buffer of log lines.
pub type LogBatch = Batch<Log>;

#[derive(Debug)]
struct BatchQueue<T> {
    items: Vec<T>,
}

/// A thread safe buffer of telemetry items.
///
/// Items are appended by [`record`](Batch::record) and drained as a whole by
/// [`flush`](Batch::flush).  Once `max_pending` items are buffered, new
/// items are rejected until the next flush.
pub struct Batch<T> {
    queue: Mutex<BatchQueue<T>>,
    common: Option<Common>,
    max_pending: usize,
}

impl<T: TelemetryItem> Batch<T> {
    /// Creates an empty batch with the default capacity.
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Creates an empty batch that holds at most `max_pending` items.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Batch {
            queue: Mutex::new(BatchQueue { items: Vec::new() }),
            common: None,
            max_pending,
        }
    }

    /// Creates an empty batch sized from the options.
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::with_max_pending(options.max_pending)
    }

    /// Attaches attributes to every flushed snapshot.
    ///
    /// Ignored for event batches, whose payload has no common block.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.common = if attributes.is_empty() || T::KIND.payload_key().is_none() {
            None
        } else {
            Some(Common::from_attributes(attributes))
        };
        self
    }

    /// Buffers an item.
    ///
    /// Fails with [`Error::Capacity`] and drops the item when the batch is
    /// full.
    pub fn record(&self, item: T) -> Result<(), Error> {
        let mut queue = lock(&self.queue);
        if queue.items.len() >= self.max_pending {
            return Err(Error::Capacity {
                max_pending: self.max_pending,
            });
        }
        queue.items.push(item);
        Ok(())
    }

    /// Drains every buffered item into a snapshot.
    pub fn flush(&self) -> Snapshot<T> {
        let items = std::mem::take(&mut lock(&self.queue).items);
        Snapshot {
            batch_id: Uuid::new_v4(),
            items,
            common: self.common.clone(),
        }
    }

    /// The number of buffered items.
    pub fn len(&self) -> usize {
        lock(&self.queue).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }
}

impl<T: TelemetryItem> Default for Batch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Batch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("pending", &lock(&self.queue).items.len())
            .field("max_pending", &self.max_pending)
            .field("common", &self.common)
            .finish()
    }
}

impl<T: TelemetryItem> Flush for Batch<T> {
    const NAME: &'static str = T::KIND.as_str();
    type Snapshot = Snapshot<T>;

    fn flush(&self) -> Snapshot<T> {
        Batch::flush(self)
    }
}

/// The drained contents of a [`Batch`].
#[derive(Clone, Debug)]
pub struct Snapshot<T> {
    batch_id: Uuid,
    items: Vec<T>,
    common: Option<Common>,
}

impl<T> Snapshot<T> {
    /// Assembles a snapshot by hand, with a fresh batch id.
    pub fn new(items: Vec<T>, common: Option<Common>) -> Self {
        Snapshot {
            batch_id: Uuid::new_v4(),
            items,
            common,
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn common(&self) -> Option<&Common> {
        self.common.as_ref()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Send + 'static> BatchSnapshot for Snapshot<T> {
    fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
