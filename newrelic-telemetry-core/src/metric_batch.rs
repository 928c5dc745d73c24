//! Aggregation of metrics between harvests.
//!
//! Every recorded value is folded into a series keyed by a [`MetricIdentity`]:
//! counts are summed, summaries track count, sum, min and max, and gauges keep
//! the last value.  [`MetricBatch::flush`] swaps the series map out in one
//! critical section and closes the reporting window of every series.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::SystemTime;

use newrelic_telemetry_types::{
    validate_attributes, validate_value, Attributes, Common, CountMetric, GaugeMetric, Metric,
    MetricKind, Summary, SummaryMetric, ValidationError,
};
use uuid::Uuid;

use crate::constants::DEFAULT_MAX_PENDING;
use crate::transport::{BatchSnapshot, Flush};
use crate::utils::lock;
use crate::{ClientOptions, Error};

/// The key two records must share to be aggregated together.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    kind: MetricKind,
    name: String,
    attributes: Attributes,
}

impl MetricIdentity {
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

#[derive(Debug)]
enum SeriesValue {
    Count(f64),
    Gauge(f64),
    Summary(Summary),
}

/// A single aggregated series within the current window.
#[derive(Debug)]
struct Series {
    /// First contribution, or the last one for gauges.
    timestamp: SystemTime,
    value: SeriesValue,
}

impl Series {
    fn new(kind: MetricKind, value: f64, timestamp: SystemTime) -> Self {
        let value = match kind {
            MetricKind::Count => SeriesValue::Count(value),
            MetricKind::Gauge => SeriesValue::Gauge(value),
            MetricKind::Summary => SeriesValue::Summary(Summary::single(value)),
        };
        Series { timestamp, value }
    }

    fn insert(&mut self, value: f64, timestamp: SystemTime) {
        match self.value {
            SeriesValue::Count(ref mut sum) => *sum += value,
            SeriesValue::Gauge(ref mut last) => {
                *last = value;
                self.timestamp = timestamp;
            }
            SeriesValue::Summary(ref mut summary) => summary.insert(value),
        }
    }

    fn into_metric(self, identity: MetricIdentity, end: SystemTime) -> Metric {
        let MetricIdentity {
            name, attributes, ..
        } = identity;
        let interval = end.duration_since(self.timestamp).unwrap_or_default();
        match self.value {
            SeriesValue::Count(value) => CountMetric {
                name,
                value,
                timestamp: self.timestamp,
                interval,
                attributes,
            }
            .into(),
            SeriesValue::Gauge(value) => GaugeMetric {
                name,
                value,
                timestamp: self.timestamp,
                attributes,
            }
            .into(),
            SeriesValue::Summary(value) => SummaryMetric {
                name,
                value,
                timestamp: self.timestamp,
                interval,
                attributes,
            }
            .into(),
        }
    }
}

#[derive(Debug)]
struct MetricBatchState {
    series: HashMap<MetricIdentity, Series>,
    interval_start: SystemTime,
}

/// Aggregates count, gauge and summary metrics until they are flushed.
///
/// # Examples
///
/// ```
/// use newrelic_telemetry_core::MetricBatch;
/// use newrelic_telemetry_types::attributes;
///
/// let batch = MetricBatch::new();
/// batch.record_count("requests", 1.0, attributes! { "route" => "/" }).unwrap();
/// batch.record_count("requests", 2.0, attributes! { "route" => "/" }).unwrap();
///
/// let snapshot = batch.flush();
/// assert_eq!(snapshot.metrics().len(), 1);
/// ```
pub struct MetricBatch {
    state: Mutex<MetricBatchState>,
    attributes: Attributes,
    max_pending: usize,
}

impl MetricBatch {
    /// Creates an empty batch with the default capacity.
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Creates an empty batch holding at most `max_pending` distinct series.
    pub fn with_max_pending(max_pending: usize) -> Self {
        MetricBatch {
            state: Mutex::new(MetricBatchState {
                series: HashMap::new(),
                interval_start: SystemTime::now(),
            }),
            attributes: Attributes::new(),
            max_pending,
        }
    }

    /// Creates an empty batch sized from the options.
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::with_max_pending(options.max_pending)
    }

    /// Attaches attributes to the common block of every snapshot.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Computes the aggregation key of a record.
    pub fn create_identity<S: Into<String>>(
        name: S,
        attributes: Attributes,
        kind: MetricKind,
    ) -> MetricIdentity {
        MetricIdentity {
            kind,
            name: name.into(),
            attributes,
        }
    }

    /// Adds `value` to a count.  Negative values are allowed.
    pub fn record_count<S: Into<String>>(
        &self,
        name: S,
        value: f64,
        attributes: Attributes,
    ) -> Result<(), Error> {
        self.record(MetricKind::Count, name.into(), value, attributes)
    }

    /// Sets a gauge, replacing any earlier value of the same series.
    pub fn record_gauge<S: Into<String>>(
        &self,
        name: S,
        value: f64,
        attributes: Attributes,
    ) -> Result<(), Error> {
        self.record(MetricKind::Gauge, name.into(), value, attributes)
    }

    /// Folds `value` into a summary.
    pub fn record_summary<S: Into<String>>(
        &self,
        name: S,
        value: f64,
        attributes: Attributes,
    ) -> Result<(), Error> {
        self.record(MetricKind::Summary, name.into(), value, attributes)
    }

    fn record(
        &self,
        kind: MetricKind,
        name: String,
        value: f64,
        attributes: Attributes,
    ) -> Result<(), Error> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        validate_value(value)?;
        validate_attributes(&attributes)?;

        let identity = Self::create_identity(name, attributes, kind);
        let now = SystemTime::now();

        let mut state = lock(&self.state);
        let pending = state.series.len();
        match state.series.entry(identity) {
            Entry::Occupied(mut e) => e.get_mut().insert(value, now),
            Entry::Vacant(e) => {
                if pending >= self.max_pending {
                    return Err(Error::Capacity {
                        max_pending: self.max_pending,
                    });
                }
                e.insert(Series::new(kind, value, now));
            }
        }
        Ok(())
    }

    /// Drains every series into a snapshot and starts a new window.
    pub fn flush(&self) -> MetricSnapshot {
        let now = SystemTime::now();
        let (series, interval_start) = {
            let mut state = lock(&self.state);
            let series = std::mem::take(&mut state.series);
            let interval_start = std::mem::replace(&mut state.interval_start, now);
            (series, interval_start)
        };

        let metrics = series
            .into_iter()
            .map(|(identity, series)| series.into_metric(identity, now))
            .collect();

        MetricSnapshot {
            batch_id: Uuid::new_v4(),
            metrics,
            common: Common {
                timestamp: Some(interval_start),
                interval: Some(now.duration_since(interval_start).unwrap_or_default()),
                attributes: self.attributes.clone(),
            },
        }
    }

    /// The number of distinct series in the current window.
    pub fn len(&self) -> usize {
        lock(&self.state).series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }
}

impl Default for MetricBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricBatch")
            .field("series", &self.len())
            .field("max_pending", &self.max_pending)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl Flush for MetricBatch {
    const NAME: &'static str = "metrics";
    type Snapshot = MetricSnapshot;

    fn flush(&self) -> MetricSnapshot {
        MetricBatch::flush(self)
    }
}

/// The drained contents of a [`MetricBatch`].
#[derive(Clone, Debug)]
pub struct MetricSnapshot {
    batch_id: Uuid,
    metrics: Vec<Metric>,
    common: Common,
}

impl MetricSnapshot {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// The batch window and batch attributes.
    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl BatchSnapshot for MetricSnapshot {
    fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    fn len(&self) -> usize {
        self.metrics.len()
    }
}
