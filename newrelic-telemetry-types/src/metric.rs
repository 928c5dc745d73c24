//! Metric data points as accepted by the Metric API.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::attributes::{validate_attributes, Attributes};
use crate::utils::{duration_millis, ts_millis};
use crate::ValidationError;

/// The aggregation type of a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    /// A sum of values over an interval.
    Count,
    /// The last observed value.
    Gauge,
    /// Count, sum, min and max of values over an interval.
    Summary,
}

impl MetricKind {
    /// The wire name of the metric type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks that a metric value is a finite number.
pub fn validate_value(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteValue(value))
    }
}

/// Aggregated statistics of a summary metric.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Summary {
    /// Number of recorded values.
    pub count: u64,
    /// Sum of recorded values.
    pub sum: f64,
    /// Smallest recorded value.
    pub min: f64,
    /// Largest recorded value.
    pub max: f64,
}

impl Summary {
    /// Creates a summary holding a single value.
    pub fn single(value: f64) -> Self {
        Summary {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    /// Folds another value into the summary.
    pub fn insert(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

/// A count of occurrences over an interval.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CountMetric {
    /// The metric name.
    pub name: String,
    /// The accumulated count.
    pub value: f64,
    /// Start of the interval.
    #[serde(with = "ts_millis")]
    pub timestamp: SystemTime,
    /// Length of the interval.
    #[serde(rename = "interval.ms", with = "duration_millis")]
    pub interval: Duration,
    /// Dimensions of the metric.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// An instantaneous value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GaugeMetric {
    /// The metric name.
    pub name: String,
    /// The observed value.
    pub value: f64,
    /// When the value was observed.
    #[serde(with = "ts_millis")]
    pub timestamp: SystemTime,
    /// Dimensions of the metric.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// Summary statistics over an interval.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryMetric {
    /// The metric name.
    pub name: String,
    /// The aggregated statistics.
    pub value: Summary,
    /// Start of the interval.
    #[serde(with = "ts_millis")]
    pub timestamp: SystemTime,
    /// Length of the interval.
    #[serde(rename = "interval.ms", with = "duration_millis")]
    pub interval: Duration,
    /// Dimensions of the metric.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl CountMetric {
    /// Creates a count stamped now with a zero interval.
    pub fn new<S: Into<String>>(name: S, value: f64) -> Self {
        CountMetric {
            name: name.into(),
            value,
            timestamp: SystemTime::now(),
            interval: Duration::ZERO,
            attributes: Attributes::new(),
        }
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the interval start.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the interval length, keeping the interval start.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Places the interval so that it ends at `end`.
    #[must_use]
    pub fn with_end_time(mut self, end: SystemTime) -> Self {
        self.timestamp = end.checked_sub(self.interval).unwrap_or(end);
        self
    }

    /// Returns the end of the interval.
    pub fn end_time(&self) -> SystemTime {
        self.timestamp + self.interval
    }
}

impl GaugeMetric {
    /// Creates a gauge stamped now.
    pub fn new<S: Into<String>>(name: S, value: f64) -> Self {
        GaugeMetric {
            name: name.into(),
            value,
            timestamp: SystemTime::now(),
            attributes: Attributes::new(),
        }
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the observation time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl SummaryMetric {
    /// Creates a summary stamped now with a zero interval.
    pub fn new<S: Into<String>>(name: S, value: Summary) -> Self {
        SummaryMetric {
            name: name.into(),
            value,
            timestamp: SystemTime::now(),
            interval: Duration::ZERO,
            attributes: Attributes::new(),
        }
    }

    /// Creates a summary of a single observed value.
    pub fn from_value<S: Into<String>>(name: S, value: f64) -> Self {
        SummaryMetric::new(name, Summary::single(value))
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the interval start.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the interval length, keeping the interval start.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Places the interval so that it ends at `end`.
    #[must_use]
    pub fn with_end_time(mut self, end: SystemTime) -> Self {
        self.timestamp = end.checked_sub(self.interval).unwrap_or(end);
        self
    }

    /// Returns the end of the interval.
    pub fn end_time(&self) -> SystemTime {
        self.timestamp + self.interval
    }
}

/// Any metric data point.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Metric {
    /// A count.
    Count(CountMetric),
    /// A gauge.
    Gauge(GaugeMetric),
    /// A summary.
    Summary(SummaryMetric),
}

impl Metric {
    /// The metric name.
    pub fn name(&self) -> &str {
        match self {
            Metric::Count(m) => &m.name,
            Metric::Gauge(m) => &m.name,
            Metric::Summary(m) => &m.name,
        }
    }

    /// The aggregation type.
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Count(_) => MetricKind::Count,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Summary(_) => MetricKind::Summary,
        }
    }

    /// The metric dimensions.
    pub fn attributes(&self) -> &Attributes {
        match self {
            Metric::Count(m) => &m.attributes,
            Metric::Gauge(m) => &m.attributes,
            Metric::Summary(m) => &m.attributes,
        }
    }

    /// The metric timestamp.
    pub fn timestamp(&self) -> SystemTime {
        match self {
            Metric::Count(m) => m.timestamp,
            Metric::Gauge(m) => m.timestamp,
            Metric::Summary(m) => m.timestamp,
        }
    }

    /// Checks name, value and attributes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        match self {
            Metric::Count(m) => validate_value(m.value)?,
            Metric::Gauge(m) => validate_value(m.value)?,
            Metric::Summary(m) => {
                for value in [m.value.sum, m.value.min, m.value.max] {
                    validate_value(value)?;
                }
            }
        }
        validate_attributes(self.attributes())
    }
}

impl From<CountMetric> for Metric {
    fn from(metric: CountMetric) -> Self {
        Metric::Count(metric)
    }
}

impl From<GaugeMetric> for Metric {
    fn from(metric: GaugeMetric) -> Self {
        Metric::Gauge(metric)
    }
}

impl From<SummaryMetric> for Metric {
    fn from(metric: SummaryMetric) -> Self {
        Metric::Summary(metric)
    }
}
