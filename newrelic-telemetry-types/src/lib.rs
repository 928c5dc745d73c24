//! This crate provides the value types of the New Relic telemetry SDK.
//!
//! It contains metrics, events, spans and logs together with their
//! attribute maps, and knows how to lay them out as request bodies for the
//! Metric, Event, Trace and Log APIs.  It performs no I/O.
//!
//! # Examples
//!
//! ```
//! use newrelic_telemetry_types::{attributes, encode_payload, GaugeMetric, Metric};
//!
//! let metric: Metric = GaugeMetric::new("temperature", 78.6)
//!     .with_attributes(attributes! { "units" => "Fahrenheit" })
//!     .into();
//! let body = encode_payload(&[metric], None).unwrap();
//! assert!(body.starts_with(b"[{\"metrics\":"));
//! ```

#![allow(clippy::new_without_default)]

mod attributes;
mod error;
mod event;
mod log;
pub mod metric;
mod payload;
mod span;
pub mod utils;

pub use crate::attributes::{validate_attributes, AttributeValue, Attributes};
pub use crate::error::ValidationError;
pub use crate::event::Event;
pub use crate::log::{Log, LEVEL_ATTRIBUTE};
pub use crate::metric::{
    validate_value, CountMetric, GaugeMetric, Metric, MetricKind, Summary, SummaryMetric,
};
pub use crate::payload::{encode_payload, Common, TelemetryItem, TelemetryKind};
pub use crate::span::{random_id, Span};
