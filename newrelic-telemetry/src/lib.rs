//! This crate sends telemetry to New Relic.
//!
//! Metrics, events, spans and logs are buffered in thread safe batches and
//! delivered by a background harvester thread over HTTP, one POST per kind
//! of telemetry and harvest cycle.
//!
//! # Quickstart
//!
//! The simplest way to get going is [`init`], which creates one batch and one
//! client per kind of telemetry and starts the harvester.  Keep the returned
//! guard alive for as long as telemetry should be sent; dropping it performs a
//! final harvest.
//!
//! ```no_run
//! use newrelic_telemetry::{attributes, ClientOptions, Event};
//!
//! let telemetry = newrelic_telemetry::init(ClientOptions::new().license_key("my-license-key"))?;
//!
//! telemetry
//!     .metrics()
//!     .record_gauge("temperature", 78.6, attributes! { "units" => "Fahrenheit" })?;
//! telemetry.events().record(Event::new("RateLimitEvent").with_attribute("path", "/v1"))?;
//! # Ok::<(), newrelic_telemetry::Error>(())
//! ```
//!
//! # Sending directly
//!
//! The clients can be used on their own.  They block until the API answered
//! and return the [`Response`]:
//!
//! ```no_run
//! use newrelic_telemetry::{ClientOptions, GaugeMetric, MetricClient};
//!
//! let client = MetricClient::new(&ClientOptions::new().license_key("my-license-key"))?;
//! let response = client.send(GaugeMetric::new("temperature", 78.6))?;
//! response.raise_for_status()?;
//! # Ok::<(), newrelic_telemetry::Error>(())
//! ```
//!
//! # Logging
//!
//! The SDK logs through the [`log`](https://crates.io/crates/log) facade.
//! Records from the application itself can be shipped to the Log API with a
//! [`TelemetryLogger`].
//!
//! # Feature Flags
//!
//! - `native-tls` (*default*): TLS through the platform library.
//! - `rustls`: TLS through `rustls`.
//! - `test`: Enables the `test` module of the core crate.

#![warn(missing_docs)]

mod client;
mod defaults;
mod init;
mod logger;
mod proxy;

pub use newrelic_telemetry_core::*;
pub use newrelic_telemetry_types::{
    attributes, AttributeValue, Attributes, Common, CountMetric, Event, GaugeMetric, Log, Metric,
    MetricKind, Span, Summary, SummaryMetric,
};

pub use crate::client::{
    default_host, default_path, gzip, EventClient, HttpClient, LogClient, MetricClient,
    SpanClient,
};
pub use crate::defaults::apply_defaults;
pub use crate::init::{init, TelemetryGuard};
pub use crate::logger::{format_record, log_from_record, TelemetryLogger};
