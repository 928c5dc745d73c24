//! This crate provides the core of the New Relic telemetry SDK.
//!
//! It holds everything that does not talk HTTP: the batches that accumulate
//! telemetry between harvests, the [`Transport`] trait the HTTP clients
//! implement, the [`Harvester`] that drives periodic delivery on a
//! background thread, and the shared [`Error`] and [`ClientOptions`] types.
//!
//! Most applications should use the `newrelic-telemetry` crate, which
//! re-exports this crate together with the HTTP clients.
//!
//! # Feature Flags
//!
//! - `test`: Enables the [`test`] module with a recording transport.

#![allow(clippy::new_without_default, clippy::len_without_is_empty)]

mod batch;
mod clientoptions;
mod constants;
mod error;
mod harvester;
mod metric_batch;
mod response;
mod transport;
mod utils;


pub use newrelic_telemetry_types as types;
pub use uuid::Uuid;

pub use crate::batch::{Batch, EventBatch, LogBatch, Snapshot, SpanBatch};
pub use crate::clientoptions::{ClientOptions, ProxyConfig};
pub use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HARVEST_INTERVAL, DEFAULT_MAX_PENDING,
    DEFAULT_POOL_IDLE_TIMEOUT, DEFAULT_POOL_MAX_IDLE_PER_HOST, DEFAULT_SHUTDOWN_TIMEOUT,
    DEFAULT_TIMEOUT, USER_AGENT, VERSION,
};
pub use crate::error::{BoxError, Error, ValidationError};
pub use crate::harvester::{Harvester, HarvesterState};
pub use crate::metric_batch::{MetricBatch, MetricIdentity, MetricSnapshot};
pub use crate::response::Response;
pub use crate::transport::{BatchSnapshot, Flush, Transport};
