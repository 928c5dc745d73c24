//! Request bodies for the ingest APIs.
//!
//! Metric, span and log payloads are a one element array holding an
//! optional `common` block and the list of items.  Event payloads are a
//! flat array of events.

use std::time::{Duration, SystemTime};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::attributes::Attributes;
use crate::utils::{duration_millis_opt, ts_millis_opt};
use crate::{Event, Log, Metric, Span};

/// Data shared by every item of a payload.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Common {
    /// Start of the reporting interval.
    #[serde(
        with = "ts_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<SystemTime>,
    /// Length of the reporting interval.
    #[serde(
        rename = "interval.ms",
        with = "duration_millis_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<Duration>,
    /// Attributes applied to every item.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Common {
    /// A common block carrying only attributes.
    pub fn from_attributes(attributes: Attributes) -> Self {
        Common {
            attributes,
            ..Default::default()
        }
    }

    /// Whether serializing this block would produce `{}`.
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.interval.is_none() && self.attributes.is_empty()
    }
}

/// The four kinds of telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    Metric,
    Event,
    Span,
    Log,
}

impl TelemetryKind {
    /// A short lowercase name, used in diagnostics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TelemetryKind::Metric => "metrics",
            TelemetryKind::Event => "events",
            TelemetryKind::Span => "spans",
            TelemetryKind::Log => "logs",
        }
    }

    /// The key the item list is stored under, `None` for flat payloads.
    pub const fn payload_key(&self) -> Option<&'static str> {
        match self {
            TelemetryKind::Metric => Some("metrics"),
            TelemetryKind::Event => None,
            TelemetryKind::Span => Some("spans"),
            TelemetryKind::Log => Some("logs"),
        }
    }
}

/// An item that can be sent to one of the ingest APIs.
pub trait TelemetryItem: Serialize + Clone + Send + Sync + 'static {
    /// Which API the item belongs to.
    const KIND: TelemetryKind;
}

impl TelemetryItem for Metric {
    const KIND: TelemetryKind = TelemetryKind::Metric;
}

impl TelemetryItem for Event {
    const KIND: TelemetryKind = TelemetryKind::Event;
}

impl TelemetryItem for Span {
    const KIND: TelemetryKind = TelemetryKind::Span;
}

impl TelemetryItem for Log {
    const KIND: TelemetryKind = TelemetryKind::Log;
}

struct Envelope<'a, T> {
    key: &'static str,
    common: Option<&'a Common>,
    items: &'a [T],
}

impl<T: Serialize> Serialize for Envelope<'_, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(common) = self.common {
            map.serialize_entry("common", common)?;
        }
        map.serialize_entry(self.key, self.items)?;
        map.end()
    }
}

/// Serializes `items` into the JSON body expected by their API.
///
/// Events have no common block; `common` is ignored for them.  An empty
/// common block is left out.
pub fn encode_payload<T: TelemetryItem>(
    items: &[T],
    common: Option<&Common>,
) -> serde_json::Result<Vec<u8>> {
    match T::KIND.payload_key() {
        None => serde_json::to_vec(items),
        Some(key) => serde_json::to_vec(&[Envelope {
            key,
            common: common.filter(|c| !c.is_empty()),
            items,
        }]),
    }
}
