use std::time::{Duration, SystemTime};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::attributes::{AttributeValue, Attributes};
use crate::utils::{datetime_to_millis, duration_to_millis};
use crate::ValidationError;

/// Generates a random identifier of 16 lowercase hex digits.
pub fn random_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// A single timed operation within a distributed trace.
///
/// On the wire the name, parent id and duration are carried as the
/// `name`, `parent.id` and `duration.ms` attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    id: String,
    trace_id: String,
    name: String,
    timestamp: SystemTime,
    parent_id: Option<String>,
    duration: Option<Duration>,
    attributes: Attributes,
}

impl Span {
    /// Starts a new span now, with a fresh span id and trace id.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Span {
            id: random_id(),
            trace_id: random_id(),
            name: name.into(),
            timestamp: SystemTime::now(),
            parent_id: None,
            duration: None,
            attributes: Attributes::new(),
        }
    }

    /// Uses the given span id instead of a random one.
    #[must_use]
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Places the span in the given trace.
    #[must_use]
    pub fn with_trace_id<S: Into<String>>(mut self, trace_id: S) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Sets the id of the calling span.
    #[must_use]
    pub fn with_parent_id<S: Into<String>>(mut self, parent_id: S) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the duration up front, which marks the span as finished.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Adds a single attribute.
    #[must_use]
    pub fn with_attribute<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Creates a child span in the same trace.
    pub fn child<S: Into<String>>(&self, name: S) -> Span {
        Span::new(name)
            .with_trace_id(self.trace_id.clone())
            .with_parent_id(self.id.clone())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn start_time(&self) -> SystemTime {
        self.timestamp
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Sets a single attribute on an existing span.
    pub fn set_attribute<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.attributes.insert(key.into(), value.into());
    }

    /// Whether a duration has been recorded.
    pub fn is_finished(&self) -> bool {
        self.duration.is_some()
    }

    /// Records the duration up to now.
    pub fn finish(&mut self) -> Result<(), ValidationError> {
        self.finish_at(SystemTime::now())
    }

    /// Records the duration up to `end`.
    ///
    /// An `end` before the start time yields a zero duration.  A span can
    /// only be finished once.
    pub fn finish_at(&mut self, end: SystemTime) -> Result<(), ValidationError> {
        if self.duration.is_some() {
            return Err(ValidationError::SpanAlreadyFinished(self.id.clone()));
        }
        self.duration = Some(end.duration_since(self.timestamp).unwrap_or_default());
        Ok(())
    }
}

struct SpanAttributes<'a>(&'a Span);

impl Serialize for SpanAttributes<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let span = self.0;
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &span.attributes {
            if !matches!(key.as_str(), "name" | "parent.id" | "duration.ms") {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry("name", &span.name)?;
        if let Some(ref parent_id) = span.parent_id {
            map.serialize_entry("parent.id", parent_id)?;
        }
        if let Some(ref duration) = span.duration {
            map.serialize_entry("duration.ms", &duration_to_millis(duration))?;
        }
        map.end()
    }
}

impl Serialize for Span {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("trace.id", &self.trace_id)?;
        map.serialize_entry("timestamp", &datetime_to_millis(&self.timestamp))?;
        map.serialize_entry("attributes", &SpanAttributes(self))?;
        map.end()
    }
}
