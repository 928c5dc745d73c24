use std::time::SystemTime;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::attributes::{AttributeValue, Attributes};
use crate::utils::datetime_to_millis;

/// A custom event as accepted by the Event API.
///
/// Events are sent as flat JSON objects: the attributes sit next to the
/// `eventType` and `timestamp` intrinsics, which take precedence over
/// attributes of the same name.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// The event type, e.g. `"RateLimitEvent"`.
    pub event_type: String,
    /// When the event happened.
    pub timestamp: SystemTime,
    /// Custom attributes.
    pub attributes: Attributes,
}

impl Event {
    /// Creates an event of the given type stamped now.
    pub fn new<S: Into<String>>(event_type: S) -> Self {
        Event {
            event_type: event_type.into(),
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

    /// Sets the event time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.attributes {
            if key != "eventType" && key != "timestamp" {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry("eventType", &self.event_type)?;
        map.serialize_entry("timestamp", &datetime_to_millis(&self.timestamp))?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_flat_serialization() {
        let event = Event::new("RateLimitEvent")
            .with_timestamp(SystemTime::UNIX_EPOCH + Duration::from_millis(1234))
            .with_attribute("path", "/v1/endpoint")
            .with_attribute("accountId", 1000);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "eventType": "RateLimitEvent",
                "timestamp": 1234,
                "path": "/v1/endpoint",
                "accountId": 1000,
            })
        );
    }

    #[test]
    fn test_intrinsics_win() {
        let event = Event::new("Real")
            .with_timestamp(SystemTime::UNIX_EPOCH)
            .with_attribute("eventType", "Fake")
            .with_attribute("timestamp", 99);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "Real");
        assert_eq!(value["timestamp"], 0);
    }
}
