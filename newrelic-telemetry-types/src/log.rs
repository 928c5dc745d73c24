use std::time::SystemTime;

use serde::Serialize;

use crate::attributes::{AttributeValue, Attributes};
use crate::utils::ts_millis;

/// The attribute carrying the severity of a log line.
pub const LEVEL_ATTRIBUTE: &str = "log.level";

/// A single log line as accepted by the Log API.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Log {
    /// The log message.
    pub message: String,
    /// When the message was generated.
    #[serde(with = "ts_millis")]
    pub timestamp: SystemTime,
    /// Additional attributes.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Log {
    /// Creates a log line stamped now.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Log {
            message: message.into(),
            timestamp: SystemTime::now(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_attribute<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the `log.level` attribute.
    #[must_use]
    pub fn with_level<S: Into<String>>(self, level: S) -> Self {
        self.with_attribute(LEVEL_ATTRIBUTE, level.into())
    }

    /// Returns the `log.level` attribute, if it is a string.
    pub fn level(&self) -> Option<&str> {
        self.attributes
            .get(LEVEL_ATTRIBUTE)
            .and_then(AttributeValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_shape() {
        let log = Log::new("Hello World")
            .with_timestamp(SystemTime::UNIX_EPOCH + Duration::from_millis(7))
            .with_level("WARN");
        assert_eq!(log.level(), Some("WARN"));
        assert_eq!(
            serde_json::to_value(&log).unwrap(),
            json!({"message": "Hello World", "timestamp": 7, "attributes": {"log.level": "WARN"}})
        );
    }

    #[test]
    fn test_attributes_omitted_when_empty() {
        let log = Log::new("bare").with_timestamp(SystemTime::UNIX_EPOCH);
        assert_eq!(
            serde_json::to_value(&log).unwrap(),
            json!({"message": "bare", "timestamp": 0})
        );
    }
}
