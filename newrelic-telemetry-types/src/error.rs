use thiserror::Error;

/// Raised when a telemetry item or one of its attributes is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A metric value was `NaN` or infinite.
    #[error("metric value must be finite, got {0}")]
    NonFiniteValue(f64),
    /// A metric was recorded without a name.
    #[error("metric name must not be empty")]
    EmptyName,
    /// An attribute map contained an empty key.
    #[error("attribute keys must not be empty")]
    EmptyAttributeKey,
    /// An attribute carried a `NaN` or infinite float.
    #[error("attribute `{0}` has a non-finite value")]
    NonFiniteAttribute(String),
    /// `finish` was called on a span that already has a duration.
    #[error("span `{0}` has already been finished")]
    SpanAlreadyFinished(String),
}
