use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::ValidationError;

/// Key/value metadata attached to telemetry items.
///
/// A `BTreeMap` keeps keys ordered, so two maps with the same entries compare
/// and hash equal regardless of insertion order.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute value.
///
/// Floats compare and hash by their bit pattern so the type can take part in
/// metric identities.  Non-finite floats are rejected by
/// [`validate_attributes`].
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A double precision float.
    Float(f64),
    /// A string.
    String(String),
}

impl AttributeValue {
    /// Returns the string value if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            AttributeValue::Int(v) => Some(v as f64),
            AttributeValue::UInt(v) => Some(v as f64),
            AttributeValue::Float(v) => Some(v),
            _ => None,
        }
    }

    fn is_finite(&self) -> bool {
        match *self {
            AttributeValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AttributeValue::Bool(v) => v.hash(state),
            AttributeValue::Int(v) => v.hash(state),
            AttributeValue::UInt(v) => v.hash(state),
            AttributeValue::Float(v) => v.to_bits().hash(state),
            AttributeValue::String(v) => v.hash(state),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::UInt(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::String(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from {
    ($ty:ty, $variant:ident, $conv:ty) => {
        impl From<$ty> for AttributeValue {
            #[inline]
            fn from(val: $ty) -> Self {
                AttributeValue::$variant(<$conv>::from(val))
            }
        }
    };
}

impl_from!(bool, Bool, bool);
impl_from!(i8, Int, i64);
impl_from!(i16, Int, i64);
impl_from!(i32, Int, i64);
impl_from!(i64, Int, i64);
impl_from!(u8, UInt, u64);
impl_from!(u16, UInt, u64);
impl_from!(u32, UInt, u64);
impl_from!(u64, UInt, u64);
impl_from!(f32, Float, f64);
impl_from!(f64, Float, f64);
impl_from!(String, String, String);
impl_from!(&str, String, String);

impl From<usize> for AttributeValue {
    #[inline]
    fn from(val: usize) -> Self {
        AttributeValue::UInt(val as u64)
    }
}

impl<'a> From<Cow<'a, str>> for AttributeValue {
    #[inline]
    fn from(val: Cow<'a, str>) -> Self {
        AttributeValue::String(val.into_owned())
    }
}

/// Checks that every key is non-empty and every float is finite.
pub fn validate_attributes(attributes: &Attributes) -> Result<(), ValidationError> {
    for (key, value) in attributes {
        if key.is_empty() {
            return Err(ValidationError::EmptyAttributeKey);
        }
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteAttribute(key.clone()));
        }
    }
    Ok(())
}

/// Builds an [`Attributes`] map from `key => value` pairs.
///
/// # Examples
///
/// ```
/// use newrelic_telemetry_types::{attributes, AttributeValue};
///
/// let attrs = attributes! { "units" => "Fahrenheit", "retries" => 3 };
/// assert_eq!(attrs["retries"], AttributeValue::Int(3));
/// ```
#[macro_export]
macro_rules! attributes {
    () => {
        $crate::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attributes = $crate::Attributes::new();
        $(
            attributes.insert(
                ::std::string::String::from($key),
                $crate::AttributeValue::from($value),
            );
        )+
        attributes
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_serialization() {
        let attrs = attributes! {
            "bool" => true,
            "float" => 1.5,
            "int" => -3,
            "str" => "value",
            "uint" => 7u32,
        };
        assert_eq!(
            serde_json::to_string(&attrs).unwrap(),
            r#"{"bool":true,"float":1.5,"int":-3,"str":"value","uint":7}"#
        );
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let mut a = Attributes::new();
        a.insert("x".into(), 1.into());
        a.insert("y".into(), "b".into());
        let mut b = Attributes::new();
        b.insert("y".into(), "b".into());
        b.insert("x".into(), 1.into());
        assert_eq!(a, b);
    }

    #[test]
    fn test_validation() {
        assert_eq!(validate_attributes(&attributes! { "ok" => 1.0 }), Ok(()));
        assert_eq!(
            validate_attributes(&attributes! { "" => 1 }),
            Err(ValidationError::EmptyAttributeKey)
        );
        assert_eq!(
            validate_attributes(&attributes! { "bad" => f64::NAN }),
            Err(ValidationError::NonFiniteAttribute("bad".into()))
        );
    }

    #[test]
    fn test_float_equality_by_bits() {
        assert_eq!(AttributeValue::Float(0.5), AttributeValue::Float(0.5));
        assert_ne!(AttributeValue::Float(1.0), AttributeValue::Int(1));
    }
}
