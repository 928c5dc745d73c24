use std::time::{Duration, SystemTime};

/// Converts a `SystemTime` object into unix epoch milliseconds.
///
/// Times before the epoch are clamped to `0`.
pub fn datetime_to_millis(st: &SystemTime) -> u64 {
    match st.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => duration_to_millis(&duration),
        Err(_) => 0,
    }
}

/// Converts a `Duration` into whole milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: &Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub mod ts_millis {
    use serde::ser;

    use super::*;

    pub fn serialize<S>(st: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_u64(datetime_to_millis(st))
    }
}

pub mod ts_millis_opt {
    use serde::ser;

    use super::*;

    pub fn serialize<S>(st: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match st {
            Some(st) => serializer.serialize_some(&datetime_to_millis(st)),
            None => serializer.serialize_none(),
        }
    }
}

pub mod duration_millis {
    use serde::ser;

    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_u64(duration_to_millis(duration))
    }
}

pub mod duration_millis_opt {
    use serde::ser;

    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&duration_to_millis(duration)),
            None => serializer.serialize_none(),
        }
    }
}
