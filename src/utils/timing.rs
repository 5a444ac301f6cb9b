use chrono::{DateTime, TimeZone, Utc};

pub type CallTime = DateTime<Utc>;

/// Seconds since the Unix epoch, with millisecond precision.
pub fn epoch_seconds(time: &CallTime) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

pub fn from_epoch_millis(millis: i64) -> Option<CallTime> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Serde adapter writing a [CallTime] as fractional epoch seconds.
pub mod as_epoch_seconds {
    use serde::Serializer;

    use super::{epoch_seconds, CallTime};

    pub fn serialize<S: Serializer>(time: &CallTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(epoch_seconds(time))
    }
}
