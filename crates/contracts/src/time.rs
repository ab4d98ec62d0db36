//! Nanosecond timestamps and conversions.

/// Sensor timestamp in integer nanoseconds.
pub type Timestamp = i64;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Nanoseconds per millisecond.
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Convert nanoseconds to seconds.
#[inline]
pub fn nsec_to_sec(timestamp: Timestamp) -> f64 {
    timestamp as f64 / NANOS_PER_SEC as f64
}

/// Convert seconds to nanoseconds, rounded to the nearest nanosecond.
#[inline]
pub fn sec_to_nsec(seconds: f64) -> Timestamp {
    (seconds * NANOS_PER_SEC as f64).round() as Timestamp
}

/// Milliseconds expressed as a timestamp.
#[inline]
pub const fn millis(ms: i64) -> Timestamp {
    ms * NANOS_PER_MILLI
}

/// Timestamp expressed in (fractional) milliseconds, for logs.
#[inline]
pub fn as_millis_f64(timestamp: Timestamp) -> f64 {
    timestamp as f64 / NANOS_PER_MILLI as f64
}
